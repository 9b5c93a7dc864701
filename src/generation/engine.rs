//! The text-to-music capability behind a trait seam.
//!
//! The model itself is an external collaborator: production deployments
//! drive a generator binary over stdout, tests plug in recording fakes.

use async_trait::async_trait;

/// Failures of the generation capability itself.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(String),

    #[error("engine exited with status {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("engine produced unusable output: {0}")]
    BadOutput(String),

    #[error("engine produced no audio")]
    Empty,
}

/// Raw waveform returned by an engine. Interleaved f32 samples in [-1, 1].
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration_seconds(&self) -> f64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

/// Opaque generation capability: text prompt + duration in, waveform out.
#[async_trait]
pub trait MusicEngine: Send + Sync {
    async fn generate(&self, description: &str, duration_s: f64)
        -> Result<AudioBuffer, EngineError>;

    fn name(&self) -> &'static str;
}

/// Production engine: spawns an external generator process and reads
/// raw f32le PCM (mono, at the configured sample rate) from its stdout.
pub struct CommandEngine {
    command: String,
    sample_rate: u32,
}

impl CommandEngine {
    pub fn new(command: String, sample_rate: u32) -> Self {
        Self {
            command,
            sample_rate,
        }
    }

    /// Verifies the generator binary exists and answers `--version`.
    /// Run once at startup; a failed probe leaves the process serving
    /// catalog-only.
    pub async fn probe(&self) -> Result<(), EngineError> {
        let output = tokio::process::Command::new(&self.command)
            .arg("--version")
            .output()
            .await
            .map_err(|error| EngineError::Spawn(error.to_string()))?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let version = String::from_utf8_lossy(&output.stdout);
        tracing::info!("✅ engine '{}' version: {}", self.command, version.trim());
        Ok(())
    }
}

#[async_trait]
impl MusicEngine for CommandEngine {
    async fn generate(
        &self,
        description: &str,
        duration_s: f64,
    ) -> Result<AudioBuffer, EngineError> {
        let output = tokio::process::Command::new(&self.command)
            .arg("--prompt")
            .arg(description)
            .arg("--duration")
            .arg(duration_s.to_string())
            .arg("--sample-rate")
            .arg(self.sample_rate.to_string())
            .output()
            .await
            .map_err(|error| EngineError::Spawn(error.to_string()))?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let samples = decode_f32le(&output.stdout)?;
        if samples.is_empty() {
            return Err(EngineError::Empty);
        }

        Ok(AudioBuffer {
            samples,
            channels: 1,
            sample_rate: self.sample_rate,
        })
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Decodes little-endian f32 PCM bytes.
fn decode_f32le(bytes: &[u8]) -> Result<Vec<f32>, EngineError> {
    if bytes.len() % 4 != 0 {
        return Err(EngineError::BadOutput(format!(
            "stdout length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_f32le_roundtrip() {
        let samples = [0.0f32, 0.5, -0.25, 1.0];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        assert_eq!(decode_f32le(&bytes).unwrap(), samples);
    }

    #[test]
    fn test_decode_rejects_truncated_output() {
        let error = decode_f32le(&[0, 0, 0]).unwrap_err();
        assert!(matches!(error, EngineError::BadOutput(_)));
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer {
            samples: vec![0.0; 32_000 * 3],
            channels: 1,
            sample_rate: 32_000,
        };
        assert_eq!(buffer.duration_seconds(), 3.0);

        let stereo = AudioBuffer {
            samples: vec![0.0; 32_000 * 2],
            channels: 2,
            sample_rate: 32_000,
        };
        assert_eq!(stereo.duration_seconds(), 1.0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let engine = CommandEngine::new("definitely-not-a-real-binary-xyz".into(), 32_000);
        let error = engine.generate("piano", 1.0).await.unwrap_err();
        assert!(matches!(error, EngineError::Spawn(_)));
    }
}

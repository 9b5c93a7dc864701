use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::generation::AudioBuffer;

/// Manager for generated WAV artifacts on disk.
pub struct ArtifactStore {
    generated_dir: PathBuf,
    max_files: usize,
}

impl ArtifactStore {
    pub fn new(generated_dir: PathBuf, max_files: usize) -> Result<Self> {
        std::fs::create_dir_all(&generated_dir)?;
        info!("📁 Artifact store at: {}", generated_dir.display());

        Ok(Self {
            generated_dir,
            max_files,
        })
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.generated_dir.join(file_name)
    }

    /// Writes the waveform as a 32-bit float WAV at the engine's sample
    /// rate. Encoding runs on the blocking pool.
    pub async fn save_wav(&self, file_name: &str, buffer: AudioBuffer) -> Result<PathBuf> {
        let path = self.path_for(file_name);
        let target = path.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let spec = hound::WavSpec {
                channels: buffer.channels,
                sample_rate: buffer.sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            let mut writer = hound::WavWriter::create(&target, spec)
                .map_err(|error| ApiError::Generation(format!("wav create: {error}")))?;
            for &sample in &buffer.samples {
                writer
                    .write_sample(sample)
                    .map_err(|error| ApiError::Generation(format!("wav write: {error}")))?;
            }
            writer
                .finalize()
                .map_err(|error| ApiError::Generation(format!("wav finalize: {error}")))?;
            Ok(())
        })
        .await
        .map_err(|error| ApiError::Generation(format!("wav writer task panicked: {error}")))??;

        info!("💾 Music saved to {}", path.display());
        Ok(path)
    }

    /// Best-effort pruning of the oldest `.wav` artifacts beyond the
    /// configured budget. Must never fail the triggering request, so
    /// every error is logged and swallowed.
    pub async fn cleanup_old(&self) {
        if let Err(error) = self.try_cleanup().await {
            warn!("artifact cleanup failed: {}", error);
        }
    }

    async fn try_cleanup(&self) -> std::io::Result<()> {
        let mut entries = fs::read_dir(&self.generated_dir).await?;
        let mut artifacts = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "wav") {
                if let Ok(metadata) = entry.metadata().await {
                    if let Ok(modified) = metadata.modified() {
                        artifacts.push((modified, path));
                    }
                }
            }
        }

        if artifacts.len() <= self.max_files {
            return Ok(());
        }

        artifacts.sort_by_key(|(modified, _)| *modified);
        let excess = artifacts.len() - self.max_files;

        for (_, path) in artifacts.into_iter().take(excess) {
            match fs::remove_file(&path).await {
                Ok(_) => info!("🗑️ Pruned old artifact: {}", path.display()),
                Err(error) => warn!("could not prune {}: {}", path.display(), error),
            }
        }

        Ok(())
    }
}

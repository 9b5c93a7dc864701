//! Request validation and serialized access to the generation engine.
//!
//! The engine is assumed non-reentrant per process: two generations
//! driving the accelerator at once risk resource contention. A single
//! worker task owns the engine; requests queue through a bounded
//! channel and a full queue is rejected with `Busy` instead of piling
//! onto the device.

pub mod engine;

use std::path::Path;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::config::Config;
use crate::error::ApiError;

pub use engine::{AudioBuffer, CommandEngine, EngineError, MusicEngine};

const DEFAULT_FILE_STEM: &str = "generated-track";

/// A validated generation request, ready to hand to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedGeneration {
    pub description: String,
    pub duration_s: f64,
    pub file_name: String,
}

/// Validates caller input before the capability is touched.
///
/// Rejections here must never reach the engine; handler tests assert
/// zero invocations on invalid input.
pub fn prepare(
    config: &Config,
    description: &str,
    duration: Option<f64>,
    file_name: Option<&str>,
) -> Result<PreparedGeneration, ApiError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(ApiError::Validation("description must not be empty".into()));
    }

    let duration_s = duration.unwrap_or(config.default_duration_s);
    if !duration_s.is_finite() || duration_s <= 0.0 {
        return Err(ApiError::Validation(format!(
            "duration must be positive, got {duration_s}"
        )));
    }
    if duration_s > config.max_duration_s {
        return Err(ApiError::Validation(format!(
            "duration {duration_s}s exceeds the maximum of {}s",
            config.max_duration_s
        )));
    }

    Ok(PreparedGeneration {
        description: description.to_string(),
        duration_s,
        file_name: sanitize_file_name(file_name),
    })
}

/// Reduces a caller-supplied name to a safe basename ending in `.wav`.
pub fn sanitize_file_name(file_name: Option<&str>) -> String {
    let base = file_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_FILE_STEM);

    if base.ends_with(".wav") {
        base.to_string()
    } else {
        format!("{base}.wav")
    }
}

struct PendingRequest {
    description: String,
    duration_s: f64,
    reply: oneshot::Sender<Result<AudioBuffer, EngineError>>,
}

/// Handle for submitting generation requests to the worker task.
///
/// The worker processes requests strictly sequentially, so the engine
/// never observes overlapping invocations.
#[derive(Clone)]
pub struct GenerationManager {
    tx: mpsc::Sender<PendingRequest>,
}

impl GenerationManager {
    /// Spawns the worker task that owns the engine.
    pub fn start(engine: Box<dyn MusicEngine>, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<PendingRequest>(queue_depth.max(1));

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                info!(
                    "🎵 generating {}s of music for: {}",
                    request.duration_s, request.description
                );
                let result = engine
                    .generate(&request.description, request.duration_s)
                    .await;
                // Caller may have disconnected; the result is simply dropped.
                let _ = request.reply.send(result);
            }
            info!("generation worker shut down");
        });

        Self { tx }
    }

    /// Submits a request and waits for the waveform.
    ///
    /// Queues behind any in-flight generation; rejects with
    /// [`ApiError::Busy`] when the backlog is at capacity.
    pub async fn generate(
        &self,
        description: &str,
        duration_s: f64,
    ) -> Result<AudioBuffer, ApiError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .try_send(PendingRequest {
                description: description.to_string(),
                duration_s,
                reply: reply_tx,
            })
            .map_err(|error| match error {
                mpsc::error::TrySendError::Full(_) => ApiError::Busy,
                mpsc::error::TrySendError::Closed(_) => ApiError::ModelUnavailable,
            })?;

        reply_rx
            .await
            .map_err(|_| ApiError::Generation("generation worker dropped the request".into()))?
            .map_err(|error| ApiError::Generation(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn test_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_rejects_empty_description() {
        let error = prepare(&test_config(), "   ", Some(10.0), None).unwrap_err();
        assert!(matches!(error, ApiError::Validation(_)));
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        assert!(prepare(&test_config(), "piano", Some(0.0), None).is_err());
        assert!(prepare(&test_config(), "piano", Some(-3.0), None).is_err());
        assert!(prepare(&test_config(), "piano", Some(f64::NAN), None).is_err());
    }

    #[test]
    fn test_rejects_duration_above_max() {
        assert!(prepare(&test_config(), "piano", Some(500.0), None).is_err());
    }

    #[test]
    fn test_defaults_duration_from_config() {
        let prepared = prepare(&test_config(), "piano", None, None).unwrap();
        assert_eq!(prepared.duration_s, 15.0);
        assert_eq!(prepared.file_name, "generated-track.wav");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name(None), "generated-track.wav");
        assert_eq!(sanitize_file_name(Some("song")), "song.wav");
        assert_eq!(sanitize_file_name(Some("song.wav")), "song.wav");
        assert_eq!(sanitize_file_name(Some("../../etc/passwd")), "passwd.wav");
        assert_eq!(sanitize_file_name(Some("a/b/c.wav")), "c.wav");
        assert_eq!(sanitize_file_name(Some("   ")), "generated-track.wav");
    }

    /// Engine fake that records invocations and flags any overlap.
    struct RecordingEngine {
        invocations: Arc<AtomicUsize>,
        in_flight: Arc<AtomicBool>,
        overlapped: Arc<AtomicBool>,
    }

    impl RecordingEngine {
        fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicBool>) {
            let invocations = Arc::new(AtomicUsize::new(0));
            let overlapped = Arc::new(AtomicBool::new(false));
            let engine = Self {
                invocations: invocations.clone(),
                in_flight: Arc::new(AtomicBool::new(false)),
                overlapped: overlapped.clone(),
            };
            (engine, invocations, overlapped)
        }
    }

    #[async_trait]
    impl MusicEngine for RecordingEngine {
        async fn generate(
            &self,
            _description: &str,
            _duration_s: f64,
        ) -> Result<AudioBuffer, EngineError> {
            if self.in_flight.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            self.invocations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.in_flight.store(false, Ordering::SeqCst);

            Ok(AudioBuffer {
                samples: vec![0.0; 64],
                channels: 1,
                sample_rate: 32_000,
            })
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_overlap_on_the_engine() {
        let (engine, invocations, overlapped) = RecordingEngine::new();
        let manager = GenerationManager::start(Box::new(engine), 16);

        let a = manager.generate("piano", 1.0);
        let b = manager.generate("drums", 1.0);
        let (first, second) = tokio::join!(a, b);

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
        assert!(!overlapped.load(Ordering::SeqCst), "engine saw overlapping calls");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_full_queue_rejects_with_busy() {
        let (engine, _invocations, _overlapped) = RecordingEngine::new();
        // Depth 1: one request in flight or queued, the rest bounce.
        let manager = GenerationManager::start(Box::new(engine), 1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.generate("piano", 1.0).await
            }));
        }

        let mut busy = 0;
        for handle in handles {
            if let Err(ApiError::Busy) = handle.await.unwrap() {
                busy += 1;
            }
        }
        assert!(busy > 0, "expected at least one Busy rejection");
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_the_engine() {
        let (engine, invocations, _overlapped) = RecordingEngine::new();
        let manager = GenerationManager::start(Box::new(engine), 4);
        let config = test_config();

        // The handler path validates first; on failure the manager is
        // never consulted.
        for (description, duration) in [("", Some(5.0)), ("piano", Some(0.0)), ("piano", Some(-1.0))]
        {
            let prepared = prepare(&config, description, duration, None);
            assert!(prepared.is_err());
        }

        drop(manager);
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }
}

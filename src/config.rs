use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,

    // Paths
    pub generated_dir: PathBuf,
    pub audio_cache_dir: PathBuf,

    // Generation
    pub engine_command: String,
    pub default_duration_s: f64,
    pub max_duration_s: f64,
    pub sample_rate: u32,
    pub queue_depth: usize,

    // Catalog credentials (each one enables its integration)
    pub jamendo_client_id: Option<String>,
    pub freepik_api_key: Option<String>,

    // Limits
    pub max_generated_files: usize,
    pub max_catalog_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Server
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()?,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),

            // Paths
            generated_dir: std::env::var("GENERATED_DIR")
                .unwrap_or_else(|_| "generated".to_string())
                .into(),
            audio_cache_dir: std::env::var("AUDIO_CACHE_DIR")
                .unwrap_or_else(|_| "audio_cache".to_string())
                .into(),

            // Generation
            engine_command: std::env::var("ENGINE_COMMAND")
                .unwrap_or_else(|_| "musegen-engine".to_string()),
            default_duration_s: std::env::var("DEFAULT_DURATION")
                .unwrap_or_else(|_| "15.0".to_string())
                .parse()?,
            max_duration_s: std::env::var("MAX_DURATION")
                .unwrap_or_else(|_| "120.0".to_string())
                .parse()?,
            sample_rate: std::env::var("SAMPLE_RATE")
                .unwrap_or_else(|_| "32000".to_string()) // MusicGen output rate
                .parse()?,
            queue_depth: std::env::var("QUEUE_DEPTH")
                .unwrap_or_else(|_| "16".to_string())
                .parse()?,

            // Catalog credentials
            jamendo_client_id: std::env::var("JAMENDO_CLIENT_ID")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            freepik_api_key: std::env::var("FREEPIK_API_KEY")
                .ok()
                .filter(|value| !value.trim().is_empty()),

            // Limits
            max_generated_files: std::env::var("MAX_GENERATED_FILES")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
            max_catalog_limit: std::env::var("MAX_CATALOG_LIMIT")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
        };

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.generated_dir)?;
        std::fs::create_dir_all(&config.audio_cache_dir)?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Durations must be positive, default must not exceed the maximum
    /// - Sample rate must fall in a sane PCM range
    /// - Queue depth and file budget must be > 0
    /// - CORS origins must be parseable URLs
    ///
    /// # Returns
    ///
    /// - `Ok(())`: All values are valid
    /// - `Err(anyhow::Error)`: Invalid configuration detected
    pub fn validate(&self) -> Result<()> {
        if self.default_duration_s <= 0.0 {
            anyhow::bail!(
                "Default duration must be positive, got: {}",
                self.default_duration_s
            );
        }

        if self.max_duration_s < self.default_duration_s {
            anyhow::bail!(
                "Max duration ({}) is below the default duration ({})",
                self.max_duration_s,
                self.default_duration_s
            );
        }

        if !(8_000..=192_000).contains(&self.sample_rate) {
            anyhow::bail!("Sample rate out of range: {}", self.sample_rate);
        }

        if self.queue_depth == 0 {
            anyhow::bail!("Queue depth must be greater than 0");
        }

        if self.max_generated_files == 0 {
            anyhow::bail!("Max generated files must be greater than 0");
        }

        if self.max_catalog_limit == 0 {
            anyhow::bail!("Max catalog limit must be greater than 0");
        }

        for origin in &self.cors_origins {
            url::Url::parse(origin)
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", origin, e))?;
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes credential values; only reports whether each catalog
    /// integration is enabled.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Server: {}:{} (CORS: {})\n  \
            Generation: {} @ {}Hz, {}s default / {}s max, queue {}\n  \
            Catalogs: jamendo={}, freepik={}\n  \
            Storage: {} (keep {}), cache {}",
            self.host,
            self.port,
            self.cors_origins.join(", "),
            self.engine_command,
            self.sample_rate,
            self.default_duration_s,
            self.max_duration_s,
            self.queue_depth,
            self.jamendo_client_id.is_some(),
            self.freepik_api_key.is_some(),
            self.generated_dir.display(),
            self.max_generated_files,
            self.audio_cache_dir.display(),
        )
    }
}

/// Default configuration values.
///
/// The source deployments disagreed on the default generation duration
/// (5s, 10s, 15s); 15s is the most recent one and stays overridable via
/// `DEFAULT_DURATION`.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],

            generated_dir: "generated".into(),
            audio_cache_dir: "audio_cache".into(),

            engine_command: "musegen-engine".to_string(),
            default_duration_s: 15.0,
            max_duration_s: 120.0,
            sample_rate: 32_000,
            queue_depth: 16,

            jamendo_client_id: None,
            freepik_api_key: None,

            max_generated_files: 200,
            max_catalog_limit: 50,
        }
    }
}

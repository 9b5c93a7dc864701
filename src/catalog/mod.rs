pub mod freepik;
pub mod jamendo;
pub mod retry;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{ApiError, UpstreamError};

pub use freepik::FreepikClient;
pub use jamendo::JamendoClient;

/// Fallbacks applied during normalization when a vendor omits a field.
pub const PLACEHOLDER_COVER: &str = "/placeholder.svg";
pub const PLACEHOLDER_TITLE: &str = "Untitled Track";
pub const PLACEHOLDER_ARTIST: &str = "Unknown Artist";

/// Normalized catalog result, built fresh per request and never mutated
/// after construction.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_display: String,
    pub cover: String,
    pub tags: Vec<String>,
    pub plays: String,
    pub audio_url: String,
    /// Present only when attribution is actually required; never
    /// serialized as `{required: false, ...}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Attribution {
    pub required: bool,
    pub text: String,
    pub link: String,
}

/// Formats a seconds count as `m:ss` with zero-padded seconds.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Trims tags and drops empty or whitespace-only entries, keeping order.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// String-encoded play counter, `"0"` when the vendor has none.
pub fn plays_label(plays: Option<u64>) -> String {
    plays.unwrap_or(0).to_string()
}

/// One external music catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Searches the catalog and returns normalized tracks.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, UpstreamError>;

    /// Name of the source, also its routing key in the API.
    fn source_name(&self) -> &'static str;
}

/// All catalog integrations enabled for this deployment.
///
/// Each integration is switched on by the presence of its credential.
/// A missing credential disables that integration only; the rest of the
/// process keeps serving.
pub struct CatalogRegistry {
    sources: Vec<Arc<dyn CatalogSource>>,
}

impl CatalogRegistry {
    pub fn from_config(config: &Config) -> Self {
        let mut sources: Vec<Arc<dyn CatalogSource>> = Vec::new();

        match &config.jamendo_client_id {
            Some(client_id) => match JamendoClient::new(client_id.clone()) {
                Ok(client) => {
                    sources.push(Arc::new(client));
                    info!("🎧 Jamendo catalog enabled");
                }
                Err(error) => {
                    error!("Jamendo client failed to build, catalog disabled: {error}");
                }
            },
            None => {
                error!("JAMENDO_CLIENT_ID missing, Jamendo catalog disabled");
            }
        }

        match &config.freepik_api_key {
            Some(api_key) => {
                match FreepikClient::new(api_key.clone(), config.audio_cache_dir.clone()) {
                    Ok(client) => {
                        sources.push(Arc::new(client));
                        info!("🎧 Freepik catalog enabled");
                    }
                    Err(error) => {
                        error!("Freepik client failed to build, catalog disabled: {error}");
                    }
                }
            }
            None => {
                error!("FREEPIK_API_KEY missing, Freepik catalog disabled");
            }
        }

        Self { sources }
    }

    #[cfg(test)]
    pub fn with_sources(sources: Vec<Arc<dyn CatalogSource>>) -> Self {
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Dispatches a search to the named source, or to the primary (first
    /// enabled) one when no name is given.
    pub async fn search(
        &self,
        source: Option<&str>,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Track>, ApiError> {
        let target = match source {
            Some(name) => self
                .sources
                .iter()
                .find(|candidate| candidate.source_name() == name)
                .ok_or_else(|| ApiError::Validation(format!("unknown catalog source: {name}")))?,
            None => self
                .sources
                .first()
                .ok_or_else(|| ApiError::Config("no catalog sources configured".into()))?,
        };

        let tracks = target.search(query, limit).await?;
        info!(
            "🎧 {} returned {} tracks for '{}'",
            target.source_name(),
            tracks.len(),
            query
        );
        Ok(tracks)
    }
}

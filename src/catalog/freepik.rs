//! Freepik catalog adapter.
//!
//! Freepik answers `{data: [...]}` with no envelope; a body without the
//! `data` key is malformed, not an empty result. Audio lives behind
//! signed URLs that expire and require the API key, so playable items
//! are downloaded once into the local audio cache and served from there.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use super::retry::{self, FetchFailure};
use super::{
    format_duration, normalize_tags, plays_label, Attribution, CatalogSource, Track,
    PLACEHOLDER_ARTIST, PLACEHOLDER_COVER, PLACEHOLDER_TITLE,
};
use crate::error::UpstreamError;

const API_URL: &str = "https://api.freepik.com/v1/audios";
const API_KEY_HEADER: &str = "x-freepik-api-key";

pub struct FreepikClient {
    client: reqwest::Client,
    api_key: String,
    cache_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct FreepikResponse {
    data: Option<Vec<FreepikItem>>,
}

#[derive(Debug, Deserialize)]
struct FreepikItem {
    id: Option<u64>,
    #[serde(default)]
    title: String,
    author: Option<FreepikAuthor>,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    image: String,
    #[serde(default)]
    tags: Vec<String>,
    plays: Option<u64>,
    audio: Option<FreepikAudio>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    license: String,
}

#[derive(Debug, Deserialize)]
struct FreepikAuthor {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct FreepikAudio {
    #[serde(default)]
    url: String,
}

/// A normalized item plus the signed URL its audio must be fetched from.
#[derive(Debug)]
struct GatedTrack {
    track: Track,
    signed_url: Option<String>,
}

/// Local cache key for a materialized payload.
fn cache_file_name(id: &str) -> String {
    format!("freepik-{id}.mp3")
}

impl FreepikClient {
    pub fn new(api_key: String, cache_dir: PathBuf) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            api_key,
            cache_dir,
        })
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<FreepikResponse, UpstreamError> {
        retry::with_retries("freepik search", || {
            let client = self.client.clone();
            let api_key = self.api_key.clone();
            let query = query.to_string();
            let limit = limit.to_string();

            async move {
                let response = client
                    .get(API_URL)
                    .header(API_KEY_HEADER, api_key)
                    .query(&[("term", query.as_str()), ("limit", limit.as_str())])
                    .send()
                    .await
                    .map_err(retry::classify)?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(FetchFailure::Fatal(UpstreamError::Status {
                        status: status.as_u16(),
                        body,
                    }));
                }

                response
                    .json::<FreepikResponse>()
                    .await
                    .map_err(retry::classify)
            }
        })
        .await
    }

    /// Downloads a signed payload into the cache, once. Single attempt,
    /// no retry; an already-materialized id is reused.
    ///
    /// The payload lands in a `.part` file first and is renamed into
    /// place only when complete, so the cache key is never occupied by
    /// a truncated download and a failed attempt is re-fetched next time.
    async fn materialize(&self, id: &str, signed_url: &str) -> Result<String, UpstreamError> {
        let file_name = cache_file_name(id);
        let path = self.cache_dir.join(&file_name);
        let local_url = format!("/audio/{file_name}");

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("freepik {} already materialized", id);
            return Ok(local_url);
        }

        let response = self
            .client
            .get(signed_url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|error| UpstreamError::Materialize(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response
            .bytes()
            .await
            .map_err(|error| UpstreamError::Materialize(error.to_string()))?;

        let partial = self.cache_dir.join(format!("{file_name}.part"));
        if let Err(error) = tokio::fs::write(&partial, &payload).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(UpstreamError::Materialize(error.to_string()));
        }
        if let Err(error) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(UpstreamError::Materialize(error.to_string()));
        }

        info!("💾 materialized freepik {} ({} bytes)", id, payload.len());
        Ok(local_url)
    }
}

/// Maps the vendor body into tracks still holding their signed URLs.
fn normalize_payload(payload: FreepikResponse) -> Result<Vec<GatedTrack>, UpstreamError> {
    let items = payload
        .data
        .ok_or_else(|| UpstreamError::Malformed("response has no 'data' key".into()))?;

    Ok(items.into_iter().filter_map(normalize_item).collect())
}

fn normalize_item(item: FreepikItem) -> Option<GatedTrack> {
    let id = match item.id {
        Some(id) => id.to_string(),
        None => {
            debug!("dropping freepik item without id");
            return None;
        }
    };

    let title = if item.title.trim().is_empty() {
        PLACEHOLDER_TITLE.to_string()
    } else {
        item.title
    };
    let artist = item
        .author
        .map(|author| author.name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| PLACEHOLDER_ARTIST.to_string());

    let cover = if item.image.trim().is_empty() {
        PLACEHOLDER_COVER.to_string()
    } else {
        item.image
    };

    // Premium items come with a paid license and need no credit line.
    let attribution = if item.license == "premium" {
        None
    } else {
        Some(Attribution {
            required: true,
            text: format!("Music by {artist} on Freepik"),
            link: item.url,
        })
    };

    let signed_url = item
        .audio
        .map(|audio| audio.url)
        .filter(|candidate| !candidate.trim().is_empty());

    Some(GatedTrack {
        track: Track {
            id,
            title,
            artist,
            duration_display: format_duration(item.duration),
            cover,
            tags: normalize_tags(item.tags),
            plays: plays_label(item.plays),
            audio_url: String::new(),
            attribution,
        },
        signed_url,
    })
}

#[async_trait::async_trait]
impl CatalogSource for FreepikClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, UpstreamError> {
        let payload = self.fetch(query, limit).await?;
        let gated = normalize_payload(payload)?;

        let mut tracks = Vec::with_capacity(gated.len());
        for item in gated {
            let mut track = item.track;
            if let Some(signed_url) = item.signed_url {
                track.audio_url = self.materialize(&track.id, &signed_url).await?;
            }
            tracks.push(track);
        }

        Ok(tracks)
    }

    fn source_name(&self) -> &'static str {
        "freepik"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_data_key_is_malformed_not_empty() {
        let payload: FreepikResponse =
            serde_json::from_str(r#"{"meta": {"total": 0}}"#).unwrap();

        match normalize_payload(payload).unwrap_err() {
            UpstreamError::Malformed(message) => assert!(message.contains("data")),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_data_is_an_empty_list() {
        let payload: FreepikResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(normalize_payload(payload).unwrap().is_empty());
    }

    #[test]
    fn test_normalizes_item_and_keeps_signed_url_aside() {
        let payload: FreepikResponse = serde_json::from_str(
            r#"{"data": [{
                "id": 9001,
                "title": "Morning Light",
                "author": {"name": "AudioAgency"},
                "duration": 125,
                "image": "https://img.freepik.com/9001.jpg",
                "tags": [" corporate ", "upbeat", ""],
                "plays": 5120,
                "audio": {"url": "https://cdn.freepik.com/signed/9001?token=abc"},
                "url": "https://www.freepik.com/audio/9001",
                "license": "freemium"
            }]}"#,
        )
        .unwrap();

        let gated = normalize_payload(payload).unwrap();
        assert_eq!(gated.len(), 1);

        let item = &gated[0];
        assert_eq!(item.track.id, "9001");
        assert_eq!(item.track.title, "Morning Light");
        assert_eq!(item.track.artist, "AudioAgency");
        assert_eq!(item.track.duration_display, "2:05");
        assert_eq!(item.track.tags, vec!["corporate", "upbeat"]);
        assert_eq!(item.track.plays, "5120");
        // Audio URL is only rewritten after materialization.
        assert_eq!(item.track.audio_url, "");
        assert_eq!(
            item.signed_url.as_deref(),
            Some("https://cdn.freepik.com/signed/9001?token=abc")
        );

        let attribution = item.track.attribution.as_ref().unwrap();
        assert!(attribution.required);
        assert_eq!(attribution.text, "Music by AudioAgency on Freepik");
    }

    #[test]
    fn test_premium_license_has_no_attribution_block() {
        let payload: FreepikResponse = serde_json::from_str(
            r#"{"data": [{"id": 7, "title": "Paid", "license": "premium"}]}"#,
        )
        .unwrap();

        let gated = normalize_payload(payload).unwrap();
        assert!(gated[0].track.attribution.is_none());
        assert!(gated[0].signed_url.is_none());
    }

    #[test]
    fn test_item_without_id_is_dropped() {
        let payload: FreepikResponse = serde_json::from_str(
            r#"{"data": [{"title": "no id"}, {"id": 3, "title": "ok"}]}"#,
        )
        .unwrap();

        let gated = normalize_payload(payload).unwrap();
        assert_eq!(gated.len(), 1);
        assert_eq!(gated[0].track.id, "3");
    }

    #[test]
    fn test_cache_file_name_is_keyed_by_id() {
        assert_eq!(cache_file_name("9001"), "freepik-9001.mp3");
    }

    #[test]
    fn test_client_builds_with_default_tls() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FreepikClient::new("key".into(), dir.path().to_path_buf()).is_ok());
    }

    // Port 9 (discard) refuses connections immediately, so these tests
    // exercise the download error path without a live endpoint.
    const UNREACHABLE: &str = "http://127.0.0.1:9/signed/42";

    #[tokio::test]
    async fn test_failed_download_leaves_no_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let client = FreepikClient::new("key".into(), dir.path().to_path_buf()).unwrap();

        let error = client.materialize("42", UNREACHABLE).await.unwrap_err();
        assert!(matches!(error, UpstreamError::Materialize(_)));

        // Neither the cache key nor a partial remnant may survive a
        // failed attempt; the next request must fetch again.
        assert!(!dir.path().join("freepik-42.mp3").exists());
        assert!(!dir.path().join("freepik-42.mp3.part").exists());
        assert!(client.materialize("42", UNREACHABLE).await.is_err());
    }

    #[tokio::test]
    async fn test_complete_cache_entry_is_reused_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let client = FreepikClient::new("key".into(), dir.path().to_path_buf()).unwrap();

        // A file at the cache key is by construction a complete payload.
        std::fs::write(dir.path().join("freepik-42.mp3"), b"complete payload").unwrap();

        let url = client.materialize("42", UNREACHABLE).await.unwrap();
        assert_eq!(url, "/audio/freepik-42.mp3");
    }
}

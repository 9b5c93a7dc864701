//! Jamendo catalog adapter.
//!
//! Jamendo wraps every payload in `{headers: {...}, results: [...]}`;
//! a non-"success" `headers.status` is an application-level rejection
//! even when the HTTP status is 200. Everything it lists is Creative
//! Commons, so attribution is always required.

use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::retry::{self, FetchFailure};
use super::{
    format_duration, normalize_tags, plays_label, Attribution, CatalogSource, Track,
    PLACEHOLDER_ARTIST, PLACEHOLDER_COVER, PLACEHOLDER_TITLE,
};
use crate::error::UpstreamError;

const API_URL: &str = "https://api.jamendo.com/v3.0/tracks/";

pub struct JamendoClient {
    client: reqwest::Client,
    client_id: String,
}

#[derive(Debug, Deserialize)]
struct JamendoResponse {
    headers: JamendoHeaders,
    #[serde(default)]
    results: Vec<JamendoItem>,
}

#[derive(Debug, Deserialize)]
struct JamendoHeaders {
    status: String,
    #[serde(default)]
    error_message: String,
}

#[derive(Debug, Deserialize)]
struct JamendoItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    image: String,
    #[serde(default)]
    album_image: String,
    #[serde(default)]
    audio: String,
    #[serde(default)]
    audiodownload: String,
    #[serde(default)]
    shareurl: String,
    #[serde(default)]
    license_ccurl: String,
    musicinfo: Option<JamendoMusicInfo>,
}

#[derive(Debug, Deserialize)]
struct JamendoMusicInfo {
    tags: Option<JamendoTags>,
}

#[derive(Debug, Deserialize)]
struct JamendoTags {
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    vartags: Vec<String>,
}

impl JamendoClient {
    pub fn new(client_id: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self { client, client_id })
    }

    async fn fetch(&self, query: &str, limit: usize) -> Result<JamendoResponse, UpstreamError> {
        retry::with_retries("jamendo search", || {
            let client = self.client.clone();
            let client_id = self.client_id.clone();
            let query = query.to_string();
            let limit = limit.to_string();

            async move {
                let response = client
                    .get(API_URL)
                    .query(&[
                        ("client_id", client_id.as_str()),
                        ("format", "json"),
                        ("limit", limit.as_str()),
                        ("search", query.as_str()),
                        ("include", "musicinfo"),
                        ("audioformat", "mp32"),
                    ])
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
                    .json::<JamendoResponse>()
                    .await
                    .map_err(retry::classify)
            }
        })
        .await
    }
}

/// Maps the vendor envelope into tracks, surfacing application-level
/// rejections hidden behind a 200.
fn normalize_response(payload: JamendoResponse) -> Result<Vec<Track>, UpstreamError> {
    if payload.headers.status != "success" {
        return Err(UpstreamError::Rejected {
            status: payload.headers.status,
            message: payload.headers.error_message,
        });
    }

    Ok(payload.results.into_iter().filter_map(normalize_item).collect())
}

/// Per-item mapping with per-field fallbacks. Items without a usable
/// identifier are dropped; everything else degrades field by field.
fn normalize_item(item: JamendoItem) -> Option<Track> {
    if item.id.trim().is_empty() {
        debug!("dropping jamendo item without id");
        return None;
    }

    let title = if item.name.trim().is_empty() {
        PLACEHOLDER_TITLE.to_string()
    } else {
        item.name
    };
    let artist = if item.artist_name.trim().is_empty() {
        PLACEHOLDER_ARTIST.to_string()
    } else {
        item.artist_name
    };

    let cover = [item.image, item.album_image]
        .into_iter()
        .find(|candidate| !candidate.trim().is_empty())
        .unwrap_or_else(|| PLACEHOLDER_COVER.to_string());

    let audio_url = [item.audio, item.audiodownload]
        .into_iter()
        .find(|candidate| !candidate.trim().is_empty())
        .unwrap_or_default();

    let tags = item
        .musicinfo
        .and_then(|info| info.tags)
        .map(|tags| normalize_tags(tags.genres.into_iter().chain(tags.vartags)))
        .unwrap_or_default();

    let link = if !item.shareurl.trim().is_empty() {
        item.shareurl
    } else {
        item.license_ccurl
    };

    Some(Track {
        id: item.id,
        duration_display: format_duration(item.duration),
        cover,
        tags,
        plays: plays_label(None),
        audio_url,
        attribution: Some(Attribution {
            required: true,
            text: format!("\"{title}\" by {artist} via Jamendo (CC)"),
            link,
        }),
        title,
        artist,
    })
}

#[async_trait::async_trait]
impl CatalogSource for JamendoClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, UpstreamError> {
        let payload = self.fetch(query, limit).await?;
        normalize_response(payload)
    }

    fn source_name(&self) -> &'static str {
        "jamendo"
    }
}

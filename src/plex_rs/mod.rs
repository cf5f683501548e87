use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

pub mod playlist;

/// Errors returned by the Plex Media Server HTTP API.
#[derive(Debug, thiserror::Error)]
pub enum PlexApiError {
    #[error("Invalid Plex URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Plex resource not found: {url}")]
    NotFound { url: String },
    #[error("Plex returned status {status} for {url}")]
    UnexpectedStatus { status: StatusCode, url: String },
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

/// A minimal Plex JSON envelope for list style endpoints that return `MediaContainer.Metadata`.
///
/// Notes
/// - Plex responses are wrapped in a top level `MediaContainer`.
/// - `metadata` defaults to an empty vec when missing (empty playlists omit it).
#[derive(Debug, Clone, Deserialize)]
pub struct PlexResponse<T> {
    #[serde(rename = "MediaContainer")]
    pub media_container: PlexMediaContainer<T>,
}

/// The inner Plex MediaContainer payload.
///
/// For paged requests, `total_size` drives the paging loop.
#[derive(Debug, Clone, Deserialize)]
pub struct PlexMediaContainer<T> {
    #[serde(rename = "totalSize", default)]
    pub total_size: Option<u32>,

    #[serde(rename = "Metadata", default = "Vec::new")]
    pub metadata: Vec<T>,
}

/// Adds the Plex headers to `request`, sends it and decodes the JSON body.
///
/// A 404 is reported as [`PlexApiError::NotFound`] so callers can tell a vanished
/// resource apart from a server that is unreachable.
async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &Url,
    user_token: &str,
) -> Result<T, PlexApiError> {
    let response = request
        .header("Accept", "application/json")
        .header("X-Plex-Token", user_token)
        .send()
        .await
        .map_err(PlexApiError::FailedToSendRequest)?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PlexApiError::NotFound {
            url: url.path().to_string(),
        });
    }
    if !status.is_success() {
        return Err(PlexApiError::UnexpectedStatus {
            status,
            url: url.path().to_string(),
        });
    }

    response
        .json::<T>()
        .await
        .map_err(PlexApiError::FailedToParseResponse)
}

/// Builds a GET request for `path` relative to the server's base URL.
fn get(client: &Client, base_url: &Url, path: &str) -> Result<(RequestBuilder, Url), PlexApiError> {
    let url = base_url.join(path)?;
    Ok((client.get(url.clone()), url))
}

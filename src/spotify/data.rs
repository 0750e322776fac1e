use crate::spotify::AuthContext;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

pub const SPOTIFY_API: &str = "https://api.spotify.com/v1";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Spotify returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|status| status.as_u16()),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, rename = "type")]
    pub type_: String,
    pub volume_percent: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct DevicesResponse {
    devices: Vec<Device>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlayingItem {
    pub uri: String,
    pub name: String,
    pub duration_ms: Option<u64>,
}

/// Payload delivered to `player_state_changed` listeners.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub device: Option<Device>,
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub shuffle_state: bool,
    pub repeat_state: Option<String>,
    pub item: Option<PlayingItem>,
}

impl PlaybackState {
    /// Equal apart from `progress_ms`, which moves on every read while a track plays.
    pub fn same_playback(&self, other: &PlaybackState) -> bool {
        self.device == other.device
            && self.is_playing == other.is_playing
            && self.shuffle_state == other.shuffle_state
            && self.repeat_state == other.repeat_state
            && self.item == other.item
    }
}

#[derive(Serialize)]
struct PlayRequest<'a> {
    uris: &'a [String],
}

/// Thin client for the player endpoints of the Web API.
#[derive(Clone)]
pub struct PlaybackApi {
    http: Client,
    base: String,
}

impl PlaybackApi {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Starts `uris` on `device_id`. Sent once; a failure is handed back as is.
    pub async fn start_playback(
        &self,
        auth: &AuthContext,
        device_id: &str,
        uris: &[String],
    ) -> Result<StatusCode, ApiError> {
        let url = format!("{}/me/player/play", self.base);
        let response = self
            .http
            .put(&url)
            .query(&[("device_id", device_id)])
            .bearer_auth(auth.token())
            .json(&PlayRequest { uris })
            .send()
            .await?;

        check_status(response).await.map(|response| response.status())
    }

    pub async fn devices(&self, auth: &AuthContext) -> Result<Vec<Device>, ApiError> {
        let url = format!("{}/me/player/devices", self.base);
        let request = self.http.get(&url).bearer_auth(auth.token());

        let response = check_status(send_request_with_rate_limit(request).await?).await?;
        let body = response.json::<DevicesResponse>().await?;
        Ok(body.devices)
    }

    /// Current playback, or `None` when nothing is playing anywhere.
    pub async fn playback_state(&self, auth: &AuthContext) -> Result<Option<PlaybackState>, ApiError> {
        let url = format!("{}/me/player", self.base);
        let request = self.http.get(&url).bearer_auth(auth.token());

        let response = check_status(send_request_with_rate_limit(request).await?).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body).map(Some).map_err(|err| ApiError::Status {
            status: StatusCode::OK.as_u16(),
            message: format!("unreadable playback state: {}", err),
        })
    }
}

async fn send_request_with_rate_limit(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
    loop {
        let attempt = match request.try_clone() {
            Some(attempt) => attempt,
            None => return Ok(request.send().await?),
        };
        let response = attempt.send().await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(1);
            warn!("Rate limited. Retrying after {} seconds...", retry_after_secs);
            sleep(Duration::from_secs(retry_after_secs)).await;
        } else {
            return Ok(response);
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!("error body from Spotify: {}", body);
    Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(&body).unwrap_or_else(|| {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        }),
    })
}

// Spotify wraps failures as {"error": {"status": 404, "message": "..."}}.
fn error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match &json["error"] {
        Value::String(message) => Some(message.clone()),
        error => error["message"].as_str().map(|message| message.to_string()),
    }
}

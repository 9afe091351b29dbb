//! Media server notification.
//!
//! After a pass changes the merged view, the media server serving it is asked
//! to rescan. The request is fire-and-forget: a failed refresh is reported
//! back to the caller but never fails the pass that triggered it.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mvault_config::MediaServerConfig;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

const TOKEN_HEADER: &str = "X-MediaBrowser-Token";
const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    pub ok: bool,
    pub detail: String,
}
impl RefreshOutcome {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Something that can be told the library on disk has changed.
pub trait MediaServer: Send + Sync {
    /// Asks the server to rescan. Idempotent.
    fn refresh_library(&self) -> RefreshOutcome;
}

/// Used when no media server is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMediaServer;
impl MediaServer for NoMediaServer {
    fn refresh_library(&self) -> RefreshOutcome {
        RefreshOutcome::ok("no media server configured")
    }
}

/// Jellyfin (and Emby, which shares the endpoint and token header).
#[derive(Clone)]
pub struct Jellyfin {
    client: Client,
    base_url: String,
    api_key: String,
}
impl Jellyfin {
    pub fn new(config: &MediaServerConfig) -> Result<Self> {
        let client = Client::builder().timeout(TIMEOUT).build().or_raise(|| ErrorKind::MediaServer)?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}
impl MediaServer for Jellyfin {
    fn refresh_library(&self) -> RefreshOutcome {
        let url = format!("{}/Library/Refresh", self.base_url);
        let response = match self.client.post(&url).header(TOKEN_HEADER, &self.api_key).send() {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(%url, error = %e, "Media server unreachable");
                return RefreshOutcome::failed(format!("failed to refresh media library: {e}"));
            },
        };
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            tracing::info!(%url, "Media server library refresh started");
            return RefreshOutcome::ok("library refresh initiated");
        }
        let body = response.text().unwrap_or_default();
        tracing::warn!(%url, %status, body = %body, "Media server refused library refresh");
        RefreshOutcome::failed(format!("failed to refresh media library: HTTP {}", status.as_u16()))
    }
}

/// Builds the notifier for an optional media server configuration.
pub fn from_config(config: Option<&MediaServerConfig>) -> Result<Box<dyn MediaServer>> {
    Ok(match config {
        Some(config) => Box::new(Jellyfin::new(config)?),
        None => Box::new(NoMediaServer),
    })
}

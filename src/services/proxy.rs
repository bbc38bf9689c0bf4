//! Self-hosted download proxy strategy
//!
//! Last strategy in the acquisition chain: a generic proxy endpoint that
//! accepts `POST /download {"url": ...}` and streams the audio back.
//! Skipped unless a proxy URL is configured.

use std::path::Path;

use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::services::acquisition::{save_body, watch_url, AcquireError};
use crate::services::media;

pub struct ProxyClient<'a> {
    config: &'a Config,
    http: &'a reqwest::Client,
}

impl<'a> ProxyClient<'a> {
    pub fn new(config: &'a Config, http: &'a reqwest::Client) -> Self {
        Self { config, http }
    }

    /// Fetch a track's audio through the proxy, saving it to `dest`.
    pub async fn fetch(&self, track_id: &str, dest: &Path) -> Result<(), AcquireError> {
        let base = self
            .config
            .proxy_url
            .as_deref()
            .ok_or(AcquireError::NotConfigured)?;

        let endpoint = format!("{}/download", base.trim_end_matches('/'));
        debug!(track_id, endpoint = %endpoint, "requesting download via proxy");

        let response = self
            .http
            .post(&endpoint)
            .json(&json!({ "url": watch_url(track_id) }))
            .timeout(self.config.download_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AcquireError::HttpStatus(response.status().as_u16()));
        }
        if let Some(ct) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !media::content_type_is_media(ct) {
                return Err(AcquireError::NotMediaContentType(ct.to_string()));
            }
        }

        save_body(response, dest).await
    }
}

//! HTTP client for the chat backend.

use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::Stream;
use reqwest::StatusCode;
use reqwest::header::COOKIE;

use super::errors::{BackendError, BackendErrorKind};
use super::sse::SseParser;
use super::types::User;
use crate::config::Config;

/// Connection settings for the backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL without a trailing slash
    pub base_url: String,
    /// Cookie header value attached to every request ("name=value")
    pub session_cookie: Option<String>,
    /// Timeout for non-streaming requests (never applied to the channel)
    pub request_timeout: Option<Duration>,
}

impl BackendConfig {
    /// Builds connection settings from the file configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let url = url::Url::parse(config.base_url.trim())
            .with_context(|| format!("Invalid base_url in config: {}", config.base_url))?;
        let base_url = url.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            base_url,
            session_cookie: config.effective_session_cookie().map(str::to_string),
            request_timeout: config.request_timeout(),
        })
    }
}

/// Backend API client.
///
/// Credentials are ambient: the cookie store carries anything the backend
/// sets, and the configured session cookie (if any) rides along on every
/// request.
pub struct BackendClient {
    config: BackendConfig,
    http: reqwest::Client,
}

impl BackendClient {
    /// Creates a new backend client with the given configuration.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    /// Opens the streaming channel for one user message.
    ///
    /// Returns the frame payload stream once the backend acknowledges the
    /// request; any non-success status is an error before delivery begins.
    pub async fn open_stream(
        &self,
        message: &str,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>, BackendError>
    {
        let url = format!("{}/api/chat/message", self.config.base_url);
        let mut request = self
            .http
            .get(&url)
            .query(&[("message", message)])
            .header("accept", "text/event-stream");
        if let Some(cookie) = &self.config.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::http_status(status.as_u16(), &body));
        }

        let byte_stream = response.bytes_stream();
        Ok(Box::pin(SseParser::new(byte_stream)))
    }

    /// Fetches the signed-in user.
    ///
    /// `None` means the backend reports signed out (401/403); any other
    /// non-success status is an error.
    pub async fn current_user(&self) -> Result<Option<User>, BackendError> {
        let url = format!("{}/users/me", self.config.base_url);
        let mut request = self.http.get(&url).header("accept", "application/json");
        if let Some(timeout) = self.config.request_timeout {
            request = request.timeout(timeout);
        }
        if let Some(cookie) = &self.config.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(None),
            status if status.is_success() => {
                let user = response.json::<User>().await.map_err(|e| {
                    BackendError::new(
                        BackendErrorKind::Connection,
                        format!("Invalid user payload: {e}"),
                    )
                })?;
                Ok(Some(user))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BackendError::http_status(status.as_u16(), &body))
            }
        }
    }
}

/// Classifies a reqwest error into a BackendError.
fn classify_reqwest_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::connection(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        BackendError::connection(format!("Connection failed: {e}"))
    } else {
        BackendError::connection(format!("Request failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_base(base_url: &str) -> Config {
        Config {
            base_url: base_url.to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_from_config_trims_trailing_slash() {
        let backend = BackendConfig::from_config(&config_with_base("http://example.com/")).unwrap();
        assert_eq!(backend.base_url, "http://example.com");

        let backend = BackendConfig::from_config(&config_with_base("http://example.com")).unwrap();
        assert_eq!(backend.base_url, "http://example.com");
    }

    #[test]
    fn test_from_config_rejects_invalid_url() {
        assert!(BackendConfig::from_config(&config_with_base("not a url")).is_err());
    }

    #[test]
    fn test_from_config_drops_blank_cookie() {
        let mut config = config_with_base("http://example.com");
        config.session_cookie = Some("  ".to_string());

        let backend = BackendConfig::from_config(&config).unwrap();
        assert_eq!(backend.session_cookie, None);
    }
}

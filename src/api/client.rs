// Deezer Core - stream retrieval and decryption for Deezer media
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP client for the Deezer catalog, gateway and CDN
//!
//! This module provides the live implementation of the collaborator traits:
//! - Public catalog lookups (`https://api.deezer.com/{track,album,playlist}/{id}`)
//! - Session bootstrap and enrichment through the gateway (`gw-light.php`)
//! - Encrypted stream fetches from the CDN
//!
//! # Timeouts
//! Catalog and gateway requests are bounded by `ClientConfig::timeout`.
//! Stream bodies are not: they use a separate client with only a connect
//! timeout, and each read must make progress within
//! `ClientConfig::stream_idle_timeout`.
//!
//! # Session
//! The gateway is authenticated by the `arl` cookie of a logged-in browser
//! session. `deezer.getUserData` returns a CSRF token (`checkForm`) that
//! every following gateway call passes as `api_token`.
//!
//! # Retries
//! Requests are not retried. The only retry in the download path is the
//! quality fallback driven by the orchestrator.

use crate::api::models::{
    parse_catalog_response, AlbumInfo, GatewayResponse, PlaylistInfo, SongData, TrackInfo,
    UserData,
};
use crate::api::traits::{CatalogService, EncryptedStream, StreamFetcher};
use crate::catalog::model::TrackEnrichment;
use crate::error::{DeezerError, Result};
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Public catalog API
pub const DEFAULT_API_URL: &str = "https://api.deezer.com";

/// Private gateway endpoint
pub const DEFAULT_GATEWAY_URL: &str = "https://www.deezer.com/ajax/gw-light.php";

/// Gateway method returning the session's user and CSRF token
const METHOD_GET_USER: &str = "deezer.getUserData";

/// Gateway method returning a track's stream metadata
const METHOD_GET_SONG: &str = "song.getData";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default longest gap between two pieces of a stream body, in seconds
const DEFAULT_STREAM_IDLE_SECS: u64 = 60;

/// Configuration for DeezerClient
/// Provides a builder pattern for client customization
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub gateway_url: String,
    /// Total timeout of catalog and gateway requests; connect timeout of streams
    pub timeout: Duration,
    /// Longest wait for the next piece of a stream body
    ///
    /// Streams have no total timeout, a large FLAC on a slow link may
    /// take minutes.
    pub stream_idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            stream_idle_timeout: Duration::from_secs(DEFAULT_STREAM_IDLE_SECS),
            user_agent: concat!("deezer-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_url<S: Into<String>>(mut self, api_url: S) -> Self {
        self.config.api_url = api_url.into();
        self
    }

    pub fn gateway_url<S: Into<String>>(mut self, gateway_url: S) -> Self {
        self.config.gateway_url = gateway_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn stream_idle_timeout(mut self, stream_idle_timeout: Duration) -> Self {
        self.config.stream_idle_timeout = stream_idle_timeout;
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Authenticated client for the live service
///
/// # Example
/// ```rust,no_run
/// use deezer_core::api::{ClientConfig, DeezerClient};
///
/// # async fn example() -> deezer_core::error::Result<()> {
/// let client = DeezerClient::login("your-arl-cookie", ClientConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct DeezerClient {
    /// Catalog and gateway requests, bounded by `config.timeout`
    http: Client,
    /// CDN streams, no total timeout
    stream_http: Client,
    config: ClientConfig,
    /// `checkForm` of the session, sent as `api_token`
    csrf_token: String,
}

impl DeezerClient {
    /// Open a gateway session from an `arl` cookie value
    ///
    /// # Errors
    /// - `AuthenticationFailed` if the gateway does not recognise the cookie
    /// - `ConfigurationError` if the gateway URL is malformed
    pub async fn login(arl: &str, config: ClientConfig) -> Result<Self> {
        let mut client = Self::connect(arl, config)?;

        let user: UserData = serde_json::from_value(client.gateway_call(METHOD_GET_USER, json!({})).await?)?;
        if user.user.user_id == 0 || user.check_form.is_empty() {
            return Err(DeezerError::AuthenticationFailed(
                "gateway did not accept the arl cookie".to_string(),
            ));
        }

        info!(user_id = user.user.user_id, "Gateway session established");
        client.csrf_token = user.check_form;
        Ok(client)
    }

    /// Build the HTTP clients without contacting the gateway
    fn connect(arl: &str, config: ClientConfig) -> Result<Self> {
        let gateway = Url::parse(&config.gateway_url).map_err(|e| {
            DeezerError::ConfigurationError(format!("invalid gateway url '{}': {}", config.gateway_url, e))
        })?;

        let jar = Arc::new(Jar::default());
        jar.add_cookie_str(&format!("arl={}; Path=/", arl), &gateway);

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|e| {
                DeezerError::ConfigurationError(format!("Invalid user agent: {}", e))
            })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let stream_http = Client::builder()
            .connect_timeout(config.timeout)
            .default_headers(headers.clone())
            .build()?;

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .cookie_provider(jar)
            .build()?;

        Ok(Self {
            http,
            stream_http,
            config,
            csrf_token: "null".to_string(),
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Call a gateway method and unwrap its `results`
    async fn gateway_call(&self, method: &str, body: Value) -> Result<Value> {
        debug!(method, "Gateway call");

        let response = self
            .http
            .post(&self.config.gateway_url)
            .query(&[
                ("api_version", "1.0"),
                ("api_token", self.csrf_token.as_str()),
                ("input", "3"),
                ("method", method),
            ])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(DeezerError::api_failed(
                format!("gateway answered {}: {}", status, error_body),
                Some(status.as_u16()),
                Some(method.to_string()),
            ));
        }

        let envelope: GatewayResponse = response.json().await?;
        envelope.into_results(method)
    }

    /// GET a public catalog object
    async fn public_get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.config.api_url.trim_end_matches('/'), path);
        debug!(%url, "Catalog lookup");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            DeezerError::invalid_response(
                format!("catalog answered {} with non-JSON body: {}", status, e),
                Some(text.chars().take(512).collect()),
            )
        })?;

        parse_catalog_response(value)
    }
}

#[async_trait]
impl CatalogService for DeezerClient {
    async fn track(&self, track_id: u64) -> Result<TrackInfo> {
        self.public_get(&format!("track/{}", track_id)).await
    }

    async fn album(&self, album_id: u64) -> Result<AlbumInfo> {
        self.public_get(&format!("album/{}", album_id)).await
    }

    async fn playlist(&self, playlist_id: u64) -> Result<PlaylistInfo> {
        self.public_get(&format!("playlist/{}", playlist_id)).await
    }

    async fn track_enrichment(&self, track_id: u64) -> Result<TrackEnrichment> {
        let results = self
            .gateway_call(METHOD_GET_SONG, json!({ "sng_id": track_id }))
            .await?;
        let song: SongData = serde_json::from_value(results)?;

        if song.md5_origin.is_empty() {
            return Err(DeezerError::invalid_response(
                format!("song.getData returned no MD5_ORIGIN for track {}", track_id),
                None,
            ));
        }
        Ok(song.into())
    }

    async fn image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeezerError::api_failed(
                format!("image request failed with status {}", status),
                Some(status.as_u16()),
                Some(url.to_string()),
            ));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl StreamFetcher for DeezerClient {
    async fn open(&self, url: &str) -> Result<EncryptedStream> {
        let response = self.stream_http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeezerError::UnexpectedStatusCode {
                status_code: status.as_u16(),
            });
        }

        let content_length = response.content_length();
        let idle = self.config.stream_idle_timeout;
        let pieces = response.bytes_stream().boxed();
        let body = stream::unfold(Some(pieces), move |state| async move {
            let mut pieces = state?;
            match tokio::time::timeout(idle, pieces.next()).await {
                Ok(Some(piece)) => Some((
                    piece.map(|bytes| bytes.to_vec()).map_err(DeezerError::from),
                    Some(pieces),
                )),
                Ok(None) => None,
                Err(_) => {
                    warn!(idle_secs = idle.as_secs_f64(), "Stream body stalled");
                    Some((Err(DeezerError::StreamStalled { idle }), None))
                }
            }
        })
        .boxed();

        Ok(EncryptedStream::new(content_length, body))
    }
}

// ===== TESTS =====

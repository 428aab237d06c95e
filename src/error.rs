//! Error types for Deezer Core
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by where they originate (catalog, stream protocol,
//! filesystem, collaborators) so callers can decide what to surface.
//!
//! ## Protocol taxonomy
//!
//! - `CatalogLookup` - the catalog answered with an `error` object for an id.
//!   Never retried and never cached.
//! - `UnsupportedQuality` - a bitrate label outside FLAC/MP3_320/MP3_256/MP3_128.
//! - `Encoding` - metadata that cannot be turned into a stream URL
//!   (empty or non-ASCII content hash).
//! - `StreamUnavailable` - every quality tier down to MP3_128 advertised no
//!   content. Terminal for that track.
//! - `StreamStalled` - the CDN stopped sending body data. Retryable.
//! - `FileIoError` / `IoError` - writing the output failed. The partial file is
//!   removed before the error reaches the caller.
//!
//! Collection downloads report these per member; one failing member never
//! stops the others.

use thiserror::Error;

/// Result type alias using our DeezerError type
pub type Result<T> = std::result::Result<T, DeezerError>;

/// Main error type for Deezer Core
#[derive(Error, Debug)]
pub enum DeezerError {
    // ===== Catalog Errors =====

    /// The public catalog reported the id as unknown or erroneous
    #[error("Catalog lookup failed: Error {code} - {message}")]
    CatalogLookup {
        /// Error type reported by the service (e.g. "DataException")
        kind: String,
        message: String,
        code: i64,
    },

    /// Authentication with the gateway failed (bad or expired ARL)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Generic API request failure
    #[error("API request failed: {message}")]
    ApiRequestFailed {
        message: String,
        /// HTTP status code if available
        status_code: Option<u16>,
        /// API endpoint or gateway method that failed
        endpoint: Option<String>,
    },

    /// API returned invalid or unexpected response format
    #[error("Invalid API response: {message}")]
    InvalidApiResponse {
        message: String,
        /// Response body snippet for debugging
        response_body: Option<String>,
    },

    /// Link does not point at a Deezer resource
    #[error("{0} is not a valid Deezer url")]
    InvalidUrl(String),

    /// Link points at a resource kind we cannot download (artist, show...)
    #[error("Action is not supported: {0}")]
    UnsupportedAction(String),

    // ===== Stream Protocol Errors =====

    /// Bitrate label outside the four known tiers
    #[error("Unsupported quality: {0}")]
    UnsupportedQuality(String),

    /// Track metadata cannot be encoded into a stream URL
    #[error("Cannot encode stream url: {0}")]
    Encoding(String),

    /// No quality tier served any content for the track
    #[error("Track {track_id} is not downloadable")]
    StreamUnavailable { track_id: u64 },

    /// Cipher setup or block decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Stream host answered with an unexpected status
    #[error("Stream request failed with status {status_code}")]
    UnexpectedStatusCode { status_code: u16 },

    /// Stream body made no progress within the idle timeout
    #[error("Stream stalled: no data for {idle:?}")]
    StreamStalled { idle: std::time::Duration },

    // ===== Tagging Errors =====

    /// Metadata embedding failed
    #[error("Tagging failed: {0}")]
    TaggingFailed(String),

    /// FFmpeg binary not found in PATH
    #[error("FFmpeg not found. Please install FFmpeg and ensure it's in your PATH.")]
    FfmpegNotFound,

    // ===== File Errors =====

    /// Generic file I/O error with the path involved
    #[error("File I/O error: {0}")]
    FileIoError(String),

    // ===== Configuration/State Errors =====

    /// Configuration file error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A component was driven through an illegal state change
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl DeezerError {
    /// Create a CatalogLookup error from the service's error object
    pub fn catalog_lookup<S: Into<String>>(kind: S, message: S, code: i64) -> Self {
        DeezerError::CatalogLookup {
            kind: kind.into(),
            message: message.into(),
            code,
        }
    }

    /// Create an ApiRequestFailed error
    pub fn api_failed<S: Into<String>>(
        message: S,
        status_code: Option<u16>,
        endpoint: Option<String>,
    ) -> Self {
        DeezerError::ApiRequestFailed {
            message: message.into(),
            status_code,
            endpoint,
        }
    }

    /// Create an InvalidApiResponse error
    pub fn invalid_response<S: Into<String>>(message: S, response_body: Option<String>) -> Self {
        DeezerError::InvalidApiResponse {
            message: message.into(),
            response_body,
        }
    }

    /// Check if the error came from resolving catalog metadata
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            DeezerError::CatalogLookup { .. }
                | DeezerError::InvalidApiResponse { .. }
                | DeezerError::ApiRequestFailed { .. }
        )
    }

    /// Check if error is related to file/disk operations
    pub fn is_file_error(&self) -> bool {
        matches!(self, DeezerError::FileIoError(_) | DeezerError::IoError(_))
    }

    /// Errors that will not change on a repeated attempt with the same input
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeezerError::CatalogLookup { .. }
                | DeezerError::UnsupportedQuality(_)
                | DeezerError::Encoding(_)
                | DeezerError::StreamUnavailable { .. }
                | DeezerError::InvalidUrl(_)
                | DeezerError::UnsupportedAction(_)
        )
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            DeezerError::StreamUnavailable { track_id } => {
                format!("Track {} cannot be downloaded in any quality.", track_id)
            }
            DeezerError::AuthenticationFailed(_) => {
                "Your ARL token was rejected. Please log in to Deezer again and copy a fresh token.".to_string()
            }
            DeezerError::UnsupportedQuality(label) => {
                format!(
                    "Unknown quality '{}'. Use one of FLAC, MP3_320, MP3_256, MP3_128.",
                    label
                )
            }
            DeezerError::FfmpegNotFound => {
                "FFmpeg is required for tagging but was not found. Please install FFmpeg and ensure it's in your PATH.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

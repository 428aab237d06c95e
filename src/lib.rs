//! Deezer Core
//!
//! Retrieval of Deezer tracks, albums and playlists: stream URL signing,
//! per-track key derivation, selective chunk decryption and an orchestrator
//! that writes and tags the result, with quality fallback.
//!
//! The catalog, the authenticated gateway, the stream host and the tagger
//! are reached through the traits in [`api::traits`] and [`audio::tagger`];
//! [`api::DeezerClient`] and [`audio::tagger::FfmpegTagger`] are the live
//! implementations.

pub mod api;
pub mod audio;
pub mod catalog;
pub mod crypto;
pub mod download;
pub mod error;
pub mod file;

pub use error::{DeezerError, Result};

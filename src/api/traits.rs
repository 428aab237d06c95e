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


//! Collaborator seams
//!
//! The download pipeline talks to the outside world only through these
//! traits: catalog metadata, authenticated enrichment and the encrypted
//! stream itself. `DeezerClient` implements both for the live service;
//! tests substitute in-memory versions.

use crate::api::models::{AlbumInfo, PlaylistInfo, TrackInfo};
use crate::catalog::model::TrackEnrichment;
use crate::error::Result;
use async_trait::async_trait;
use futures_util::Stream;
use std::fmt;
use std::pin::Pin;

/// Catalog metadata lookups
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Public track metadata; unknown ids fail with `CatalogLookup`
    async fn track(&self, track_id: u64) -> Result<TrackInfo>;

    /// Public album metadata including the ordered member ids
    async fn album(&self, album_id: u64) -> Result<AlbumInfo>;

    /// Public playlist metadata including the ordered member ids
    async fn playlist(&self, playlist_id: u64) -> Result<PlaylistInfo>;

    /// Authenticated lookup of content hash, media version and credits
    async fn track_enrichment(&self, track_id: u64) -> Result<TrackEnrichment>;

    /// Raw bytes of an image (album cover)
    async fn image(&self, url: &str) -> Result<Vec<u8>>;
}

/// Body of an encrypted stream response, in transport-sized pieces
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// An opened stream: declared length plus body
pub struct EncryptedStream {
    /// `Content-Length` as declared by the CDN, `None` when absent
    pub content_length: Option<u64>,
    pub body: ChunkStream,
}

impl EncryptedStream {
    pub fn new(content_length: Option<u64>, body: ChunkStream) -> Self {
        Self {
            content_length,
            body,
        }
    }

    /// Declared total length, if the CDN actually has content at this tier
    ///
    /// A missing or zero length means the tier is unavailable for the track.
    pub fn available_length(&self) -> Option<u64> {
        self.content_length.filter(|len| *len > 0)
    }
}

impl fmt::Debug for EncryptedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens encrypted media streams by signed URL
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn open(&self, url: &str) -> Result<EncryptedStream>;
}

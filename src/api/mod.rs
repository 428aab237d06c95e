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


//! Collaborators of the download pipeline
//!
//! - `traits` - the seams the core calls (catalog, stream fetch)
//! - `models` - JSON wire shapes of the public API and the gateway
//! - `client` - the live HTTP implementation of both seams

pub mod client;
pub mod models;
pub mod traits;

// Re-export commonly used types
pub use client::{ClientConfig, ClientConfigBuilder, DeezerClient};
pub use traits::{CatalogService, ChunkStream, EncryptedStream, StreamFetcher};

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


//! Stream protocol cryptography
//!
//! This module reverses the service's partial-encryption scheme and signs
//! stream requests.
//!
//! # Pieces
//! - **key**: per-track Blowfish key derived from the track id
//! - **url**: AES-128-ECB signed CDN URL built from track metadata
//! - **chunked**: selective Blowfish-CBC decryption of every third 2048-byte chunk
//!
//! All protocol constants (salt, URL key, IV, CDN host) are private to these
//! modules. They are fixed by the remote service and are not configuration.

pub mod chunked;
pub mod key;
pub mod url;

// Re-export commonly used items
pub use chunked::{decrypt_stream, ChunkedDecryptor, DecryptStream, CHUNK_SIZE};
pub use key::{derive_key, StreamKey};
pub use url::build_url;

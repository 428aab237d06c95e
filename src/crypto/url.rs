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


//! Stream URL signing
//!
//! The CDN only serves a track when the request path carries a token that
//! the service can decrypt back into the track's metadata. The token is
//! built like this (all separators are the single raw byte `0xA4`):
//!
//! ```text
//! payload = content_hash ¤ quality_code ¤ track_id ¤ media_version
//! block   = md5_hex(payload) ¤ payload ¤
//! block   = zero-pad(block) to a multiple of 16
//! token   = hex(AES-128-ECB(URL_KEY, block))
//! url     = https://e-cdns-proxy-{content_hash[0]}.dzcdn.net/mobile/1/{token}
//! ```
//!
//! Every byte matters: the server rejects a token with a different
//! separator, padding or hex case.

use crate::crypto::key::md5_hex;
use crate::error::{DeezerError, Result};
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// Field separator inside the token plaintext
const SEPARATOR: u8 = 0xA4;

/// AES block size
const BLOCK_SIZE: usize = 16;

/// Fixed AES-128 key of the URL token
const URL_KEY: &[u8; 16] = b"jo6aey6haid2Teih";

/// CDN host prefix, completed by the first character of the content hash
const CDN_HOST_PREFIX: &str = "https://e-cdns-proxy-";

/// CDN path for the mobile stream endpoint
const CDN_PATH: &str = ".dzcdn.net/mobile/1/";

/// Build the encrypted stream URL for one track at one quality
///
/// # Arguments
/// * `content_hash` - the track's `MD5_ORIGIN` digest (32 hex characters)
/// * `quality_code` - internal quality code, e.g. `"9"` for FLAC
/// * `track_id` - numeric track id
/// * `media_version` - the track's `MEDIA_VERSION` token
///
/// # Errors
/// - `Encoding` if `content_hash` is empty or contains non-ASCII characters
pub fn build_url(
    content_hash: &str,
    quality_code: &str,
    track_id: u64,
    media_version: &str,
) -> Result<String> {
    let host_char = match content_hash.chars().next() {
        Some(c) => c,
        None => return Err(DeezerError::Encoding("content hash is empty".to_string())),
    };
    if !content_hash.is_ascii() {
        return Err(DeezerError::Encoding(format!(
            "content hash '{}' is not ASCII",
            content_hash
        )));
    }

    let token = encrypt_token(&token_plaintext(
        content_hash,
        quality_code,
        track_id,
        media_version,
    ));

    Ok(format!("{}{}{}{}", CDN_HOST_PREFIX, host_char, CDN_PATH, token))
}

/// Assemble the zero-padded plaintext block sequence
fn token_plaintext(
    content_hash: &str,
    quality_code: &str,
    track_id: u64,
    media_version: &str,
) -> Vec<u8> {
    let track_id = track_id.to_string();
    let fields: [&[u8]; 4] = [
        content_hash.as_bytes(),
        quality_code.as_bytes(),
        track_id.as_bytes(),
        media_version.as_bytes(),
    ];
    let payload = fields.join(&SEPARATOR);
    let digest = md5_hex(&payload);

    let mut block = Vec::with_capacity(digest.len() + payload.len() + 2 + BLOCK_SIZE);
    block.extend_from_slice(&digest);
    block.push(SEPARATOR);
    block.extend_from_slice(&payload);
    block.push(SEPARATOR);

    let remainder = block.len() % BLOCK_SIZE;
    if remainder != 0 {
        block.resize(block.len() + BLOCK_SIZE - remainder, 0);
    }
    block
}

/// AES-128 in ECB mode: every 16-byte block encrypted independently
fn encrypt_token(plaintext: &[u8]) -> String {
    let cipher = Aes128::new(URL_KEY.into());
    let mut data = plaintext.to_vec();
    for block in data.chunks_exact_mut(BLOCK_SIZE) {
        cipher.encrypt_block(block.into());
    }
    hex::encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "abc1234567890def0123456789abcdef";

    #[test]
    fn test_known_flac_url() {
        let url = build_url(HASH, "9", 2104162, "1").unwrap();
        assert_eq!(
            url,
            "https://e-cdns-proxy-a.dzcdn.net/mobile/1/\
             fa66e661cdc9582d9112eebb3c483f3125c4ac9f0447a529d9fb39dcdf5445b5\
             6e771e351672db3690c1b5c66b0cf13b35805f758945ebcef0ad5316ab652a66\
             c9e46db5dc9cb79c797776dfe64423b6"
        );
    }

    #[test]
    fn test_known_mp3_url() {
        let url = build_url(HASH, "3", 2104162, "1").unwrap();
        assert!(url.ends_with(
            "2e433f4fd5e93ac2c340cbf87543b6c8c53240efc801e74a1d4889758213a06d\
             6e771e351672db3690c1b5c66b0cf13b35805f758945ebcef0ad5316ab652a66\
             9ccf11d7c16f5872960ede225b2a1e90"
        ));
    }

    #[test]
    fn test_url_is_reproducible() {
        let first = build_url(HASH, "9", 2104162, "1").unwrap();
        let second = build_url(HASH, "9", 2104162, "1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_host_uses_first_hash_character() {
        let url = build_url("f0000000000000000000000000000000", "1", 42, "3").unwrap();
        assert!(url.starts_with("https://e-cdns-proxy-f.dzcdn.net/mobile/1/"));
    }

    #[test]
    fn test_empty_hash_is_rejected() {
        let err = build_url("", "9", 2104162, "1").unwrap_err();
        assert!(matches!(err, DeezerError::Encoding(_)));
    }

    #[test]
    fn test_non_ascii_hash_is_rejected() {
        let err = build_url("äbc", "9", 2104162, "1").unwrap_err();
        assert!(matches!(err, DeezerError::Encoding(_)));
    }

    #[test]
    fn test_plaintext_layout() {
        let block = token_plaintext(HASH, "9", 2104162, "1");
        assert_eq!(block.len() % BLOCK_SIZE, 0);
        assert_eq!(block[32], SEPARATOR);
        assert_eq!(&block[33..65], HASH.as_bytes());
        assert_eq!(block[65], SEPARATOR);
        assert_eq!(&block[66..67], b"9");
    }
}

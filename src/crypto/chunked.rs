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


//! Selective chunk decryption
//!
//! Streams are served in 2048-byte chunks of which only every third one is
//! encrypted: chunk 0, 3, 6, ... are Blowfish-CBC with the track's key and a
//! fixed IV, the rest are plaintext. A trailing chunk shorter than 2048
//! bytes is never encrypted, whatever its position.
//!
//! The caller must hand over chunks exactly as the source was cut. Feeding
//! chunks re-sliced at other boundaries corrupts the output, which is why
//! the download path re-chunks the HTTP body into `CHUNK_SIZE` pieces first.

use crate::crypto::key::StreamKey;
use crate::error::{DeezerError, Result};
use blowfish::Blowfish;
use cbc::cipher::{BlockDecryptMut, InnerIvInit, KeyInit};

/// Size of one stream chunk
pub const CHUNK_SIZE: usize = 2048;

/// Blowfish block size
const BLOWFISH_BLOCK: usize = 8;

/// Fixed CBC IV of encrypted chunks
const CHUNK_IV: &[u8; 8] = &[0, 1, 2, 3, 4, 5, 6, 7];

type BlowfishCbcDec = cbc::Decryptor<Blowfish>;

/// Stateful decryptor for one track stream
///
/// Not restartable: it counts chunks as they pass and must see every chunk
/// of the stream exactly once, in order.
pub struct ChunkedDecryptor {
    cipher: Blowfish,
    segment: u64,
    finished: bool,
}

impl ChunkedDecryptor {
    /// Create a decryptor for a stream encrypted with `key`
    pub fn new(key: &StreamKey) -> Result<Self> {
        let cipher = Blowfish::new_from_slice(key.as_bytes())
            .map_err(|e| DeezerError::DecryptionFailed(format!("invalid chunk key: {}", e)))?;

        Ok(Self {
            cipher,
            segment: 0,
            finished: false,
        })
    }

    /// Number of non-empty chunks processed so far
    pub fn segment(&self) -> u64 {
        self.segment
    }

    /// Whether an end-of-stream chunk has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Transform the next chunk of the stream
    ///
    /// Returns `None` once an empty chunk has been seen; the empty chunk is
    /// the end-of-stream marker and everything after it is ignored.
    pub fn process(&mut self, mut chunk: Vec<u8>) -> Option<Vec<u8>> {
        if self.finished || chunk.is_empty() {
            self.finished = true;
            return None;
        }

        if self.segment % 3 == 0 && chunk.len() == CHUNK_SIZE {
            self.decrypt_in_place(&mut chunk);
        }
        self.segment += 1;

        Some(chunk)
    }

    fn decrypt_in_place(&self, chunk: &mut [u8]) {
        let mut decryptor = BlowfishCbcDec::inner_iv_init(self.cipher.clone(), CHUNK_IV.into());
        for block in chunk.chunks_exact_mut(BLOWFISH_BLOCK) {
            decryptor.decrypt_block_mut(block.into());
        }
    }
}

/// Lazy plaintext view over a sequence of encrypted chunks
///
/// Yields one output chunk per input chunk and stops at the first empty one.
pub struct DecryptStream<I> {
    chunks: I,
    decryptor: ChunkedDecryptor,
}

impl<I> Iterator for DecryptStream<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.decryptor.is_finished() {
            return None;
        }
        let chunk = self.chunks.next()?;
        self.decryptor.process(chunk)
    }
}

/// Decrypt a chunk sequence with the given key
///
/// # Example
/// ```
/// use deezer_core::crypto::{decrypt_stream, derive_key};
///
/// let chunks = vec![vec![0u8; 100], Vec::new(), vec![1u8; 10]];
/// let plain: Vec<Vec<u8>> = decrypt_stream(chunks, &derive_key(1)).unwrap().collect();
///
/// // short chunk passes through, the empty chunk ends the stream
/// assert_eq!(plain, vec![vec![0u8; 100]]);
/// ```
pub fn decrypt_stream<I>(chunks: I, key: &StreamKey) -> Result<DecryptStream<I::IntoIter>>
where
    I: IntoIterator<Item = Vec<u8>>,
{
    Ok(DecryptStream {
        chunks: chunks.into_iter(),
        decryptor: ChunkedDecryptor::new(key)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::key::derive_key;
    use cbc::cipher::BlockEncryptMut;

    type BlowfishCbcEnc = cbc::Encryptor<Blowfish>;

    fn pattern(seed: u8) -> Vec<u8> {
        (0..CHUNK_SIZE).map(|i| (i as u8).wrapping_add(seed)).collect()
    }

    /// Encrypt a chunk the way the CDN does
    fn server_encrypt(key: &StreamKey, chunk: &mut [u8]) {
        let cipher = Blowfish::new_from_slice(key.as_bytes()).unwrap();
        let mut encryptor = BlowfishCbcEnc::inner_iv_init(cipher, CHUNK_IV.into());
        for block in chunk.chunks_exact_mut(BLOWFISH_BLOCK) {
            encryptor.encrypt_block_mut(block.into());
        }
    }

    #[test]
    fn test_known_chunk_decryption() {
        let key = derive_key(3135556);
        let input: Vec<u8> = (0..CHUNK_SIZE).map(|i| i as u8).collect();

        let out: Vec<Vec<u8>> = decrypt_stream(vec![input], &key).unwrap().collect();

        assert_eq!(hex::encode(&out[0][..16]), "460ee1dbcddd9b0c6b242a4fb71cf64e");
        assert_eq!(hex::encode(&out[0][CHUNK_SIZE - 8..]), "5df7cd94b2996202");
    }

    #[test]
    fn test_every_third_chunk_is_transformed() {
        let key = derive_key(2104162);
        let input: Vec<Vec<u8>> = (0..9).map(|i| pattern(i as u8)).collect();

        let output: Vec<Vec<u8>> = decrypt_stream(input.clone(), &key).unwrap().collect();

        assert_eq!(output.len(), 9);
        for (i, (before, after)) in input.iter().zip(output.iter()).enumerate() {
            if i % 3 == 0 {
                assert_ne!(before, after, "chunk {} should be decrypted", i);
            } else {
                assert_eq!(before, after, "chunk {} should pass through", i);
            }
        }
    }

    #[test]
    fn test_short_final_chunk_passes_through() {
        let key = derive_key(2104162);
        // position 3 would be a cipher chunk if it were full length
        let tail = vec![7u8; 100];
        let input = vec![pattern(0), pattern(1), pattern(2), tail.clone()];

        let output: Vec<Vec<u8>> = decrypt_stream(input, &key).unwrap().collect();

        assert_eq!(output.len(), 4);
        assert_eq!(output[3], tail);
    }

    #[test]
    fn test_empty_chunk_ends_stream() {
        let key = derive_key(2104162);
        let input = vec![pattern(0), pattern(1), Vec::new(), pattern(3), pattern(4)];

        let output: Vec<Vec<u8>> = decrypt_stream(input, &key).unwrap().collect();

        assert_eq!(output.len(), 2);
        assert_eq!(output[1], pattern(1));
    }

    #[test]
    fn test_round_trip_recovers_plaintext() {
        let key = derive_key(95813354);
        let plaintext: Vec<Vec<u8>> = (0..7)
            .map(|i| pattern(i as u8 * 31))
            .chain(std::iter::once(vec![9u8; 555]))
            .collect();

        let mut served = plaintext.clone();
        for (i, chunk) in served.iter_mut().enumerate() {
            if i % 3 == 0 && chunk.len() == CHUNK_SIZE {
                server_encrypt(&key, chunk);
            }
        }
        assert_ne!(served[0], plaintext[0]);

        let recovered: Vec<Vec<u8>> = decrypt_stream(served, &key).unwrap().collect();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn test_process_counts_segments() {
        let mut decryptor = ChunkedDecryptor::new(&derive_key(1)).unwrap();
        assert!(decryptor.process(pattern(0)).is_some());
        assert!(decryptor.process(vec![1, 2, 3]).is_some());
        assert_eq!(decryptor.segment(), 2);

        assert!(decryptor.process(Vec::new()).is_none());
        assert!(decryptor.is_finished());
        assert!(decryptor.process(pattern(0)).is_none());
    }
}

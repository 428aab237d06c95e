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


//! Streaming fetch, decrypt and write
//!
//! The HTTP body arrives in whatever pieces the transport produces. They
//! are re-cut into exact `CHUNK_SIZE` chunks (only the last may be short)
//! before reaching the `ChunkedDecryptor`, then written through a buffered
//! file handle.
//!
//! Output goes to a `.part` sibling owned by a `PartialFile` guard. The
//! guard deletes the sibling when dropped without `commit`, which covers
//! errors and a caller dropping the download future midway. The caller
//! commits once the file is complete, which for tracks means tagged too, so
//! a file at the final path is always a finished one.

use crate::api::traits::{ChunkStream, EncryptedStream};
use crate::crypto::{ChunkedDecryptor, StreamKey, CHUNK_SIZE};
use crate::download::progress::ProgressObserver;
use crate::error::{DeezerError, Result};
use futures_util::StreamExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

/// Write buffer size
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Re-cuts a body stream into fixed-size chunks
pub struct FixedChunks {
    body: ChunkStream,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl FixedChunks {
    pub fn new(body: ChunkStream) -> Self {
        Self {
            body,
            buffer: Vec::with_capacity(CHUNK_SIZE * 2),
            exhausted: false,
        }
    }

    /// Next chunk of exactly `CHUNK_SIZE` bytes, or the short remainder at the end
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        while !self.exhausted && self.buffer.len() < CHUNK_SIZE {
            match self.body.next().await {
                Some(Ok(piece)) => self.buffer.extend_from_slice(&piece),
                Some(Err(e)) => return Some(Err(e)),
                None => self.exhausted = true,
            }
        }

        if self.buffer.is_empty() {
            return None;
        }

        let take = self.buffer.len().min(CHUNK_SIZE);
        let rest = self.buffer.split_off(take);
        Some(Ok(std::mem::replace(&mut self.buffer, rest)))
    }
}

/// Output file that is removed unless committed
pub struct PartialFile {
    part_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl PartialFile {
    pub fn new(final_path: &Path) -> Self {
        let mut name = OsString::from(final_path.as_os_str());
        name.push(".part");
        Self {
            part_path: PathBuf::from(name),
            final_path: final_path.to_path_buf(),
            committed: false,
        }
    }

    pub fn part_path(&self) -> &Path {
        &self.part_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Move the written data to its final path
    pub async fn commit(mut self) -> Result<PathBuf> {
        fs::rename(&self.part_path, &self.final_path)
            .await
            .map_err(|e| io_failure("rename", &self.final_path, e))?;
        self.committed = true;
        Ok(self.final_path.clone())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed && std::fs::remove_file(&self.part_path).is_ok() {
            debug!("Removed partial file {}", self.part_path.display());
        }
    }
}

fn io_failure(op: &str, path: &Path, e: std::io::Error) -> DeezerError {
    DeezerError::FileIoError(format!("{}: {} - {}", op, path.display(), e))
}

/// Decrypt `stream` into the `.part` file of `partial`, returning the
/// number of bytes written
///
/// Parent directories are created as needed. `observer` is called after
/// every chunk write with the running byte count and the declared total.
/// Nothing is committed.
pub async fn write_decrypted(
    stream: EncryptedStream,
    key: &StreamKey,
    partial: &PartialFile,
    observer: Option<&ProgressObserver>,
) -> Result<u64> {
    let total = stream.available_length().unwrap_or(0);

    if let Some(parent) = partial.final_path().parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_failure("create_dir", parent, e))?;
    }

    let file = File::create(partial.part_path())
        .await
        .map_err(|e| io_failure("create", partial.part_path(), e))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    let mut decryptor = ChunkedDecryptor::new(key)?;
    let mut chunks = FixedChunks::new(stream.body);
    let mut written = 0u64;

    while let Some(chunk) = chunks.next_chunk().await {
        let Some(plain) = decryptor.process(chunk?) else {
            break;
        };

        writer
            .write_all(&plain)
            .await
            .map_err(|e| io_failure("write", partial.part_path(), e))?;
        written += plain.len() as u64;

        if let Some(observer) = observer {
            observer(written, total);
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| io_failure("flush", partial.part_path(), e))?;
    drop(writer);

    debug!(
        bytes = written,
        segments = decryptor.segment(),
        "Wrote {}",
        partial.part_path().display()
    );
    Ok(written)
}

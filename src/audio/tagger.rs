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


//! Tagging collaborator
//!
//! After a stream has been written completely the orchestrator hands the
//! file to a `Tagger` exactly once. `FfmpegTagger` is the shipped
//! implementation: it remuxes the file with FFmpeg (`-codec copy`), adding
//! `-metadata` fields and, when available, the album cover as an attached
//! picture. The result is written to a temporary sibling and renamed over
//! the original, so a failed run leaves the untagged audio intact.
//!
//! # Tags written
//! - title, artist, album, album_artist
//! - track (`n/total`), disc, date, year
//! - genre, publisher (label), isrc, bpm, replaygain_track_peak
//! - composer, lyricist (author) once the track is enriched

use crate::catalog::model::{Album, Track};
use crate::download::quality::Container;
use crate::error::{DeezerError, Result};
use async_trait::async_trait;
use chrono::Datelike;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

/// Descriptors handed to the tagger for one file
#[derive(Debug, Clone)]
pub struct TagContext {
    pub track: Arc<Track>,
    pub album: Arc<Album>,
    /// JPEG bytes of the album cover
    pub cover: Option<Vec<u8>>,
}

/// Embeds metadata into a finished output file
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag(&self, path: &Path, container: Container, context: &TagContext) -> Result<()>;
}

/// Tagger that shells out to `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegTagger {
    binary: PathBuf,
}

impl Default for FfmpegTagger {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific ffmpeg binary instead of the one in PATH
    pub fn with_binary<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `key=value` pairs for every known field
    fn metadata_pairs(context: &TagContext) -> Vec<(&'static str, String)> {
        let track = &context.track;
        let album = &context.album;
        let mut pairs = vec![
            ("title", track.title.clone()),
            ("artist", track.artist.clone()),
            ("album", album.title.clone()),
            ("album_artist", album.artist.clone()),
            ("track", format!("{}/{}", track.number, album.total_tracks())),
            ("disc", track.disc_number.to_string()),
        ];

        if let Some(date) = track.release_date.or(album.release_date) {
            pairs.push(("date", date.format("%Y-%m-%d").to_string()));
            pairs.push(("year", date.year().to_string()));
        }
        if !album.genres.is_empty() {
            pairs.push(("genre", album.genres.join(", ")));
        }
        if !album.label.is_empty() {
            pairs.push(("publisher", album.label.clone()));
        }
        if !track.isrc.is_empty() {
            pairs.push(("isrc", track.isrc.clone()));
        }
        if track.bpm > 0.0 {
            pairs.push(("bpm", format!("{}", track.bpm)));
        }
        if track.replaygain_track_peak != 0.0 {
            pairs.push(("replaygain_track_peak", format!("{}", track.replaygain_track_peak)));
        }
        if let Some(enrichment) = track.enrichment() {
            if !enrichment.composers.is_empty() {
                pairs.push(("composer", enrichment.composers.join(", ")));
            }
            if !enrichment.authors.is_empty() {
                pairs.push(("lyricist", enrichment.authors.join(", ")));
            }
        }

        pairs
    }

    fn build_args(
        input: &Path,
        cover: Option<&Path>,
        output: &Path,
        pairs: &[(&'static str, String)],
    ) -> Vec<String> {
        let mut args = vec!["-i".to_string(), input.to_string_lossy().to_string()];

        if let Some(cover) = cover {
            args.extend([
                "-i".to_string(),
                cover.to_string_lossy().to_string(),
                "-map".to_string(),
                "0:a".to_string(),
                "-map".to_string(),
                "1:v".to_string(),
                "-disposition:v:0".to_string(),
                "attached_pic".to_string(),
                "-metadata:s:v".to_string(),
                "comment=Cover (front)".to_string(),
            ]);
        }

        args.extend(["-codec".to_string(), "copy".to_string()]);

        for (key, value) in pairs {
            args.push("-metadata".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push("-y".to_string());
        args.push(output.to_string_lossy().to_string());
        args
    }

    async fn execute(&self, args: &[String]) -> Result<()> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DeezerError::FfmpegNotFound
                } else {
                    DeezerError::TaggingFailed(format!("Failed to execute ffmpeg: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeezerError::TaggingFailed(format!("FFmpeg failed: {}", stderr)));
        }

        Ok(())
    }
}

/// Temporary sibling keeping the real extension so ffmpeg picks the right muxer
fn temp_sibling(file: &Path, container: Container, tag: &str) -> PathBuf {
    file.with_extension(format!("{}{}", tag, container.extension()))
}

#[async_trait]
impl Tagger for FfmpegTagger {
    async fn tag(&self, path: &Path, container: Container, context: &TagContext) -> Result<()> {
        let temp_file = temp_sibling(path, container, "tagging");

        let cover_file = match &context.cover {
            Some(bytes) => {
                let cover_path = path.with_extension("cover.jpg");
                fs::write(&cover_path, bytes).await.map_err(|e| {
                    DeezerError::FileIoError(format!("write: {} - {}", cover_path.display(), e))
                })?;
                Some(cover_path)
            }
            None => None,
        };

        let pairs = Self::metadata_pairs(context);
        let args = Self::build_args(path, cover_file.as_deref(), &temp_file, &pairs);
        debug!(track_id = context.track.id, fields = pairs.len(), "Tagging {}", path.display());

        let result = self.execute(&args).await;

        if let Some(cover_path) = &cover_file {
            let _ = fs::remove_file(cover_path).await;
        }
        if let Err(e) = result {
            let _ = fs::remove_file(&temp_file).await;
            return Err(e);
        }

        fs::rename(&temp_file, path).await.map_err(|e| {
            DeezerError::FileIoError(format!("rename: {} - {}", path.display(), e))
        })?;

        Ok(())
    }
}

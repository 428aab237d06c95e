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


//! Download orchestration
//!
//! `Downloader` drives one track through
//! enrich -> build URL -> open stream -> decrypt/write -> tag, and fans that
//! out over albums and playlists.
//!
//! # Quality fallback
//! The requested tier is tried first. A stream that declares no content
//! (missing or zero `Content-Length`) makes the orchestrator step down one
//! tier and retry, at most once per tier. When MP3_128 is empty too the
//! track fails with `StreamUnavailable`. No other failure is retried.
//!
//! # Collections
//! Members are downloaded in declared order, up to
//! `max_concurrent_downloads` at a time with results still yielded in
//! order. Each member is independent: its error is reported in its slot
//! and the remaining members continue.
//!
//! # Existing files
//! A track whose output already exists at the requested tier's extension
//! is reported as skipped without contacting the stream host, unless
//! `overwrite` is set. A lower tier's file never satisfies a FLAC request.
//! Audio is tagged while still a `.part` file and only then moved to its
//! final path, so an existing file is always a tagged one.

use crate::api::traits::{CatalogService, StreamFetcher};
use crate::audio::tagger::{TagContext, Tagger};
use crate::catalog::cache::EntityCache;
use crate::catalog::model::{Album, Collection, Track};
use crate::crypto::{build_url, derive_key};
use crate::download::progress::{DownloadState, MemberObserver, ProgressObserver, StateMachine};
use crate::download::quality::QualityTier;
use crate::download::stream::{write_decrypted, PartialFile};
use crate::error::{DeezerError, Result};
use crate::file::paths::track_path;
use futures_util::stream::{self, BoxStream, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root of the `<artist>/<album>/<n> - <title>` tree
    pub output_directory: PathBuf,

    /// Tier used when the caller does not pick one
    pub default_quality: QualityTier,

    /// Collection members downloaded at once (1 = sequential)
    pub max_concurrent_downloads: usize,

    /// Replace files that already exist instead of skipping them
    pub overwrite: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("Songs"),
            default_quality: QualityTier::Flac,
            max_concurrent_downloads: 1,
            overwrite: false,
        }
    }
}

impl DownloadConfig {
    /// Read a JSON config file; absent keys keep their defaults
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            DeezerError::ConfigurationError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            DeezerError::ConfigurationError(format!("invalid config {}: {}", path.display(), e))
        })?;

        if config.max_concurrent_downloads == 0 {
            return Err(DeezerError::ConfigurationError(
                "max_concurrent_downloads must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

/// Outcome of one finished track
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub track_id: u64,
    pub path: PathBuf,
    /// Bytes written (or size of the existing file when skipped)
    pub bytes: u64,
    /// Tier actually delivered
    ///
    /// `None` for a skipped `.mp3`, whose bitrate cannot be told from the
    /// file name.
    pub quality: Option<QualityTier>,
    /// Tiers that served no content, in the order they were tried
    pub fallbacks: Vec<QualityTier>,
    /// Lifecycle states the download went through
    pub transitions: Vec<DownloadState>,
    /// Output already existed and nothing was fetched
    pub skipped: bool,
}

/// How `download_collection` hands back member results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    /// Lazily, one member at a time as the caller polls
    Streaming,
    /// Eagerly, after every member has finished
    Materialized,
}

/// Member results of a collection, in declared order
pub enum CollectionDownload<'a> {
    Streaming(BoxStream<'a, Result<DownloadResult>>),
    Materialized(Vec<Result<DownloadResult>>),
}

impl<'a> CollectionDownload<'a> {
    /// Drive the download to the end and return every member result
    pub async fn into_results(self) -> Vec<Result<DownloadResult>> {
        match self {
            CollectionDownload::Streaming(results) => results.collect().await,
            CollectionDownload::Materialized(results) => results,
        }
    }
}

/// Kinds of links `download_link` understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    Track(u64),
    Album(u64),
    Playlist(u64),
}

impl LinkTarget {
    /// Parse `https://www.deezer.com/[lang/]<kind>/<id>`
    ///
    /// # Errors
    /// - `InvalidUrl` when the link is not a Deezer resource link
    /// - `UnsupportedAction` for kinds other than track, album, playlist
    pub fn parse(link: &str) -> Result<Self> {
        static LINK: OnceLock<Option<Regex>> = OnceLock::new();
        let pattern = LINK
            .get_or_init(|| {
                Regex::new(r"^https?://(?:www\.)?deezer\.com/(?:[a-z]{2}(?:-[a-z]{2})?/)?(\w+)/(\d+)")
                    .ok()
            })
            .as_ref()
            .ok_or_else(|| DeezerError::InvalidState("link pattern failed to compile".to_string()))?;

        let captures = pattern
            .captures(link.trim())
            .ok_or_else(|| DeezerError::InvalidUrl(link.to_string()))?;
        let id: u64 = captures[2]
            .parse()
            .map_err(|_| DeezerError::InvalidUrl(link.to_string()))?;

        match &captures[1] {
            "track" => Ok(LinkTarget::Track(id)),
            "album" => Ok(LinkTarget::Album(id)),
            "playlist" => Ok(LinkTarget::Playlist(id)),
            other => Err(DeezerError::UnsupportedAction(other.to_string())),
        }
    }
}

/// Result of `download_link`
#[derive(Debug)]
pub enum LinkDownload {
    Track(DownloadResult),
    Collection(Vec<Result<DownloadResult>>),
}

/// Track, album and playlist downloader
pub struct Downloader {
    cache: EntityCache,
    fetcher: Arc<dyn StreamFetcher>,
    tagger: Arc<dyn Tagger>,
    config: DownloadConfig,
}

impl Downloader {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        fetcher: Arc<dyn StreamFetcher>,
        tagger: Arc<dyn Tagger>,
        config: DownloadConfig,
    ) -> Self {
        Self {
            cache: EntityCache::new(catalog),
            fetcher,
            tagger,
            config,
        }
    }

    /// Descriptor cache shared by every download of this instance
    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Resolve a track id and download it
    pub async fn download_track(
        &self,
        track_id: u64,
        quality: QualityTier,
        observer: Option<&ProgressObserver>,
    ) -> Result<DownloadResult> {
        let track = self.cache.track(track_id).await?;
        self.download_object(&track, quality, observer).await
    }

    /// Download one resolved track
    ///
    /// # Errors
    /// - `CatalogLookup` if the track's album cannot be resolved
    /// - `Encoding` if the enrichment cannot be turned into a URL
    /// - `StreamUnavailable` if no tier down to MP3_128 has content
    /// - `FileIoError` if writing fails; no partial file is left behind
    /// - `TaggingFailed` / `FfmpegNotFound` from the tagger; no file is kept,
    ///   so the next attempt downloads again
    pub async fn download_object(
        &self,
        track: &Arc<Track>,
        quality: QualityTier,
        observer: Option<&ProgressObserver>,
    ) -> Result<DownloadResult> {
        let mut machine = StateMachine::new(track.id);
        let result = self.run(track, quality, observer, &mut machine).await;

        if let Err(e) = &result {
            machine.fail();
            warn!(track_id = track.id, state = %machine.state(), "Download failed: {}", e);
        }
        result
    }

    async fn run(
        &self,
        track: &Arc<Track>,
        quality: QualityTier,
        observer: Option<&ProgressObserver>,
        machine: &mut StateMachine,
    ) -> Result<DownloadResult> {
        let album = self.cache.album(track.album_id).await?;

        if !self.config.overwrite {
            if let Some((path, bytes)) = self.existing_output(track, &album, quality).await {
                info!(track_id = track.id, "Already downloaded: {}", path.display());
                return Ok(DownloadResult {
                    track_id: track.id,
                    path,
                    bytes,
                    quality: (quality == QualityTier::Flac).then_some(quality),
                    fallbacks: Vec::new(),
                    transitions: machine.history().to_vec(),
                    skipped: true,
                });
            }
        }

        let enrichment = self.cache.enrich(track).await?;
        machine.advance(DownloadState::MetadataEnriched)?;

        let mut fallbacks = Vec::new();
        for tier in quality.fallback_chain() {
            let url = build_url(
                &enrichment.content_hash,
                tier.code(),
                track.id,
                &enrichment.media_version,
            )?;
            machine.advance(DownloadState::UrlResolved)?;

            let stream = self.fetcher.open(&url).await?;
            machine.advance(DownloadState::Streaming)?;

            if stream.available_length().is_none() {
                fallbacks.push(tier);
                match tier.step_down() {
                    Some(next) => {
                        warn!(track_id = track.id, from = %tier, to = %next, "No content at this quality, falling back");
                        machine.advance(DownloadState::Retrying)?;
                        continue;
                    }
                    None => break,
                }
            }

            let path = track_path(
                &self.config.output_directory,
                &album.artist,
                &album.title,
                track.number,
                &track.title,
                tier.extension(),
            );
            info!(track_id = track.id, quality = %tier, "Downloading {}", path.display());

            let partial = PartialFile::new(&path);
            let key = derive_key(track.id);
            let bytes = write_decrypted(stream, &key, &partial, observer).await?;

            machine.advance(DownloadState::Tagging)?;
            let context = TagContext {
                track: track.clone(),
                album: album.clone(),
                cover: self.cover_for(&album).await,
            };
            self.tagger
                .tag(partial.part_path(), tier.container(), &context)
                .await?;
            let path = partial.commit().await?;
            machine.advance(DownloadState::Complete)?;

            info!(track_id = track.id, bytes, "Finished {}", path.display());
            return Ok(DownloadResult {
                track_id: track.id,
                path,
                bytes,
                quality: Some(tier),
                fallbacks,
                transitions: machine.history().to_vec(),
                skipped: false,
            });
        }

        Err(DeezerError::StreamUnavailable { track_id: track.id })
    }

    /// Existing output of this track with `quality`'s extension, and its size
    async fn existing_output(
        &self,
        track: &Track,
        album: &Album,
        quality: QualityTier,
    ) -> Option<(PathBuf, u64)> {
        let path = track_path(
            &self.config.output_directory,
            &album.artist,
            &album.title,
            track.number,
            &track.title,
            quality.extension(),
        );
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Some((path, metadata.len())),
            _ => None,
        }
    }

    /// Cover bytes for tagging; a failed fetch only costs the picture
    async fn cover_for(&self, album: &Album) -> Option<Vec<u8>> {
        match self.cache.album_cover(album).await {
            Ok(cover) => cover.map(<[u8]>::to_vec),
            Err(e) => {
                warn!(album_id = album.id, "Cover unavailable: {}", e);
                None
            }
        }
    }

    /// Download every member of a collection
    ///
    /// Members are resolved through the cache one by one, so a member the
    /// catalog rejects fails alone. `observer` hears every member's writes,
    /// keyed by track id.
    pub async fn download_collection(
        &self,
        collection: &Collection,
        quality: QualityTier,
        mode: CollectionMode,
        observer: Option<MemberObserver>,
    ) -> CollectionDownload<'_> {
        info!(
            collection_id = collection.id(),
            members = collection.track_ids().len(),
            "Downloading {}",
            collection.title()
        );

        let members = self.member_stream(collection.track_ids().to_vec(), quality, observer);
        match mode {
            CollectionMode::Streaming => CollectionDownload::Streaming(members),
            CollectionMode::Materialized => CollectionDownload::Materialized(members.collect().await),
        }
    }

    fn member_stream(
        &self,
        track_ids: Vec<u64>,
        quality: QualityTier,
        observer: Option<MemberObserver>,
    ) -> BoxStream<'_, Result<DownloadResult>> {
        let concurrency = self.config.max_concurrent_downloads.max(1);
        stream::iter(track_ids)
            .map(move |track_id| {
                let member = member_observer(observer.as_ref(), track_id);
                async move {
                    let result = self.download_track(track_id, quality, member.as_ref()).await;
                    if let Err(e) = &result {
                        error!(track_id, "Collection member failed: {}", e);
                    }
                    result
                }
            })
            .buffered(concurrency)
            .boxed()
    }

    pub async fn download_album(
        &self,
        album_id: u64,
        quality: QualityTier,
        mode: CollectionMode,
        observer: Option<MemberObserver>,
    ) -> Result<CollectionDownload<'_>> {
        let album = self.cache.album(album_id).await?;
        Ok(self
            .download_collection(&Collection::Album(album), quality, mode, observer)
            .await)
    }

    pub async fn download_playlist(
        &self,
        playlist_id: u64,
        quality: QualityTier,
        mode: CollectionMode,
        observer: Option<MemberObserver>,
    ) -> Result<CollectionDownload<'_>> {
        let playlist = self.cache.playlist(playlist_id).await?;
        Ok(self
            .download_collection(&Collection::Playlist(playlist), quality, mode, observer)
            .await)
    }

    /// Download whatever a Deezer link points at
    ///
    /// Albums and playlists are downloaded materialised. `observer` is
    /// called with the track id of whichever track is being written.
    pub async fn download_link(
        &self,
        link: &str,
        quality: QualityTier,
        observer: Option<MemberObserver>,
    ) -> Result<LinkDownload> {
        let download = match LinkTarget::parse(link)? {
            LinkTarget::Track(id) => {
                let observer = member_observer(observer.as_ref(), id);
                return self
                    .download_track(id, quality, observer.as_ref())
                    .await
                    .map(LinkDownload::Track);
            }
            LinkTarget::Album(id) => {
                self.download_album(id, quality, CollectionMode::Materialized, observer)
                    .await?
            }
            LinkTarget::Playlist(id) => {
                self.download_playlist(id, quality, CollectionMode::Materialized, observer)
                    .await?
            }
        };
        Ok(LinkDownload::Collection(download.into_results().await))
    }
}

/// Bind a collection observer to one member
fn member_observer(observer: Option<&MemberObserver>, track_id: u64) -> Option<ProgressObserver> {
    observer.map(|observer| {
        let observer = observer.clone();
        Arc::new(move |done, total| observer(track_id, done, total)) as ProgressObserver
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_links() {
        assert_eq!(
            LinkTarget::parse("https://www.deezer.com/us/track/3135556").unwrap(),
            LinkTarget::Track(3135556)
        );
        assert_eq!(
            LinkTarget::parse("https://deezer.com/album/302127").unwrap(),
            LinkTarget::Album(302127)
        );
        assert_eq!(
            LinkTarget::parse("http://www.deezer.com/pt-br/playlist/908622995?utm=x").unwrap(),
            LinkTarget::Playlist(908622995)
        );
    }

    #[test]
    fn test_parse_link_errors() {
        assert!(matches!(
            LinkTarget::parse("https://www.deezer.com/en/artist/27"),
            Err(DeezerError::UnsupportedAction(kind)) if kind == "artist"
        ));
        assert!(matches!(
            LinkTarget::parse("https://example.com/track/1"),
            Err(DeezerError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = DownloadConfig::default();
        assert_eq!(config.output_directory, PathBuf::from("Songs"));
        assert_eq!(config.default_quality, QualityTier::Flac);
        assert_eq!(config.max_concurrent_downloads, 1);
        assert!(!config.overwrite);
    }

    #[tokio::test]
    async fn test_config_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "default_quality": "MP3_320", "overwrite": true }"#)
            .await
            .unwrap();

        let config = DownloadConfig::load(&path).await.unwrap();
        assert_eq!(config.default_quality, QualityTier::Mp3_320);
        assert!(config.overwrite);
        assert_eq!(config.output_directory, PathBuf::from("Songs"));
    }

    #[tokio::test]
    async fn test_config_load_rejects_zero_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "max_concurrent_downloads": 0 }"#)
            .await
            .unwrap();

        assert!(matches!(
            DownloadConfig::load(&path).await,
            Err(DeezerError::ConfigurationError(_))
        ));
    }
}

//! In-memory collaborators for driving `Downloader` without the network

#![allow(dead_code)]

use async_trait::async_trait;
use deezer_core::api::models::{AlbumInfo, PlaylistInfo, TrackInfo};
use deezer_core::api::{CatalogService, EncryptedStream, StreamFetcher};
use deezer_core::audio::{TagContext, Tagger};
use deezer_core::catalog::TrackEnrichment;
use deezer_core::crypto::{build_url, CHUNK_SIZE};
use deezer_core::download::{Container, DownloadConfig, Downloader, QualityTier};
use deezer_core::error::{DeezerError, Result};
use futures_util::stream::{self, StreamExt};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ALBUM_ID: u64 = 302127;
pub const OTHER_ALBUM_ID: u64 = 6575789;
pub const PLAYLIST_ID: u64 = 908622995;

pub fn content_hash(track_id: u64) -> String {
    format!("{:032x}", track_id)
}

pub fn media_version(_track_id: u64) -> String {
    "4".to_string()
}

/// Stream URL the downloader will request for a track at a tier
pub fn url_for(track_id: u64, tier: QualityTier) -> String {
    build_url(
        &content_hash(track_id),
        tier.code(),
        track_id,
        &media_version(track_id),
    )
    .unwrap()
}

/// Deterministic "encrypted" payload of `len` bytes
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

/// Catalog with one album (tracks 1..=5), a second album and a playlist
#[derive(Default)]
pub struct MockCatalog {
    pub tracks: HashMap<u64, TrackInfo>,
    pub albums: HashMap<u64, AlbumInfo>,
    pub playlists: HashMap<u64, PlaylistInfo>,
    pub poisoned: Mutex<HashSet<u64>>,
    pub track_calls: AtomicUsize,
    pub enrich_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        let mut catalog = MockCatalog::default();

        for number in 1..=5u64 {
            catalog.add_track(number, ALBUM_ID, number as u32, &format!("Track {}", number));
        }
        catalog.add_track(9001, OTHER_ALBUM_ID, 7, "Elsewhere");

        catalog.albums.insert(
            ALBUM_ID,
            serde_json::from_value(json!({
                "id": ALBUM_ID,
                "title": "Discovery",
                "artist": { "name": "Daft Punk" },
                "nb_tracks": 5,
                "tracks": { "data": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}, {"id": 5}] }
            }))
            .unwrap(),
        );
        catalog.albums.insert(
            OTHER_ALBUM_ID,
            serde_json::from_value(json!({
                "id": OTHER_ALBUM_ID,
                "title": "Random Access Memories",
                "artist": { "name": "Daft Punk" },
                "cover_xl": "https://cdn.example/cover.jpg",
                "tracks": { "data": [{"id": 9001}] }
            }))
            .unwrap(),
        );
        catalog.playlists.insert(
            PLAYLIST_ID,
            serde_json::from_value(json!({
                "id": PLAYLIST_ID,
                "title": "Mix",
                "creator": { "name": "someone" },
                "tracks": { "data": [{"id": 9001}, {"id": 2}] }
            }))
            .unwrap(),
        );

        catalog
    }

    fn add_track(&mut self, id: u64, album_id: u64, number: u32, title: &str) {
        let info = serde_json::from_value(json!({
            "id": id,
            "title": title,
            "track_position": number,
            "disk_number": 1,
            "artist": { "name": "Daft Punk" },
            "album": { "id": album_id }
        }))
        .unwrap();
        self.tracks.insert(id, info);
    }

    /// Make lookups of `id` fail with a catalog error
    pub fn poison(&self, id: u64) {
        self.poisoned.lock().unwrap().insert(id);
    }

    fn lookup<T: Clone>(&self, map: &HashMap<u64, T>, id: u64) -> Result<T> {
        if self.poisoned.lock().unwrap().contains(&id) {
            return Err(DeezerError::catalog_lookup("DataException", "no data", 800));
        }
        map.get(&id)
            .cloned()
            .ok_or_else(|| DeezerError::catalog_lookup("DataException", "no data", 800))
    }
}

#[async_trait]
impl CatalogService for MockCatalog {
    async fn track(&self, track_id: u64) -> Result<TrackInfo> {
        self.track_calls.fetch_add(1, Ordering::SeqCst);
        self.lookup(&self.tracks, track_id)
    }

    async fn album(&self, album_id: u64) -> Result<AlbumInfo> {
        self.lookup(&self.albums, album_id)
    }

    async fn playlist(&self, playlist_id: u64) -> Result<PlaylistInfo> {
        self.lookup(&self.playlists, playlist_id)
    }

    async fn track_enrichment(&self, track_id: u64) -> Result<TrackEnrichment> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TrackEnrichment {
            content_hash: content_hash(track_id),
            media_version: media_version(track_id),
            composers: vec!["Thomas Bangalter".to_string()],
            authors: Vec::new(),
        })
    }

    async fn image(&self, _url: &str) -> Result<Vec<u8>> {
        Ok(vec![0xff, 0xd8, 0xff, 0xe0])
    }
}

/// What the stream host answers for one URL
#[derive(Clone)]
pub struct Served {
    pub content_length: Option<u64>,
    /// Transport pieces; `None` is a connection error at that point
    pub pieces: Vec<Option<Vec<u8>>>,
}

impl Served {
    pub fn empty(content_length: Option<u64>) -> Self {
        Self {
            content_length,
            pieces: Vec::new(),
        }
    }

    /// `data` delivered in pieces of `piece_len` bytes
    pub fn bytes(data: &[u8], piece_len: usize) -> Self {
        Self {
            content_length: Some(data.len() as u64),
            pieces: data.chunks(piece_len).map(|p| Some(p.to_vec())).collect(),
        }
    }
}

/// Stream host keyed by signed URL; unknown URLs answer 404
#[derive(Default)]
pub struct MockFetcher {
    served: Mutex<HashMap<String, Served>>,
    pub opened: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn serve(&self, track_id: u64, tier: QualityTier, served: Served) {
        self.served
            .lock()
            .unwrap()
            .insert(url_for(track_id, tier), served);
    }

    /// Serve every tier of a track with `len` bytes
    pub fn serve_all(&self, track_id: u64, len: usize) {
        for tier in QualityTier::ALL {
            self.serve(track_id, tier, Served::bytes(&payload(len), CHUNK_SIZE));
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }
}

#[async_trait]
impl StreamFetcher for MockFetcher {
    async fn open(&self, url: &str) -> Result<EncryptedStream> {
        self.opened.lock().unwrap().push(url.to_string());
        let served = self
            .served
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(DeezerError::UnexpectedStatusCode { status_code: 404 })?;

        let body = stream::iter(served.pieces.into_iter().map(|piece| {
            piece.ok_or_else(|| DeezerError::api_failed("connection reset", None, None))
        }))
        .boxed();
        Ok(EncryptedStream::new(served.content_length, body))
    }
}

/// Tagger that records its calls instead of touching the file
#[derive(Default)]
pub struct RecordingTagger {
    pub calls: Mutex<Vec<(PathBuf, Container, u64, Option<usize>)>>,
    /// Size of the file handed over, per call
    pub sizes: Mutex<Vec<u64>>,
    pub fail: bool,
}

impl RecordingTagger {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn tag(&self, path: &Path, container: Container, context: &TagContext) -> Result<()> {
        self.calls.lock().unwrap().push((
            path.to_path_buf(),
            container,
            context.track.id,
            context.cover.as_ref().map(Vec::len),
        ));
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        self.sizes.lock().unwrap().push(size);
        if self.fail {
            return Err(DeezerError::TaggingFailed("recording tagger told to fail".to_string()));
        }
        Ok(())
    }
}

pub struct Harness {
    pub catalog: Arc<MockCatalog>,
    pub fetcher: Arc<MockFetcher>,
    pub tagger: Arc<RecordingTagger>,
    pub downloader: Downloader,
    pub root: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MockCatalog::new(), RecordingTagger::default(), |_| {})
    }

    pub fn with(
        catalog: MockCatalog,
        tagger: RecordingTagger,
        configure: impl FnOnce(&mut DownloadConfig),
    ) -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = DownloadConfig {
            output_directory: root.path().to_path_buf(),
            ..Default::default()
        };
        configure(&mut config);

        let catalog = Arc::new(catalog);
        let fetcher = Arc::new(MockFetcher::default());
        let tagger = Arc::new(tagger);
        let downloader = Downloader::new(catalog.clone(), fetcher.clone(), tagger.clone(), config);

        Self {
            catalog,
            fetcher,
            tagger,
            downloader,
            root,
        }
    }

    /// A second downloader over the same catalog, fetcher and output root
    pub fn downloader_with(&self, tagger: RecordingTagger) -> (Arc<RecordingTagger>, Downloader) {
        let tagger = Arc::new(tagger);
        let downloader = Downloader::new(
            self.catalog.clone(),
            self.fetcher.clone(),
            tagger.clone(),
            self.downloader.config().clone(),
        );
        (tagger, downloader)
    }

    /// All regular files under the output root
    pub fn files(&self) -> Vec<PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }

        let mut out = Vec::new();
        walk(self.root.path(), &mut out);
        out.sort();
        out
    }
}

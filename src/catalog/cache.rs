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


//! EntityCache: identity-preserving descriptor registry
//!
//! Maps catalog ids to shared descriptors. The first resolution of an id
//! performs the catalog fetch; every later resolution returns the same
//! `Arc`. Each id owns its own `OnceCell`, so concurrent first resolutions
//! of one id wait on each other while different ids proceed in parallel.
//! The map lock is held only to find or insert the per-id cell.
//!
//! A failed fetch caches nothing and the next caller fetches again. Its
//! empty cell is dropped from the map unless another caller is still
//! waiting on it. Resolved entries are never evicted.

use crate::api::traits::CatalogService;
use crate::catalog::model::{Album, Playlist, Track, TrackEnrichment};
use crate::error::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

type Slot<T> = Arc<OnceCell<Arc<T>>>;

/// Per-kind id → descriptor registry
struct Registry<T> {
    kind: &'static str,
    slots: Mutex<HashMap<u64, Slot<T>>>,
}

impl<T> Registry<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, id: u64) -> Slot<T> {
        let mut slots = self.slots.lock().await;
        slots.entry(id).or_default().clone()
    }

    async fn resolve<F, Fut>(&self, id: u64, fetch: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = self.slot(id).await;
        if let Some(hit) = slot.get() {
            debug!(kind = self.kind, id, "Cache hit");
            return Ok(hit.clone());
        }

        let value = slot
            .get_or_try_init(|| async {
                debug!(kind = self.kind, id, "Cache miss, fetching");
                fetch().await.map(Arc::new)
            })
            .await;

        match value {
            Ok(value) => Ok(value.clone()),
            Err(e) => {
                self.release(id, &slot).await;
                Err(e)
            }
        }
    }

    /// Remove an empty cell nobody else holds
    async fn release(&self, id: u64, slot: &Slot<T>) {
        let mut slots = self.slots.lock().await;
        let unused = slots.get(&id).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2 && !slot.initialized()
        });
        if unused {
            slots.remove(&id);
        }
    }

    async fn resolved(&self) -> usize {
        let slots = self.slots.lock().await;
        slots.values().filter(|slot| slot.initialized()).count()
    }
}

/// Shared cache of tracks, albums and playlists
pub struct EntityCache {
    catalog: Arc<dyn CatalogService>,
    tracks: Registry<Track>,
    albums: Registry<Album>,
    playlists: Registry<Playlist>,
}

impl EntityCache {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        Self {
            catalog,
            tracks: Registry::new("track"),
            albums: Registry::new("album"),
            playlists: Registry::new("playlist"),
        }
    }

    /// Resolve a track descriptor
    ///
    /// # Errors
    /// `CatalogLookup` when the catalog reports the id as unknown. The
    /// failure is not cached.
    pub async fn track(&self, id: u64) -> Result<Arc<Track>> {
        let catalog = self.catalog.clone();
        self.tracks
            .resolve(id, || async move { catalog.track(id).await.map(Track::from) })
            .await
    }

    /// Resolve an album descriptor
    pub async fn album(&self, id: u64) -> Result<Arc<Album>> {
        let catalog = self.catalog.clone();
        self.albums
            .resolve(id, || async move { catalog.album(id).await.map(Album::from) })
            .await
    }

    /// Resolve a playlist descriptor
    pub async fn playlist(&self, id: u64) -> Result<Arc<Playlist>> {
        let catalog = self.catalog.clone();
        self.playlists
            .resolve(id, || async move { catalog.playlist(id).await.map(Playlist::from) })
            .await
    }

    /// Populate the enrichment fields of a track, at most once
    ///
    /// The fields live on the shared descriptor, so every holder of the
    /// track sees them without another lookup.
    pub async fn enrich<'t>(&self, track: &'t Track) -> Result<&'t TrackEnrichment> {
        track
            .enrichment_cell()
            .get_or_try_init(|| async {
                debug!(track_id = track.id, "Fetching enrichment");
                self.catalog.track_enrichment(track.id).await
            })
            .await
    }

    /// Cover bytes of an album, fetched once; `None` if the album has no cover link
    pub async fn album_cover<'a>(&self, album: &'a Album) -> Result<Option<&'a [u8]>> {
        let Some(link) = album.cover_xl.as_deref() else {
            return Ok(None);
        };

        let bytes = album
            .cover_cell()
            .get_or_try_init(|| async { self.catalog.image(link).await })
            .await?;
        Ok(Some(bytes.as_slice()))
    }

    /// Number of resolved descriptors across all kinds
    pub async fn len(&self) -> usize {
        self.tracks.resolved().await + self.albums.resolved().await + self.playlists.resolved().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

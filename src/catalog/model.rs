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


//! Catalog descriptors
//!
//! Domain-side view of tracks, albums and playlists. Built once from the
//! wire shapes in `api::models` and then shared as `Arc`s out of the
//! `EntityCache`. Collections hold member ids only, never member
//! descriptors.

use crate::api::models::{AlbumInfo, PlaylistInfo, TrackInfo};
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Fields populated by the authenticated lookup
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackEnrichment {
    /// 32-character hex origin digest (`MD5_ORIGIN`)
    pub content_hash: String,
    pub media_version: String,
    pub composers: Vec<String>,
    pub authors: Vec<String>,
}

/// A single downloadable track
#[derive(Debug)]
pub struct Track {
    pub id: u64,
    pub album_id: u64,
    pub title: String,
    pub title_short: String,
    pub artist: String,
    pub contributors: Vec<String>,
    /// Seconds
    pub duration: u32,
    pub number: u32,
    pub disc_number: u32,
    pub bpm: f64,
    pub replaygain_track_peak: f64,
    pub rank: u64,
    pub isrc: String,
    pub link: String,
    pub preview_link: String,
    pub release_date: Option<NaiveDate>,
    enrichment: OnceCell<TrackEnrichment>,
}

impl Track {
    /// Enrichment fields, if the authenticated lookup already ran
    pub fn enrichment(&self) -> Option<&TrackEnrichment> {
        self.enrichment.get()
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.initialized()
    }

    pub(crate) fn enrichment_cell(&self) -> &OnceCell<TrackEnrichment> {
        &self.enrichment
    }
}

impl From<TrackInfo> for Track {
    fn from(info: TrackInfo) -> Self {
        Track {
            id: info.id,
            album_id: info.album.id,
            title: info.title,
            title_short: info.title_short,
            artist: info.artist.name,
            contributors: info.contributors.into_iter().map(|c| c.name).collect(),
            duration: info.duration,
            number: info.track_position,
            disc_number: info.disk_number,
            bpm: info.bpm,
            replaygain_track_peak: info.gain,
            rank: info.rank,
            isrc: info.isrc,
            link: info.link,
            preview_link: info.preview,
            release_date: parse_date(info.release_date.as_deref()),
            enrichment: OnceCell::new(),
        }
    }
}

/// An album with its ordered member ids
#[derive(Debug)]
pub struct Album {
    pub id: u64,
    pub title: String,
    pub artist: String,
    pub upc: String,
    pub link: String,
    pub record_type: String,
    pub release_date: Option<NaiveDate>,
    pub track_count: u32,
    pub label: String,
    pub genres: Vec<String>,
    pub cover_small: Option<String>,
    pub cover_medium: Option<String>,
    pub cover_big: Option<String>,
    pub cover_xl: Option<String>,
    /// Seconds
    pub duration: u32,
    pub track_ids: Vec<u64>,
    cover: OnceCell<Vec<u8>>,
}

impl Album {
    /// Cover bytes, if already fetched
    pub fn cover(&self) -> Option<&[u8]> {
        self.cover.get().map(Vec::as_slice)
    }

    pub(crate) fn cover_cell(&self) -> &OnceCell<Vec<u8>> {
        &self.cover
    }

    /// Number of tracks, falling back to the member list when the catalog omits it
    pub fn total_tracks(&self) -> u32 {
        if self.track_count > 0 {
            self.track_count
        } else {
            self.track_ids.len() as u32
        }
    }
}

impl From<AlbumInfo> for Album {
    fn from(info: AlbumInfo) -> Self {
        Album {
            id: info.id,
            title: info.title,
            artist: info.artist.name,
            upc: info.upc,
            link: info.link,
            record_type: info.record_type,
            release_date: parse_date(info.release_date.as_deref()),
            track_count: info.nb_tracks,
            label: info.label,
            genres: info.genres.data.into_iter().map(|g| g.name).collect(),
            cover_small: info.cover_small,
            cover_medium: info.cover_medium,
            cover_big: info.cover_big,
            cover_xl: info.cover_xl,
            duration: info.duration,
            track_ids: info.tracks.data.into_iter().map(|t| t.id).collect(),
            cover: OnceCell::new(),
        }
    }
}

#[derive(Debug)]
pub struct Playlist {
    pub id: u64,
    pub title: String,
    pub creator: String,
    pub picture_link: Option<String>,
    pub track_ids: Vec<u64>,
}

impl From<PlaylistInfo> for Playlist {
    fn from(info: PlaylistInfo) -> Self {
        Playlist {
            id: info.id,
            title: info.title,
            creator: info.creator.name,
            picture_link: info.picture_xl,
            track_ids: info.tracks.data.into_iter().map(|t| t.id).collect(),
        }
    }
}

/// Anything that downloads as an ordered list of tracks
#[derive(Debug, Clone)]
pub enum Collection {
    Album(Arc<Album>),
    Playlist(Arc<Playlist>),
}

impl Collection {
    pub fn id(&self) -> u64 {
        match self {
            Collection::Album(album) => album.id,
            Collection::Playlist(playlist) => playlist.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Collection::Album(album) => &album.title,
            Collection::Playlist(playlist) => &playlist.title,
        }
    }

    /// Member ids in declared order
    pub fn track_ids(&self) -> &[u64] {
        match self {
            Collection::Album(album) => &album.track_ids,
            Collection::Playlist(playlist) => &playlist.track_ids,
        }
    }
}

/// `YYYY-MM-DD`; the catalog sends `0000-00-00` for unknown dates
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track_info() -> TrackInfo {
        serde_json::from_value(json!({
            "id": 3135556,
            "title": "Harder, Better, Faster, Stronger",
            "title_short": "Harder, Better, Faster, Stronger",
            "duration": 224,
            "track_position": 4,
            "disk_number": 1,
            "release_date": "2001-03-07",
            "bpm": 123.4,
            "gain": -12.4,
            "isrc": "GBDUW0000059",
            "artist": { "name": "Daft Punk" },
            "contributors": [{ "name": "Daft Punk" }],
            "album": { "id": 302127 }
        }))
        .unwrap()
    }

    #[test]
    fn test_track_from_info() {
        let track = Track::from(track_info());
        assert_eq!(track.id, 3135556);
        assert_eq!(track.album_id, 302127);
        assert_eq!(track.number, 4);
        assert_eq!(track.artist, "Daft Punk");
        assert_eq!(track.release_date, NaiveDate::from_ymd_opt(2001, 3, 7));
        assert!(!track.is_enriched());
        assert!(track.enrichment().is_none());
    }

    #[test]
    fn test_unknown_date_is_none() {
        assert_eq!(parse_date(Some("0000-00-00")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_album_member_order_and_total() {
        let info: AlbumInfo = serde_json::from_value(json!({
            "id": 302127,
            "title": "Discovery",
            "artist": { "name": "Daft Punk" },
            "genres": { "data": [{ "name": "Electro" }] },
            "tracks": { "data": [{ "id": 3 }, { "id": 1 }, { "id": 2 }] }
        }))
        .unwrap();

        let album = Album::from(info);
        assert_eq!(album.track_ids, vec![3, 1, 2]);
        assert_eq!(album.total_tracks(), 3);
        assert_eq!(album.genres, vec!["Electro"]);
        assert!(album.cover().is_none());

        let collection = Collection::Album(Arc::new(album));
        assert_eq!(collection.id(), 302127);
        assert_eq!(collection.track_ids(), &[3, 1, 2]);
    }
}

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


//! Wire shapes of the catalog API and the gateway
//!
//! The public catalog (`GET /track/{id}`, `/album/{id}`, `/playlist/{id}`)
//! answers either with the object or with
//! `{"error": {"type": .., "message": .., "code": ..}}`.
//!
//! The gateway (`gw-light.php`) wraps every answer in
//! `{"error": [] | {..}, "results": ..}` and uses upper-case field names.
//! Its numeric fields arrive as strings or numbers depending on the method,
//! so those are read leniently.
//!
//! Field names change between service versions; keep them confined here.
//! Domain code uses the descriptors in `crate::catalog::model`.

use crate::catalog::model::TrackEnrichment;
use crate::error::{DeezerError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `{"error": {...}}` body of the public catalog
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: i64,
}

impl From<ApiErrorBody> for DeezerError {
    fn from(body: ApiErrorBody) -> Self {
        DeezerError::catalog_lookup(body.kind, body.message, body.code)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdRef {
    pub id: u64,
}

/// `{"data": [...]}` list wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct DataList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for DataList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

/// `GET /track/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct TrackInfo {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub title_short: String,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub track_position: u32,
    #[serde(default)]
    pub disk_number: u32,
    #[serde(default)]
    pub rank: u64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub bpm: f64,
    #[serde(default)]
    pub gain: f64,
    #[serde(default)]
    pub isrc: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub artist: NamedRef,
    #[serde(default)]
    pub contributors: Vec<NamedRef>,
    pub album: IdRef,
}

/// `GET /album/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct AlbumInfo {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub artist: NamedRef,
    #[serde(default)]
    pub upc: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub record_type: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub nb_tracks: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub genres: DataList<NamedRef>,
    #[serde(default)]
    pub cover_small: Option<String>,
    #[serde(default)]
    pub cover_medium: Option<String>,
    #[serde(default)]
    pub cover_big: Option<String>,
    #[serde(default)]
    pub cover_xl: Option<String>,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub tracks: DataList<IdRef>,
}

/// `GET /playlist/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistInfo {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub creator: NamedRef,
    #[serde(default)]
    pub picture_xl: Option<String>,
    #[serde(default)]
    pub nb_tracks: u32,
    #[serde(default)]
    pub tracks: DataList<IdRef>,
}

/// Parse a public catalog answer, turning an `error` object into `CatalogLookup`
pub fn parse_catalog_response<T: DeserializeOwned>(value: Value) -> Result<T> {
    if let Some(error) = value.get("error") {
        let body: ApiErrorBody = serde_json::from_value(error.clone())?;
        return Err(body.into());
    }
    Ok(serde_json::from_value(value)?)
}

// ===== Gateway =====

/// Envelope of every gateway answer
#[derive(Debug, Deserialize)]
pub struct GatewayResponse {
    #[serde(default)]
    pub error: Value,
    #[serde(default)]
    pub results: Value,
}

impl GatewayResponse {
    /// Unwrap `results`, failing if the envelope carries a non-empty error
    pub fn into_results(self, method: &str) -> Result<Value> {
        let has_error = match &self.error {
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            _ => true,
        };

        if has_error {
            return Err(DeezerError::api_failed(
                format!("gateway error: {}", self.error),
                None,
                Some(method.to_string()),
            ));
        }
        Ok(self.results)
    }
}

/// `deezer.getUserData` results (only what the session needs)
#[derive(Debug, Deserialize)]
pub struct UserData {
    #[serde(rename = "checkForm", default)]
    pub check_form: String,
    #[serde(rename = "USER", default)]
    pub user: GatewayUser,
}

#[derive(Debug, Default, Deserialize)]
pub struct GatewayUser {
    #[serde(rename = "USER_ID", default, deserialize_with = "lenient_u64")]
    pub user_id: u64,
}

/// `song.getData` results
#[derive(Debug, Deserialize)]
pub struct SongData {
    #[serde(rename = "SNG_ID", default, deserialize_with = "lenient_u64")]
    pub sng_id: u64,
    #[serde(rename = "MD5_ORIGIN", default)]
    pub md5_origin: String,
    #[serde(rename = "MEDIA_VERSION", default, deserialize_with = "lenient_string")]
    pub media_version: String,
    /// `{"composer": [..], "author": [..]}`, or `[]` when there are none
    #[serde(rename = "SNG_CONTRIBUTORS", default)]
    pub contributors: Value,
}

impl SongData {
    fn contributor_names(&self, role: &str) -> Vec<String> {
        self.contributors
            .get(role)
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<SongData> for TrackEnrichment {
    fn from(song: SongData) -> Self {
        TrackEnrichment {
            composers: song.contributor_names("composer"),
            authors: song.contributor_names("author"),
            content_hash: song.md5_origin,
            media_version: song.media_version,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse::<u64>().ok(),
        Value::Null => Some(0),
        _ => None,
    };
    parsed.ok_or_else(|| serde::de::Error::custom(format!("expected an id, got {}", value)))
}

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


//! Quality tiers and fallback order
//!
//! | Label   | Code | Container | Extension |
//! |---------|------|-----------|-----------|
//! | FLAC    | 9    | lossless  | .flac     |
//! | MP3_320 | 3    | lossy     | .mp3      |
//! | MP3_256 | 5    | lossy     | .mp3      |
//! | MP3_128 | 1    | lossy     | .mp3      |
//!
//! When a tier serves no content the orchestrator steps down one tier at a
//! time (FLAC -> MP3_320 -> MP3_256 -> MP3_128). MP3_128 is the floor.

use crate::error::{DeezerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output fidelity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "FLAC")]
    Flac,
    #[serde(rename = "MP3_320")]
    Mp3_320,
    #[serde(rename = "MP3_256")]
    Mp3_256,
    #[serde(rename = "MP3_128")]
    Mp3_128,
}

/// Output container family of a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    Lossless,
    Lossy,
}

impl Container {
    /// File extension including the leading dot
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Lossless => ".flac",
            Container::Lossy => ".mp3",
        }
    }
}

impl QualityTier {
    /// All tiers, best first
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Flac,
        QualityTier::Mp3_320,
        QualityTier::Mp3_256,
        QualityTier::Mp3_128,
    ];

    /// Human-facing label
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Flac => "FLAC",
            QualityTier::Mp3_320 => "MP3_320",
            QualityTier::Mp3_256 => "MP3_256",
            QualityTier::Mp3_128 => "MP3_128",
        }
    }

    /// Internal quality code used when signing stream URLs
    pub fn code(&self) -> &'static str {
        match self {
            QualityTier::Flac => "9",
            QualityTier::Mp3_320 => "3",
            QualityTier::Mp3_256 => "5",
            QualityTier::Mp3_128 => "1",
        }
    }

    pub fn container(&self) -> Container {
        match self {
            QualityTier::Flac => Container::Lossless,
            _ => Container::Lossy,
        }
    }

    pub fn extension(&self) -> &'static str {
        self.container().extension()
    }

    /// Next tier down the fallback chain, `None` at MP3_128
    pub fn step_down(&self) -> Option<QualityTier> {
        match self {
            QualityTier::Flac => Some(QualityTier::Mp3_320),
            QualityTier::Mp3_320 => Some(QualityTier::Mp3_256),
            QualityTier::Mp3_256 => Some(QualityTier::Mp3_128),
            QualityTier::Mp3_128 => None,
        }
    }

    /// This tier followed by every tier below it
    pub fn fallback_chain(&self) -> impl Iterator<Item = QualityTier> {
        std::iter::successors(Some(*self), |tier| tier.step_down())
    }
}

impl Default for QualityTier {
    fn default() -> Self {
        QualityTier::Flac
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for QualityTier {
    type Err = DeezerError;

    fn from_str(label: &str) -> Result<Self> {
        QualityTier::ALL
            .into_iter()
            .find(|tier| tier.label() == label)
            .ok_or_else(|| DeezerError::UnsupportedQuality(label.to_string()))
    }
}

/// Map a bitrate label to its internal quality code
///
/// # Errors
/// - `UnsupportedQuality` for anything but FLAC, MP3_320, MP3_256, MP3_128
pub fn resolve(label: &str) -> Result<&'static str> {
    label.parse::<QualityTier>().map(|tier| tier.code())
}

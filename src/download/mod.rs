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


//! Download pipeline: quality negotiation, streaming decryption and orchestration

pub mod manager;
pub mod progress;
pub mod quality;
pub mod stream;

pub use manager::{
    CollectionDownload, CollectionMode, DownloadConfig, DownloadResult, Downloader, LinkDownload,
    LinkTarget,
};
pub use progress::{
    format_bytes, DownloadState, MemberObserver, ProgressObserver, ProgressTracker,
};
pub use quality::{resolve, Container, QualityTier};

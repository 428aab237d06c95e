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


//! Output layout and filename sanitisation
//!
//! Every track lands at
//! `<root>/<album artist>/<album title>/<number> - <title><ext>`.
//! Each component is sanitised on its own so catalog strings can never
//! introduce extra directory levels or characters the filesystem rejects.

use std::path::{Path, PathBuf};

/// Longest single path component, in bytes
const MAX_COMPONENT_LENGTH: usize = 255;

/// Used when a component sanitises to nothing
const EMPTY_COMPONENT: &str = "Unknown";

/// Make one catalog string safe to use as a single path component
///
/// Separators and characters reserved on common filesystems are replaced
/// by look-alikes, control characters by `_`. Surrounding whitespace and
/// dots are trimmed, so `.` and `..` cannot survive.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name.chars().map(replace_char).collect();
    let trimmed = replaced.trim().trim_matches('.').trim();

    let mut result = handle_windows_reserved_names(trimmed);
    if result.is_empty() {
        result = EMPTY_COMPONENT.to_string();
    }

    truncate_component(&result, MAX_COMPONENT_LENGTH)
}

fn replace_char(c: char) -> char {
    match c {
        '/' => '∕',  // U+2215 division slash
        '\\' => '＼', // U+FF3C fullwidth reverse solidus
        '<' => '＜',
        '>' => '＞',
        ':' => '_',
        '"' => '＂',
        '|' => '⏐',
        '?' => '？',
        '*' => '✱',
        c if c.is_control() => '_',
        c => c,
    }
}

fn handle_windows_reserved_names(name: &str) -> String {
    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    let upper = name.to_uppercase();
    let stem = upper.split('.').next().unwrap_or_default();
    if RESERVED.contains(&stem) {
        format!("_{}", name)
    } else {
        name.to_string()
    }
}

/// Truncate to at most `max_bytes` on a UTF-8 boundary
pub fn truncate_component(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut index = max_bytes;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    text[..index].trim_end().to_string()
}

/// Directory holding every track of one album
pub fn album_dir(root: &Path, album_artist: &str, album_title: &str) -> PathBuf {
    root.join(sanitize_component(album_artist))
        .join(sanitize_component(album_title))
}

/// Full output path of a track
///
/// `extension` includes the leading dot and is never truncated.
pub fn track_path(
    root: &Path,
    album_artist: &str,
    album_title: &str,
    number: u32,
    title: &str,
    extension: &str,
) -> PathBuf {
    let stem = sanitize_component(&format!("{} - {}", number, title));
    let stem = truncate_component(&stem, MAX_COMPONENT_LENGTH - extension.len());
    album_dir(root, album_artist, album_title).join(format!("{}{}", stem, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let path = track_path(Path::new("Songs"), "Daft Punk", "Discovery", 1, "One More Time", ".flac");
        assert_eq!(path, PathBuf::from("Songs/Daft Punk/Discovery/1 - One More Time.flac"));
    }

    #[test]
    fn test_separators_cannot_add_levels() {
        let path = track_path(Path::new("out"), "AC/DC", "..", 3, "What/Ever", ".mp3");
        assert_eq!(path.components().count(), 4);
        assert_eq!(path, PathBuf::from("out/AC∕DC/Unknown/3 - What∕Ever.mp3"));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Who? Me*"), "Who？ Me✱");
        assert_eq!(sanitize_component("a:b"), "a_b");
        assert_eq!(sanitize_component("  .hidden.  "), "hidden");
        assert_eq!(sanitize_component(""), "Unknown");
        assert_eq!(sanitize_component("tab\there"), "tab_here");
        assert_eq!(sanitize_component("con"), "_con");
        assert_eq!(sanitize_component("Nul.mp3"), "_Nul.mp3");
    }

    #[test]
    fn test_long_titles_keep_extension() {
        let title = "é".repeat(300);
        let path = track_path(Path::new("out"), "x", "y", 1, &title, ".flac");
        let file_name = path.file_name().unwrap().to_str().unwrap();

        assert!(file_name.len() <= MAX_COMPONENT_LENGTH);
        assert!(file_name.ends_with(".flac"));
    }
}

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


//! Download lifecycle and progress reporting
//!
//! # Lifecycle
//! ```text
//! Pending -> MetadataEnriched -> UrlResolved -> Streaming -> Tagging -> Complete
//!                                     ^             |
//!                                     +- Retrying <-+   (zero-length stream, one per tier)
//! ```
//! Any state may move to `Failed`. `StateMachine` enforces the edges and
//! keeps the visited states for the `DownloadResult`.
//!
//! # Progress
//! The orchestrator calls an optional `ProgressObserver` with
//! `(bytes_so_far, total_bytes)` after every chunk write. Collections take a
//! `MemberObserver` that also receives the member's track id.
//! `ProgressTracker` turns those calls into a throttled status line.

use crate::error::{DeezerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest fallback sequence: one retry per step down from FLAC
pub const MAX_RETRIES: usize = 3;

/// State of a single-track download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadState {
    /// Descriptor resolved, nothing fetched yet
    Pending,
    /// Content hash and media version known
    MetadataEnriched,
    /// Signed stream URL built for the current tier
    UrlResolved,
    /// Reading, decrypting and writing the stream
    Streaming,
    /// Current tier had no content; stepping down
    Retrying,
    /// Handing the finished file to the tagger
    Tagging,
    Complete,
    Failed,
}

impl DownloadState {
    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: DownloadState) -> bool {
        use DownloadState::*;
        matches!(
            (self, next),
            (Pending, MetadataEnriched)
                | (MetadataEnriched, UrlResolved)
                | (UrlResolved, Streaming)
                | (Streaming, Retrying)
                | (Retrying, UrlResolved)
                | (Streaming, Tagging)
                | (Tagging, Complete)
        ) || (next == Failed && !self.is_final())
    }

    pub fn is_final(&self) -> bool {
        matches!(self, DownloadState::Complete | DownloadState::Failed)
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownloadState::Pending => "pending",
            DownloadState::MetadataEnriched => "metadata enriched",
            DownloadState::UrlResolved => "url resolved",
            DownloadState::Streaming => "streaming",
            DownloadState::Retrying => "retrying",
            DownloadState::Tagging => "tagging",
            DownloadState::Complete => "complete",
            DownloadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Transition-checked lifecycle of one download
#[derive(Debug, Clone)]
pub struct StateMachine {
    track_id: u64,
    history: Vec<DownloadState>,
}

impl StateMachine {
    pub fn new(track_id: u64) -> Self {
        Self {
            track_id,
            history: vec![DownloadState::Pending],
        }
    }

    pub fn state(&self) -> DownloadState {
        self.history
            .last()
            .copied()
            .unwrap_or(DownloadState::Pending)
    }

    /// Move to `next`, rejecting edges the lifecycle does not have
    pub fn advance(&mut self, next: DownloadState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(DeezerError::InvalidState(format!(
                "track {}: cannot go from {} to {}",
                self.track_id, current, next
            )));
        }

        if next == DownloadState::Retrying && self.retries() >= MAX_RETRIES {
            return Err(DeezerError::InvalidState(format!(
                "track {}: more than {} retries",
                self.track_id, MAX_RETRIES
            )));
        }

        tracing::debug!(track_id = self.track_id, from = %current, to = %next, "Download state");
        self.history.push(next);
        Ok(())
    }

    /// Mark as failed unless already final
    pub fn fail(&mut self) {
        if !self.state().is_final() {
            self.history.push(DownloadState::Failed);
        }
    }

    pub fn retries(&self) -> usize {
        self.history
            .iter()
            .filter(|s| **s == DownloadState::Retrying)
            .count()
    }

    pub fn history(&self) -> &[DownloadState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<DownloadState> {
        self.history
    }
}

/// Called with `(bytes_so_far, total_bytes)` after each chunk write
pub type ProgressObserver = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Collection form of `ProgressObserver`, called with
/// `(track_id, bytes_so_far, total_bytes)` for every member
pub type MemberObserver = Arc<dyn Fn(u64, u64, u64) + Send + Sync>;

/// Rate-limited status line for one download
#[derive(Debug)]
pub struct ProgressTracker {
    label: String,
    started: Instant,
    last_shown: Option<Instant>,
    interval: Duration,
    done: u64,
    total: u64,
}

impl ProgressTracker {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            started: Instant::now(),
            last_shown: None,
            interval: Duration::from_millis(200),
            done: 0,
            total: 0,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Record an observer call; true when a line is due
    ///
    /// The first call and the call that reaches `total` are always due.
    pub fn update(&mut self, done: u64, total: u64) -> bool {
        self.done = done;
        self.total = total;

        let now = Instant::now();
        let due = self
            .last_shown
            .map_or(true, |shown| now.duration_since(shown) >= self.interval);
        if due || (total > 0 && done >= total) {
            self.last_shown = Some(now);
            true
        } else {
            false
        }
    }

    /// `None` while the total is unknown
    pub fn percent(&self) -> Option<f64> {
        (self.total > 0).then(|| self.done as f64 * 100.0 / self.total as f64)
    }

    /// Bytes per second since the tracker was created
    pub fn speed(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.done as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn eta(&self) -> Option<Duration> {
        let speed = self.speed();
        if speed <= 0.0 || self.total == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.done);
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    pub fn line(&self) -> String {
        let mut line = match self.percent() {
            Some(percent) => format!(
                "{}: {:.1}% ({} / {})",
                self.label,
                percent,
                format_bytes(self.done),
                format_bytes(self.total)
            ),
            None => format!("{}: {}", self.label, format_bytes(self.done)),
        };
        line.push_str(&format!(" {}/s", format_bytes(self.speed() as u64)));
        if let Some(eta) = self.eta() {
            line.push_str(&format!(" eta {}s", eta.as_secs()));
        }
        line
    }
}

/// e.g. "45.2 MB"
pub fn format_bytes(bytes: u64) -> String {
    format!("{:.1} MB", bytes as f64 / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut machine = StateMachine::new(1);
        for state in [
            DownloadState::MetadataEnriched,
            DownloadState::UrlResolved,
            DownloadState::Streaming,
            DownloadState::Tagging,
            DownloadState::Complete,
        ] {
            machine.advance(state).unwrap();
        }
        assert_eq!(machine.state(), DownloadState::Complete);
        assert_eq!(machine.history().len(), 6);
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let mut machine = StateMachine::new(1);
        let err = machine.advance(DownloadState::Streaming).unwrap_err();
        assert!(matches!(err, DeezerError::InvalidState(_)));
        assert_eq!(machine.state(), DownloadState::Pending);
    }

    #[test]
    fn test_retries_are_bounded() {
        let mut machine = StateMachine::new(1);
        machine.advance(DownloadState::MetadataEnriched).unwrap();
        machine.advance(DownloadState::UrlResolved).unwrap();

        for _ in 0..MAX_RETRIES {
            machine.advance(DownloadState::Streaming).unwrap();
            machine.advance(DownloadState::Retrying).unwrap();
            machine.advance(DownloadState::UrlResolved).unwrap();
        }
        machine.advance(DownloadState::Streaming).unwrap();

        assert!(machine.advance(DownloadState::Retrying).is_err());
        assert_eq!(machine.retries(), MAX_RETRIES);
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut machine = StateMachine::new(1);
        machine.fail();
        machine.fail();
        assert_eq!(machine.history(), &[DownloadState::Pending, DownloadState::Failed]);
        assert!(!DownloadState::Failed.can_transition_to(DownloadState::Failed));
    }

    #[test]
    fn test_tracker_throttles_until_finished() {
        let mut tracker = ProgressTracker::new("t").with_interval(Duration::from_secs(3600));

        assert!(tracker.update(1024, 4096));
        assert!(!tracker.update(2048, 4096));
        assert!(tracker.update(4096, 4096));
        assert_eq!(tracker.percent(), Some(100.0));
    }

    #[test]
    fn test_line_without_total() {
        let mut tracker = ProgressTracker::new("One More Time");
        tracker.update(2_500_000, 0);

        assert_eq!(tracker.percent(), None);
        assert_eq!(tracker.eta(), None);
        assert!(tracker.line().starts_with("One More Time: 2.5 MB "));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.0 MB");
        assert_eq!(format_bytes(45_200_000), "45.2 MB");
    }
}

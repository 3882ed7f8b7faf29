//! Ordered track queue with a movable cursor
//!
//! Pure data structure, no I/O. The owning session serializes all access, so
//! no internal locking is needed. Navigation never fails: movement that is
//! impossible (empty queue, end reached, out-of-range jump) returns `None`
//! and leaves the cursor where it was.

use serde::{Deserialize, Serialize};

/// A queued reference to a playable media item plus display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Provider reference (watch URL)
    pub link: String,
    /// Display title
    pub title: String,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    /// Display name of the requesting user
    #[serde(default)]
    pub requested_by: Option<String>,
}

impl Track {
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: title.into(),
            duration_ms: None,
            requested_by: None,
        }
    }
}

/// Ordered playlist with a cursor marking the current track
///
/// The cursor is `None` until playback first advances; it is always a valid
/// index afterwards.
#[derive(Debug, Default)]
pub struct TrackQueue {
    tracks: Vec<Track>,
    cursor: Option<usize>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track. Never moves the cursor.
    pub fn add(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Append several tracks in order. Never moves the cursor.
    pub fn add_all(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(tracks);
    }

    /// Advance the cursor by one and return the track now under it, or
    /// `None` when already at (or past) the end.
    pub fn next(&mut self) -> Option<&Track> {
        let next = match self.cursor {
            None => 0,
            Some(index) => index + 1,
        };
        if next >= self.tracks.len() {
            return None;
        }
        self.cursor = Some(next);
        self.tracks.get(next)
    }

    /// Retreat the cursor by one and return the track now under it, or
    /// `None` when at the start or not yet started.
    pub fn previous(&mut self) -> Option<&Track> {
        let index = self.cursor?;
        if index == 0 {
            return None;
        }
        self.cursor = Some(index - 1);
        self.tracks.get(index - 1)
    }

    /// Set the cursor to `position` if it is in bounds and return the track
    /// there; otherwise return `None` with the cursor unchanged.
    pub fn jump(&mut self, position: usize) -> Option<&Track> {
        if position >= self.tracks.len() {
            return None;
        }
        self.cursor = Some(position);
        self.tracks.get(position)
    }

    /// Track under the cursor, if any
    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.cursor?)
    }

    /// Current cursor position, if playback has started
    pub fn position(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

//! Fire-and-forget user-facing acknowledgements
//!
//! The core only reports that something happened; rendering and delivering a
//! chat message is the command layer's concern.

use crate::playback::queue::Track;
use crate::playback::transform::FilterKind;
use std::time::Duration;

/// Session-level acknowledgements
#[derive(Debug, Clone)]
pub enum Notice {
    NowPlaying(Track),
    QueueFinished,
    FilterChanged(Option<FilterKind>),
    SeekApplied(Duration),
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Drops every notice. For sessions with no chat channel attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notice: Notice) {}
}

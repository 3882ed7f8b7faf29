//! Voice connection and audio sink collaborator interfaces
//!
//! The session consumes the voice gateway and the downstream player through
//! these traits; implementations live with the bot shell, not here.

use crate::error::Result;
use crate::playback::queue::Track;
use crate::provider::AudioStream;
use crate::types::{ChannelId, GuildId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Voice connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

/// Establishes voice connections for guild channels
pub trait ConnectionManager: Send + Sync {
    fn join(&self, guild: GuildId, channel: ChannelId) -> Result<Arc<dyn VoiceConnection>>;
}

/// A live voice connection
pub trait VoiceConnection: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// Watch state transitions; the session uses this to await readiness
    /// under a bounded timeout.
    fn watch_state(&self) -> watch::Receiver<ConnectionState>;

    /// The channel this connection is (or was last) joined to
    fn channel_id(&self) -> ChannelId;

    /// Re-establish a dropped connection, possibly to a different channel
    fn rejoin(&self, channel: ChannelId) -> Result<()>;

    /// Route the sink's audio through this connection
    fn subscribe(&self, sink: Arc<dyn AudioSink>);

    fn destroy(&self);
}

/// Sink player states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    Idle,
    Playing,
}

/// Sink lifecycle notifications
///
/// `Finished` means the resource played to completion and the session should
/// advance the queue. `Stopped` is an explicit stop (or replacement) and must
/// not trigger advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Started,
    Finished,
    Stopped,
}

/// A resolved stream paired with the track it plays
pub struct PlaybackResource {
    pub track: Track,
    pub stream: AudioStream,
}

impl PlaybackResource {
    pub fn new(track: Track, stream: AudioStream) -> Self {
        Self { track, stream }
    }
}

impl fmt::Debug for PlaybackResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackResource")
            .field("track", &self.track)
            .finish_non_exhaustive()
    }
}

/// Downstream audio player, long-lived and reused across tracks
pub trait AudioSink: Send + Sync {
    /// Begin playing a resource, replacing whatever was playing before
    fn play(&self, resource: PlaybackResource);

    fn stop(&self);

    fn state(&self) -> SinkState;

    fn subscribe(&self) -> broadcast::Receiver<SinkEvent>;
}

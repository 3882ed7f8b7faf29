//! Session event types
//!
//! Broadcast by each session for observability; sends with no receivers are
//! silently dropped.

use crate::playback::queue::Track;
use crate::playback::transform::FilterKind;
use crate::types::{ChannelId, GuildId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Playback session events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A track's stream was handed to the sink
    TrackStarted {
        guild_id: GuildId,
        track: Track,
        timestamp: DateTime<Utc>,
    },

    /// Advancement found no further track; the player stopped
    QueueExhausted {
        guild_id: GuildId,
        timestamp: DateTime<Utc>,
    },

    /// Filter selection changed (applies to the next resolution)
    FilterChanged {
        guild_id: GuildId,
        filter: Option<FilterKind>,
        timestamp: DateTime<Utc>,
    },

    /// The current track was re-resolved at an offset
    SeekApplied {
        guild_id: GuildId,
        offset_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A voice connection reached the ready state
    ConnectionReady {
        guild_id: GuildId,
        channel_id: ChannelId,
        timestamp: DateTime<Utc>,
    },

    /// The session was torn down and removed from the registry
    SessionDestroyed {
        guild_id: GuildId,
        timestamp: DateTime<Utc>,
    },
}

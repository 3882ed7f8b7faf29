//! # Minstrel
//!
//! Playback pipeline for a chat-bot music player.
//!
//! **Purpose:** Resolve requested tracks to decodable audio streams, re-encode
//! them through an external transcoder for filters and seeking, and feed the
//! result to a downstream audio sink while a per-channel session tracks queue
//! order and connection state.
//!
//! **Architecture:** One `PlaybackSession` per guild, created through an
//! injected `SessionRegistry`. The session owns a cursor queue and a
//! `StreamTransformer`; the voice connection, audio sink, media provider,
//! transcoder, and chat notifier are collaborators consumed through traits.

pub mod config;
pub mod error;
pub mod events;
pub mod notify;
pub mod playback;
pub mod provider;
pub mod registry;
pub mod types;
pub mod voice;

pub use error::{Error, Result};
pub use registry::{SessionContext, SessionRegistry};

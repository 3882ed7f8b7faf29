//! Playback core: track queue, stream transformation, session orchestration

pub mod queue;
pub mod session;
pub mod transform;

pub use queue::{Track, TrackQueue};
pub use session::{ActiveTrack, PlaybackSession};
pub use transform::{FfmpegTranscoder, FilterKind, StreamTransformer, Transcoder};

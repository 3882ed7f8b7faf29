//! Per-guild playback session
//!
//! The only component that decides what plays now. Owns the track queue, the
//! stream transformer, the voice connection handle, and the sink handle;
//! exposes queue navigation, seeking, and filter selection to the command
//! layer.
//!
//! All mutable state sits behind one async mutex, so operations serialize
//! naturally. Overlapping invocations (rapid skip-skip-seek) resolve
//! last-writer-wins: whichever resolution completes last hands its stream to
//! the sink, and the transformer severs the stale pipe before wiring a new
//! one. Errors are reported to the caller as typed values but never corrupt
//! queue, filter, or connection state; the session stays usable for the next
//! command.

use crate::error::{Error, Result};
use crate::events::PlayerEvent;
use crate::notify::{Notice, Notifier};
use crate::playback::queue::{Track, TrackQueue};
use crate::playback::transform::{FilterKind, StreamTransformer};
use crate::registry::{SessionContext, SessionRegistry};
use crate::types::{ChannelId, GuildId};
use crate::voice::{
    AudioSink, ConnectionManager, ConnectionState, PlaybackResource, SinkEvent, SinkState,
    VoiceConnection,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle of the resource most recently handed to the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveTrack {
    /// Nothing has been played since the session was created
    NotStarted,
    /// This track's stream is with the sink
    Playing(Track),
    /// Playback stopped: queue exhausted, explicit stop, or destroy
    Stopped,
}

struct Inner {
    connection: Option<Arc<dyn VoiceConnection>>,
    queue: TrackQueue,
    filter: Option<FilterKind>,
    transformer: StreamTransformer,
    active: ActiveTrack,
    destroyed: bool,
}

/// Per-guild playback orchestrator
pub struct PlaybackSession {
    id: Uuid,
    guild_id: GuildId,
    sink: Arc<dyn AudioSink>,
    manager: Arc<dyn ConnectionManager>,
    notifier: Arc<dyn Notifier>,
    registry: SessionRegistry,
    join_timeout: Duration,
    events: broadcast::Sender<PlayerEvent>,
    inner: Mutex<Inner>,
}

impl PlaybackSession {
    pub(crate) fn spawn(
        guild_id: GuildId,
        sink: Arc<dyn AudioSink>,
        context: &SessionContext,
        registry: SessionRegistry,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(context.config.session.event_buffer);
        let transformer = StreamTransformer::new(
            Arc::clone(&context.provider),
            Arc::clone(&context.transcoder),
            &context.config,
        );

        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            guild_id,
            sink,
            manager: Arc::clone(&context.manager),
            notifier: Arc::clone(&context.notifier),
            registry,
            join_timeout: context.config.session.join_timeout(),
            events,
            inner: Mutex::new(Inner {
                connection: None,
                queue: TrackQueue::new(),
                filter: None,
                transformer,
                active: ActiveTrack::NotStarted,
                destroyed: false,
            }),
        });

        session.spawn_advance_loop();
        info!(session = %session.id, guild = %guild_id, "playback session created");
        session
    }

    /// Advance the queue whenever the sink finishes a resource naturally.
    /// Holds only a weak handle so a destroyed session can be dropped.
    fn spawn_advance_loop(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let mut events = self.sink.subscribe();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SinkEvent::Finished) => {
                        let Some(session) = weak.upgrade() else { break };
                        match session.play_next(None).await {
                            Ok(_) => {}
                            Err(Error::SessionDestroyed) => break,
                            // A failed advance must not kill the loop; the
                            // next command or track can still succeed.
                            Err(error) => {
                                warn!(guild = %session.guild_id, %error, "auto-advance failed");
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "sink event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Connect to a voice channel, or repair an existing connection.
    ///
    /// No-op when already ready on that exact channel. A disconnected
    /// connection is rejoined and the sink re-subscribed. Otherwise a fresh
    /// connection is established and awaited up to the configured timeout; on
    /// timeout the connection is left in whatever state it reached and the
    /// caller may retry later.
    pub async fn join_channel(&self, channel: ChannelId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_live(&inner)?;

        if let Some(connection) = &inner.connection {
            match connection.state() {
                ConnectionState::Ready if connection.channel_id() == channel => {
                    debug!(guild = %self.guild_id, %channel, "already connected");
                    return Ok(());
                }
                ConnectionState::Disconnected => {
                    connection.rejoin(channel)?;
                    connection.subscribe(Arc::clone(&self.sink));
                    info!(guild = %self.guild_id, %channel, "rejoined voice channel");
                    return Ok(());
                }
                _ => {}
            }
        }

        let connection = self.manager.join(self.guild_id, channel)?;
        connection.subscribe(Arc::clone(&self.sink));
        inner.connection = Some(Arc::clone(&connection));

        self.wait_ready(&connection).await?;
        info!(guild = %self.guild_id, %channel, "voice connection ready");
        self.emit(PlayerEvent::ConnectionReady {
            guild_id: self.guild_id,
            channel_id: channel,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn wait_ready(&self, connection: &Arc<dyn VoiceConnection>) -> Result<()> {
        let mut state = connection.watch_state();
        let ready = async {
            loop {
                let current = *state.borrow_and_update();
                if current == ConnectionState::Ready {
                    return Ok(());
                }
                if state.changed().await.is_err() {
                    return Err(Error::Connection(
                        "connection closed before becoming ready".to_string(),
                    ));
                }
            }
        };

        match tokio::time::timeout(self.join_timeout, ready).await {
            Ok(result) => result,
            Err(_) => {
                warn!(guild = %self.guild_id, "voice connection not ready in time");
                Err(Error::JoinTimeout)
            }
        }
    }

    /// Enqueue tracks without touching playback
    pub async fn add_tracks(&self, tracks: Vec<Track>) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        self.ensure_live(&inner)?;
        inner.queue.add_all(tracks);
        Ok(inner.queue.len())
    }

    /// Enqueue tracks and, if the player is idle, start the next one.
    ///
    /// When something is already playing the addition only affects future
    /// advancement. Returns the track that started, if any.
    pub async fn add_and_play(&self, tracks: Vec<Track>) -> Result<Option<Track>> {
        {
            let mut inner = self.inner.lock().await;
            self.ensure_live(&inner)?;
            inner.queue.add_all(tracks);
        }

        if self.sink.state() == SinkState::Idle {
            self.play_next(None).await
        } else {
            Ok(None)
        }
    }

    /// Advance the queue (or jump to `position`) and play the resulting
    /// track, replacing whatever is playing.
    ///
    /// An exhausted queue or out-of-range jump stops the player and returns
    /// `Ok(None)`; that is a normal terminal condition, not a failure.
    pub async fn play_next(&self, position: Option<usize>) -> Result<Option<Track>> {
        let mut inner = self.inner.lock().await;
        self.ensure_live(&inner)?;

        let track = match position {
            Some(position) => inner.queue.jump(position).cloned(),
            None => inner.queue.next().cloned(),
        };

        let Some(track) = track else {
            self.sink.stop();
            inner.active = ActiveTrack::Stopped;
            debug!(guild = %self.guild_id, "queue exhausted, player stopped");
            self.emit(PlayerEvent::QueueExhausted {
                guild_id: self.guild_id,
                timestamp: Utc::now(),
            });
            self.notifier.notify(Notice::QueueFinished);
            return Ok(None);
        };

        self.start(&mut inner, track).await.map(Some)
    }

    /// Retreat the queue and play the resulting track. No-op when there is
    /// no previous track.
    pub async fn play_previous(&self) -> Result<Option<Track>> {
        let mut inner = self.inner.lock().await;
        self.ensure_live(&inner)?;

        let Some(track) = inner.queue.previous().cloned() else {
            return Ok(None);
        };
        self.start(&mut inner, track).await.map(Some)
    }

    /// Re-resolve the current track at an offset and replace the playing
    /// resource. The queue cursor does not move. No-op (`Ok(None)`) when
    /// nothing is current.
    pub async fn seek(&self, offset_ms: u64) -> Result<Option<Duration>> {
        let mut inner = self.inner.lock().await;
        self.ensure_live(&inner)?;

        let Some(track) = inner.queue.current().cloned() else {
            debug!(guild = %self.guild_id, "seek requested with no current track");
            return Ok(None);
        };

        let offset = Duration::from_millis(offset_ms);
        let stream = inner.transformer.seek_to(&track.link, offset).await?;

        self.sink.play(PlaybackResource::new(track.clone(), stream));
        inner.active = ActiveTrack::Playing(track);
        info!(guild = %self.guild_id, offset_ms, "seek applied");
        self.emit(PlayerEvent::SeekApplied {
            guild_id: self.guild_id,
            offset_ms,
            timestamp: Utc::now(),
        });
        self.notifier.notify(Notice::SeekApplied(offset));
        Ok(Some(offset))
    }

    /// Change the filter selection. Takes effect on the next stream
    /// resolution; the playing resource is untouched.
    pub async fn set_filter(&self, filter: Option<FilterKind>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        self.ensure_live(&inner)?;

        inner.filter = filter;
        info!(guild = %self.guild_id, filter = ?filter.map(FilterKind::name), "filter changed");
        self.emit(PlayerEvent::FilterChanged {
            guild_id: self.guild_id,
            filter,
            timestamp: Utc::now(),
        });
        self.notifier.notify(Notice::FilterChanged(filter));
        Ok(())
    }

    /// Tear the session down: stop the sink, sever the active pipe, destroy
    /// the connection, and remove the session from the registry. Repeated
    /// calls after the first are no-ops.
    pub async fn destroy(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;

            self.sink.stop();
            inner.transformer.detach();
            if let Some(connection) = inner.connection.take() {
                connection.destroy();
            }
            inner.active = ActiveTrack::Stopped;
        }

        self.registry.remove(self.guild_id).await;
        info!(session = %self.id, guild = %self.guild_id, "playback session destroyed");
        self.emit(PlayerEvent::SessionDestroyed {
            guild_id: self.guild_id,
            timestamp: Utc::now(),
        });
    }

    /// Resolve a stream for `track` honoring the active filter and hand it
    /// to the sink. The queue cursor has already moved; a resolution failure
    /// leaves everything else untouched.
    async fn start(&self, inner: &mut Inner, track: Track) -> Result<Track> {
        let resolved = match inner.filter {
            None => inner.transformer.fetch_raw(&track.link).await,
            Some(filter) => inner.transformer.apply_filter(&track.link, filter).await,
        };

        let stream = match resolved {
            Ok(stream) => stream,
            Err(error) => {
                warn!(guild = %self.guild_id, track = %track.title, %error, "stream resolution failed");
                return Err(error);
            }
        };

        self.sink.play(PlaybackResource::new(track.clone(), stream));
        inner.active = ActiveTrack::Playing(track.clone());
        info!(guild = %self.guild_id, track = %track.title, "track started");
        self.emit(PlayerEvent::TrackStarted {
            guild_id: self.guild_id,
            track: track.clone(),
            timestamp: Utc::now(),
        });
        self.notifier.notify(Notice::NowPlaying(track.clone()));
        Ok(track)
    }

    fn ensure_live(&self, inner: &Inner) -> Result<()> {
        if inner.destroyed {
            Err(Error::SessionDestroyed)
        } else {
            Ok(())
        }
    }

    fn emit(&self, event: PlayerEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// Track under the queue cursor, if any
    pub async fn current_track(&self) -> Option<Track> {
        self.inner.lock().await.queue.current().cloned()
    }

    pub async fn filter(&self) -> Option<FilterKind> {
        self.inner.lock().await.filter
    }

    pub async fn active_track(&self) -> ActiveTrack {
        self.inner.lock().await.active.clone()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    pub async fn queued_tracks(&self) -> Vec<Track> {
        self.inner.lock().await.queue.tracks().to_vec()
    }

    pub async fn connection_state(&self) -> Option<ConnectionState> {
        self.inner
            .lock()
            .await
            .connection
            .as_ref()
            .map(|connection| connection.state())
    }
}

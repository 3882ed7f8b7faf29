//! Shared test doubles for the playback pipeline
//!
//! Mock implementations of every collaborator trait plus a harness that
//! wires them into a registry and session context.

#![allow(dead_code)]

use async_trait::async_trait;
use minstrel::config::Config;
use minstrel::error::Result;
use minstrel::notify::{Notice, Notifier};
use minstrel::playback::queue::Track;
use minstrel::playback::session::PlaybackSession;
use minstrel::playback::transform::{TranscodeChild, Transcoder};
use minstrel::provider::{AudioStream, MediaProvider, StreamFormat};
use minstrel::registry::{SessionContext, SessionRegistry};
use minstrel::types::{ChannelId, GuildId};
use minstrel::voice::{
    AudioSink, ConnectionManager, ConnectionState, PlaybackResource, SinkEvent, SinkState,
    VoiceConnection,
};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// A supported reference; the mock provider serves it regardless
pub const GOOD_LINK: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

pub fn track(title: &str) -> Track {
    Track::new(GOOD_LINK, title)
}

pub fn unsupported_track(title: &str) -> Track {
    Track::new("https://example.com/nope", title)
}

/// Config with a short join timeout so failing waits don't stall the suite
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.session.join_timeout_ms = 200;
    config
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minstrel=debug".into()),
        )
        .try_init();
}

/// Poll `predicate` until it holds or a second passes
pub async fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}

/// Media provider serving a fixed format list and pre-loaded streams
pub struct MockProvider {
    formats: StdMutex<Vec<StreamFormat>>,
    streams: StdMutex<Vec<AudioStream>>,
    pub opens: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            formats: StdMutex::new(vec![StreamFormat {
                itag: 140,
                container: "mp4".to_string(),
                url: "https://cdn.example/140".to_string(),
            }]),
            streams: StdMutex::new(Vec::new()),
            opens: AtomicUsize::new(0),
        })
    }

    pub fn set_formats(&self, formats: Vec<StreamFormat>) {
        *self.formats.lock().unwrap() = formats;
    }

    /// Queue a stream to be returned by the next `open` call (FIFO).
    /// When none is queued, `open` returns an immediately-EOF stream.
    pub fn push_stream(&self, stream: AudioStream) {
        self.streams.lock().unwrap().push(stream);
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaProvider for MockProvider {
    async fn formats(&self, _reference: &str) -> Result<Vec<StreamFormat>> {
        Ok(self.formats.lock().unwrap().clone())
    }

    async fn open(&self, _format: &StreamFormat) -> Result<AudioStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut streams = self.streams.lock().unwrap();
        if streams.is_empty() {
            Ok(Box::new(tokio::io::empty()))
        } else {
            Ok(streams.remove(0))
        }
    }
}

/// Transcoder stdin that only counts the writes reaching it
struct CountingSink {
    writes: Arc<AtomicUsize>,
}

impl tokio::io::AsyncWrite for CountingSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

pub struct SpawnRecord {
    pub args: Vec<String>,
    pub stdin_writes: Arc<AtomicUsize>,
}

/// Transcoder that records every spawn instead of launching a process
pub struct MockTranscoder {
    spawns: StdMutex<Vec<SpawnRecord>>,
}

impl MockTranscoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            spawns: StdMutex::new(Vec::new()),
        })
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.lock().unwrap().len()
    }

    pub fn args_of(&self, index: usize) -> Vec<String> {
        self.spawns.lock().unwrap()[index].args.clone()
    }

    pub fn last_args(&self) -> Option<Vec<String>> {
        self.spawns.lock().unwrap().last().map(|s| s.args.clone())
    }

    /// Counter of writes that reached spawn `index`'s stdin
    pub fn stdin_writes(&self, index: usize) -> Arc<AtomicUsize> {
        Arc::clone(&self.spawns.lock().unwrap()[index].stdin_writes)
    }
}

impl Transcoder for MockTranscoder {
    fn spawn(&self, args: &[String]) -> Result<TranscodeChild> {
        let writes = Arc::new(AtomicUsize::new(0));
        self.spawns.lock().unwrap().push(SpawnRecord {
            args: args.to_vec(),
            stdin_writes: Arc::clone(&writes),
        });
        Ok(TranscodeChild {
            stdin: Box::new(CountingSink { writes }),
            stdout: Box::new(tokio::io::empty()),
        })
    }
}

/// Sink that records played tracks and lets tests drive completion
pub struct MockSink {
    state: StdMutex<SinkState>,
    played: StdMutex<Vec<Track>>,
    stops: AtomicUsize,
    events: broadcast::Sender<SinkEvent>,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            state: StdMutex::new(SinkState::Idle),
            played: StdMutex::new(Vec::new()),
            stops: AtomicUsize::new(0),
            events,
        })
    }

    pub fn played_titles(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    pub fn play_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Simulate the playing resource running to its natural end
    pub fn finish_current(&self) {
        *self.state.lock().unwrap() = SinkState::Idle;
        let _ = self.events.send(SinkEvent::Finished);
    }
}

impl AudioSink for MockSink {
    fn play(&self, resource: PlaybackResource) {
        *self.state.lock().unwrap() = SinkState::Playing;
        self.played.lock().unwrap().push(resource.track);
        let _ = self.events.send(SinkEvent::Started);
    }

    fn stop(&self) {
        *self.state.lock().unwrap() = SinkState::Idle;
        self.stops.fetch_add(1, Ordering::SeqCst);
        let _ = self.events.send(SinkEvent::Stopped);
    }

    fn state(&self) -> SinkState {
        *self.state.lock().unwrap()
    }

    fn subscribe(&self) -> broadcast::Receiver<SinkEvent> {
        self.events.subscribe()
    }
}

/// Voice connection whose state tests can drive directly
pub struct MockConnection {
    channel: StdMutex<ChannelId>,
    state_tx: watch::Sender<ConnectionState>,
    pub rejoins: AtomicUsize,
    pub subscriptions: AtomicUsize,
    pub destroys: AtomicUsize,
}

impl MockConnection {
    pub fn new(channel: ChannelId, state: ConnectionState) -> Arc<Self> {
        let (state_tx, _) = watch::channel(state);
        Arc::new(Self {
            channel: StdMutex::new(channel),
            state_tx,
            rejoins: AtomicUsize::new(0),
            subscriptions: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
        })
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

impl VoiceConnection for MockConnection {
    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn channel_id(&self) -> ChannelId {
        *self.channel.lock().unwrap()
    }

    fn rejoin(&self, channel: ChannelId) -> Result<()> {
        *self.channel.lock().unwrap() = channel;
        self.rejoins.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Ready);
        Ok(())
    }

    fn subscribe(&self, _sink: Arc<dyn AudioSink>) {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Destroyed);
    }
}

/// Manager handing out mock connections (ready immediately unless preset)
pub struct MockConnectionManager {
    preset: StdMutex<Option<Arc<MockConnection>>>,
    last: StdMutex<Option<Arc<MockConnection>>>,
    pub joins: AtomicUsize,
}

impl MockConnectionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            preset: StdMutex::new(None),
            last: StdMutex::new(None),
            joins: AtomicUsize::new(0),
        })
    }

    /// Hand this connection out on the next `join` instead of a fresh one
    pub fn preset(&self, connection: Arc<MockConnection>) {
        *self.preset.lock().unwrap() = Some(connection);
    }

    pub fn last_connection(&self) -> Option<Arc<MockConnection>> {
        self.last.lock().unwrap().clone()
    }

    pub fn join_count(&self) -> usize {
        self.joins.load(Ordering::SeqCst)
    }
}

impl ConnectionManager for MockConnectionManager {
    fn join(&self, _guild: GuildId, channel: ChannelId) -> Result<Arc<dyn VoiceConnection>> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        let connection = self
            .preset
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| MockConnection::new(channel, ConnectionState::Ready));
        *self.last.lock().unwrap() = Some(Arc::clone(&connection));
        let connection: Arc<dyn VoiceConnection> = connection;
        Ok(connection)
    }
}

/// Notifier that records every notice
pub struct MockNotifier {
    notices: StdMutex<Vec<Notice>>,
}

impl MockNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            notices: StdMutex::new(Vec::new()),
        })
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Full collaborator set wired into a registry
pub struct Harness {
    pub registry: SessionRegistry,
    pub context: SessionContext,
    pub provider: Arc<MockProvider>,
    pub transcoder: Arc<MockTranscoder>,
    pub manager: Arc<MockConnectionManager>,
    pub notifier: Arc<MockNotifier>,
    pub sink: Arc<MockSink>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();

        let provider = MockProvider::new();
        let transcoder = MockTranscoder::new();
        let manager = MockConnectionManager::new();
        let notifier = MockNotifier::new();
        let sink = MockSink::new();

        let manager_dyn: Arc<dyn ConnectionManager> = manager.clone();
        let provider_dyn: Arc<dyn MediaProvider> = provider.clone();
        let transcoder_dyn: Arc<dyn Transcoder> = transcoder.clone();
        let notifier_dyn: Arc<dyn Notifier> = notifier.clone();
        let context = SessionContext {
            manager: manager_dyn,
            provider: provider_dyn,
            transcoder: transcoder_dyn,
            notifier: notifier_dyn,
            config,
        };

        Self {
            registry: SessionRegistry::new(),
            context,
            provider,
            transcoder,
            manager,
            notifier,
            sink,
        }
    }

    pub async fn session(&self) -> Arc<PlaybackSession> {
        let sink: Arc<dyn AudioSink> = self.sink.clone();
        self.registry
            .get_or_create(GuildId(1), sink, &self.context)
            .await
    }
}

//! Process-wide session registry
//!
//! An explicit, injected registry object rather than module-global state:
//! the top-level process owns one `SessionRegistry` and passes it into
//! session construction; sessions remove themselves on destroy.

use crate::config::Config;
use crate::notify::Notifier;
use crate::playback::session::PlaybackSession;
use crate::playback::transform::Transcoder;
use crate::provider::MediaProvider;
use crate::types::GuildId;
use crate::voice::{AudioSink, ConnectionManager};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Collaborators shared by every session the registry creates
pub struct SessionContext {
    pub manager: Arc<dyn ConnectionManager>,
    pub provider: Arc<dyn MediaProvider>,
    pub transcoder: Arc<dyn Transcoder>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Config,
}

/// Thread-safe session map keyed by guild id
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<GuildId, Arc<PlaybackSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, guild: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.read().await.get(&guild).cloned()
    }

    /// Fetch the guild's session, creating it on first use.
    ///
    /// `sink` is only consulted when a session has to be built; an existing
    /// session keeps the sink it was created with.
    pub async fn get_or_create(
        &self,
        guild: GuildId,
        sink: Arc<dyn AudioSink>,
        context: &SessionContext,
    ) -> Arc<PlaybackSession> {
        if let Some(session) = self.get(guild).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        // Checked again under the write lock; two commands can race to create
        if let Some(session) = sessions.get(&guild) {
            return Arc::clone(session);
        }

        let session = PlaybackSession::spawn(guild, sink, context, self.clone());
        sessions.insert(guild, Arc::clone(&session));
        debug!(%guild, "session registered");
        session
    }

    /// Drop the guild's session from the registry, returning it if present
    pub async fn remove(&self, guild: GuildId) -> Option<Arc<PlaybackSession>> {
        let removed = self.sessions.write().await.remove(&guild);
        if removed.is_some() {
            debug!(%guild, "session unregistered");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

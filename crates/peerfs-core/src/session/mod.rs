//! Swarm sessions.
//!
//! A session is one file being seeded (publisher) or collected and reseeded
//! (spreader). Each session runs as a single task that owns all of its
//! state: the peer table, the block layout and the staging file. The caller
//! drives it through a [`SessionHandle`].
//!
//! # Lifecycle
//!
//! ```text
//! Created ─► Initializing ─► Ready ─► Running ⇄ Paused
//!                 │                      │
//!                 ▼                      ▼
//!               Failed               Finished (spreader)
//! ```
//!
//! The two roles share the engine and differ only in the hooks of
//! [`SwarmRole`].

mod engine;
pub mod publisher;
pub mod spreader;
#[cfg(test)]
mod test_support;

pub use publisher::Publisher;
pub use spreader::Spreader;

use crate::config::SessionConfig;
use crate::event::SessionEvent;
use crate::peer::{PeerId, PeerTable};
use crate::transport::Transport;
use crate::wire::WireMessage;
use crate::{Result, SessionError};
use async_trait::async_trait;
use peerfs_crypto::Tag;
use peerfs_files::{BlockLayout, StagingFile};
use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::warn;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Handle exists, task not yet running
    #[default]
    Created,
    /// Staging file being prepared
    Initializing,
    /// Addressable by tag; pacing loop not started
    Ready,
    /// Pacing loop active
    Running,
    /// Pacing loop stopped; inbound messages still handled
    Paused,
    /// File restored (spreader only); seeding continues while started
    Finished,
    /// Initialization or restoration failed
    Failed,
}

impl SessionState {
    /// Whether the state can no longer change through start or pause
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Initializing => "initializing",
            SessionState::Ready => "ready",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Finished => "finished",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    /// Lifecycle state
    pub state: SessionState,
    /// Content tag, once known
    pub tag: Option<Tag>,
    /// Known number of blocks (0 until a spreader learns it)
    pub block_count: u64,
    /// Blocks held locally
    pub written: u64,
    /// Error that put the session into `Failed`
    pub error: Option<SessionError>,
}

/// Role hooks plugged into the shared session engine
#[async_trait]
pub trait SwarmRole: Send + Sync + 'static {
    /// Short role name for logs
    fn name(&self) -> &'static str;

    /// Prepare the staging file and report the session tag and layout.
    ///
    /// Runs once, before any message is handled.
    async fn preload(&mut self, staging: &Path) -> Result<(Tag, BlockLayout)>;

    /// Handle a frame whose tag matches this session.
    async fn on_peer_message(&mut self, ctx: &mut SessionContext, from: &PeerId, message: WireMessage);

    /// Whether a new pacing round should start
    fn should_spread(&self, ctx: &SessionContext) -> bool;

    /// Indices a new pacing round walks, in order
    fn block_indices(&self, ctx: &SessionContext) -> Vec<u64>;

    /// Value of `isDone` on outgoing block frames
    fn is_done(&self, ctx: &SessionContext) -> bool;
}

/// State shared by the engine and the role hooks
pub struct SessionContext {
    tag: Tag,
    staging: StagingFile,
    layout: BlockLayout,
    peers: PeerTable,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<SessionStatus>,
}

impl SessionContext {
    /// Session tag
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Path of the staging file
    #[must_use]
    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }

    /// Current block layout
    #[must_use]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Mutable block layout
    pub fn layout_mut(&mut self) -> &mut BlockLayout {
        &mut self.layout
    }

    /// Peer table
    #[must_use]
    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Mutable peer table
    pub fn peers_mut(&mut self) -> &mut PeerTable {
        &mut self.peers
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Move to `state`
    pub fn set_state(&self, state: SessionState) {
        self.status.send_modify(|s| s.state = state);
    }

    /// Edit the published status
    pub fn update_status(&self, f: impl FnOnce(&mut SessionStatus)) {
        self.status.send_modify(f);
    }

    /// Publish an event. Having no subscriber is fine.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    /// Unicast a frame; failures are logged and reported as `false`
    pub async fn send_to(&self, peer: &PeerId, message: &WireMessage) -> bool {
        match self.transport.send_to(peer, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %peer, block = message.block_n, error = %e, "Send failed");
                false
            }
        }
    }

    /// Broadcast a frame; failures are logged
    pub async fn broadcast(&self, message: &WireMessage) {
        if let Err(e) = self.transport.broadcast(message).await {
            warn!(error = %e, "Broadcast failed");
        }
    }
}

pub(crate) enum Command {
    Start,
    Pause(oneshot::Sender<Result<()>>),
    Shutdown,
}

/// Handle on a running session.
///
/// Dropping the handle ends the session and removes its staging file.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Spawn a session running `role` over `transport`.
    ///
    /// Allocates the staging file and subscribes to the transport before
    /// returning, so no transport event after this call is missed. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration or when the staging
    /// file cannot be created.
    pub fn spawn<R: SwarmRole>(
        role: R,
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;

        let staging = StagingFile::new()
            .map_err(|e| SessionError::Storage(Cow::Owned(format!("staging file: {e}"))))?;
        let subscription = transport.subscribe();
        let (commands, command_rx) = mpsc::channel(32);
        let (events, _) = broadcast::channel(config.event_capacity);
        let (status_tx, status) = watch::channel(SessionStatus::default());

        let setup = engine::Setup {
            staging,
            transport,
            subscription,
            commands: command_rx,
            events: events.clone(),
            status: status_tx,
            config,
        };
        let task = tokio::spawn(engine::run(role, setup));

        Ok(Self {
            commands,
            status,
            events,
            task,
        })
    }

    /// Wait until initialization is over and return the tag.
    ///
    /// # Errors
    ///
    /// Returns the initialization error if the session failed.
    pub async fn ready(&self) -> Result<Tag> {
        let mut status = self.status.clone();
        let snapshot = status
            .wait_for(|s| !matches!(s.state, SessionState::Created | SessionState::Initializing))
            .await
            .map_err(|_| SessionError::channel("session ended before ready"))?
            .clone();

        match snapshot.tag {
            Some(tag) => Ok(tag),
            None => Err(snapshot
                .error
                .unwrap_or(SessionError::invalid_state("session failed"))),
        }
    }

    /// Start (or resume) the pacing loop.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Channel`] if the session has ended.
    pub async fn start(&self) -> Result<()> {
        self.commands
            .send(Command::Start)
            .await
            .map_err(|_| SessionError::channel("session ended"))
    }

    /// Stop the pacing loop and wait until the stop takes effect.
    ///
    /// A round in flight is finished first.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidState`] if a `start` superseded this
    /// pause, or [`SessionError::Channel`] if the session has ended.
    pub async fn pause(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.commands
            .send(Command::Pause(ack))
            .await
            .map_err(|_| SessionError::channel("session ended"))?;
        done.await
            .map_err(|_| SessionError::channel("session ended before pause"))?
    }

    /// Wait until the file is restored.
    ///
    /// Publishers never finish, so this only resolves for spreaders.
    ///
    /// # Errors
    ///
    /// Returns the failure if the session failed instead.
    pub async fn finished(&self) -> Result<()> {
        let mut status = self.status.clone();
        let snapshot = status
            .wait_for(|s| s.state.is_terminal())
            .await
            .map_err(|_| SessionError::channel("session ended before finishing"))?
            .clone();

        match snapshot.state {
            SessionState::Finished => Ok(()),
            _ => Err(snapshot
                .error
                .unwrap_or(SessionError::invalid_state("session failed"))),
        }
    }

    /// Current status snapshot
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// Watch status changes
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Subscribe to events from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// End the session and wait for its task to exit.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TaskJoin`] if the task panicked.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(Command::Shutdown).await;
        self.task
            .await
            .map_err(|e| SessionError::TaskJoin(Cow::Owned(e.to_string())))
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

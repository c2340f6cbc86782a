//! Session task.
//!
//! One task per session multiplexes transport events, handle commands and
//! pacing ticks with a biased select, in that priority order. Inbound
//! frames are always handled, whether or not the pacing loop is active.
//!
//! A pacing round is a fresh [`BlockSequence`] over the role's indices. One
//! index is processed per tick; readiness is only checked when a new round
//! would start.

use super::{Command, SessionContext, SessionState, SwarmRole};
use crate::config::SessionConfig;
use crate::event::SessionEvent;
use crate::peer::PeerTable;
use crate::transport::{Subscription, Transport, TransportEvent};
use crate::wire::WireMessage;
use crate::{Result, SessionError, SessionStatus};
use peerfs_files::{BlockSequence, StagingFile, block_sequence};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, trace, warn};

pub(crate) struct Setup {
    pub staging: StagingFile,
    pub transport: Arc<dyn Transport>,
    pub subscription: Subscription,
    pub commands: mpsc::Receiver<Command>,
    pub events: broadcast::Sender<SessionEvent>,
    pub status: watch::Sender<SessionStatus>,
    pub config: SessionConfig,
}

pub(crate) async fn run<R: SwarmRole>(mut role: R, setup: Setup) {
    let Setup {
        staging,
        transport,
        subscription,
        commands,
        events,
        status,
        config,
    } = setup;

    status.send_modify(|s| s.state = SessionState::Initializing);
    debug!(role = role.name(), "Initializing session");

    let (tag, layout) = match role.preload(staging.path()).await {
        Ok(init) => init,
        Err(e) => {
            error!(role = role.name(), error = %e, "Session initialization failed");
            status.send_modify(|s| {
                s.state = SessionState::Failed;
                s.error = Some(e.clone());
            });
            let _ = events.send(SessionEvent::Error { error: e });
            return;
        }
    };

    let mut peers = PeerTable::new();
    for peer in subscription.active {
        peers.register(peer);
    }

    let ctx = SessionContext {
        tag,
        staging,
        layout,
        peers,
        transport,
        events,
        status,
    };

    let held = role.block_indices(&ctx).len() as u64;
    ctx.update_status(|s| {
        s.state = SessionState::Ready;
        s.tag = Some(tag);
        s.block_count = layout.block_count;
        s.written = held;
    });
    ctx.emit(SessionEvent::Ready { tag });
    info!(
        role = role.name(),
        tag = %tag,
        blocks = layout.block_count,
        peers = ctx.peers().len(),
        "Session ready"
    );

    let mut ticker = interval_at(Instant::now() + config.pace_interval, config.pace_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let engine = Engine {
        role,
        ctx,
        commands,
        transport_events: subscription.events,
        transport_open: true,
        ticker,
        active: false,
        stop_requested: false,
        pause_waiters: Vec::new(),
        round: None,
    };
    engine.event_loop().await;
}

struct Engine<R> {
    role: R,
    ctx: SessionContext,
    commands: mpsc::Receiver<Command>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    transport_open: bool,
    ticker: Interval,
    active: bool,
    stop_requested: bool,
    pause_waiters: Vec<oneshot::Sender<Result<()>>>,
    round: Option<BlockSequence>,
}

impl<R: SwarmRole> Engine<R> {
    async fn event_loop(mut self) {
        loop {
            tokio::select! {
                biased;

                event = self.transport_events.recv(), if self.transport_open => match event {
                    Some(event) => self.on_transport_event(event).await,
                    None => {
                        warn!(tag = %self.ctx.tag(), "Transport event stream closed");
                        self.transport_open = false;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Start) => self.on_start(),
                    Some(Command::Pause(ack)) => self.on_pause(ack),
                    Some(Command::Shutdown) | None => break,
                },
                _ = self.ticker.tick(), if self.active => self.on_tick().await,
            }
        }

        for waiter in self.pause_waiters.drain(..) {
            let _ = waiter.send(Err(SessionError::channel("session ended")));
        }
        info!(tag = %self.ctx.tag(), role = self.role.name(), "Session ended");
    }

    async fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(peer) => {
                debug!(peer = %peer, "Peer connected");
                self.ctx.peers_mut().register(peer);
            }
            TransportEvent::Disconnected(peer) => {
                debug!(peer = %peer, "Peer disconnected");
                self.ctx.peers_mut().remove(&peer);
            }
            TransportEvent::Message { from, message } => {
                if message.tag != *self.ctx.tag() {
                    trace!(from = %from, tag = %message.tag, "Ignoring frame for another tag");
                    return;
                }
                self.role.on_peer_message(&mut self.ctx, &from, message).await;
            }
        }
    }

    fn on_start(&mut self) {
        if self.stop_requested {
            self.stop_requested = false;
            for waiter in self.pause_waiters.drain(..) {
                let _ = waiter.send(Err(SessionError::invalid_state(
                    "pause superseded by start",
                )));
            }
        }
        if !self.active {
            self.active = true;
            self.ticker.reset();
        }
        if !self.ctx.state().is_terminal() {
            self.ctx.set_state(SessionState::Running);
        }
        self.ctx.emit(SessionEvent::Started);
        info!(tag = %self.ctx.tag(), role = self.role.name(), "Pacing started");
    }

    fn on_pause(&mut self, ack: oneshot::Sender<Result<()>>) {
        if !self.active {
            let _ = ack.send(Ok(()));
            return;
        }
        self.stop_requested = true;
        self.pause_waiters.push(ack);
        if self.round.is_none() {
            self.enter_paused();
        }
    }

    fn enter_paused(&mut self) {
        self.active = false;
        self.stop_requested = false;
        self.round = None;
        if !self.ctx.state().is_terminal() {
            self.ctx.set_state(SessionState::Paused);
        }
        self.ctx.emit(SessionEvent::Paused);
        for waiter in self.pause_waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
        info!(tag = %self.ctx.tag(), role = self.role.name(), "Pacing paused");
    }

    async fn on_tick(&mut self) {
        if self.round.is_none() {
            if self.stop_requested {
                self.enter_paused();
                return;
            }
            if !self.role.should_spread(&self.ctx) {
                return;
            }
            let indices = self.role.block_indices(&self.ctx);
            trace!(blocks = indices.len(), "Starting pacing round");
            self.round = Some(block_sequence(
                self.ctx.staging_path(),
                *self.ctx.layout(),
                indices,
            ));
        }

        let next = match self.round.as_mut() {
            Some(round) => round.next().await,
            None => None,
        };
        match next {
            Some(Ok((index, bytes))) => self.publish_block(index, bytes).await,
            Some(Err(e)) => {
                warn!(error = %e, "Failed to read block for pacing round");
                self.ctx.emit(SessionEvent::Error { error: e.into() });
            }
            None => {}
        }

        if self.round.as_ref().is_none_or(BlockSequence::is_exhausted) {
            self.round = None;
            if self.stop_requested {
                self.enter_paused();
            }
        }
    }

    async fn publish_block(&mut self, index: u64, bytes: Vec<u8>) {
        self.ctx.emit(SessionEvent::Processing { block: index });

        let recipients = self.ctx.peers().recipients(index);
        if recipients.is_empty() {
            return;
        }

        let message = WireMessage::block(
            *self.ctx.tag(),
            index,
            bytes,
            self.ctx.layout().block_count,
            self.role.is_done(&self.ctx),
        );
        for peer in recipients {
            if self.ctx.send_to(&peer, &message).await {
                debug!(block = index, peer = %peer, "Published block");
                self.ctx.emit(SessionEvent::Publishing { block: index, peer });
            }
        }
    }
}

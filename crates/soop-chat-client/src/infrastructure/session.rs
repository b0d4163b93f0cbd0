//! Session lifecycle controller.
//!
//! A chat session is one Tokio task that exclusively owns the transport, the
//! keepalive and prune timers, the [`Dispatcher`] and the [`EventStore`].
//! The host talks to it through a cloneable [`SessionHandle`], which only
//! queues commands on a channel; the task processes commands, inbound frames
//! and timer ticks one at a time, so no state is ever shared or locked.
//!
//! # Task layout (for beginners)
//!
//! ```text
//!  SessionHandle ──Command──► mpsc ──┐
//!                                    ▼
//!  WebSocket frames ────────► [session task] ──► ChatHandler callbacks
//!  keepalive / prune ticks ──────────┘      └──► watch<ConnectionState>
//! ```
//!
//! `tokio::select!` waits on all inputs at once and handles whichever is ready
//! first.  Every branch runs to completion before the next input is looked
//! at, which gives the "one frame at a time" ordering the protocol relies on.
//!
//! # Teardown
//!
//! Whatever ends the session (transport error, server close, broadcast
//! closed, or [`SessionHandle::close`]) goes through one teardown step that
//! drops both timers together and calls [`ChatHandler::on_flush`] exactly
//! once.

use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use futures_util::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use soop_chat_core::events::ChatEvent;
use soop_chat_core::protocol::codec::{encode_chat, KEEPALIVE_FRAME};
use soop_chat_core::retention::{EventStore, VisibilityRules};

use crate::application::dispatcher::{ConnectionState, Directive, Dispatcher};
use crate::domain::config::{ChatConfig, ConfigError};
use crate::domain::endpoint::EndpointInfo;
use crate::infrastructure::transport;

// ── Public API ────────────────────────────────────────────────────────────────

/// Errors reported synchronously to callers of a [`SessionHandle`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The transport is not open (still connecting, or already closed).
    #[error("chat transport is not connected")]
    NotConnected,

    /// The session task has finished; no further commands are accepted.
    #[error("chat session has ended")]
    Ended,
}

/// Callbacks supplied by the host.
///
/// All callbacks run on the session task, one at a time.  They must not
/// block; to close the session from inside a callback, call
/// [`SessionHandle::close`] on a handle the handler owns.  The close is
/// queued and performed after the current frame has been handled.
#[cfg_attr(test, mockall::automock)]
pub trait ChatHandler: Send + 'static {
    /// The room join completed and timers are running.  Called at most once.
    fn on_connect(&mut self);

    /// The session ended.  Called exactly once per session.
    fn on_flush(&mut self);

    /// An event was accepted.  `retained` tells whether it entered the history.
    fn on_event(&mut self, event: &ChatEvent, retained: bool) {
        let _ = (event, retained);
    }
}

/// Requests queued from a [`SessionHandle`] to the session task.
#[derive(Debug)]
enum Command {
    Send(String),
    Close,
    SetRules(VisibilityRules),
    SetThreshold(usize),
    Snapshot(oneshot::Sender<Vec<ChatEvent>>),
}

/// Cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    transport_open: Arc<AtomicBool>,
    state: watch::Receiver<ConnectionState>,
}

impl SessionHandle {
    /// Unique id of the session, as it appears in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Sends a chat message.
    ///
    /// `Ok(())` means the message was queued, not delivered.  If the server
    /// drops the connection before the task picks the message up, the task
    /// discards it during teardown and logs it at `warn`; the host learns of
    /// the disconnect through [`ChatHandler::on_flush`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] if the transport is not open.
    pub fn send(&self, message: &str) -> Result<(), SessionError> {
        if !self.transport_open.load(Ordering::Acquire) {
            return Err(SessionError::NotConnected);
        }
        self.commands
            .send(Command::Send(message.to_string()))
            .map_err(|_| SessionError::NotConnected)
    }

    /// Closes the session.  Safe to call any number of times, in any state.
    pub fn close(&self) {
        // A send error means the task already finished, which is the goal.
        let _ = self.commands.send(Command::Close);
    }

    /// Replaces the visibility rules used for events accepted from now on.
    pub fn set_rules(&self, rules: VisibilityRules) -> Result<(), SessionError> {
        self.command(Command::SetRules(rules))
    }

    /// Changes the history cap; the history is trimmed immediately.
    pub fn set_threshold(&self, threshold: usize) -> Result<(), SessionError> {
        self.command(Command::SetThreshold(threshold))
    }

    /// Copies the retained history, oldest first.
    pub async fn snapshot(&self) -> Result<Vec<ChatEvent>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Snapshot(tx))?;
        rx.await.map_err(|_| SessionError::Ended)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver notified on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Resolves once the session has reached [`ConnectionState::Closed`].
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // An error means the task dropped its sender, i.e. it has finished.
        let _ = state.wait_for(|s| *s == ConnectionState::Closed).await;
    }

    fn command(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Ended)
    }
}

/// A spawned session: its handle plus the task running it.
#[derive(Debug)]
pub struct ChatSession {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl ChatSession {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Waits for the session task to finish.
    pub async fn wait(self) {
        let ChatSession { handle, task } = self;
        if let Err(e) = task.await {
            warn!("chat session {} task failed: {e}", handle.id());
        }
    }
}

/// Result of [`connect`].
#[derive(Debug)]
pub enum ConnectOutcome {
    /// The session task was spawned and is connecting.
    Started(ChatSession),
    /// Chat is unavailable for this broadcast (endpoint fields missing or
    /// invalid).  This is not a protocol failure.
    Unavailable(ConfigError),
}

/// Validates `info` and spawns a session connected to its chat room.
///
/// Must be called from within a Tokio runtime.  An invalid endpoint record
/// is reported as [`ConnectOutcome::Unavailable`]; transport failures are
/// reported later through [`ChatHandler::on_flush`].
pub fn connect<H: ChatHandler>(
    info: &EndpointInfo,
    cookie: Option<String>,
    config: ChatConfig,
    handler: H,
) -> ConnectOutcome {
    let endpoint = match info.resolve() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            info!("chat unavailable: {e}");
            return ConnectOutcome::Unavailable(e);
        }
    };

    let url = endpoint.url();
    info!("connecting to {url} (room {})", endpoint.room_id);
    ConnectOutcome::Started(spawn_with_transport(
        endpoint.room_id,
        cookie,
        config,
        handler,
        async move { transport::open(&url).await },
    ))
}

/// Spawns a session over a transport produced by `open`.
///
/// [`connect`] uses this with a real WebSocket connection; any other
/// `WebSocketStream` (for example over an in-memory duplex pipe) works too.
pub fn spawn_with_transport<H, S, F>(
    room_id: String,
    cookie: Option<String>,
    config: ChatConfig,
    handler: H,
    open: F,
) -> ChatSession
where
    H: ChatHandler,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: Future<Output = anyhow::Result<WebSocketStream<S>>> + Send + 'static,
{
    let id = Uuid::new_v4();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let transport_open = Arc::new(AtomicBool::new(false));

    let span = info_span!("chat_session", session = %id, room = %room_id);
    let task = SessionTask {
        dispatcher: Dispatcher::new(room_id, cookie),
        store: EventStore::new(config.retention_threshold, config.rules),
        keepalive_period: config.keepalive_interval(),
        prune_period: config.prune_interval(),
        keepalive: None,
        prune: None,
        handler,
        transport_open: Arc::clone(&transport_open),
        state: state_tx,
    };

    let task = tokio::spawn(task.run(open, command_rx).instrument(span));

    ChatSession {
        handle: SessionHandle {
            id,
            commands: command_tx,
            transport_open,
            state: state_rx,
        },
        task,
    }
}

// ── Session task ──────────────────────────────────────────────────────────────

/// Whether the session loop keeps running after an input was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct SessionTask<H> {
    dispatcher: Dispatcher,
    store: EventStore,
    keepalive_period: Duration,
    prune_period: Duration,
    keepalive: Option<Interval>,
    prune: Option<Interval>,
    handler: H,
    transport_open: Arc<AtomicBool>,
    state: watch::Sender<ConnectionState>,
}

impl<H: ChatHandler> SessionTask<H> {
    async fn run<S, F>(mut self, open: F, mut commands: mpsc::UnboundedReceiver<Command>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: Future<Output = anyhow::Result<WebSocketStream<S>>>,
    {
        // ── Connecting: wait for the transport, honouring an early close ──────
        tokio::pin!(open);
        let stream = loop {
            tokio::select! {
                result = &mut open => match result {
                    Ok(stream) => break stream,
                    Err(e) => {
                        warn!("chat transport failed to open: {e:#}");
                        self.terminate();
                        return;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Close) | None => {
                        info!("session closed before the transport opened");
                        self.terminate();
                        return;
                    }
                    Some(command) => self.control(command),
                },
            }
        };

        // ── Open: run the handshake and the main loop ─────────────────────────
        let (mut sink, mut source) = stream.split();
        self.transport_open.store(true, Ordering::Release);

        let mut flow = Flow::Continue;
        for directive in self.dispatcher.on_open() {
            flow = self.apply(directive, &mut sink).await;
            if flow == Flow::Stop {
                break;
            }
        }

        while flow == Flow::Continue {
            flow = tokio::select! {
                incoming = source.next() => match incoming {
                    Some(Ok(message)) => self.on_message(message, &mut sink).await,
                    Some(Err(e)) => {
                        warn!("chat transport error: {e}");
                        Flow::Stop
                    }
                    None => {
                        info!("chat transport closed by server");
                        Flow::Stop
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        self.send(&mut sink, encode_chat(&text)).await
                    }
                    Some(Command::Close) | None => {
                        info!("closing chat session");
                        // Ignore: the transport may already be gone.
                        let _ = sink.close().await;
                        Flow::Stop
                    }
                    Some(command) => {
                        self.control(command);
                        Flow::Continue
                    }
                },
                _ = tick(&mut self.keepalive) => {
                    debug!("keepalive");
                    self.send(&mut sink, KEEPALIVE_FRAME.to_string()).await
                }
                _ = tick(&mut self.prune) => {
                    let dropped = self.store.prune();
                    if dropped > 0 {
                        debug!("pruned {dropped} events from history");
                    }
                    Flow::Continue
                }
            };
        }

        self.terminate();
        let dropped = self.drain(&mut commands);
        if dropped > 0 {
            warn!("discarded {dropped} chat messages queued while the session closed");
        }
    }

    /// Handles commands queued before teardown and returns how many chat
    /// sends were discarded.  Runs after `terminate`, so new sends are
    /// already refused with [`SessionError::NotConnected`].
    fn drain(&mut self, commands: &mut mpsc::UnboundedReceiver<Command>) -> usize {
        let mut dropped = 0;
        while let Ok(command) = commands.try_recv() {
            match command {
                Command::Send(text) => {
                    debug!("discarding chat send after close: {text:?}");
                    dropped += 1;
                }
                command => self.control(command),
            }
        }
        dropped
    }

    async fn on_message<K>(&mut self, message: WsMessage, sink: &mut K) -> Flow
    where
        K: Sink<WsMessage, Error = WsError> + Unpin,
    {
        let text = match message {
            WsMessage::Text(text) => text,
            WsMessage::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            WsMessage::Close(frame) => {
                info!("server sent close: {frame:?}");
                return Flow::Stop;
            }
            // Pings are answered by tungstenite itself.
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {
                return Flow::Continue;
            }
        };

        for directive in self.dispatcher.on_frame(&text) {
            if self.apply(directive, sink).await == Flow::Stop {
                return Flow::Stop;
            }
        }
        self.publish_state();
        Flow::Continue
    }

    async fn apply<K>(&mut self, directive: Directive, sink: &mut K) -> Flow
    where
        K: Sink<WsMessage, Error = WsError> + Unpin,
    {
        match directive {
            Directive::Send(packet) => return self.send(sink, packet).await,
            Directive::StartTimers => {
                self.start_timers();
                self.dispatcher.mark_active();
                self.publish_state();
            }
            Directive::NotifyConnected => self.handler.on_connect(),
            Directive::CloseTransport => {
                let _ = sink.close().await;
                return Flow::Stop;
            }
            Directive::Emit(payload) => {
                let submission = self.store.submit(payload);
                self.handler
                    .on_event(&submission.event, submission.retained);
            }
        }
        Flow::Continue
    }

    async fn send<K>(&mut self, sink: &mut K, frame: String) -> Flow
    where
        K: Sink<WsMessage, Error = WsError> + Unpin,
    {
        match sink.send(WsMessage::Text(frame)).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                warn!("chat transport send failed: {e}");
                Flow::Stop
            }
        }
    }

    /// Applies a control command that does not touch the transport.
    fn control(&mut self, command: Command) {
        match command {
            Command::SetRules(rules) => {
                debug!("visibility rules replaced: {rules:?}");
                self.store.set_rules(rules);
            }
            Command::SetThreshold(threshold) => {
                let dropped = self.store.set_threshold(threshold);
                debug!("retention threshold set to {threshold} ({dropped} dropped)");
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.store.buffer().snapshot());
            }
            Command::Send(_) => debug!("dropping chat send: transport not open"),
            Command::Close => {}
        }
    }

    fn start_timers(&mut self) {
        let now = Instant::now();

        let mut keepalive = interval_at(now + self.keepalive_period, self.keepalive_period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut prune = interval_at(now + self.prune_period, self.prune_period);
        prune.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.keepalive = Some(keepalive);
        self.prune = Some(prune);
        debug!(
            "timers started (keepalive {:?}, prune {:?})",
            self.keepalive_period, self.prune_period
        );
    }

    /// Single teardown path: cancels both timers, releases the transport
    /// flag and notifies the host once.
    fn terminate(&mut self) {
        if !self.dispatcher.on_terminated() {
            return;
        }
        self.keepalive = None;
        self.prune = None;
        self.transport_open.store(false, Ordering::Release);
        self.publish_state();
        info!("chat session closed");
        self.handler.on_flush();
    }

    #[cfg(test)]
    fn timers_running(&self) -> (bool, bool) {
        (self.keepalive.is_some(), self.prune.is_some())
    }

    fn publish_state(&self) {
        let state = self.dispatcher.state();
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

/// Waits for the next tick of `timer`, or forever when it is not running.
async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

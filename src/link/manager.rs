//! # Connection Manager
//!
//! Owns the control channel and everything bound to it, and keeps a
//! connection attempt in flight whenever the link is down.
//!
//! ## State Machine
//!
//! ```text
//!                connect()              open ok
//! Disconnected ───────────► Connecting ─────────► Connected
//!      ▲                        │                     │
//!      │      open failed       │    close / error    │
//!      └────────────────────────┴─────────────────────┘
//! ```
//!
//! A watchdog ticks once per reconnect interval for the life of the manager.
//! Whenever it finds the state `Disconnected` it calls `connect()`. There is
//! no backoff and no attempt limit. Open failures, runtime errors, a clean
//! close and a silent peer are all handled the same way.
//!
//! ## Liveness
//!
//! While connected the link is pinged every heartbeat interval. Any inbound
//! frame (message, ping or pong) counts as a sign of life. A peer that stays
//! silent for the peer timeout is treated as a runtime error, which catches
//! half-open connections that never deliver a close.
//!
//! ## Sessions
//!
//! Entering `Connected` creates a session: a fresh [`Coalescer`] bound to the
//! link, and every configured [`InputSource`] mounted behind its own change
//! gate. Leaving `Connected` unmounts the sources and drops the coalescer
//! together with any pending vector, so nothing from one connection is ever
//! sent on the next.
//!
//! ## Event Loop
//!
//! [`ConnectionManager::run`] is the only task that touches connection
//! state. It multiplexes the watchdog, control requests, the open attempt,
//! link events and the session timers in one `select!` loop, so no locks
//! are needed. Requests from other tasks go through a [`LinkControl`].

use serde::de::Error as _;
use std::fmt;
use std::future::{pending, Future};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{
    interval_at, sleep_until, timeout, Duration, Instant, Interval, MissedTickBehavior,
};
use tracing::{debug, info, trace, warn};

use super::coalescer::Coalescer;
use super::transport::{Link, LinkEvent, LinkSender, Transport};
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::input::{InputSource, MountedSource};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Timing contract of the link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkTimings {
    /// Watchdog period
    pub reconnect_interval: Duration,
    /// Upper bound on one open attempt
    pub connect_timeout: Duration,
    /// Input sampling period
    pub sample_interval: Duration,
    /// Minimum spacing between transmissions
    pub coalesce_interval: Duration,
    /// Ping period while connected
    pub heartbeat_interval: Duration,
    /// Silence after which the peer is considered gone
    pub peer_timeout: Duration,
}

impl LinkTimings {
    /// Checks that every period is usable.
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` if a period is zero or the peer timeout
    /// does not exceed the heartbeat interval.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("reconnect_interval", self.reconnect_interval),
            ("connect_timeout", self.connect_timeout),
            ("sample_interval", self.sample_interval),
            ("coalesce_interval", self.coalesce_interval),
            ("heartbeat_interval", self.heartbeat_interval),
            ("peer_timeout", self.peer_timeout),
        ] {
            if value.is_zero() {
                return Err(LinkError::Config(toml::de::Error::custom(format!(
                    "{} must be non-zero",
                    name
                ))));
            }
        }
        if self.peer_timeout <= self.heartbeat_interval {
            return Err(LinkError::Config(toml::de::Error::custom(
                "peer_timeout must exceed heartbeat_interval",
            )));
        }
        Ok(())
    }
}

impl Default for LinkTimings {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_millis(1000),
            connect_timeout: Duration::from_millis(5000),
            sample_interval: Duration::from_millis(50),
            coalesce_interval: Duration::from_millis(100),
            heartbeat_interval: Duration::from_millis(5000),
            peer_timeout: Duration::from_millis(10000),
        }
    }
}

impl From<&Config> for LinkTimings {
    fn from(config: &Config) -> Self {
        Self {
            reconnect_interval: Duration::from_millis(config.link.reconnect_interval_ms),
            connect_timeout: Duration::from_millis(config.link.connect_timeout_ms),
            sample_interval: Duration::from_millis(config.input.sample_interval_ms),
            coalesce_interval: Duration::from_millis(config.coalescer.interval_ms),
            heartbeat_interval: Duration::from_millis(config.link.heartbeat_interval_ms),
            peer_timeout: Duration::from_millis(config.link.peer_timeout_ms),
        }
    }
}

/// Lifetime counters, logged on disconnect and at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub open_attempts: u64,
    pub sessions: u64,
    pub commands_sent: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Connect,
    Disconnect,
}

/// Handle for steering a running [`ConnectionManager`].
///
/// Cheap to clone. Requests are ignored once the manager has stopped.
#[derive(Debug, Clone)]
pub struct LinkControl {
    commands: mpsc::UnboundedSender<Command>,
}

impl LinkControl {
    /// Requests a fresh connection, closing the current one first.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Requests an explicit close. The watchdog reconnects on its next tick.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }
}

type OpenFuture = Pin<Box<dyn Future<Output = Result<Link>> + Send>>;

/// Everything that exists only while connected.
struct Session {
    link: Link,
    coalescer: Coalescer<LinkSender>,
    sources: Vec<MountedSource>,
    sampler: Interval,
    heartbeat: Interval,
    peer_deadline: Instant,
}

enum Phase {
    Disconnected,
    Connecting(OpenFuture),
    Connected(Session),
}

/// What woke the event loop, besides the watchdog and shutdown.
enum Wake {
    Opened(Result<Link>),
    Link(LinkEvent),
    CoalescerTick,
    SampleTick,
    HeartbeatTick,
    PeerTimeout,
}

fn repeating(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Supervisor for the control channel.
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    timings: LinkTimings,
    idle_sources: Vec<Box<dyn InputSource>>,
    phase: Phase,
    state_tx: watch::Sender<ConnectionState>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands: mpsc::UnboundedReceiver<Command>,
    stats: LinkStats,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    ///
    /// # Arguments
    ///
    /// * `transport` - Opens the control channel
    /// * `timings` - Reconnect, sampling, coalescing and liveness periods
    /// * `sources` - Input sources mounted on every connect
    ///
    /// # Errors
    ///
    /// Returns `LinkError::Config` if `timings` fails validation.
    pub fn new(
        transport: Arc<dyn Transport>,
        timings: LinkTimings,
        sources: Vec<Box<dyn InputSource>>,
    ) -> Result<Self> {
        timings.validate()?;
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (commands_tx, commands) = mpsc::unbounded_channel();
        Ok(Self {
            transport,
            timings,
            idle_sources: sources,
            phase: Phase::Disconnected,
            state_tx,
            commands_tx,
            commands,
            stats: LinkStats::default(),
        })
    }

    /// Returns a handle that can request connects and disconnects while
    /// [`run`](Self::run) owns the manager.
    #[must_use]
    pub fn control(&self) -> LinkControl {
        LinkControl {
            commands: self.commands_tx.clone(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Lifetime counters so far.
    #[must_use]
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Starts a new open attempt, tearing down any existing connection first.
    ///
    /// The attempt makes progress while [`run`](Self::run) is executing. Once
    /// `run` owns the manager, use [`LinkControl::connect`] instead.
    pub fn connect(&mut self) {
        self.disconnect();

        let transport = Arc::clone(&self.transport);
        let limit = self.timings.connect_timeout;
        let attempt = async move {
            let target = transport.describe();
            match timeout(limit, transport.open()).await {
                Ok(result) => result,
                Err(_) => Err(LinkError::TransportOpenFailure {
                    target,
                    reason: format!("timed out after {:?}", limit),
                }),
            }
        };

        self.stats.open_attempts += 1;
        info!("Connecting to {}...", self.transport.describe());
        self.phase = Phase::Connecting(Box::pin(attempt));
        self.set_state(ConnectionState::Connecting);
    }

    /// Closes the connection or abandons the open attempt. No-op when
    /// already disconnected. Once `run` owns the manager, use
    /// [`LinkControl::disconnect`] instead.
    pub fn disconnect(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Disconnected) {
            Phase::Disconnected => return,
            Phase::Connecting(_) => debug!("Abandoning open attempt"),
            Phase::Connected(session) => {
                info!("Disconnecting...");
                self.end_session(session);
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Runs the event loop until `shutdown` completes, then disconnects.
    ///
    /// Returns the lifetime counters.
    pub async fn run<F>(mut self, shutdown: F) -> LinkStats
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);
        let mut watchdog = repeating(self.timings.reconnect_interval);
        // The manager keeps a sender, so this channel never reports closed
        let (_, detached) = mpsc::unbounded_channel();
        let mut commands = std::mem::replace(&mut self.commands, detached);

        if self.state() == ConnectionState::Disconnected {
            self.connect();
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = watchdog.tick() => self.on_watchdog_tick(),
                Some(command) = commands.recv() => self.on_command(command),
                wake = self.next_wake() => self.handle(wake),
            }
        }

        self.disconnect();
        info!(
            "Link stopped: {} open attempts, {} sessions, {} commands sent",
            self.stats.open_attempts, self.stats.sessions, self.stats.commands_sent
        );
        self.stats
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    async fn next_wake(&mut self) -> Wake {
        match &mut self.phase {
            Phase::Disconnected => pending().await,
            Phase::Connecting(attempt) => Wake::Opened(attempt.as_mut().await),
            Phase::Connected(session) => tokio::select! {
                event = session.link.next_event() => Wake::Link(event),
                _ = session.coalescer.tick() => Wake::CoalescerTick,
                _ = session.sampler.tick() => Wake::SampleTick,
                _ = session.heartbeat.tick() => Wake::HeartbeatTick,
                _ = sleep_until(session.peer_deadline) => Wake::PeerTimeout,
            },
        }
    }

    fn handle(&mut self, wake: Wake) {
        match wake {
            Wake::Opened(Ok(link)) => self.begin_session(link),
            Wake::Opened(Err(e)) => {
                warn!("{}", e);
                self.phase = Phase::Disconnected;
                self.set_state(ConnectionState::Disconnected);
            }
            Wake::Link(LinkEvent::Message(text)) => {
                debug!("Received: {}", text);
                self.mark_alive();
            }
            Wake::Link(LinkEvent::Heartbeat) => {
                trace!("Peer heartbeat");
                self.mark_alive();
            }
            Wake::Link(LinkEvent::Closed) => self.drop_connection(LinkError::TransportClosed),
            Wake::Link(LinkEvent::Error(e)) => {
                self.drop_connection(LinkError::TransportRuntimeError(e))
            }
            Wake::CoalescerTick => {
                if let Phase::Connected(session) = &mut self.phase {
                    session.coalescer.on_tick();
                }
            }
            Wake::SampleTick => {
                if let Phase::Connected(session) = &mut self.phase {
                    for source in session.sources.iter_mut() {
                        if let Some(vector) = source.poll() {
                            session.coalescer.submit(vector);
                        }
                    }
                }
            }
            Wake::HeartbeatTick => {
                if let Phase::Connected(session) = &self.phase {
                    if let Err(e) = session.link.ping() {
                        debug!("Heartbeat not sent: {}", e);
                    }
                }
            }
            Wake::PeerTimeout => {
                let silence = self.timings.peer_timeout;
                self.drop_connection(LinkError::TransportRuntimeError(format!(
                    "no response from peer for {:?}",
                    silence
                )));
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        debug!("Control request: {:?}", command);
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect => self.disconnect(),
        }
    }

    fn mark_alive(&mut self) {
        let silence = self.timings.peer_timeout;
        if let Phase::Connected(session) = &mut self.phase {
            session.peer_deadline = Instant::now() + silence;
        }
    }

    fn on_watchdog_tick(&mut self) {
        if let Phase::Connected(session) = &mut self.phase {
            if session.coalescer.take_send_failure() {
                self.drop_connection(LinkError::TransportRuntimeError(
                    "outbound send failed".to_string(),
                ));
            }
        }

        if self.state() == ConnectionState::Disconnected {
            self.connect();
        }
    }

    fn begin_session(&mut self, link: Link) {
        let coalescer = Coalescer::new(link.sender(), self.timings.coalesce_interval);
        let sources = self
            .idle_sources
            .drain(..)
            .map(MountedSource::mount)
            .collect();

        self.stats.sessions += 1;
        self.phase = Phase::Connected(Session {
            link,
            coalescer,
            sources,
            sampler: repeating(self.timings.sample_interval),
            heartbeat: repeating(self.timings.heartbeat_interval),
            peer_deadline: Instant::now() + self.timings.peer_timeout,
        });
        info!("Connected.");
        self.set_state(ConnectionState::Connected);
    }

    fn end_session(&mut self, session: Session) {
        let Session {
            link,
            coalescer,
            sources,
            ..
        } = session;

        for source in sources {
            self.idle_sources.push(source.unmount());
        }
        if let Some(vector) = coalescer.pending() {
            debug!("Discarding pending vector {:?}", vector);
        }
        self.stats.commands_sent += coalescer.transmissions();
        info!("Session ended after {} commands", coalescer.transmissions());
        drop(coalescer);
        drop(link);
    }

    fn drop_connection(&mut self, reason: LinkError) {
        if let Phase::Connected(session) = std::mem::replace(&mut self.phase, Phase::Disconnected) {
            warn!("Connection lost: {}", reason);
            self.end_session(session);
            info!("Disconnected.");
        }
        self.set_state(ConnectionState::Disconnected);
    }
}

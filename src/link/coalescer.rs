//! # Coalescer
//!
//! Trailing-edge rate limiter between the input pipeline and the transport.
//!
//! ## Behaviour
//!
//! - The first vector of a burst is sent immediately and starts a repeating
//!   timer of one interval.
//! - While the timer runs, submitted vectors overwrite a single pending slot
//!   (last write wins, nothing is queued).
//! - On each tick the pending vector, if any, is sent and the slot cleared.
//!   A tick with nothing pending stops the timer, so a quiet link carries no
//!   traffic at all.
//!
//! Over a span `D` of submissions this sends at most `ceil(D / interval) + 1`
//! vectors, and the last one sent is the last one submitted.
//!
//! ## Usage
//!
//! The coalescer does not own a task. Its owner polls [`Coalescer::tick`]
//! inside a `select!` and calls [`Coalescer::on_tick`] when it fires:
//!
//! ```no_run
//! # use teleop_link::link::coalescer::{Coalescer, CommandSink};
//! # async fn drive<S: CommandSink>(mut coalescer: Coalescer<S>) {
//! loop {
//!     tokio::select! {
//!         _ = coalescer.tick() => coalescer.on_tick(),
//!         // ... other event sources calling coalescer.submit(v) ...
//!     }
//! }
//! # }
//! ```

use std::future::pending;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{trace, warn};

use crate::control::ControlVector;
use crate::error::Result;

/// Destination for coalesced vectors.
pub trait CommandSink {
    /// Transmits one vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector could not be handed to the connection.
    fn send(&mut self, vector: &ControlVector) -> Result<()>;
}

/// Rate limiter holding at most one pending vector.
///
/// Bound to a single connection: it is created when the session opens and
/// dropped, pending value included, when the session closes.
pub struct Coalescer<S: CommandSink> {
    sink: S,
    period: Duration,
    pending: Option<ControlVector>,
    timer: Option<Interval>,
    transmissions: u64,
    send_failed: bool,
}

impl<S: CommandSink> Coalescer<S> {
    /// Creates an idle coalescer sending at most once per `period`.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn new(sink: S, period: Duration) -> Self {
        assert!(!period.is_zero(), "coalescing period must be non-zero");
        Self {
            sink,
            period,
            pending: None,
            timer: None,
            transmissions: 0,
            send_failed: false,
        }
    }

    /// Sends `vector` now if idle, otherwise makes it the pending value.
    pub fn submit(&mut self, vector: ControlVector) {
        if self.timer.is_none() {
            trace!("Sending first vector of burst");
            self.transmit(vector);
            let mut timer = interval_at(Instant::now() + self.period, self.period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.timer = Some(timer);
        } else {
            trace!("Updating pending vector");
            self.pending = Some(vector);
        }
    }

    /// Completes at the next timer tick. Never completes while idle.
    ///
    /// Cancel safe.
    pub async fn tick(&mut self) {
        match self.timer.as_mut() {
            Some(timer) => {
                timer.tick().await;
            }
            None => pending::<()>().await,
        }
    }

    /// Handles a timer tick: flush the pending value or go idle.
    pub fn on_tick(&mut self) {
        match self.pending.take() {
            Some(vector) => {
                trace!("Sending pending vector from interval");
                self.transmit(vector);
            }
            None => {
                trace!("Nothing pending, stopping interval");
                self.timer = None;
            }
        }
    }

    /// Whether the repeating timer is running.
    #[must_use]
    pub fn is_timer_active(&self) -> bool {
        self.timer.is_some()
    }

    /// The value waiting for the next tick.
    #[must_use]
    pub fn pending(&self) -> Option<ControlVector> {
        self.pending
    }

    /// Number of vectors handed to the sink.
    #[must_use]
    pub fn transmissions(&self) -> u64 {
        self.transmissions
    }

    /// Returns and clears the send-failure flag.
    ///
    /// Set when the sink rejected a vector; the connection manager checks it
    /// on the next watchdog tick.
    pub fn take_send_failure(&mut self) -> bool {
        std::mem::take(&mut self.send_failed)
    }

    /// The underlying sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn transmit(&mut self, vector: ControlVector) {
        match self.sink.send(&vector) {
            Ok(()) => self.transmissions += 1,
            Err(e) => {
                warn!("Failed to send control vector: {}", e);
                self.send_failed = true;
            }
        }
    }
}

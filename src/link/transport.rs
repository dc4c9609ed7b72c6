//! Trait abstraction for the control channel to enable testing
//!
//! A [`Transport`] knows how to open a [`Link`]. The link is a pair of
//! channels: outbound frames (text or a liveness ping), and inbound events
//! from the connection. Dropping the link closes the connection.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::coalescer::CommandSink;
use crate::control::ControlVector;
use crate::error::{LinkError, Result};

/// Event reported by an open link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Inbound text payload
    Message(String),
    /// The peer showed it is alive without sending a payload (pong or ping)
    Heartbeat,
    /// The peer closed the connection
    Closed,
    /// The connection failed
    Error(String),
}

/// Frame queued for the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    /// Ping; the peer is expected to answer with a pong
    Ping,
}

/// An open connection.
#[derive(Debug)]
pub struct Link {
    pub outbound: mpsc::UnboundedSender<OutboundFrame>,
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    /// Returns a command sink writing to this link.
    #[must_use]
    pub fn sender(&self) -> LinkSender {
        LinkSender {
            outbound: self.outbound.clone(),
        }
    }

    /// Queues a liveness ping.
    ///
    /// # Errors
    ///
    /// Returns `TransportClosed` if the connection is gone.
    pub fn ping(&self) -> Result<()> {
        self.outbound
            .send(OutboundFrame::Ping)
            .map_err(|_| LinkError::TransportClosed)
    }

    /// Waits for the next event. A dropped event channel reads as `Closed`.
    pub async fn next_event(&mut self) -> LinkEvent {
        self.events.recv().await.unwrap_or(LinkEvent::Closed)
    }
}

/// Command sink that serializes vectors onto a link's outbound channel.
#[derive(Debug, Clone)]
pub struct LinkSender {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
}

impl CommandSink for LinkSender {
    fn send(&mut self, vector: &ControlVector) -> Result<()> {
        let payload = vector.to_json()?;
        self.outbound
            .send(OutboundFrame::Text(payload))
            .map_err(|_| LinkError::TransportClosed)
    }
}

/// Trait for opening the control channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns `TransportOpenFailure` if the connection cannot be established.
    async fn open(&self) -> Result<Link>;

    /// Human-readable target, for log messages.
    fn describe(&self) -> String;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Test side of a link opened by [`MockTransport`].
    pub struct MockPeer {
        pub received: mpsc::UnboundedReceiver<OutboundFrame>,
        pub events: mpsc::UnboundedSender<LinkEvent>,
        pub pings: usize,
    }

    impl MockPeer {
        /// Drains every text frame received so far, counting pings.
        pub fn drain(&mut self) -> Vec<String> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.received.try_recv() {
                match frame {
                    OutboundFrame::Text(text) => frames.push(text),
                    OutboundFrame::Ping => self.pings += 1,
                }
            }
            frames
        }

        /// Answers as a live peer would.
        pub fn heartbeat(&self) {
            let _ = self.events.send(LinkEvent::Heartbeat);
        }

        /// Drains received frames and parses them as control vectors.
        pub fn drain_vectors(&mut self) -> Vec<ControlVector> {
            self.drain()
                .iter()
                .map(|frame| serde_json::from_str(frame).unwrap())
                .collect()
        }

        /// Simulates the peer closing the connection.
        pub fn close(&self) {
            let _ = self.events.send(LinkEvent::Closed);
        }
    }

    /// Outcome of one scripted open attempt.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum OpenOutcome {
        Succeed,
        Fail,
        Hang,
    }

    /// Scripted transport for testing
    #[derive(Clone)]
    pub struct MockTransport {
        script: Arc<Mutex<VecDeque<OpenOutcome>>>,
        pub attempts: Arc<Mutex<u32>>,
        pub peers: Arc<Mutex<Vec<MockPeer>>>,
    }

    impl MockTransport {
        /// Transport that follows `script`, then succeeds once it runs out.
        pub fn new(script: Vec<OpenOutcome>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                attempts: Arc::new(Mutex::new(0)),
                peers: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Transport that fails `failures` times before succeeding.
        pub fn succeeding_on(attempt: u32) -> Self {
            let failures = attempt.saturating_sub(1) as usize;
            Self::new(vec![OpenOutcome::Fail; failures])
        }

        pub fn attempts(&self) -> u32 {
            *self.attempts.lock().unwrap()
        }

        pub fn peer_count(&self) -> usize {
            self.peers.lock().unwrap().len()
        }

        /// Runs `f` against the peer of the `index`-th successful open.
        pub fn with_peer<R>(&self, index: usize, f: impl FnOnce(&mut MockPeer) -> R) -> R {
            let mut peers = self.peers.lock().unwrap();
            f(&mut peers[index])
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self) -> Result<Link> {
            *self.attempts.lock().unwrap() += 1;
            let outcome = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(OpenOutcome::Succeed);

            match outcome {
                OpenOutcome::Succeed => {
                    let (outbound, received) = mpsc::unbounded_channel();
                    let (event_tx, events) = mpsc::unbounded_channel();
                    self.peers.lock().unwrap().push(MockPeer {
                        received,
                        events: event_tx,
                        pings: 0,
                    });
                    Ok(Link { outbound, events })
                }
                OpenOutcome::Fail => Err(LinkError::TransportOpenFailure {
                    target: self.describe(),
                    reason: "connection refused".to_string(),
                }),
                OpenOutcome::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        fn describe(&self) -> String {
            "mock://teleop".to_string()
        }
    }
}

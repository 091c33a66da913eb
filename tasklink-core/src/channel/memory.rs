//! In-memory sync channel
//!
//! MemoryChannel stands in for the remote agent: tests and the replay
//! command inject inbound events with `inject()` and inspect what was
//! sent with `sent()`. Connectivity and send failures can be scripted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex as StdMutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use super::traits::SyncChannel;
use crate::error::{ChannelError, ProtocolError};
use crate::events::{InboundEvent, OutboundEvent};

/// In-process implementation of SyncChannel
pub struct MemoryChannel {
    /// Whether frames can be sent
    connected: AtomicBool,
    /// Whether `initialize()` succeeds
    reachable: AtomicBool,
    /// Whether `emit()` fails while connected
    fail_sends: AtomicBool,
    /// Queue size of each subscription
    capacity: usize,
    /// One sender per live subscription
    subscribers: StdMutex<Vec<mpsc::Sender<InboundEvent>>>,
    /// Every frame successfully emitted, in order
    sent: Mutex<Vec<OutboundEvent>>,
}

impl MemoryChannel {
    /// A reachable channel that has not been initialized yet
    pub fn new(capacity: usize) -> Self {
        Self {
            connected: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            fail_sends: AtomicBool::new(false),
            capacity: capacity.max(1),
            subscribers: StdMutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A channel whose `initialize()` fails until `set_reachable(true)`
    pub fn unreachable(capacity: usize) -> Self {
        let channel = Self::new(capacity);
        channel.set_reachable(false);
        channel
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Make every subsequent `emit()` fail with `SendFailed`
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Drop the connection; `initialize()` can bring it back
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// End every subscription; receivers drain what is queued, then see `None`
    pub fn close_inbound(&self) {
        self.subscribers().clear();
    }

    /// Deliver an event as if the remote agent sent it
    ///
    /// Waits while a subscriber's queue is full. Returns the number of
    /// subscribers that received it.
    pub async fn inject(&self, event: InboundEvent) -> usize {
        debug!(event = event.name(), "Injecting inbound event");
        let subscribers = self.subscribers().clone();
        let mut delivered = 0;
        for tx in &subscribers {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        self.subscribers().retain(|tx| !tx.is_closed());
        delivered
    }

    /// Decode a wire frame and deliver it
    pub async fn inject_frame(&self, frame: &str) -> Result<usize, ProtocolError> {
        let event = InboundEvent::decode(frame)?;
        Ok(self.inject(event).await)
    }

    /// Frames emitted so far
    pub async fn sent(&self) -> Vec<OutboundEvent> {
        self.sent.lock().await.clone()
    }

    /// Frames emitted so far, clearing the log
    pub async fn take_sent(&self) -> Vec<OutboundEvent> {
        std::mem::take(&mut *self.sent.lock().await)
    }

    // Never held across an await
    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::Sender<InboundEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SyncChannel for MemoryChannel {
    async fn initialize(&self) -> Result<(), ChannelError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed(
                "remote agent unreachable".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn emit(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed(format!(
                "{} rejected by transport",
                event.name()
            )));
        }
        self.sent.lock().await.push(event);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<InboundEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers().push(tx);
        rx
    }
}

//! SyncChannel trait

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::events::{InboundEvent, OutboundEvent, RequestResponse};

/// Duplex connection to the remote agent
///
/// Implementations must deliver every inbound event to every subscriber
/// in arrival order without dropping any. Each subscriber owns a bounded
/// queue, so a slow subscriber holds back delivery instead of losing
/// events. Dropping a receiver unsubscribes it; the receiver yields `None`
/// once the channel stops delivering.
#[async_trait]
pub trait SyncChannel: Send + Sync {
    /// Connect, or reconnect after a failure
    async fn initialize(&self) -> Result<(), ChannelError>;

    /// Whether frames can currently be sent
    fn is_connected(&self) -> bool;

    /// Send one frame to the remote agent
    async fn emit(&self, event: OutboundEvent) -> Result<(), ChannelError>;

    /// Subscribe to inbound events from now on
    fn subscribe(&self) -> mpsc::Receiver<InboundEvent>;

    /// Send the correlated answer to an agent-initiated request
    async fn respond_to_request(&self, response: RequestResponse) -> Result<(), ChannelError> {
        self.emit(OutboundEvent::RequestResponse(response)).await
    }
}

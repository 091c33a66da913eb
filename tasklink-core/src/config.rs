//! Sync configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capacity of the inbound event and local command queues
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Default limit for a single collaborator call, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration for the sync service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Capacity of each inbound subscription and the local command queue
    pub channel_capacity: usize,
    /// Limit for a collaborator call; `None` or 0 waits indefinitely
    pub request_timeout_secs: Option<u64>,
    /// Queue local mutations for delivery to the remote agent
    pub push_local_changes: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            push_local_changes: true,
        }
    }
}

impl SyncConfig {
    /// Collaborator call limit as a Duration
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        }
    }

    /// Queue capacity, never zero
    pub fn capacity(&self) -> usize {
        self.channel_capacity.max(1)
    }
}

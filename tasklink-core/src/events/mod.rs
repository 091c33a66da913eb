//! Events exchanged with the remote agent

pub mod types;

// Re-export key types for convenience
pub use types::{
    EditCodeRequest, InboundEvent, OpenFileRequest, OutboundEvent, RemoteRequest, RequestKind,
    RequestResponse, ResponseStatus, Routed, RunCommandRequest, ShowDiffRequest, SyncEvent,
    SyncSnapshot, TaskAssigned, TaskCompleted,
};

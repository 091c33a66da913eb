//! Error types for tasklink-core

use thiserror::Error;

/// Top-level error type for tasklink-core
#[derive(Error, Debug)]
pub enum TaskLinkError {
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Sync service stopped")]
    ServiceStopped,
}

/// Convenience alias used across the crate
pub type TaskLinkResult<T> = Result<T, TaskLinkError>;

/// Errors raised by the task store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task already exists: {0}")]
    AlreadyExists(String),

    #[error("Illegal transition for task {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: String,
        to: String,
    },
}

/// Errors raised by the agent registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Agent not found: {0}")]
    NotFound(String),

    #[error("Agent already registered: {0}")]
    AlreadyRegistered(String),
}

/// Errors from the sync channel to the remote agent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Sync channel is not connected")]
    NotConnected,

    #[error("Failed to send to remote agent: {0}")]
    SendFailed(String),

    #[error("Sync channel closed")]
    Closed,
}

/// Violations of the remote command protocol
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No pending request with id {0}")]
    UnknownRequest(String),

    #[error("Request {0} was already answered")]
    DuplicateResponse(String),

    #[error("Request {0} is already pending")]
    DuplicateRequest(String),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
}

/// Failures reported by local collaborators (editor, executor, diff view)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{0}")]
    Failed(String),

    #[error("{0} is disabled")]
    Disabled(String),

    #[error("Timed out after {0}s")]
    TimedOut(u64),
}

//! tasklink-core: Task synchronization with a remote coding agent
//!
//! This crate keeps a local task list consistent with an external agent
//! process and routes the agent's requests to local tooling:
//!
//! - **Task model** - [`Task`], [`TaskStore`] and the status state machine
//! - **Agent catalog** - [`AgentRegistry`] with assignment and performance bookkeeping
//! - **Sync channel** - [`SyncChannel`] trait and the in-process [`MemoryChannel`]
//! - **Reconciliation** - [`ReconciliationEngine`] merging inbound events and local actions
//! - **Command routing** - [`CommandRouter`] answering agent-initiated requests exactly once
//! - **Service** - [`SyncService`] serializing everything onto one task, driven by [`SyncHandle`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tasklink_core::{AgentRegistry, Collaborators, MemoryChannel, NewTask, SyncConfig, SyncService};
//!
//! async fn example(collaborators: Collaborators) -> tasklink_core::TaskLinkResult<()> {
//!     let channel = Arc::new(MemoryChannel::new(256));
//!     let (handle, join) = SyncService::spawn(
//!         channel,
//!         AgentRegistry::with_defaults(),
//!         collaborators,
//!         SyncConfig::default(),
//!     );
//!
//!     let task = handle.create_task(NewTask::new("Fix login redirect")).await?;
//!     handle.assign_task(&task.id, "claude").await?;
//!
//!     handle.shutdown().await;
//!     let _ = join.await;
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod channel;
pub mod collab;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod outbox;
pub mod router;
pub mod service;
pub mod task;

// Re-export key types for convenience
pub use agent::{Agent, AgentKind, AgentRegistry, AgentStatus, Performance};
pub use channel::{MemoryChannel, SyncChannel};
pub use collab::{CommandExecutor, CommandOutput, Collaborators, DiffViewer, EditorSurface};
pub use config::SyncConfig;
pub use engine::{Applied, ConnectionStatus, ReconciliationEngine, ResyncSummary};
pub use error::{
    AgentError, ChannelError, CollaboratorError, ProtocolError, TaskError, TaskLinkError,
    TaskLinkResult,
};
pub use events::{InboundEvent, OutboundEvent, RemoteRequest, RequestResponse, ResponseStatus};
pub use outbox::{Outbox, OutboxEntry, PushKind};
pub use router::{CommandRouter, PendingRequest, RequestStatus};
pub use service::{SyncHandle, SyncService};
pub use task::{
    MessageSender, NewTask, Priority, Task, TaskFilter, TaskMessage, TaskPatch, TaskSource,
    TaskStatus, TaskStore,
};

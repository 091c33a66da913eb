//! Event type definitions
//!
//! Every frame exchanged with the remote agent has the shape
//! `{"type": <event name>, "data": <payload>}`. Inbound frames are
//! decoded into [`InboundEvent`] at the channel boundary and then routed
//! either to the reconciliation engine ([`SyncEvent`]) or to the command
//! router ([`RemoteRequest`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::task::{Task, TaskMessage, TaskPatch};

/// `task_assigned` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssigned {
    pub id: String,
    #[serde(rename = "assignedAgent", alias = "assigned_agent", alias = "assigned_to")]
    pub assigned_agent: String,
}

/// `task_completed` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompleted {
    pub id: String,
    /// Outcome credited to the assigned agent
    #[serde(default = "succeeded")]
    pub success: bool,
}

fn succeeded() -> bool {
    true
}

/// `sync_response` payload: the remote agent's full task list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub tasks: Vec<TaskPatch>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Ask the editor to open a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFileRequest {
    pub request_id: String,
    pub file_path: String,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Ask the editor to apply an edit set to a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditCodeRequest {
    pub request_id: String,
    pub file_path: String,
    /// Edit set, opaque to the router
    #[serde(default)]
    pub changes: serde_json::Value,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Ask the local environment to run a shell command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCommandRequest {
    pub request_id: String,
    pub command: String,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Ask the diff view to show a before/after pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowDiffRequest {
    pub request_id: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// Frames received from the remote agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    TaskCreated(TaskPatch),
    TaskSynced(TaskPatch),
    TaskUpdated(TaskPatch),
    TaskAssigned(TaskAssigned),
    TaskCompleted(TaskCompleted),
    TaskMessage(TaskMessage),
    SyncResponse(SyncSnapshot),
    OpenFileRequest(OpenFileRequest),
    EditCodeRequest(EditCodeRequest),
    RunCommandRequest(RunCommandRequest),
    ShowDiffRequest(ShowDiffRequest),
}

/// Task-affecting events handled by the reconciliation engine
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Created(TaskPatch),
    Synced(TaskPatch),
    Updated(TaskPatch),
    Assigned(TaskAssigned),
    Completed(TaskCompleted),
    Message(TaskMessage),
    Snapshot(SyncSnapshot),
}

/// Agent-initiated requests handled by the command router
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteRequest {
    OpenFile(OpenFileRequest),
    EditCode(EditCodeRequest),
    RunCommand(RunCommandRequest),
    ShowDiff(ShowDiffRequest),
}

/// Where an inbound event goes
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Sync(SyncEvent),
    Request(RemoteRequest),
}

impl InboundEvent {
    /// Decode a wire frame
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated(_) => "task_created",
            Self::TaskSynced(_) => "task_synced",
            Self::TaskUpdated(_) => "task_updated",
            Self::TaskAssigned(_) => "task_assigned",
            Self::TaskCompleted(_) => "task_completed",
            Self::TaskMessage(_) => "task_message",
            Self::SyncResponse(_) => "sync_response",
            Self::OpenFileRequest(_) => "open_file_request",
            Self::EditCodeRequest(_) => "edit_code_request",
            Self::RunCommandRequest(_) => "run_command_request",
            Self::ShowDiffRequest(_) => "show_diff_request",
        }
    }

    /// Split into engine events and router requests
    pub fn route(self) -> Routed {
        match self {
            Self::TaskCreated(p) => Routed::Sync(SyncEvent::Created(p)),
            Self::TaskSynced(p) => Routed::Sync(SyncEvent::Synced(p)),
            Self::TaskUpdated(p) => Routed::Sync(SyncEvent::Updated(p)),
            Self::TaskAssigned(p) => Routed::Sync(SyncEvent::Assigned(p)),
            Self::TaskCompleted(p) => Routed::Sync(SyncEvent::Completed(p)),
            Self::TaskMessage(m) => Routed::Sync(SyncEvent::Message(m)),
            Self::SyncResponse(s) => Routed::Sync(SyncEvent::Snapshot(s)),
            Self::OpenFileRequest(r) => Routed::Request(RemoteRequest::OpenFile(r)),
            Self::EditCodeRequest(r) => Routed::Request(RemoteRequest::EditCode(r)),
            Self::RunCommandRequest(r) => Routed::Request(RemoteRequest::RunCommand(r)),
            Self::ShowDiffRequest(r) => Routed::Request(RemoteRequest::ShowDiff(r)),
        }
    }
}

impl SyncEvent {
    /// Wire name of the event this came from
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "task_created",
            Self::Synced(_) => "task_synced",
            Self::Updated(_) => "task_updated",
            Self::Assigned(_) => "task_assigned",
            Self::Completed(_) => "task_completed",
            Self::Message(_) => "task_message",
            Self::Snapshot(_) => "sync_response",
        }
    }

    /// Id of the task the event targets (`None` for snapshots)
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Created(p) | Self::Synced(p) | Self::Updated(p) => Some(&p.id),
            Self::Assigned(a) => Some(&a.id),
            Self::Completed(c) => Some(&c.id),
            Self::Message(m) => Some(&m.task_id),
            Self::Snapshot(_) => None,
        }
    }
}

/// Kinds of agent-initiated requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    OpenFile,
    EditCode,
    RunCommand,
    ShowDiff,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenFile => "open_file",
            Self::EditCode => "edit_code",
            Self::RunCommand => "run_command",
            Self::ShowDiff => "show_diff",
        }
    }
}

impl RemoteRequest {
    pub fn request_id(&self) -> &str {
        match self {
            Self::OpenFile(r) => &r.request_id,
            Self::EditCode(r) => &r.request_id,
            Self::RunCommand(r) => &r.request_id,
            Self::ShowDiff(r) => &r.request_id,
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::OpenFile(_) => RequestKind::OpenFile,
            Self::EditCode(_) => RequestKind::EditCode,
            Self::RunCommand(_) => RequestKind::RunCommand,
            Self::ShowDiff(_) => RequestKind::ShowDiff,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::OpenFile(r) => r.task_id.as_deref(),
            Self::EditCode(r) => r.task_id.as_deref(),
            Self::RunCommand(r) => r.task_id.as_deref(),
            Self::ShowDiff(r) => r.task_id.as_deref(),
        }
    }
}

/// Outcome reported back to the remote agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// `request_response` payload, correlated by `request_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResponse {
    pub request_id: String,
    pub response: ResponseStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl RequestResponse {
    pub fn success(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            response: ResponseStatus::Success,
            message: message.into(),
            output: None,
        }
    }

    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            response: ResponseStatus::Error,
            message: message.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Frames sent to the remote agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundEvent {
    TaskCreated(Task),
    TaskUpdated(Task),
    TaskMessage(TaskMessage),
    RequestResponse(RequestResponse),
    SyncRequest,
}

impl OutboundEvent {
    /// Encode as a wire frame
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated(_) => "task_created",
            Self::TaskUpdated(_) => "task_updated",
            Self::TaskMessage(_) => "task_message",
            Self::RequestResponse(_) => "request_response",
            Self::SyncRequest => "sync_request",
        }
    }
}

//! Task data model
//!
//! Field names follow the wire schema shared with the remote agent:
//! tasks use camelCase, messages use snake_case.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Generate a new task id (time-ordered)
pub fn new_task_id() -> String {
    format!("task_{}", Uuid::now_v7().simple())
}

/// Generate a new message id (time-ordered)
pub fn new_message_id() -> String {
    format!("msg_{}", Uuid::now_v7().simple())
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Task lifecycle state
///
/// ```text
/// pending ──► in_progress ──► completed
///    │  │        ▲    │
///    │  └──► blocked ◄┘
///    └──────────────────────► completed
/// ```
///
/// `completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    /// Convert to wire string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    /// Parse from wire string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the state machine allows moving to `next`
    ///
    /// Staying in the same state is always allowed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Blocked)
                | (Pending, Completed)
                | (InProgress, Completed)
                | (InProgress, Blocked)
                | (Blocked, InProgress)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a task originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Local,
    #[default]
    #[serde(alias = "claude_code")]
    Remote,
}

/// One step of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: TaskStatus,
}

/// A unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    /// Agent id (weak reference into the agent registry)
    #[serde(default)]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Display-only percentage, 0..=100
    #[serde(
        default,
        deserialize_with = "clamped_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<u8>,
    #[serde(default)]
    pub source: TaskSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

impl Task {
    /// Apply every field present in the patch (shallow overwrite)
    ///
    /// `id`, `source` and `createdAt` are never changed. Callers check
    /// status legality beforehand.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(agent) = &patch.assigned_agent {
            self.assigned_agent = agent.clone();
        }
        if let Some(subtasks) = &patch.subtasks {
            self.subtasks = subtasks.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        if let Some(progress) = patch.progress {
            self.progress = Some(progress.min(100));
        }
        if let Some(deadline) = patch.deadline {
            self.deadline = Some(deadline);
        }
        if let Some(estimate) = &patch.estimated_time {
            self.estimated_time = Some(estimate.clone());
        }
        self.touch();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Partial task fields; absent fields leave the task untouched
///
/// `assignedAgent: null` clears the assignment, which is why it is a
/// double option.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(
        default,
        alias = "assigned_agent",
        alias = "assigned_to",
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_agent: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtasks: Option<Vec<Subtask>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(
        default,
        deserialize_with = "clamped_percent",
        skip_serializing_if = "Option::is_none"
    )]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

impl TaskPatch {
    /// An empty patch for the given task
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set the assigned agent; `None` clears the assignment
    pub fn assigned_agent(mut self, agent_id: Option<&str>) -> Self {
        self.assigned_agent = Some(agent_id.map(str::to_string));
        self
    }

    /// Build a full task from the patch, filling absent fields with defaults
    pub fn into_task(self, source: TaskSource) -> Task {
        let now = Utc::now();
        Task {
            id: self.id,
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            assigned_agent: self.assigned_agent.flatten(),
            subtasks: self.subtasks.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            progress: self.progress.map(|p| p.min(100)),
            source,
            created_at: now,
            updated_at: now,
            deadline: self.deadline,
            estimated_time: self.estimated_time,
        }
    }
}

impl From<&Task> for TaskPatch {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            priority: Some(task.priority),
            status: Some(task.status),
            assigned_agent: Some(task.assigned_agent.clone()),
            subtasks: Some(task.subtasks.clone()),
            tags: Some(task.tags.clone()),
            progress: task.progress,
            deadline: task.deadline,
            estimated_time: task.estimated_time.clone(),
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// Percentages outside 0..=100 are clamped instead of failing the frame
fn clamped_percent<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    Ok(value.map(|percent| percent.clamp(0, 100) as u8))
}

/// Input for a task created by the local user
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub tags: BTreeSet<String>,
    pub subtasks: Vec<Subtask>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimated_time: Option<String>,
}

impl NewTask {
    /// Medium priority, due in 24 hours
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority: Priority::Medium,
            tags: BTreeSet::new(),
            subtasks: Vec::new(),
            deadline: Some(Utc::now() + Duration::hours(24)),
            estimated_time: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_subtasks<I, S>(mut self, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = self.subtasks.len();
        self.subtasks
            .extend(titles.into_iter().enumerate().map(|(i, title)| Subtask {
                id: format!("sub_{}", start + i + 1),
                title: title.into(),
                status: TaskStatus::Pending,
            }));
        self
    }

    /// Materialize as a pending local task with a fresh id
    pub fn into_task(self) -> Task {
        let now = Utc::now();
        Task {
            id: new_task_id(),
            title: self.title,
            description: self.description,
            priority: self.priority,
            status: TaskStatus::Pending,
            assigned_agent: None,
            subtasks: self.subtasks,
            tags: self.tags,
            progress: None,
            source: TaskSource::Local,
            created_at: now,
            updated_at: now,
            deadline: self.deadline,
            estimated_time: self.estimated_time,
        }
    }
}

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    #[serde(alias = "claudeditor")]
    Local,
    #[default]
    #[serde(alias = "claude_code")]
    Remote,
}

/// Kind of thread entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Comment,
    StatusUpdate,
}

/// One entry of a task's message thread; immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub task_id: String,
    pub message: String,
    #[serde(default)]
    pub sender: MessageSender,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
}

impl TaskMessage {
    /// A comment written by the local user
    pub fn local(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            task_id: task_id.into(),
            message: message.into(),
            sender: MessageSender::Local,
            timestamp: Utc::now(),
            kind: MessageKind::Comment,
        }
    }
}

// Some senders use millisecond timestamps as message ids
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Read-only selection over the task list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskFilter {
    #[default]
    All,
    Status(TaskStatus),
    Source(TaskSource),
    Agent(String),
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Status(status) => task.status == *status,
            Self::Source(source) => task.source == *source,
            Self::Agent(agent) => task.assigned_agent.as_deref() == Some(agent.as_str()),
        }
    }
}

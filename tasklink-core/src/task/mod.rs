//! Task model and store
//!
//! - Task, subtask and message types shared with the remote agent
//! - The status state machine
//! - The ordered in-process store with per-task threads

pub mod store;
pub mod types;

pub use store::{Assignment, Completion, TaskStore, Upsert};
pub use types::{
    MessageKind, MessageSender, NewTask, Priority, Subtask, Task, TaskFilter, TaskMessage,
    TaskPatch, TaskSource, TaskStatus, new_message_id, new_task_id,
};

//! In-process task store
//!
//! TaskStore holds the ordered task list (most recent first) and the
//! per-task message threads. It enforces id uniqueness and the status
//! state machine; the reconciliation engine decides which operation an
//! event maps to.

use std::collections::HashMap;

use super::types::{Task, TaskFilter, TaskMessage, TaskPatch, TaskSource, TaskStatus};
use crate::error::TaskError;

/// Result of merging a task-shaped payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No task had that id; it was inserted at the front
    Inserted,
    /// An existing task was updated in place
    Merged,
}

/// Result of assigning an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// The task was already assigned to that agent
    Unchanged,
    /// The agent was set; `previous` is the agent it replaced
    Assigned { previous: Option<String> },
}

/// Result of a forced completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Status before the completion
    pub previous: TaskStatus,
    /// Agent the task was assigned to, if any
    pub agent: Option<String>,
}

/// Ordered task list plus message threads
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    threads: HashMap<String, Vec<TaskMessage>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All tasks, most recent first
    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks matching the filter, in list order
    pub fn filter(&self, filter: &TaskFilter) -> Vec<&Task> {
        self.tasks.iter().filter(|t| filter.matches(t)).collect()
    }

    pub fn count(&self, filter: &TaskFilter) -> usize {
        self.tasks.iter().filter(|t| filter.matches(t)).count()
    }

    /// Insert a new task at the front
    pub fn create(&mut self, task: Task) -> Result<&Task, TaskError> {
        if self.contains(&task.id) {
            return Err(TaskError::AlreadyExists(task.id));
        }
        self.tasks.insert(0, task);
        Ok(&self.tasks[0])
    }

    /// Merge into an existing task, or insert a new one at the front
    pub fn upsert(&mut self, patch: TaskPatch, source: TaskSource) -> Result<Upsert, TaskError> {
        if self.contains(&patch.id) {
            let id = patch.id.clone();
            self.update(&id, &patch)?;
            Ok(Upsert::Merged)
        } else {
            self.tasks.insert(0, patch.into_task(source));
            Ok(Upsert::Inserted)
        }
    }

    /// Shallow-merge a patch into an existing task
    ///
    /// The whole patch is rejected if it carries an illegal status change.
    pub fn update(&mut self, id: &str, patch: &TaskPatch) -> Result<&Task, TaskError> {
        let task = self.get_mut(id)?;
        if let Some(next) = patch.status {
            check_transition(task, next)?;
        }
        task.apply(patch);
        Ok(&*task)
    }

    /// Move a task to a new status under the state machine
    pub fn set_status(&mut self, id: &str, status: TaskStatus) -> Result<&Task, TaskError> {
        let task = self.get_mut(id)?;
        check_transition(task, status)?;
        if task.status != status {
            task.status = status;
            task.touch();
        }
        Ok(&*task)
    }

    /// Assign an agent and start the task
    ///
    /// Idempotent when the task is already assigned to the same agent.
    pub fn assign(&mut self, id: &str, agent_id: &str) -> Result<Assignment, TaskError> {
        let task = self.get_mut(id)?;
        if task.assigned_agent.as_deref() == Some(agent_id) {
            return Ok(Assignment::Unchanged);
        }
        check_transition(task, TaskStatus::InProgress)?;
        let previous = task.assigned_agent.replace(agent_id.to_string());
        task.status = TaskStatus::InProgress;
        task.touch();
        Ok(Assignment::Assigned { previous })
    }

    /// Assign an agent regardless of the current status
    ///
    /// Forces `in_progress` unless the task is already completed, in which
    /// case only the agent changes.
    pub fn force_assign(&mut self, id: &str, agent_id: &str) -> Result<Assignment, TaskError> {
        let task = self.get_mut(id)?;
        if !task.status.is_terminal() {
            task.status = TaskStatus::InProgress;
        }
        let previous = task.assigned_agent.replace(agent_id.to_string());
        task.touch();
        if previous.as_deref() == Some(agent_id) {
            Ok(Assignment::Unchanged)
        } else {
            Ok(Assignment::Assigned { previous })
        }
    }

    /// Complete a task regardless of the current status; sets progress to 100
    pub fn force_complete(&mut self, id: &str) -> Result<Completion, TaskError> {
        let task = self.get_mut(id)?;
        let previous = task.status;
        task.status = TaskStatus::Completed;
        task.progress = Some(100);
        task.touch();
        Ok(Completion {
            previous,
            agent: task.assigned_agent.clone(),
        })
    }

    /// Append to a task's thread; the task does not have to exist
    pub fn append_message(&mut self, message: TaskMessage) {
        self.threads
            .entry(message.task_id.clone())
            .or_default()
            .push(message);
    }

    /// Thread of a task, oldest first
    pub fn messages(&self, task_id: &str) -> &[TaskMessage] {
        self.threads.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Task, TaskError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }
}

fn check_transition(task: &Task, next: TaskStatus) -> Result<(), TaskError> {
    if task.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(TaskError::IllegalTransition {
            id: task.id.clone(),
            from: task.status.to_string(),
            to: next.to_string(),
        })
    }
}

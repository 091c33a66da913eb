//! Reconciliation engine
//!
//! The ReconciliationEngine is the only writer of the task store and the
//! agent registry. It applies:
//! - Inbound sync events from the remote agent, in arrival order
//! - Local user actions, which are also queued in the outbox
//!
//! Rejected operations are logged at `warn` and leave state untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::agent::{Agent, AgentRegistry};
use crate::channel::SyncChannel;
use crate::config::SyncConfig;
use crate::error::{AgentError, ChannelError, TaskError, TaskLinkResult};
use crate::events::{OutboundEvent, SyncEvent, SyncSnapshot, TaskAssigned, TaskCompleted};
use crate::outbox::{Outbox, PushKind};
use crate::task::{
    Assignment, Completion, NewTask, Task, TaskMessage, TaskPatch, TaskSource, TaskStatus,
    TaskStore, Upsert,
};

/// Remote sync availability as shown to the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Most recent channel failure, cleared on a successful reconnect
    pub last_error: Option<String>,
}

/// Counts from applying a sync response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncSummary {
    pub inserted: usize,
    pub merged: usize,
    pub rejected: usize,
}

/// What an inbound event did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Upserted(Upsert),
    Updated,
    Assigned(Assignment),
    Completed(Completion),
    MessageAppended,
    Resynced(ResyncSummary),
}

/// Single authority over the task store and agent registry
pub struct ReconciliationEngine {
    store: TaskStore,
    agents: AgentRegistry,
    outbox: Outbox,
    channel: Arc<dyn SyncChannel>,
    config: SyncConfig,
    last_error: Option<String>,
}

impl ReconciliationEngine {
    pub fn new(channel: Arc<dyn SyncChannel>, agents: AgentRegistry, config: SyncConfig) -> Self {
        Self {
            store: TaskStore::new(),
            agents,
            outbox: Outbox::new(),
            channel,
            config,
            last_error: None,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            connected: self.channel.is_connected(),
            last_error: self.last_error.clone(),
        }
    }

    // ==================== Inbound Events ====================

    /// Apply one inbound sync event
    #[instrument(skip(self, event), fields(event = event.name(), task_id = event.task_id()))]
    pub fn apply(&mut self, event: SyncEvent) -> Result<Applied, TaskError> {
        let result = match event {
            SyncEvent::Created(patch) | SyncEvent::Synced(patch) => {
                self.upsert_remote(patch).map(Applied::Upserted)
            }
            SyncEvent::Updated(patch) => {
                let id = patch.id.clone();
                let before = self.holder(&id);
                let updated = self.store.update(&id, &patch).map(|_| ());
                updated.map(|()| {
                    self.track_patch(&id, before);
                    Applied::Updated
                })
            }
            SyncEvent::Assigned(assigned) => self.apply_assigned(assigned),
            SyncEvent::Completed(completed) => self.apply_completed(completed),
            SyncEvent::Message(message) => {
                if !self.store.contains(&message.task_id) {
                    debug!("Message for a task not in the store");
                }
                self.store.append_message(message);
                Ok(Applied::MessageAppended)
            }
            SyncEvent::Snapshot(snapshot) => Ok(Applied::Resynced(self.apply_snapshot(snapshot))),
        };

        match &result {
            Ok(applied) => debug!(?applied, "Applied sync event"),
            Err(e) => warn!(error = %e, "Rejected sync event"),
        }
        result
    }

    // task_assigned overrides the state machine, except that a completed
    // task stays completed
    fn apply_assigned(&mut self, assigned: TaskAssigned) -> Result<Applied, TaskError> {
        let TaskAssigned { id, assigned_agent } = assigned;
        let assignment = self.store.force_assign(&id, &assigned_agent)?;
        let active = self
            .store
            .get(&id)
            .is_some_and(|task| !task.status.is_terminal());
        self.track_assignment(&id, &assigned_agent, &assignment, active);
        Ok(Applied::Assigned(assignment))
    }

    fn apply_completed(&mut self, completed: TaskCompleted) -> Result<Applied, TaskError> {
        let completion = self.store.force_complete(&completed.id)?;
        if completion.previous != TaskStatus::Completed
            && let Some(agent_id) = &completion.agent
        {
            self.track_completion(&completed.id, agent_id, completed.success);
        }
        Ok(Applied::Completed(completion))
    }

    fn apply_snapshot(&mut self, snapshot: SyncSnapshot) -> ResyncSummary {
        let mut summary = ResyncSummary::default();
        for patch in snapshot.tasks {
            let id = patch.id.clone();
            match self.upsert_remote(patch) {
                Ok(Upsert::Inserted) => summary.inserted += 1,
                Ok(Upsert::Merged) => summary.merged += 1,
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Rejected task from sync response");
                    summary.rejected += 1;
                }
            }
        }
        info!(
            inserted = summary.inserted,
            merged = summary.merged,
            rejected = summary.rejected,
            "Applied sync response"
        );
        summary
    }

    fn upsert_remote(&mut self, patch: TaskPatch) -> Result<Upsert, TaskError> {
        let id = patch.id.clone();
        let before = self.holder(&id);
        let upsert = self.store.upsert(patch, TaskSource::Remote)?;
        self.track_patch(&id, before);
        Ok(upsert)
    }

    // ==================== Local Actions ====================

    /// Create a task locally and queue it for the remote agent
    #[instrument(skip(self, new_task), fields(title = %new_task.title))]
    pub fn create_task(&mut self, new_task: NewTask) -> Result<Task, TaskError> {
        let task = self.store.create(new_task.into_task())?.clone();
        info!(task_id = %task.id, "Created local task");
        self.queue_task(&task.id, PushKind::Create);
        Ok(task)
    }

    /// Shallow-merge local edits into a task
    ///
    /// A patch that sets `assignedAgent` must name an agent in the registry.
    #[instrument(skip(self, patch), fields(task_id = %patch.id))]
    pub fn update_task(&mut self, patch: TaskPatch) -> TaskLinkResult<Task> {
        let id = patch.id.clone();
        if let Some(Some(agent_id)) = &patch.assigned_agent
            && !self.agents.contains(agent_id)
        {
            warn!(agent_id = %agent_id, "Cannot assign unknown agent");
            return Err(AgentError::NotFound(agent_id.clone()).into());
        }
        let before = self.holder(&id);
        let task = self
            .store
            .update(&id, &patch)
            .inspect_err(|e| warn!(error = %e, "Rejected local update"))?
            .clone();
        self.track_patch(&id, before);
        self.queue_task(&id, PushKind::Update);
        Ok(task)
    }

    /// Assign an agent and start the task
    #[instrument(skip(self))]
    pub fn assign_task(&mut self, task_id: &str, agent_id: &str) -> TaskLinkResult<Task> {
        if !self.agents.contains(agent_id) {
            warn!("Cannot assign unknown agent");
            return Err(AgentError::NotFound(agent_id.to_string()).into());
        }
        let assignment = self
            .store
            .assign(task_id, agent_id)
            .inspect_err(|e| warn!(error = %e, "Rejected local assignment"))?;
        if assignment != Assignment::Unchanged {
            self.track_assignment(task_id, agent_id, &assignment, true);
            self.queue_task(task_id, PushKind::Update);
        }
        Ok(self.task_snapshot(task_id)?)
    }

    /// Complete a task under the state machine and credit its agent
    #[instrument(skip(self))]
    pub fn complete_task(&mut self, task_id: &str, success: bool) -> Result<Task, TaskError> {
        let previous = self
            .store
            .get(task_id)
            .map(|task| task.status)
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
            .inspect_err(|e| warn!(error = %e, "Rejected local completion"))?;
        if previous == TaskStatus::Completed {
            debug!("Task already completed");
            return self.task_snapshot(task_id);
        }

        let patch = TaskPatch::new(task_id)
            .status(TaskStatus::Completed)
            .progress(100);
        let task = self
            .store
            .update(task_id, &patch)
            .inspect_err(|e| warn!(error = %e, "Rejected local completion"))?
            .clone();
        if let Some(agent_id) = &task.assigned_agent {
            self.track_completion(task_id, agent_id, success);
        }
        self.queue_task(task_id, PushKind::Update);
        Ok(task)
    }

    /// Append a local comment to an existing task's thread
    #[instrument(skip(self, text))]
    pub fn send_message(&mut self, task_id: &str, text: &str) -> Result<TaskMessage, TaskError> {
        if !self.store.contains(task_id) {
            warn!("Cannot message unknown task");
            return Err(TaskError::NotFound(task_id.to_string()));
        }
        let message = TaskMessage::local(task_id, text);
        self.store.append_message(message.clone());
        if self.config.push_local_changes {
            self.outbox.queue_message(message.clone());
        }
        Ok(message)
    }

    fn queue_task(&mut self, task_id: &str, kind: PushKind) {
        if self.config.push_local_changes {
            self.outbox.queue_task(task_id, kind);
        }
    }

    fn task_snapshot(&self, task_id: &str) -> Result<Task, TaskError> {
        self.store
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    // ==================== Agent Bookkeeping ====================

    fn track_assignment(&mut self, task_id: &str, agent_id: &str, assignment: &Assignment, active: bool) {
        if let Assignment::Assigned {
            previous: Some(previous),
        } = assignment
        {
            self.release_agent(previous, task_id);
        }
        if active && let Err(e) = self.agents.set_current_task(agent_id, Some(task_id.to_string())) {
            debug!(error = %e, "Assigned agent is not in the catalog");
        }
    }

    fn track_completion(&mut self, task_id: &str, agent_id: &str, success: bool) {
        match self.agents.record_completion(agent_id, success) {
            Ok(_) => self.release_agent(agent_id, task_id),
            Err(e) => debug!(error = %e, "Completed by an agent not in the catalog"),
        }
    }

    fn holder(&self, task_id: &str) -> Option<(TaskStatus, Option<String>)> {
        self.store
            .get(task_id)
            .map(|task| (task.status, task.assigned_agent.clone()))
    }

    // Keep agents in step with a merge that moved the task's agent or
    // completed it. `before` is None for a task the merge inserted; an
    // inserted task that is already completed credits nobody.
    fn track_patch(&mut self, task_id: &str, before: Option<(TaskStatus, Option<String>)>) {
        let Some(task) = self.store.get(task_id) else {
            return;
        };
        let (status, agent) = (task.status, task.assigned_agent.clone());
        let (before_status, before_agent) = match before {
            Some((previous_status, previous_agent)) => (Some(previous_status), previous_agent),
            None => (None, None),
        };

        if agent != before_agent {
            match &agent {
                Some(agent_id) => {
                    let assignment = Assignment::Assigned {
                        previous: before_agent,
                    };
                    self.track_assignment(task_id, agent_id, &assignment, !status.is_terminal());
                }
                None => {
                    if let Some(previous) = &before_agent {
                        self.release_agent(previous, task_id);
                    }
                }
            }
        }

        let newly_completed = status == TaskStatus::Completed
            && before_status.is_some_and(|previous| previous != TaskStatus::Completed);
        if newly_completed && let Some(agent_id) = &agent {
            self.track_completion(task_id, agent_id, true);
        }
    }

    // Clear the agent's current task if it still points at this one
    fn release_agent(&mut self, agent_id: &str, task_id: &str) {
        let holds_task = self
            .agents
            .get(agent_id)
            .and_then(|agent: &Agent| agent.current_task.as_deref())
            == Some(task_id);
        if holds_task {
            let _ = self.agents.set_current_task(agent_id, None);
        }
    }

    // ==================== Channel ====================

    /// Connect the channel, ask for a full resync and flush the outbox
    #[instrument(skip(self))]
    pub async fn connect(&mut self) -> Result<(), ChannelError> {
        if let Err(e) = self.channel.initialize().await {
            self.record_failure(&e);
            return Err(e);
        }
        info!("Connected to remote agent");
        self.last_error = None;
        self.request_resync().await;
        self.flush_outbox().await;
        Ok(())
    }

    /// Ask the remote agent for its full task list
    pub async fn request_resync(&mut self) {
        if !self.channel.is_connected() {
            return;
        }
        if let Err(e) = self.channel.emit(OutboundEvent::SyncRequest).await {
            self.record_failure(&e);
        }
    }

    /// Send queued local changes; entries stay queued on failure
    pub async fn flush_outbox(&mut self) -> usize {
        if self.outbox.is_empty() || !self.channel.is_connected() {
            return 0;
        }
        match self.outbox.flush(&self.store, self.channel.as_ref()).await {
            Ok(sent) => sent,
            Err(e) => {
                self.record_failure(&e);
                0
            }
        }
    }

    /// Note a channel failure in the connection status
    pub fn record_failure(&mut self, error: &ChannelError) {
        warn!(error = %error, "Remote sync unavailable");
        self.last_error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::error::TaskLinkError;
    use crate::task::MessageSender;

    fn engine_with(channel: Arc<MemoryChannel>) -> ReconciliationEngine {
        ReconciliationEngine::new(channel, AgentRegistry::with_defaults(), SyncConfig::default())
    }

    fn engine() -> ReconciliationEngine {
        engine_with(Arc::new(MemoryChannel::new(16)))
    }

    fn remote(id: &str) -> SyncEvent {
        SyncEvent::Created(TaskPatch::new(id).title(id))
    }

    fn assigned(id: &str, agent: &str) -> SyncEvent {
        SyncEvent::Assigned(TaskAssigned {
            id: id.to_string(),
            assigned_agent: agent.to_string(),
        })
    }

    fn completed(id: &str, success: bool) -> SyncEvent {
        SyncEvent::Completed(TaskCompleted {
            id: id.to_string(),
            success,
        })
    }

    // ==================== Inbound Tests ====================

    #[test]
    fn task_created_then_synced_merges() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();

        let applied = engine
            .apply(SyncEvent::Synced(TaskPatch::new("t1").title("renamed")))
            .unwrap();

        assert_eq!(applied, Applied::Upserted(Upsert::Merged));
        assert_eq!(engine.store().len(), 1);
        assert_eq!(engine.store().get("t1").unwrap().title, "renamed");
        assert_eq!(engine.store().get("t1").unwrap().source, TaskSource::Remote);
    }

    #[test]
    fn task_updated_never_creates() {
        let mut engine = engine();

        let result = engine.apply(SyncEvent::Updated(TaskPatch::new("ghost").title("x")));

        assert_eq!(result, Err(TaskError::NotFound("ghost".to_string())));
        assert!(engine.store().is_empty());
    }

    #[test]
    fn task_updated_cannot_revive_completed() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();
        engine.apply(completed("t1", true)).unwrap();

        let result = engine.apply(SyncEvent::Updated(
            TaskPatch::new("t1").status(TaskStatus::Pending),
        ));

        assert!(matches!(result, Err(TaskError::IllegalTransition { .. })));
        assert_eq!(engine.store().get("t1").unwrap().status, TaskStatus::Completed);
    }

    #[test]
    fn task_assigned_tracks_agents() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();

        engine.apply(assigned("t1", "claude")).unwrap();
        assert_eq!(
            engine.agents().get("claude").unwrap().current_task.as_deref(),
            Some("t1")
        );

        engine.apply(assigned("t1", "kimi_k2")).unwrap();
        assert_eq!(engine.agents().get("claude").unwrap().current_task, None);
        assert_eq!(
            engine.agents().get("kimi_k2").unwrap().current_task.as_deref(),
            Some("t1")
        );
        assert_eq!(engine.store().get("t1").unwrap().status, TaskStatus::InProgress);
    }

    #[test]
    fn task_assigned_to_unknown_agent_still_applies() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();

        engine.apply(assigned("t1", "someone_else")).unwrap();

        assert_eq!(
            engine.store().get("t1").unwrap().assigned_agent.as_deref(),
            Some("someone_else")
        );
    }

    #[test]
    fn task_completed_records_agent_performance_once() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();
        engine.apply(assigned("t1", "zen_workflow")).unwrap();
        let before = engine.agents().get("zen_workflow").unwrap().performance;

        engine.apply(completed("t1", false)).unwrap();
        engine.apply(completed("t1", false)).unwrap();

        let agent = engine.agents().get("zen_workflow").unwrap();
        assert_eq!(agent.performance.completed, before.completed + 1);
        assert_eq!(agent.performance.success_rate, 89);
        assert_eq!(agent.current_task, None);
    }

    #[test]
    fn task_message_for_unknown_task_is_kept() {
        let mut engine = engine();
        let mut message = TaskMessage::local("later", "hello");
        message.sender = MessageSender::Remote;

        engine.apply(SyncEvent::Message(message)).unwrap();

        assert_eq!(engine.store().messages("later").len(), 1);
        assert!(engine.store().is_empty());
    }

    #[test]
    fn snapshot_counts_outcomes() {
        let mut engine = engine();
        engine.apply(remote("a")).unwrap();
        engine.apply(completed("a", true)).unwrap();

        let snapshot = SyncSnapshot {
            tasks: vec![
                TaskPatch::new("a").status(TaskStatus::InProgress),
                TaskPatch::new("b").title("b"),
                TaskPatch::new("b").title("b2"),
            ],
            timestamp: None,
        };
        let applied = engine.apply(SyncEvent::Snapshot(snapshot)).unwrap();

        assert_eq!(
            applied,
            Applied::Resynced(ResyncSummary {
                inserted: 1,
                merged: 1,
                rejected: 1
            })
        );
        assert_eq!(engine.store().get("b").unwrap().title, "b2");
    }

    #[test]
    fn remote_events_are_not_queued() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();
        engine.apply(completed("t1", true)).unwrap();
        assert!(engine.outbox().is_empty());
    }

    // ==================== Local Action Tests ====================

    #[test]
    fn create_task_is_local_pending_and_queued() {
        let mut engine = engine();

        let task = engine.create_task(NewTask::new("Write docs")).unwrap();

        assert_eq!(task.source, TaskSource::Local);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(engine.outbox().contains_task(&task.id));
    }

    #[test]
    fn push_disabled_keeps_outbox_empty() {
        let config = SyncConfig {
            push_local_changes: false,
            ..Default::default()
        };
        let mut engine = ReconciliationEngine::new(
            Arc::new(MemoryChannel::new(16)),
            AgentRegistry::with_defaults(),
            config,
        );

        let task = engine.create_task(NewTask::new("quiet")).unwrap();
        engine.send_message(&task.id, "note").unwrap();

        assert!(engine.outbox().is_empty());
    }

    #[test]
    fn assign_task_requires_known_agent() {
        let mut engine = engine();
        let task = engine.create_task(NewTask::new("t")).unwrap();

        let result = engine.assign_task(&task.id, "nobody");

        assert!(matches!(result, Err(TaskLinkError::Agent(AgentError::NotFound(_)))));
        assert_eq!(engine.store().get(&task.id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn assign_task_starts_task() {
        let mut engine = engine();
        let task = engine.create_task(NewTask::new("t")).unwrap();

        let task = engine.assign_task(&task.id, "claude").unwrap();

        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(
            engine.agents().get("claude").unwrap().current_task.as_deref(),
            Some(task.id.as_str())
        );
    }

    #[test]
    fn complete_task_from_blocked_is_illegal() {
        let mut engine = engine();
        let task = engine.create_task(NewTask::new("t")).unwrap();
        engine
            .update_task(TaskPatch::new(&task.id).status(TaskStatus::Blocked))
            .unwrap();

        let result = engine.complete_task(&task.id, true);

        assert!(matches!(result, Err(TaskError::IllegalTransition { .. })));
    }

    #[test]
    fn complete_task_credits_agent() {
        let mut engine = engine();
        let task = engine.create_task(NewTask::new("t")).unwrap();
        engine.assign_task(&task.id, "xmasters").unwrap();

        let done = engine.complete_task(&task.id, true).unwrap();
        engine.complete_task(&task.id, true).unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, Some(100));
        let agent = engine.agents().get("xmasters").unwrap();
        assert_eq!(agent.performance.completed, 7);
        assert_eq!(agent.current_task, None);
    }

    #[test]
    fn task_updated_to_completed_credits_and_frees_agent() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();
        engine.apply(assigned("t1", "claude")).unwrap();

        engine
            .apply(SyncEvent::Updated(
                TaskPatch::new("t1").status(TaskStatus::Completed),
            ))
            .unwrap();
        engine
            .apply(SyncEvent::Updated(TaskPatch::new("t1").title("again")))
            .unwrap();

        let claude = engine.agents().get("claude").unwrap();
        assert_eq!(claude.current_task, None);
        assert_eq!(claude.performance.completed, 21);
        assert_eq!(claude.performance.successes, 20);
    }

    #[test]
    fn task_updated_reassignment_moves_current_task() {
        let mut engine = engine();
        engine.apply(remote("t1")).unwrap();
        engine.apply(assigned("t1", "claude")).unwrap();

        engine
            .apply(SyncEvent::Updated(
                TaskPatch::new("t1").assigned_agent(Some("kimi_k2")),
            ))
            .unwrap();

        assert_eq!(engine.agents().get("claude").unwrap().current_task, None);
        assert_eq!(
            engine.agents().get("kimi_k2").unwrap().current_task.as_deref(),
            Some("t1")
        );
    }

    #[test]
    fn task_synced_with_agent_occupies_it() {
        let mut engine = engine();

        engine
            .apply(SyncEvent::Synced(
                TaskPatch::new("t1")
                    .status(TaskStatus::InProgress)
                    .assigned_agent(Some("command_mcp")),
            ))
            .unwrap();

        assert_eq!(
            engine.agents().get("command_mcp").unwrap().current_task.as_deref(),
            Some("t1")
        );
    }

    #[test]
    fn update_task_to_completed_credits_agent() {
        let mut engine = engine();
        let task = engine.create_task(NewTask::new("t")).unwrap();
        engine.assign_task(&task.id, "xmasters").unwrap();

        engine
            .update_task(TaskPatch::new(&task.id).status(TaskStatus::Completed))
            .unwrap();

        let agent = engine.agents().get("xmasters").unwrap();
        assert_eq!(agent.current_task, None);
        assert_eq!(agent.performance.completed, 7);
    }

    #[test]
    fn update_task_clearing_agent_frees_it() {
        let mut engine = engine();
        let task = engine.create_task(NewTask::new("t")).unwrap();
        engine.assign_task(&task.id, "claude").unwrap();

        let task = engine
            .update_task(TaskPatch::new(&task.id).assigned_agent(None))
            .unwrap();

        assert_eq!(task.assigned_agent, None);
        assert_eq!(engine.agents().get("claude").unwrap().current_task, None);
    }

    #[test]
    fn update_task_rejects_unknown_agent() {
        let mut engine = engine();
        let task = engine.create_task(NewTask::new("t")).unwrap();

        let result = engine.update_task(TaskPatch::new(&task.id).assigned_agent(Some("nobody")));

        assert!(matches!(
            result,
            Err(TaskLinkError::Agent(AgentError::NotFound(ref id))) if id == "nobody"
        ));
        assert_eq!(engine.store().get(&task.id).unwrap().assigned_agent, None);
    }

    #[test]
    fn send_message_requires_task() {
        let mut engine = engine();
        assert_eq!(
            engine.send_message("ghost", "hi"),
            Err(TaskError::NotFound("ghost".to_string()))
        );
    }

    // ==================== Channel Tests ====================

    #[tokio::test]
    async fn connect_requests_resync_and_flushes() {
        let channel = Arc::new(MemoryChannel::new(16));
        let mut engine = engine_with(channel.clone());
        let task = engine.create_task(NewTask::new("offline")).unwrap();

        engine.connect().await.unwrap();

        let sent = channel.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], OutboundEvent::SyncRequest);
        assert!(matches!(&sent[1], OutboundEvent::TaskCreated(t) if t.id == task.id));
        assert!(engine.outbox().is_empty());
        assert!(engine.connection_status().connected);
    }

    #[tokio::test]
    async fn failed_connect_is_recorded() {
        let channel = Arc::new(MemoryChannel::unreachable(16));
        let mut engine = engine_with(channel.clone());

        assert!(engine.connect().await.is_err());
        let status = engine.connection_status();
        assert!(!status.connected);
        assert!(status.last_error.is_some());

        channel.set_reachable(true);
        engine.connect().await.unwrap();
        assert_eq!(engine.connection_status().last_error, None);
    }

    #[tokio::test]
    async fn flush_failure_keeps_local_state() {
        let channel = Arc::new(MemoryChannel::new(16));
        let mut engine = engine_with(channel.clone());
        engine.connect().await.unwrap();
        channel.set_fail_sends(true);

        let task = engine.create_task(NewTask::new("t")).unwrap();
        assert_eq!(engine.flush_outbox().await, 0);

        assert!(engine.store().contains(&task.id));
        assert!(engine.outbox().contains_task(&task.id));
        assert!(engine.connection_status().last_error.is_some());
    }
}

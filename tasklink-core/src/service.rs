//! Serialized sync service
//!
//! One tokio task owns the reconciliation engine and the command router.
//! Inbound events and local commands are taken one at a time, so no two
//! mutations of the store ever interleave. Callers talk to the service
//! through a cloneable [`SyncHandle`].
//!
//! ```text
//!  SyncChannel ───mpsc──────┐
//!                           ├──► SyncService ──► ReconciliationEngine ──► TaskStore
//!  SyncHandle ────mpsc──────┘         │                    └─► Outbox ──► SyncChannel
//!                                     └────► CommandRouter ──► Collaborators
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentRegistry};
use crate::channel::SyncChannel;
use crate::collab::Collaborators;
use crate::config::SyncConfig;
use crate::engine::{ConnectionStatus, ReconciliationEngine};
use crate::error::{ChannelError, TaskError, TaskLinkError, TaskLinkResult};
use crate::events::{InboundEvent, Routed};
use crate::router::CommandRouter;
use crate::task::{NewTask, Task, TaskFilter, TaskMessage, TaskPatch};

type Reply<T> = oneshot::Sender<T>;

/// Local commands queued for the service
enum Command {
    CreateTask(NewTask, Reply<Result<Task, TaskError>>),
    UpdateTask(TaskPatch, Reply<TaskLinkResult<Task>>),
    AssignTask {
        task_id: String,
        agent_id: String,
        reply: Reply<TaskLinkResult<Task>>,
    },
    CompleteTask {
        task_id: String,
        success: bool,
        reply: Reply<Result<Task, TaskError>>,
    },
    SendMessage {
        task_id: String,
        text: String,
        reply: Reply<Result<TaskMessage, TaskError>>,
    },
    Tasks(TaskFilter, Reply<Vec<Task>>),
    Task(String, Reply<Option<Task>>),
    Messages(String, Reply<Vec<TaskMessage>>),
    Agents(Reply<Vec<Agent>>),
    Status(Reply<ConnectionStatus>),
    Reconnect(Reply<Result<(), ChannelError>>),
    Shutdown,
}

/// Owner of all sync state
pub struct SyncService {
    channel: Arc<dyn SyncChannel>,
    engine: ReconciliationEngine,
    router: CommandRouter,
    inbound: Option<mpsc::Receiver<InboundEvent>>,
    commands: mpsc::Receiver<Command>,
}

impl SyncService {
    /// Build the service and its handle without starting it
    ///
    /// The inbound subscription is taken here, so events the channel
    /// delivers from now on are not missed.
    pub fn new(
        channel: Arc<dyn SyncChannel>,
        agents: AgentRegistry,
        collaborators: Collaborators,
        config: SyncConfig,
    ) -> (Self, SyncHandle) {
        let (tx, commands) = mpsc::channel(config.capacity());
        let router = CommandRouter::new(channel.clone(), collaborators, config.request_timeout());
        let engine = ReconciliationEngine::new(channel.clone(), agents, config);
        let inbound = Some(channel.subscribe());
        let service = Self {
            channel,
            engine,
            router,
            inbound,
            commands,
        };
        (service, SyncHandle { tx })
    }

    /// Start the service on the tokio runtime
    pub fn spawn(
        channel: Arc<dyn SyncChannel>,
        agents: AgentRegistry,
        collaborators: Collaborators,
        config: SyncConfig,
    ) -> (SyncHandle, JoinHandle<()>) {
        let (service, handle) = Self::new(channel, agents, collaborators, config);
        (handle, tokio::spawn(service.run()))
    }

    /// Connect, then process inbound events and local commands until shutdown
    pub async fn run(mut self) {
        if self.engine.connect().await.is_err() {
            info!("Remote agent unavailable, running local-only");
        }

        loop {
            tokio::select! {
                // Events that already arrived are reconciled before the
                // next local command
                biased;
                received = next_inbound(&mut self.inbound) => match received {
                    Some(event) => self.handle_inbound(event).await,
                    None => {
                        self.engine.record_failure(&ChannelError::Closed);
                        warn!("Inbound stream closed, continuing local-only");
                        self.inbound = None;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
            }

            self.engine.flush_outbox().await;
            if self.router.unanswered() > 0 && self.channel.is_connected() {
                self.router.resend_unanswered().await;
            }
        }

        info!("Sync service stopped");
    }

    async fn handle_inbound(&mut self, event: InboundEvent) {
        debug!(event = event.name(), "Inbound event");
        match event.route() {
            Routed::Sync(event) => {
                // Rejections are logged by the engine
                let _ = self.engine.apply(event);
            }
            Routed::Request(request) => {
                if let Err(e) = self.router.handle(request).await {
                    debug!(error = %e, "Request not dispatched");
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        // A dropped reply only means the caller stopped waiting
        match command {
            Command::CreateTask(task, reply) => {
                let _ = reply.send(self.engine.create_task(task));
            }
            Command::UpdateTask(patch, reply) => {
                let _ = reply.send(self.engine.update_task(patch));
            }
            Command::AssignTask {
                task_id,
                agent_id,
                reply,
            } => {
                let _ = reply.send(self.engine.assign_task(&task_id, &agent_id));
            }
            Command::CompleteTask {
                task_id,
                success,
                reply,
            } => {
                let _ = reply.send(self.engine.complete_task(&task_id, success));
            }
            Command::SendMessage {
                task_id,
                text,
                reply,
            } => {
                let _ = reply.send(self.engine.send_message(&task_id, &text));
            }
            Command::Tasks(filter, reply) => {
                let tasks = self.engine.store().filter(&filter).into_iter().cloned().collect();
                let _ = reply.send(tasks);
            }
            Command::Task(id, reply) => {
                let _ = reply.send(self.engine.store().get(&id).cloned());
            }
            Command::Messages(task_id, reply) => {
                let _ = reply.send(self.engine.store().messages(&task_id).to_vec());
            }
            Command::Agents(reply) => {
                let _ = reply.send(self.engine.agents().list().to_vec());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.engine.connection_status());
            }
            Command::Reconnect(reply) => {
                let _ = reply.send(self.reconnect().await);
            }
            Command::Shutdown => {}
        }
    }

    async fn reconnect(&mut self) -> Result<(), ChannelError> {
        if self.inbound.is_none() {
            self.inbound = Some(self.channel.subscribe());
        }
        self.engine.connect().await?;
        let resent = self.router.resend_unanswered().await;
        if resent > 0 {
            debug!(resent, "Re-sent request responses");
        }
        Ok(())
    }
}

async fn next_inbound(
    inbound: &mut Option<mpsc::Receiver<InboundEvent>>,
) -> Option<InboundEvent> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a running [`SyncService`]
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<Command>,
}

impl SyncHandle {
    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> TaskLinkResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| TaskLinkError::ServiceStopped)?;
        rx.await.map_err(|_| TaskLinkError::ServiceStopped)
    }

    /// Create a local task; it is in the store when this returns
    pub async fn create_task(&self, task: NewTask) -> TaskLinkResult<Task> {
        Ok(self.call(|reply| Command::CreateTask(task, reply)).await??)
    }

    /// Shallow-merge fields into an existing task
    pub async fn update_task(&self, patch: TaskPatch) -> TaskLinkResult<Task> {
        self.call(|reply| Command::UpdateTask(patch, reply)).await?
    }

    pub async fn assign_task(&self, task_id: &str, agent_id: &str) -> TaskLinkResult<Task> {
        self.call(|reply| Command::AssignTask {
            task_id: task_id.to_string(),
            agent_id: agent_id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn complete_task(&self, task_id: &str, success: bool) -> TaskLinkResult<Task> {
        Ok(self
            .call(|reply| Command::CompleteTask {
                task_id: task_id.to_string(),
                success,
                reply,
            })
            .await??)
    }

    /// Append a local comment to a task's thread
    pub async fn send_message(&self, task_id: &str, text: &str) -> TaskLinkResult<TaskMessage> {
        Ok(self
            .call(|reply| Command::SendMessage {
                task_id: task_id.to_string(),
                text: text.to_string(),
                reply,
            })
            .await??)
    }

    /// Tasks matching the filter, most recent first
    pub async fn tasks(&self, filter: TaskFilter) -> TaskLinkResult<Vec<Task>> {
        self.call(|reply| Command::Tasks(filter, reply)).await
    }

    pub async fn task(&self, id: &str) -> TaskLinkResult<Option<Task>> {
        self.call(|reply| Command::Task(id.to_string(), reply)).await
    }

    /// A task's thread, oldest first
    pub async fn messages(&self, task_id: &str) -> TaskLinkResult<Vec<TaskMessage>> {
        self.call(|reply| Command::Messages(task_id.to_string(), reply))
            .await
    }

    pub async fn agents(&self) -> TaskLinkResult<Vec<Agent>> {
        self.call(Command::Agents).await
    }

    pub async fn connection_status(&self) -> TaskLinkResult<ConnectionStatus> {
        self.call(Command::Status).await
    }

    /// Re-initialize the channel, resync and flush pending pushes
    pub async fn reconnect(&self) -> TaskLinkResult<()> {
        Ok(self.call(Command::Reconnect).await??)
    }

    /// Stop the service after the commands queued before this one
    pub async fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            debug!("Sync service already stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::collab::{CommandExecutor, CommandOutput, DiffViewer, EditorSurface};
    use crate::error::CollaboratorError;
    use crate::events::{OutboundEvent, TaskCompleted};
    use crate::task::TaskStatus;
    use async_trait::async_trait;

    struct Accepting;

    #[async_trait]
    impl EditorSurface for Accepting {
        async fn open_file(&self, _: &str, _: Option<&str>) -> Result<(), CollaboratorError> {
            Ok(())
        }

        async fn apply_edits(
            &self,
            _: &str,
            _: &serde_json::Value,
            _: Option<&str>,
        ) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    #[async_trait]
    impl CommandExecutor for Accepting {
        async fn run(&self, _: &str, _: Option<&str>) -> Result<CommandOutput, CollaboratorError> {
            Ok(CommandOutput::default())
        }
    }

    #[async_trait]
    impl DiffViewer for Accepting {
        async fn show_diff(&self, _: &str, _: &str, _: Option<&str>) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    fn accepting() -> Collaborators {
        Collaborators {
            editor: Arc::new(Accepting),
            executor: Arc::new(Accepting),
            diff_view: Arc::new(Accepting),
        }
    }

    fn spawn(channel: Arc<MemoryChannel>) -> (SyncHandle, JoinHandle<()>) {
        SyncService::spawn(
            channel,
            AgentRegistry::with_defaults(),
            accepting(),
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn service_connects_and_requests_resync() {
        let channel = Arc::new(MemoryChannel::new(16));
        let (handle, join) = spawn(channel.clone());

        let status = handle.connection_status().await.unwrap();

        assert!(status.connected);
        assert_eq!(channel.sent().await.first(), Some(&OutboundEvent::SyncRequest));
        handle.shutdown().await;
        join.await.unwrap();
    }

    #[tokio::test]
    async fn local_commands_apply_in_order() {
        let channel = Arc::new(MemoryChannel::new(16));
        let (handle, join) = spawn(channel.clone());

        let task = handle.create_task(NewTask::new("ship it")).await.unwrap();
        handle.assign_task(&task.id, "claude").await.unwrap();
        handle.send_message(&task.id, "starting").await.unwrap();
        let done = handle.complete_task(&task.id, true).await.unwrap();

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(handle.messages(&task.id).await.unwrap().len(), 1);
        assert_eq!(
            handle
                .tasks(TaskFilter::Status(TaskStatus::Completed))
                .await
                .unwrap()
                .len(),
            1
        );
        handle.shutdown().await;
        join.await.unwrap();
    }

    #[tokio::test]
    async fn inbound_events_reach_the_store() {
        let channel = Arc::new(MemoryChannel::new(16));
        let (handle, join) = spawn(channel.clone());
        handle.connection_status().await.unwrap();

        channel
            .inject_frame(r#"{"type":"task_created","data":{"id":"t1","title":"remote"}}"#)
            .await
            .unwrap();
        channel
            .inject(InboundEvent::TaskCompleted(TaskCompleted {
                id: "t1".to_string(),
                success: true,
            }))
            .await;

        let task = handle.task("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, Some(100));
        handle.shutdown().await;
        join.await.unwrap();
    }

    #[tokio::test]
    async fn closed_inbound_degrades_to_local_only() {
        let channel = Arc::new(MemoryChannel::new(16));
        let (handle, join) = spawn(channel.clone());
        handle.connection_status().await.unwrap();

        channel.close_inbound();
        let task = handle.create_task(NewTask::new("after close")).await.unwrap();

        let status = handle.connection_status().await.unwrap();
        assert_eq!(status.last_error, Some(ChannelError::Closed.to_string()));
        assert_eq!(handle.task(&task.id).await.unwrap(), Some(task));
        handle.shutdown().await;
        join.await.unwrap();
    }

    #[tokio::test]
    async fn handle_reports_stopped_service() {
        let channel = Arc::new(MemoryChannel::new(16));
        let (handle, join) = spawn(channel);
        handle.shutdown().await;
        join.await.unwrap();

        let result = handle.tasks(TaskFilter::All).await;

        assert!(matches!(result, Err(TaskLinkError::ServiceStopped)));
    }

    #[tokio::test]
    async fn local_only_until_reconnect() {
        let channel = Arc::new(MemoryChannel::unreachable(16));
        let (handle, join) = spawn(channel.clone());

        let task = handle.create_task(NewTask::new("offline")).await.unwrap();
        let status = handle.connection_status().await.unwrap();
        assert!(!status.connected);
        assert!(status.last_error.is_some());
        assert!(channel.sent().await.is_empty());

        channel.set_reachable(true);
        handle.reconnect().await.unwrap();
        // Any command is processed after the reconnect completes
        handle.connection_status().await.unwrap();

        let created: Vec<_> = channel
            .sent()
            .await
            .into_iter()
            .filter(|e| matches!(e, OutboundEvent::TaskCreated(t) if t.id == task.id))
            .collect();
        assert_eq!(created.len(), 1);
        handle.shutdown().await;
        join.await.unwrap();
    }
}

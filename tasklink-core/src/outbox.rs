//! Outbox of local changes awaiting delivery to the remote agent
//!
//! Local mutations are applied to the store first and queued here. A
//! flush sends queued entries in order and stops at the first failure,
//! leaving the rest queued. Entries are keyed by task or message id, so
//! queueing the same change twice sends it once, and re-sending after a
//! failure is harmless because the remote agent merges by id.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::channel::SyncChannel;
use crate::error::ChannelError;
use crate::events::OutboundEvent;
use crate::task::{TaskMessage, TaskStore};

/// How a queued task is announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushKind {
    Create,
    Update,
}

/// One queued change
#[derive(Debug, Clone, PartialEq)]
pub enum OutboxEntry {
    /// Send the task's state as of flush time
    Task { id: String, kind: PushKind },
    Message(TaskMessage),
}

/// Ordered, de-duplicated queue of pending pushes
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    entries: VecDeque<OutboxEntry>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task push
    ///
    /// An already queued create stays a create, since it will carry the
    /// latest state anyway.
    pub fn queue_task(&mut self, id: &str, kind: PushKind) {
        let existing = self.entries.iter_mut().find_map(|entry| match entry {
            OutboxEntry::Task { id: queued, kind } if queued == id => Some(kind),
            _ => None,
        });
        match existing {
            Some(queued) => {
                if *queued == PushKind::Update {
                    *queued = kind;
                }
            }
            None => self.entries.push_back(OutboxEntry::Task {
                id: id.to_string(),
                kind,
            }),
        }
    }

    /// Queue a message push
    pub fn queue_message(&mut self, message: TaskMessage) {
        let queued = self
            .entries
            .iter()
            .any(|entry| matches!(entry, OutboxEntry::Message(m) if m.id == message.id));
        if !queued {
            self.entries.push_back(OutboxEntry::Message(message));
        }
    }

    pub fn contains_task(&self, id: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, OutboxEntry::Task { id: queued, .. } if queued == id))
    }

    pub fn entries(&self) -> impl Iterator<Item = &OutboxEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Send queued entries in order
    ///
    /// Returns how many were sent. On failure the failed entry and
    /// everything after it stay queued.
    pub async fn flush(
        &mut self,
        store: &TaskStore,
        channel: &dyn SyncChannel,
    ) -> Result<usize, ChannelError> {
        let mut sent = 0;
        while let Some(entry) = self.entries.front() {
            let event = match entry {
                OutboxEntry::Task { id, kind } => match store.get(id) {
                    Some(task) if *kind == PushKind::Create => OutboundEvent::TaskCreated(task.clone()),
                    Some(task) => OutboundEvent::TaskUpdated(task.clone()),
                    None => {
                        warn!(task_id = %id, "Dropping outbox entry for unknown task");
                        self.entries.pop_front();
                        continue;
                    }
                },
                OutboxEntry::Message(message) => OutboundEvent::TaskMessage(message.clone()),
            };

            channel.emit(event).await?;
            self.entries.pop_front();
            sent += 1;
        }
        if sent > 0 {
            debug!(sent, "Flushed outbox");
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::task::{NewTask, TaskPatch};

    fn store_with_task(title: &str) -> (TaskStore, String) {
        let mut store = TaskStore::new();
        let task = NewTask::new(title).into_task();
        let id = task.id.clone();
        store.create(task).unwrap();
        (store, id)
    }

    async fn connected_channel() -> MemoryChannel {
        let channel = MemoryChannel::new(16);
        channel.initialize().await.unwrap();
        channel
    }

    // ==================== Queue Tests ====================

    #[test]
    fn queue_task_deduplicates_by_id() {
        let mut outbox = Outbox::new();
        outbox.queue_task("t1", PushKind::Create);
        outbox.queue_task("t1", PushKind::Update);
        outbox.queue_task("t1", PushKind::Update);

        assert_eq!(outbox.len(), 1);
        assert_eq!(
            outbox.entries().next(),
            Some(&OutboxEntry::Task {
                id: "t1".to_string(),
                kind: PushKind::Create
            })
        );
    }

    #[test]
    fn queue_update_then_create_becomes_create() {
        let mut outbox = Outbox::new();
        outbox.queue_task("t1", PushKind::Update);
        outbox.queue_task("t1", PushKind::Create);

        assert!(matches!(
            outbox.entries().next(),
            Some(OutboxEntry::Task { kind: PushKind::Create, .. })
        ));
    }

    #[test]
    fn queue_message_deduplicates_by_message_id() {
        let mut outbox = Outbox::new();
        let message = TaskMessage::local("t1", "hello");
        outbox.queue_message(message.clone());
        outbox.queue_message(message);

        assert_eq!(outbox.len(), 1);
        assert!(!outbox.contains_task("t1"));
    }

    // ==================== Flush Tests ====================

    #[tokio::test]
    async fn flush_sends_latest_task_state() {
        let (mut store, id) = store_with_task("draft");
        let channel = connected_channel().await;
        let mut outbox = Outbox::new();
        outbox.queue_task(&id, PushKind::Create);

        store
            .update(&id, &TaskPatch::new(&id).title("final"))
            .unwrap();
        let sent = outbox.flush(&store, &channel).await.unwrap();

        assert_eq!(sent, 1);
        assert!(outbox.is_empty());
        match &channel.sent().await[0] {
            OutboundEvent::TaskCreated(task) => assert_eq!(task.title, "final"),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn flush_keeps_entries_on_failure() {
        let (store, id) = store_with_task("t");
        let channel = MemoryChannel::new(16);
        let mut outbox = Outbox::new();
        outbox.queue_task(&id, PushKind::Create);
        outbox.queue_message(TaskMessage::local(&id, "note"));

        let result = outbox.flush(&store, &channel).await;

        assert_eq!(result, Err(ChannelError::NotConnected));
        assert_eq!(outbox.len(), 2);
    }

    #[tokio::test]
    async fn flush_retry_sends_once() {
        let (store, id) = store_with_task("t");
        let channel = connected_channel().await;
        channel.set_fail_sends(true);
        let mut outbox = Outbox::new();
        outbox.queue_task(&id, PushKind::Create);

        assert!(outbox.flush(&store, &channel).await.is_err());
        outbox.queue_task(&id, PushKind::Update);
        channel.set_fail_sends(false);
        assert_eq!(outbox.flush(&store, &channel).await.unwrap(), 1);

        let sent = channel.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name(), "task_created");
    }

    #[tokio::test]
    async fn flush_drops_entries_for_unknown_tasks() {
        let store = TaskStore::new();
        let channel = connected_channel().await;
        let mut outbox = Outbox::new();
        outbox.queue_task("ghost", PushKind::Update);

        assert_eq!(outbox.flush(&store, &channel).await.unwrap(), 0);
        assert!(outbox.is_empty());
    }
}

//! Replay a recorded session against a local sync service.
//!
//! The input holds one inbound wire frame per line. Blank lines and
//! lines starting with `#` are ignored; frames that fail to decode are
//! logged and skipped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tasklink_core::{
    ConnectionStatus, MemoryChannel, OutboundEvent, SyncService, Task, TaskFilter, TaskStatus,
};
use tracing::{debug, warn};

use crate::collaborators;
use crate::config::{ConfigLoader, TaskLinkConfig};

/// Replay arguments.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// File with one inbound frame per line
    pub file: PathBuf,

    /// Keep the remote agent unreachable for the whole replay
    #[arg(long)]
    pub offline: bool,
}

/// What a replay left behind
#[derive(Debug)]
pub struct ReplayReport {
    pub tasks: Vec<Task>,
    pub sent: Vec<OutboundEvent>,
    pub status: ConnectionStatus,
    pub skipped: usize,
}

/// Run replay command.
pub async fn run(args: ReplayArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let frames = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let capacity = config.sync.capacity();
    let channel = Arc::new(if args.offline {
        MemoryChannel::unreachable(capacity)
    } else {
        MemoryChannel::new(capacity)
    });

    let report = replay(&frames, channel, &config).await?;
    print_report(&report)
}

/// Feed frames through a fresh service, one at a time
pub async fn replay(
    frames: &str,
    channel: Arc<MemoryChannel>,
    config: &TaskLinkConfig,
) -> Result<ReplayReport> {
    let (handle, join) = SyncService::spawn(
        channel.clone(),
        config.registry(),
        collaborators::from_config(&config.commands),
        config.sync.clone(),
    );
    // Returns once the service has finished connecting
    handle.connection_status().await?;

    let mut skipped = 0;
    for (index, line) in frames.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match channel.inject_frame(line).await {
            Ok(_) => {
                debug!(line = index + 1, "Frame delivered");
                // Wait for the frame to be reconciled before sending the next
                handle.connection_status().await?;
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping frame");
                skipped += 1;
            }
        }
    }

    let tasks = handle.tasks(TaskFilter::All).await?;
    let status = handle.connection_status().await?;
    handle.shutdown().await;
    join.await.context("Sync service panicked")?;

    Ok(ReplayReport {
        tasks,
        sent: channel.take_sent().await,
        status,
        skipped,
    })
}

fn print_report(report: &ReplayReport) -> Result<()> {
    if report.tasks.is_empty() {
        println!("No tasks.");
    } else {
        println!("{}", tasks_table(&report.tasks));
    }

    match (report.status.connected, &report.status.last_error) {
        (true, _) => println!("Remote sync: connected"),
        (false, Some(error)) => println!("Remote sync unavailable: {}", error),
        (false, None) => println!("Remote sync unavailable"),
    }
    if report.skipped > 0 {
        println!("Skipped {} undecodable frame(s)", report.skipped);
    }

    if !report.sent.is_empty() {
        println!();
        println!("Outbound frames:");
        for event in &report.sent {
            println!("{}", event.encode()?);
        }
    }
    Ok(())
}

pub fn tasks_table(tasks: &[Task]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Title").fg(Color::Cyan),
        Cell::new("Status").fg(Color::Cyan),
        Cell::new("Priority").fg(Color::Cyan),
        Cell::new("Agent").fg(Color::Cyan),
        Cell::new("Progress").fg(Color::Cyan),
        Cell::new("Source").fg(Color::Cyan),
    ]);

    for task in tasks {
        let status_color = match task.status {
            TaskStatus::Pending => Color::Yellow,
            TaskStatus::InProgress => Color::Blue,
            TaskStatus::Completed => Color::Green,
            TaskStatus::Blocked => Color::Red,
        };
        let progress = task
            .progress
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&task.id),
            Cell::new(&task.title),
            Cell::new(task.status).fg(status_color),
            Cell::new(format!("{:?}", task.priority).to_lowercase()),
            Cell::new(task.assigned_agent.as_deref().unwrap_or("-")),
            Cell::new(progress),
            Cell::new(format!("{:?}", task.source).to_lowercase()),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use tasklink_core::ResponseStatus;

    const SESSION: &str = r#"
# remote agent session
{"type":"task_created","data":{"id":"t1","title":"Fix login","priority":"high"}}
{"type":"task_assigned","data":{"id":"t1","assignedAgent":"claude"}}
{"type":"run_command_request","data":{"request_id":"r1","command":"git status","task_id":"t1"}}
{"type":"not_an_event","data":{}}
{"type":"task_completed","data":{"id":"t1"}}
"#;

    #[tokio::test]
    async fn replay_applies_frames_in_order() {
        let channel = Arc::new(MemoryChannel::new(16));

        let report = replay(SESSION, channel, &TaskLinkConfig::default())
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].status, TaskStatus::Completed);
        assert_eq!(report.tasks[0].assigned_agent.as_deref(), Some("claude"));
        assert!(report.status.connected);
    }

    #[tokio::test]
    async fn replay_answers_with_shell_disabled() {
        let channel = Arc::new(MemoryChannel::new(16));

        let report = replay(SESSION, channel, &TaskLinkConfig::default())
            .await
            .unwrap();

        let answers: Vec<_> = report
            .sent
            .iter()
            .filter_map(|e| match e {
                OutboundEvent::RequestResponse(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].request_id, "r1");
        assert_eq!(answers[0].response, ResponseStatus::Error);
        assert!(answers[0].message.contains("disabled"));
    }

    #[tokio::test]
    async fn offline_replay_sends_nothing() {
        let channel = Arc::new(MemoryChannel::unreachable(16));

        let report = replay(SESSION, channel, &TaskLinkConfig::default())
            .await
            .unwrap();

        assert!(report.sent.is_empty());
        assert!(!report.status.connected);
        assert!(report.status.last_error.is_some());
        assert_eq!(report.tasks.len(), 1);
    }

    #[test]
    fn table_shows_task_rows() {
        let task = tasklink_core::NewTask::new("Write docs").into_task();

        let rendered = tasks_table(std::slice::from_ref(&task)).to_string();

        assert!(rendered.contains("Write docs"));
        assert!(rendered.contains("pending"));
        assert!(rendered.contains("local"));
    }
}

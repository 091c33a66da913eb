//! Local collaborators for the command line
//!
//! There is no editor or diff view in a terminal session, so those
//! requests are recorded in the log. Shell commands run for real, but
//! only when `commands.allow_shell` is enabled.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tasklink_core::{
    CollaboratorError, Collaborators, CommandExecutor, CommandOutput, DiffViewer, EditorSurface,
};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::CommandsConfig;

/// Build the collaborator set for a configuration
pub fn from_config(config: &CommandsConfig) -> Collaborators {
    Collaborators {
        editor: Arc::new(LoggingEditor),
        executor: Arc::new(ShellExecutor::new(
            config.allow_shell,
            config.working_dir.clone(),
        )),
        diff_view: Arc::new(LoggingDiffView),
    }
}

/// Editor surface that logs requests
pub struct LoggingEditor;

#[async_trait]
impl EditorSurface for LoggingEditor {
    async fn open_file(&self, path: &str, task_id: Option<&str>) -> Result<(), CollaboratorError> {
        info!(path, task_id, "Open file requested");
        Ok(())
    }

    async fn apply_edits(
        &self,
        path: &str,
        changes: &serde_json::Value,
        task_id: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        let edits = changes.as_array().map_or(1, Vec::len);
        info!(path, task_id, edits, "Edit requested");
        Ok(())
    }
}

/// Diff view that logs the size of each side
pub struct LoggingDiffView;

#[async_trait]
impl DiffViewer for LoggingDiffView {
    async fn show_diff(
        &self,
        before: &str,
        after: &str,
        file_path: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        info!(
            file_path,
            before_lines = before.lines().count(),
            after_lines = after.lines().count(),
            "Diff requested"
        );
        Ok(())
    }
}

/// Runs commands through `sh -c`
pub struct ShellExecutor {
    enabled: bool,
    default_dir: Option<PathBuf>,
}

impl ShellExecutor {
    pub fn new(enabled: bool, default_dir: Option<PathBuf>) -> Self {
        Self {
            enabled,
            default_dir,
        }
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn run(
        &self,
        command: &str,
        working_dir: Option<&str>,
    ) -> Result<CommandOutput, CollaboratorError> {
        if !self.enabled {
            debug!(command, "Refusing shell command");
            return Err(CollaboratorError::Disabled("Shell execution".to_string()));
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command).kill_on_drop(true);
        if let Some(dir) = working_dir.map(PathBuf::from).or_else(|| self.default_dir.clone()) {
            cmd.current_dir(dir);
        }

        info!(command, "Running shell command");
        let output = cmd
            .output()
            .await
            .map_err(|e| CollaboratorError::Failed(format!("Failed to spawn shell: {}", e)))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

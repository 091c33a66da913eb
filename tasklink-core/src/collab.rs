//! Local collaborators driven by the command router
//!
//! The editing surface, command execution and diff view live outside
//! the core; the router only sees these traits.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// The text editing surface
#[async_trait]
pub trait EditorSurface: Send + Sync {
    /// Open a file, optionally in the context of a task
    async fn open_file(&self, path: &str, task_id: Option<&str>) -> Result<(), CollaboratorError>;

    /// Apply an edit set to a file
    async fn apply_edits(
        &self,
        path: &str,
        changes: &serde_json::Value,
        task_id: Option<&str>,
    ) -> Result<(), CollaboratorError>;
}

/// Captured result of a command run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs shell-like commands on behalf of the remote agent
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(
        &self,
        command: &str,
        working_dir: Option<&str>,
    ) -> Result<CommandOutput, CollaboratorError>;
}

/// Shows a before/after comparison
#[async_trait]
pub trait DiffViewer: Send + Sync {
    async fn show_diff(
        &self,
        before: &str,
        after: &str,
        file_path: Option<&str>,
    ) -> Result<(), CollaboratorError>;
}

/// The set of collaborators handed to the command router
#[derive(Clone)]
pub struct Collaborators {
    pub editor: Arc<dyn EditorSurface>,
    pub executor: Arc<dyn CommandExecutor>,
    pub diff_view: Arc<dyn DiffViewer>,
}

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tasklink_core::{Agent, AgentKind, AgentRegistry, SyncConfig};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTaskLinkConfig {
    #[serde(default)]
    pub sync: RawSyncConfig,

    #[serde(default)]
    pub commands: RawCommandsConfig,

    /// Replaces the built-in agent catalog when set
    #[serde(default)]
    pub agents: Option<Vec<AgentEntry>>,
}

/// Sync settings as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSyncConfig {
    pub channel_capacity: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub push_local_changes: Option<bool>,
}

/// Command settings as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawCommandsConfig {
    pub allow_shell: Option<bool>,
    pub working_dir: Option<PathBuf>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TaskLinkConfig {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub commands: CommandsConfig,

    /// Empty means the built-in catalog
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentEntry>,
}

impl TaskLinkConfig {
    /// Agent registry for this configuration
    pub fn registry(&self) -> AgentRegistry {
        if self.agents.is_empty() {
            AgentRegistry::with_defaults()
        } else {
            AgentRegistry::from_catalog(self.agents.iter().cloned().map(AgentEntry::into_agent))
        }
    }
}

/// How agent-initiated commands are executed
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CommandsConfig {
    /// Run `run_command_request`s through `sh -c`; refused when false
    #[serde(default)]
    pub allow_shell: bool,

    /// Directory used when a request names none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

/// One agent of a configured catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Completion history to start from
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub successes: u32,
}

impl AgentEntry {
    pub fn into_agent(self) -> Agent {
        Agent::new(self.id, self.name, self.kind)
            .with_capabilities(self.capabilities)
            .with_performance(self.completed, self.successes)
    }
}

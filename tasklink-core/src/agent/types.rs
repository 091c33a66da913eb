//! Agent type definitions

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Agent kind classification
///
/// Identifies which family of worker an agent belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// General purpose coding assistant
    Claude,
    /// Long-context reasoning model
    Kimi,
    /// Tool and command execution agent
    Command,
    /// Workflow orchestration agent
    Workflow,
    /// Expert review and analysis agent
    Expert,
    /// The remote coding agent the task list is synchronized with
    ClaudeCode,
    /// A human collaborator
    Human,
}

/// Whether an agent can currently take work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Online,
    Offline,
}

/// Completion counters for an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Performance {
    /// Number of finished tasks
    pub completed: u32,
    /// Number of finished tasks that succeeded
    #[serde(default)]
    pub successes: u32,
    /// `round(successes / completed * 100)`, 0 when nothing completed
    pub success_rate: u8,
}

impl Performance {
    /// Create counters from a completion history
    pub fn new(completed: u32, successes: u32) -> Self {
        let successes = successes.min(completed);
        Self {
            completed,
            successes,
            success_rate: rate(successes, completed),
        }
    }

    /// Record one finished task and recompute the success rate
    pub fn record(&mut self, success: bool) {
        self.completed += 1;
        if success {
            self.successes += 1;
        }
        self.success_rate = rate(self.successes, self.completed);
    }
}

fn rate(successes: u32, completed: u32) -> u8 {
    if completed == 0 {
        return 0;
    }
    (f64::from(successes) / f64::from(completed) * 100.0).round() as u8
}

/// A collaborating worker, human or automated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Id of the task the agent is working on (weak reference)
    #[serde(default)]
    pub current_task: Option<String>,
    #[serde(default)]
    pub performance: Performance,
}

impl Agent {
    /// Create an online agent with no history
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            status: AgentStatus::Online,
            capabilities: BTreeSet::new(),
            current_task: None,
            performance: Performance::default(),
        }
    }

    /// Add capabilities
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Seed the completion history
    pub fn with_performance(mut self, completed: u32, successes: u32) -> Self {
        self.performance = Performance::new(completed, successes);
        self
    }

    /// The built-in agent catalog, in display order
    pub fn defaults() -> Vec<Self> {
        vec![
            Agent::new("claude", "Claude", AgentKind::Claude)
                .with_capabilities(["code generation", "code review", "documentation", "debugging"])
                .with_performance(20, 19),
            Agent::new("kimi_k2", "Kimi K2", AgentKind::Kimi)
                .with_capabilities([
                    "chinese processing",
                    "complex reasoning",
                    "data analysis",
                    "creative writing",
                ])
                .with_performance(25, 23),
            Agent::new("command_mcp", "Command MCP", AgentKind::Command)
                .with_capabilities([
                    "command execution",
                    "system administration",
                    "tool calls",
                    "automation",
                ])
                .with_performance(50, 49),
            Agent::new("zen_workflow", "Zen Workflow", AgentKind::Workflow)
                .with_capabilities([
                    "workflow orchestration",
                    "task scheduling",
                    "state management",
                    "monitoring",
                ])
                .with_performance(8, 8),
            Agent::new("xmasters", "X-Masters", AgentKind::Expert)
                .with_capabilities([
                    "expert analysis",
                    "quality assurance",
                    "performance tuning",
                    "architecture",
                ])
                .with_performance(6, 6),
            Agent::new("claude_code", "Claude Code", AgentKind::ClaudeCode)
                .with_capabilities([
                    "project management",
                    "code generation",
                    "automated development",
                    "task coordination",
                ])
                .with_performance(25, 24),
        ]
    }
}

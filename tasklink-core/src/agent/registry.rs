//! Agent registry
//!
//! The AgentRegistry is the catalog of collaborating agents:
//! - Ordered listing (catalog order is preserved)
//! - Lookup and filtering by status
//! - Runtime bookkeeping of status, current task and performance
//!
//! The registry only mutates its own state; it never touches tasks.

use tracing::debug;

use super::types::{Agent, AgentStatus, Performance};
use crate::error::AgentError;

/// Ordered catalog of agents keyed by id
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a catalog, skipping duplicate ids
    pub fn from_catalog(catalog: impl IntoIterator<Item = Agent>) -> Self {
        let mut registry = Self::new();
        for agent in catalog {
            if let Err(e) = registry.register(agent) {
                debug!(error = %e, "Skipping catalog entry");
            }
        }
        registry
    }

    /// Create a registry holding the built-in catalog
    pub fn with_defaults() -> Self {
        Self::from_catalog(Agent::defaults())
    }

    /// Add an agent at the end of the catalog
    pub fn register(&mut self, agent: Agent) -> Result<(), AgentError> {
        if self.get(&agent.id).is_some() {
            return Err(AgentError::AlreadyRegistered(agent.id));
        }
        self.agents.push(agent);
        Ok(())
    }

    /// All agents in catalog order
    pub fn list(&self) -> &[Agent] {
        &self.agents
    }

    /// Get an agent by id
    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Whether an agent with this id exists
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Agents with the given status, in catalog order
    pub fn by_status(&self, status: AgentStatus) -> Vec<&Agent> {
        self.agents.iter().filter(|a| a.status == status).collect()
    }

    pub fn set_status(&mut self, id: &str, status: AgentStatus) -> Result<(), AgentError> {
        self.get_mut(id)?.status = status;
        Ok(())
    }

    /// Point the agent at a task, or clear it with `None`
    pub fn set_current_task(&mut self, id: &str, task_id: Option<String>) -> Result<(), AgentError> {
        self.get_mut(id)?.current_task = task_id;
        Ok(())
    }

    /// Count one finished task and recompute the success rate
    pub fn record_completion(&mut self, id: &str, success: bool) -> Result<Performance, AgentError> {
        let agent = self.get_mut(id)?;
        agent.performance.record(success);
        debug!(
            agent_id = id,
            completed = agent.performance.completed,
            success_rate = agent.performance.success_rate,
            "Recorded completion"
        );
        Ok(agent.performance)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Agent, AgentError> {
        self.agents
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AgentError::NotFound(id.to_string()))
    }
}

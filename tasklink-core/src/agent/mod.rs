//! Agent catalog
//!
//! This module provides the collaborating agents the task list refers to:
//! - Agent identity, kind, capabilities and performance counters
//! - The ordered registry with runtime bookkeeping

pub mod registry;
pub mod types;

pub use registry::AgentRegistry;
pub use types::{Agent, AgentKind, AgentStatus, Performance};

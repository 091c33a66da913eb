pub mod agents;
pub mod config;
pub mod replay;

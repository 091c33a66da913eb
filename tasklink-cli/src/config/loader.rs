use super::types::{
    CommandsConfig, RawCommandsConfig, RawSyncConfig, RawTaskLinkConfig, TaskLinkConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tasklink_core::SyncConfig;
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<TaskLinkConfig> {
        let mut raw = RawTaskLinkConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::load_file(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::load_file(&project_path)?);
        }

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tasklink").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TASKLINK_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TASKLINK_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".tasklink/config.toml")
        }
    }

    /// Parse one config layer
    pub fn load_file(path: &Path) -> Result<RawTaskLinkConfig> {
        debug!(path = %path.display(), "Loading config layer");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawTaskLinkConfig, overlay: RawTaskLinkConfig) -> RawTaskLinkConfig {
        RawTaskLinkConfig {
            sync: RawSyncConfig {
                channel_capacity: overlay.sync.channel_capacity.or(base.sync.channel_capacity),
                request_timeout_secs: overlay
                    .sync
                    .request_timeout_secs
                    .or(base.sync.request_timeout_secs),
                push_local_changes: overlay
                    .sync
                    .push_local_changes
                    .or(base.sync.push_local_changes),
            },
            commands: RawCommandsConfig {
                allow_shell: overlay.commands.allow_shell.or(base.commands.allow_shell),
                working_dir: overlay.commands.working_dir.or(base.commands.working_dir),
            },
            agents: overlay.agents.or(base.agents),
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawTaskLinkConfig) -> TaskLinkConfig {
        let defaults = SyncConfig::default();
        TaskLinkConfig {
            sync: SyncConfig {
                channel_capacity: raw.sync.channel_capacity.unwrap_or(defaults.channel_capacity),
                request_timeout_secs: raw
                    .sync
                    .request_timeout_secs
                    .or(defaults.request_timeout_secs),
                push_local_changes: raw
                    .sync
                    .push_local_changes
                    .unwrap_or(defaults.push_local_changes),
            },
            commands: CommandsConfig {
                allow_shell: raw.commands.allow_shell.unwrap_or(false),
                working_dir: raw.commands.working_dir,
            },
            agents: raw.agents.unwrap_or_default(),
        }
    }
}

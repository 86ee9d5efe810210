//! Relay Config - supervisor and logging settings
//!
//! Every field is optional so that a project file can override a single
//! value from the global file. Defaults are applied by the consumer.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Config file name (in both the global and the project store)
pub const RELAY_CONFIG_FILE: &str = "relay.json";

/// relay configuration as stored on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// Rolling buffer capacity per stream, in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_buffer_chars: Option<usize>,

    /// Delay between the graceful and the forced termination signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_period_ms: Option<u64>,

    /// Characters of output shown in status summaries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_tail_chars: Option<usize>,

    /// Shell used to run commands (`sh` / `cmd` when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,

    /// Signal the whole process group instead of the shell only (Unix)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_process_group: Option<bool>,

    /// Default tracing filter for the binary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Global config merged with the current project's config
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<RelayConfig>(RELAY_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        let project = JsonStore::current_project()?;
        if let Some(project_config) = project.load_optional::<RelayConfig>(RELAY_CONFIG_FILE)? {
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Load from a single store, defaults when the file is absent
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        Ok(store
            .load_optional::<RelayConfig>(RELAY_CONFIG_FILE)?
            .unwrap_or_default())
    }

    pub fn save_to(&self, store: &JsonStore) -> Result<()> {
        store.save(RELAY_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Merge another config into this one (`other` wins)
    pub fn merge(&mut self, other: RelayConfig) {
        if other.max_buffer_chars.is_some() {
            self.max_buffer_chars = other.max_buffer_chars;
        }
        if other.grace_period_ms.is_some() {
            self.grace_period_ms = other.grace_period_ms;
        }
        if other.summary_tail_chars.is_some() {
            self.summary_tail_chars = other.summary_tail_chars;
        }
        if other.shell.is_some() {
            self.shell = other.shell;
        }
        if other.kill_process_group.is_some() {
            self.kill_process_group = other.kill_process_group;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_other_wins() {
        let mut base = RelayConfig {
            grace_period_ms: Some(2000),
            shell: Some("/bin/sh".to_string()),
            ..Default::default()
        };
        base.merge(RelayConfig {
            grace_period_ms: Some(500),
            ..Default::default()
        });

        assert_eq!(base.grace_period_ms, Some(500));
        assert_eq!(base.shell.as_deref(), Some("/bin/sh"));
    }

    #[test]
    fn test_camel_case_file() {
        let config: RelayConfig =
            serde_json::from_str(r#"{"maxBufferChars": 100, "killProcessGroup": false}"#).unwrap();
        assert_eq!(config.max_buffer_chars, Some(100));
        assert_eq!(config.kill_process_group, Some(false));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_save_and_load_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());

        assert_eq!(RelayConfig::load_from(&store).unwrap(), RelayConfig::default());

        let config = RelayConfig {
            summary_tail_chars: Some(80),
            ..Default::default()
        };
        config.save_to(&store).unwrap();
        assert_eq!(RelayConfig::load_from(&store).unwrap(), config);
    }
}

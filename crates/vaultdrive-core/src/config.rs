//! Mapping-set configuration
//!
//! Typed structs that map to the YAML mapping file the sync engine supplies
//! on every change, with loading, validation, and defaults. The stack
//! factories consume a validated [`AdapterConfig`] and rebuild the composite
//! clients from it; nothing here is mutated after load.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::root::RootId;

/// Errors produced while loading or validating the mapping configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid mapping set: {0}")]
    Invalid(String),
}

/// Top-level adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// One entry per sync root.
    pub mappings: Vec<MappingConfig>,
    #[serde(default)]
    pub tuning: TuningConfig,
}

/// One sync-root mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Identifier upper layers address this root by; must be >= 1 and unique.
    pub root_id: RootId,
    /// Absolute local anchor directory.
    pub local_path: PathBuf,
    /// Volume the anchor lives on.
    pub volume_id: String,
    /// Event/move scope; roots sharing a scope share a watcher.
    pub scope: String,
    /// Register the root for on-demand (placeholder) files.
    #[serde(default)]
    pub on_demand: bool,
    /// Disabled mappings keep their root id but get no stack.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Reject every mutating operation on this root.
    #[serde(default)]
    pub read_only: bool,
    /// Keep a backup of the previous content on every overwrite.
    #[serde(default)]
    pub backup_writes: bool,
    /// Project a single remote file as this root's only entry.
    #[serde(default)]
    pub virtual_file: Option<VirtualFileConfig>,
}

/// Projection of one real file as a pseudo-root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualFileConfig {
    /// Root-relative path of the real parent directory.
    pub parent_path: String,
    /// Fixed name of the projected file.
    pub file_name: String,
}

/// Adapter tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningConfig {
    /// Name of the per-volume trash directory used for soft deletes.
    pub trash_dir_name: String,
    /// Capacity of the bounded OS hydration-demand channel.
    pub demand_channel_capacity: usize,
    /// Capacity of the per-subscriber event channel.
    pub event_channel_capacity: usize,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            trash_dir_name: ".vaultdrive-trash".to_string(),
            demand_channel_capacity: 64,
            event_channel_capacity: 1024,
        }
    }
}

fn default_true() -> bool {
    true
}

impl AdapterConfig {
    /// Load and validate a configuration file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(
            mappings = config.mappings.len(),
            path = %path.display(),
            "mapping set loaded"
        );
        Ok(config)
    }

    /// Validate the mapping set.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for default/duplicate root ids or
    /// relative local paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for mapping in &self.mappings {
            if mapping.root_id.is_unassigned() {
                return Err(ConfigError::Invalid(format!(
                    "mapping for {} uses the unassigned root id",
                    mapping.local_path.display()
                )));
            }
            if !seen.insert(mapping.root_id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate root id {}",
                    mapping.root_id
                )));
            }
            if !mapping.local_path.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "local path must be absolute: {}",
                    mapping.local_path.display()
                )));
            }
        }
        Ok(())
    }

    /// The enabled mappings, in declaration order.
    pub fn enabled_mappings(&self) -> impl Iterator<Item = &MappingConfig> {
        self.mappings.iter().filter(|m| m.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(id: u64, path: &str) -> MappingConfig {
        MappingConfig {
            root_id: RootId::new(id),
            local_path: PathBuf::from(path),
            volume_id: "vol-1".to_string(),
            scope: "scope-a".to_string(),
            on_demand: false,
            enabled: true,
            read_only: false,
            backup_writes: false,
            virtual_file: None,
        }
    }

    #[test]
    fn test_validate_accepts_wellformed() {
        let config = AdapterConfig {
            mappings: vec![mapping(1, "/home/user/Vault"), mapping(2, "/mnt/usb/Vault")],
            tuning: TuningConfig::default(),
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unassigned_root_id() {
        let config = AdapterConfig {
            mappings: vec![mapping(0, "/home/user/Vault")],
            tuning: TuningConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_root_id() {
        let config = AdapterConfig {
            mappings: vec![mapping(1, "/a"), mapping(1, "/b")],
            tuning: TuningConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_path() {
        let config = AdapterConfig {
            mappings: vec![mapping(1, "relative/path")],
            tuning: TuningConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_enabled_mappings_filters() {
        let mut disabled = mapping(2, "/b");
        disabled.enabled = false;
        let config = AdapterConfig {
            mappings: vec![mapping(1, "/a"), disabled],
            tuning: TuningConfig::default(),
        };
        let enabled: Vec<_> = config.enabled_mappings().collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].root_id, RootId::new(1));
    }

    #[test]
    fn test_yaml_roundtrip_with_defaults() {
        let yaml = r#"
mappings:
  - root_id: 1
    local_path: /home/user/Vault
    volume_id: vol-1
    scope: scope-a
    on_demand: true
  - root_id: 2
    local_path: /mnt/usb/Vault
    volume_id: vol-2
    scope: scope-b
    read_only: true
"#;
        let config: AdapterConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.mappings.len(), 2);
        assert!(config.mappings[0].on_demand);
        assert!(config.mappings[0].enabled);
        assert!(config.mappings[1].read_only);
        assert_eq!(config.tuning.trash_dir_name, ".vaultdrive-trash");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let err = AdapterConfig::load(Path::new("/nonexistent/mappings.yaml"));
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }
}

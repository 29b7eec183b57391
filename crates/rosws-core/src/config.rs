use crate::CoreError;
use rosws_schema::{ConditionContext, PackageName, ProjectId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Per-user workspace settings, stored as TOML.
///
/// ```toml
/// auto_resolve = true
/// rosdistro = "noetic"
/// remote_index = "/home/me/.cache/rosws/remote.json"
/// checked_out = ["42"]
/// default_packages = ["my_robot_bringup"]
///
/// [conditions]
/// ROS_VERSION = "1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Pick among ambiguous remote projects without asking.
    #[serde(default)]
    pub auto_resolve: bool,
    #[serde(default = "default_rosdep_command")]
    pub rosdep_command: String,
    #[serde(default)]
    pub rosdistro: Option<String>,
    /// Remote project index produced by the crawler.
    #[serde(default)]
    pub remote_index: Option<PathBuf>,
    /// Remote projects already cloned into the workspace.
    #[serde(default)]
    pub checked_out: Vec<ProjectId>,
    /// Packages resolved when none are named on the command line.
    #[serde(default)]
    pub default_packages: Vec<PackageName>,
    /// Variables for `condition` attributes, layered over the environment.
    #[serde(default)]
    pub conditions: BTreeMap<String, String>,
}

fn default_rosdep_command() -> String {
    "rosdep".to_owned()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            auto_resolve: false,
            rosdep_command: default_rosdep_command(),
            rosdistro: None,
            remote_index: None,
            checked_out: Vec::new(),
            default_packages: Vec::new(),
            conditions: BTreeMap::new(),
        }
    }
}

impl WorkspaceConfig {
    /// Load config from `~/.config/rosws/config.toml`, or defaults if absent.
    pub fn load_default() -> Result<Self, CoreError> {
        let path = default_config_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            CoreError::Config(format!("invalid config {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Condition variables from the environment, overridden by `conditions`.
    pub fn condition_context(&self) -> ConditionContext {
        let mut ctx = ConditionContext::from_env();
        if let Some(distro) = &self.rosdistro {
            ctx.set("ROS_DISTRO", distro.as_str());
        }
        for (key, value) in &self.conditions {
            ctx.set(key.as_str(), value.as_str());
        }
        ctx
    }
}

pub fn default_config_path() -> Result<PathBuf, CoreError> {
    let home = std::env::var("HOME").map_err(|_| CoreError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/rosws/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut config = WorkspaceConfig {
            auto_resolve: true,
            rosdistro: Some("noetic".to_owned()),
            checked_out: vec![ProjectId::from("42")],
            ..WorkspaceConfig::default()
        };
        config
            .conditions
            .insert("ROS_VERSION".to_owned(), "1".to_owned());
        config.save(&path).unwrap();

        let loaded = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        let loaded = WorkspaceConfig::load(&path).unwrap();
        assert_eq!(loaded.rosdep_command, "rosdep");
        assert!(!loaded.auto_resolve);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "auto_resolv = true\n").unwrap();
        assert!(matches!(
            WorkspaceConfig::load(&path),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn conditions_override_rosdistro() {
        let mut config = WorkspaceConfig {
            rosdistro: Some("noetic".to_owned()),
            ..WorkspaceConfig::default()
        };
        let ctx = config.condition_context();
        assert_eq!(ctx.get("ROS_DISTRO"), Some("noetic"));

        config
            .conditions
            .insert("ROS_DISTRO".to_owned(), "humble".to_owned());
        assert_eq!(config.condition_context().get("ROS_DISTRO"), Some("humble"));
    }
}

use crate::{SysdepError, SystemOracle, SystemResolution};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A static system dependency oracle loaded from a TOML rule table.
///
/// ```toml
/// installed = ["libboost-dev"]
///
/// [rules.boost]
/// installer = "apt"
/// packages = ["libboost-dev"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleTable {
    #[serde(default)]
    pub rules: BTreeMap<String, SystemResolution>,
    /// System packages treated as already installed on the host.
    #[serde(default)]
    pub installed: BTreeSet<String>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(input: &str) -> Result<Self, SysdepError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, SysdepError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[must_use]
    pub fn with_rule(mut self, name: &str, installer: &str, packages: &[&str]) -> Self {
        self.rules.insert(
            name.to_owned(),
            SystemResolution {
                installer: installer.to_owned(),
                packages: packages.iter().map(|p| (*p).to_owned()).collect(),
            },
        );
        self
    }

    #[must_use]
    pub fn with_installed(mut self, packages: &[&str]) -> Self {
        self.installed.extend(packages.iter().map(|p| (*p).to_owned()));
        self
    }
}

impl SystemOracle for RuleTable {
    fn resolve(&self, name: &str) -> Result<SystemResolution, SysdepError> {
        self.rules
            .get(name)
            .cloned()
            .ok_or_else(|| SysdepError::NotFound(name.to_owned()))
    }

    fn query_installed(
        &self,
        _installer: &str,
        packages: &[String],
    ) -> Result<BTreeSet<String>, SysdepError> {
        Ok(packages
            .iter()
            .filter(|p| self.installed.contains(*p))
            .cloned()
            .collect())
    }
}

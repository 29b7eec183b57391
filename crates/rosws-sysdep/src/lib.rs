//! System dependency oracle for rosws.
//!
//! This crate answers the resolver's questions about OS-level packages: whether a
//! dependency name has a system package rule, which installer provides it, and
//! whether those packages are already installed on the host. `RosdepOracle`
//! shells out to `rosdep` with per-name memoization; `RuleTable` is a static
//! TOML-backed oracle for offline use and tests.

pub mod host;
pub mod prereq;
pub mod rosdep;
pub mod rules;

pub use host::install_command;
pub use prereq::{check_rosdep_prereqs, format_missing, MissingPrereq};
pub use rosdep::RosdepOracle;
pub use rules::RuleTable;

use rosws_schema::PackageName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SysdepError {
    #[error("no system package rule for '{0}'")]
    NotFound(String),
    #[error("system dependency database unavailable: {0}")]
    Unavailable(String),
    #[error("rosdep failed for '{name}': {message}")]
    Failed { name: String, message: String },
    #[error("sysdep I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid rule table: {0}")]
    Rules(#[from] toml::de::Error),
    #[error("installed package query failed: {0}")]
    Query(String),
}

/// How a dependency name maps onto OS packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemResolution {
    /// rosdep installer id, e.g. `apt`, `dnf`, `pip`.
    pub installer: String,
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Source of truth for system (OS-level) dependencies.
///
/// Implementations are constructed by the caller and passed to the resolver.
pub trait SystemOracle: Send + Sync {
    /// Resolve a dependency name; unknown names yield [`SysdepError::NotFound`].
    fn resolve(&self, name: &str) -> Result<SystemResolution, SysdepError>;

    /// Ask the host which of `packages` (all for `installer`) are installed.
    fn query_installed(
        &self,
        installer: &str,
        packages: &[String],
    ) -> Result<BTreeSet<String>, SysdepError>;

    fn contains(&self, name: &str) -> Result<bool, SysdepError> {
        match self.resolve(name) {
            Ok(_) => Ok(true),
            Err(SysdepError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Dependency names whose system packages are all installed already.
    fn installed(&self, names: &[PackageName]) -> Result<BTreeSet<PackageName>, SysdepError> {
        let mut by_installer: BTreeMap<String, Vec<(&PackageName, Vec<String>)>> = BTreeMap::new();
        for name in names {
            let res = self.resolve(name)?;
            by_installer
                .entry(res.installer)
                .or_default()
                .push((name, res.packages));
        }

        let mut installed = BTreeSet::new();
        for (installer, entries) in by_installer {
            let mut wanted: Vec<String> = entries.iter().flat_map(|(_, p)| p.clone()).collect();
            wanted.sort();
            wanted.dedup();
            let present = self.query_installed(&installer, &wanted)?;
            for (name, packages) in entries {
                if packages.iter().all(|p| present.contains(p)) {
                    installed.insert(name.clone());
                }
            }
        }
        Ok(installed)
    }
}

impl<T: SystemOracle + ?Sized> SystemOracle for &T {
    fn resolve(&self, name: &str) -> Result<SystemResolution, SysdepError> {
        (**self).resolve(name)
    }

    fn query_installed(
        &self,
        installer: &str,
        packages: &[String],
    ) -> Result<BTreeSet<String>, SysdepError> {
        (**self).query_installed(installer, packages)
    }
}

impl<T: SystemOracle + ?Sized> SystemOracle for Box<T> {
    fn resolve(&self, name: &str) -> Result<SystemResolution, SysdepError> {
        (**self).resolve(name)
    }

    fn query_installed(
        &self,
        installer: &str,
        packages: &[String],
    ) -> Result<BTreeSet<String>, SysdepError> {
        (**self).query_installed(installer, packages)
    }
}

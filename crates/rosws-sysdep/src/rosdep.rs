use crate::{host, SysdepError, SystemOracle, SystemResolution};
use std::collections::{BTreeSet, HashMap};
use std::process::Command;
use std::sync::Mutex;
use tracing::{debug, trace};

/// System dependency oracle backed by the `rosdep` command line tool.
///
/// Every lookup spawns `rosdep resolve`, which loads the whole rule database,
/// so results (including "no rule") are memoized per dependency name for the
/// lifetime of the oracle.
pub struct RosdepOracle {
    program: String,
    leading_args: Vec<String>,
    rosdistro: Option<String>,
    cache: Mutex<HashMap<String, Option<SystemResolution>>>,
}

impl Default for RosdepOracle {
    fn default() -> Self {
        Self::new("rosdep")
    }
}

impl RosdepOracle {
    /// `command` may carry leading arguments, e.g. `"python3 -m rosdep2"`.
    pub fn new(command: &str) -> Self {
        let mut words = command.split_whitespace().map(str::to_owned);
        let program = words.next().unwrap_or_else(|| "rosdep".to_owned());
        Self {
            program,
            leading_args: words.collect(),
            rosdistro: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_rosdistro(mut self, rosdistro: &str) -> Self {
        self.rosdistro = Some(rosdistro.to_owned());
        self
    }

    fn cached(&self, name: &str) -> Result<Option<Option<SystemResolution>>, SysdepError> {
        let cache = self
            .cache
            .lock()
            .map_err(|e| SysdepError::Query(format!("cache mutex poisoned: {e}")))?;
        Ok(cache.get(name).cloned())
    }

    fn store(&self, name: &str, value: Option<SystemResolution>) -> Result<(), SysdepError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| SysdepError::Query(format!("cache mutex poisoned: {e}")))?;
        cache.insert(name.to_owned(), value);
        Ok(())
    }

    fn run_resolve(&self, name: &str) -> Result<Option<SystemResolution>, SysdepError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).arg("resolve").arg(name);
        if let Some(distro) = &self.rosdistro {
            cmd.arg("--rosdistro").arg(distro);
        }
        debug!("rosdep resolve {name}");
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SysdepError::Unavailable(format!("'{}' is not installed", self.program))
            } else {
                SysdepError::Io(e)
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.success() {
            return parse_resolve_output(&stdout)
                .map(Some)
                .ok_or_else(|| SysdepError::Failed {
                    name: name.to_owned(),
                    message: format!("unexpected rosdep output: {}", stdout.trim()),
                });
        }

        let message = stderr.trim();
        if is_missing_rule(message) {
            trace!("rosdep has no rule for {name}");
            Ok(None)
        } else if is_uninitialized(message) {
            Err(SysdepError::Unavailable(first_line(message).to_owned()))
        } else {
            Err(SysdepError::Failed {
                name: name.to_owned(),
                message: first_line(message).to_owned(),
            })
        }
    }
}

impl SystemOracle for RosdepOracle {
    fn resolve(&self, name: &str) -> Result<SystemResolution, SysdepError> {
        let resolved = match self.cached(name)? {
            Some(hit) => hit,
            None => {
                let fresh = self.run_resolve(name)?;
                self.store(name, fresh.clone())?;
                fresh
            }
        };
        resolved.ok_or_else(|| SysdepError::NotFound(name.to_owned()))
    }

    fn query_installed(
        &self,
        installer: &str,
        packages: &[String],
    ) -> Result<BTreeSet<String>, SysdepError> {
        match host::installer_package_manager(installer) {
            Some(pkg_manager) => host::query_installed(pkg_manager, packages),
            None => Ok(BTreeSet::new()),
        }
    }
}

/// Parse `rosdep resolve` output: a `#<installer>` header followed by the
/// system package names, whitespace or newline separated.
pub fn parse_resolve_output(output: &str) -> Option<SystemResolution> {
    let mut lines = output.lines().map(str::trim).skip_while(|l| !l.starts_with('#'));
    let installer = lines.next()?.trim_start_matches('#').trim().to_owned();
    if installer.is_empty() {
        return None;
    }
    let packages = lines
        .take_while(|l| !l.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(str::to_owned)
        .collect();
    Some(SystemResolution {
        installer,
        packages,
    })
}

fn is_missing_rule(stderr: &str) -> bool {
    stderr.contains("no rosdep rule")
        || stderr.contains("Cannot locate rosdep definition")
        || stderr.contains("No definition of")
}

fn is_uninitialized(stderr: &str) -> bool {
    stderr.contains("not been initialized") || stderr.contains("rosdep update")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

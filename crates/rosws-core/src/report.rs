use crate::resolver::{PackageSource, Resolution};
use crate::CoreError;
use rosws_index::{PackageIndex, RemoteProject};
use rosws_schema::{PackageName, ProjectId};
use rosws_sysdep::{install_command, SysdepError, SystemOracle};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

/// One installer invocation that would provide a group of system dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallSuggestion {
    pub installer: String,
    /// Dependency names covered by this suggestion.
    pub dependencies: Vec<PackageName>,
    /// OS package names to install.
    pub packages: Vec<String>,
    /// Ready-to-run command line; empty for installers without a known command.
    pub command: Vec<String>,
}

impl fmt::Display for InstallSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.command.is_empty() {
            write!(f, "{}: {}", self.installer, self.packages.join(" "))
        } else {
            write!(f, "{}", self.command.join(" "))
        }
    }
}

/// Group system dependencies into one suggestion per installer.
///
/// With `missing_only`, dependencies whose packages are all installed already
/// are left out.
pub fn install_suggestions(
    system_depends: &BTreeSet<PackageName>,
    oracle: &dyn SystemOracle,
    missing_only: bool,
) -> Result<Vec<InstallSuggestion>, SysdepError> {
    let names: Vec<PackageName> = system_depends.iter().cloned().collect();
    let installed = if missing_only {
        oracle.installed(&names)?
    } else {
        BTreeSet::new()
    };

    let mut grouped: BTreeMap<String, (Vec<PackageName>, Vec<String>)> = BTreeMap::new();
    for name in names.into_iter().filter(|n| !installed.contains(n)) {
        let resolution = oracle.resolve(&name)?;
        let (deps, packages) = grouped.entry(resolution.installer).or_default();
        deps.push(name);
        for pkg in resolution.packages {
            if !packages.contains(&pkg) {
                packages.push(pkg);
            }
        }
    }

    Ok(grouped
        .into_iter()
        .map(|(installer, (dependencies, packages))| InstallSuggestion {
            command: install_command(&installer, &packages),
            installer,
            dependencies,
            packages,
        })
        .collect())
}

/// Remote projects that have to be cloned, in remote index order.
pub fn projects_to_clone<'a>(
    resolution: &Resolution<'a>,
    index: &'a PackageIndex,
) -> Vec<&'a RemoteProject> {
    let selected = resolution.selected_projects();
    index
        .projects()
        .iter()
        .filter(|p| selected.contains(&p.id))
        .collect()
}

/// Render conflicts as plain text, one block per package.
pub fn format_conflicts(conflicts: &BTreeMap<PackageName, Vec<String>>) -> String {
    let mut out = String::new();
    for (name, reasons) in conflicts {
        let _ = writeln!(out, "{name}:");
        for reason in reasons {
            let _ = writeln!(out, "  - {reason}");
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteSelection {
    pub package: PackageName,
    pub project: ProjectId,
    /// Package path inside the project checkout.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloneTarget {
    pub id: ProjectId,
    pub url: String,
    /// Packages the clone makes available, required or not.
    pub packages: Vec<PackageName>,
}

/// Owned, serializable summary of a resolution, ready for printing or JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionReport {
    pub workspace: Vec<PackageName>,
    pub remote: Vec<RemoteSelection>,
    pub projects_to_clone: Vec<CloneTarget>,
    pub system_depends: Vec<PackageName>,
    pub install: Vec<InstallSuggestion>,
    pub conflicts: BTreeMap<PackageName, Vec<String>>,
}

impl ResolutionReport {
    /// Build the report; install suggestions are only computed when the
    /// resolution has no conflicts.
    pub fn build(
        resolution: &Resolution<'_>,
        index: &PackageIndex,
        oracle: &dyn SystemOracle,
        missing_only: bool,
    ) -> Result<Self, CoreError> {
        let mut workspace = Vec::new();
        let mut remote = Vec::new();
        for (name, source) in &resolution.depends {
            match source {
                PackageSource::Workspace(_) => workspace.push(name.clone()),
                PackageSource::Remote(pkg) => remote.push(RemoteSelection {
                    package: name.clone(),
                    project: pkg.project.clone(),
                    path: pkg.path.clone(),
                }),
            }
        }

        let selected = resolution.selected_projects();
        let projects_to_clone = index
            .projects()
            .iter()
            .filter(|p| selected.contains(&p.id))
            .map(|p| CloneTarget {
                id: p.id.clone(),
                url: p.url.clone(),
                packages: p.package_names().cloned().collect(),
            })
            .collect();

        let install = if resolution.is_resolved() {
            install_suggestions(&resolution.system_depends, oracle, missing_only)?
        } else {
            Vec::new()
        };

        Ok(Self {
            workspace,
            remote,
            projects_to_clone,
            system_depends: resolution.system_depends.iter().cloned().collect(),
            install,
            conflicts: resolution.conflicts.clone(),
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn ensure_resolved(&self) -> Result<(), CoreError> {
        if self.is_resolved() {
            Ok(())
        } else {
            Err(CoreError::Unresolved(self.conflicts.len()))
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use rosws_index::WorkspacePackage;
    use rosws_schema::PackageManifest;
    use rosws_sysdep::RuleTable;

    fn manifest(name: &str, deps: &[&str]) -> PackageManifest {
        PackageManifest::new(name).with_depends(deps.iter().copied())
    }

    fn oracle() -> RuleTable {
        RuleTable::new()
            .with_rule("boost", "apt", &["libboost-dev"])
            .with_rule("eigen", "apt", &["libeigen3-dev"])
            .with_rule("numpy", "pip", &["numpy"])
            .with_rule("opencv", "apt", &["libopencv-dev", "libboost-dev"])
            .with_installed(&["libeigen3-dev"])
    }

    fn all(names: &[&str]) -> BTreeSet<PackageName> {
        names.iter().map(|n| PackageName::from(*n)).collect()
    }

    #[test]
    fn suggestions_group_by_installer() {
        let suggestions =
            install_suggestions(&all(&["boost", "eigen", "numpy", "opencv"]), &oracle(), false)
                .unwrap();
        assert_eq!(suggestions.len(), 2);

        let apt = &suggestions[0];
        assert_eq!(apt.installer, "apt");
        assert_eq!(
            apt.packages,
            vec!["libboost-dev", "libeigen3-dev", "libopencv-dev"]
        );
        assert_eq!(&apt.command[..3], &["sudo", "apt-get", "install"]);
        assert_eq!(suggestions[1].installer, "pip");
    }

    #[test]
    fn missing_only_skips_installed() {
        let suggestions =
            install_suggestions(&all(&["boost", "eigen"]), &oracle(), true).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].dependencies, vec![PackageName::from("boost")]);
    }

    #[test]
    fn nothing_missing_yields_no_suggestions() {
        let suggestions = install_suggestions(&all(&["eigen"]), &oracle(), true).unwrap();
        assert!(suggestions.is_empty());
    }

    #[test]
    fn unknown_installer_displays_package_list() {
        let suggestion = InstallSuggestion {
            installer: "nix".to_owned(),
            dependencies: vec![PackageName::from("boost")],
            packages: vec!["boost".to_owned()],
            command: Vec::new(),
        };
        assert_eq!(suggestion.to_string(), "nix: boost");
    }

    #[test]
    fn conflicts_render_grouped() {
        let mut conflicts = BTreeMap::new();
        conflicts.insert(
            PackageName::from("ghost"),
            vec!["not found".to_owned(), "required by 'app'".to_owned()],
        );
        let text = format_conflicts(&conflicts);
        assert_eq!(text, "ghost:\n  - not found\n  - required by 'app'\n");
    }

    #[test]
    fn report_partitions_and_serializes() {
        let mut builder = PackageIndex::builder();
        builder
            .add_workspace_package(WorkspacePackage::new(manifest("app", &["boost"]), "src/app"))
            .unwrap();
        let index = builder.build();
        let oracle = oracle();
        let resolution = resolve(["app"], &index, &oracle).unwrap();

        let report = ResolutionReport::build(&resolution, &index, &oracle, false).unwrap();
        assert_eq!(report.workspace, vec![PackageName::from("app")]);
        assert!(report.remote.is_empty());
        assert_eq!(report.install.len(), 1);
        report.ensure_resolved().unwrap();

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["system_depends"][0], "boost");
        assert_eq!(json["install"][0]["installer"], "apt");
    }

    #[test]
    fn unresolved_report_skips_install_and_errors() {
        let mut builder = PackageIndex::builder();
        builder
            .add_workspace_package(WorkspacePackage::new(manifest("app", &["ghost"]), "src/app"))
            .unwrap();
        let index = builder.build();
        let oracle = oracle();
        let resolution = resolve(["app"], &index, &oracle).unwrap();

        let report = ResolutionReport::build(&resolution, &index, &oracle, false).unwrap();
        assert!(report.install.is_empty());
        assert!(matches!(
            report.ensure_resolved(),
            Err(CoreError::Unresolved(1))
        ));
    }
}

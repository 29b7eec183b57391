use crate::remote::{RemoteIndex, RemotePackage, RemoteProject};
use crate::workspace::WorkspacePackage;
use crate::IndexError;
use rosws_schema::{PackageName, ProjectId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Read-only view over workspace packages and remote projects.
///
/// Workspace package names are unique (enforced by [`PackageIndexBuilder`]).
/// Remote candidates for a name are returned in project insertion order.
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    workspace: BTreeMap<PackageName, WorkspacePackage>,
    projects: Vec<RemoteProject>,
    project_pos: BTreeMap<ProjectId, usize>,
    /// Package name -> (project position, package position).
    remote: BTreeMap<PackageName, Vec<(usize, usize)>>,
    workspace_projects: BTreeSet<ProjectId>,
}

impl PackageIndex {
    pub fn builder() -> PackageIndexBuilder {
        PackageIndexBuilder::default()
    }

    pub fn workspace_package(&self, name: &str) -> Option<&WorkspacePackage> {
        self.workspace.get(name)
    }

    pub fn workspace_packages(&self) -> impl Iterator<Item = &WorkspacePackage> {
        self.workspace.values()
    }

    pub fn is_workspace_package(&self, name: &str) -> bool {
        self.workspace.contains_key(name)
    }

    /// Remote packages named `name`, one per offering project, first-found first.
    pub fn remote_candidates(&self, name: &str) -> Vec<&RemotePackage> {
        self.remote
            .get(name)
            .map(|slots| {
                slots
                    .iter()
                    .map(|&(project, package)| &self.projects[project].packages[package])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remote_packages(&self) -> impl Iterator<Item = &RemotePackage> {
        self.projects.iter().flat_map(|p| p.packages.iter())
    }

    pub fn project(&self, id: &str) -> Option<&RemoteProject> {
        self.project_pos.get(id).map(|&pos| &self.projects[pos])
    }

    pub fn projects(&self) -> &[RemoteProject] {
        &self.projects
    }

    /// Whether the project is already checked out in the workspace.
    pub fn is_workspace_project(&self, id: &str) -> bool {
        self.workspace_projects.contains(id)
    }

    pub fn workspace_projects(&self) -> &BTreeSet<ProjectId> {
        &self.workspace_projects
    }

    /// Whether the name is provided by the workspace or any remote project.
    pub fn is_known(&self, name: &str) -> bool {
        self.workspace.contains_key(name) || self.remote.contains_key(name)
    }
}

/// Collects workspace packages and remote projects, rejecting duplicates.
#[derive(Debug, Default)]
pub struct PackageIndexBuilder {
    workspace: BTreeMap<PackageName, WorkspacePackage>,
    projects: Vec<RemoteProject>,
    workspace_projects: BTreeSet<ProjectId>,
}

impl PackageIndexBuilder {
    /// Add a workspace package. A second package with the same name is a fatal
    /// layout error that must be fixed before resolution can run.
    pub fn add_workspace_package(&mut self, pkg: WorkspacePackage) -> Result<(), IndexError> {
        if let Some(existing) = self.workspace.get(pkg.name()) {
            return Err(IndexError::DuplicatePackage {
                name: pkg.name().clone(),
                first: existing.path.clone(),
                second: pkg.path,
            });
        }
        self.workspace.insert(pkg.name().clone(), pkg);
        Ok(())
    }

    pub fn add_workspace_packages(
        &mut self,
        pkgs: impl IntoIterator<Item = WorkspacePackage>,
    ) -> Result<(), IndexError> {
        for pkg in pkgs {
            self.add_workspace_package(pkg)?;
        }
        Ok(())
    }

    pub fn add_remote_project(&mut self, project: RemoteProject) -> Result<(), IndexError> {
        if self.projects.iter().any(|p| p.id == project.id) {
            return Err(IndexError::DuplicateProject(project.id));
        }
        let mut seen = BTreeSet::new();
        for name in project.package_names() {
            if !seen.insert(name) {
                return Err(IndexError::DuplicateRemotePackage {
                    project: project.id.clone(),
                    name: name.clone(),
                });
            }
        }
        self.projects.push(project);
        Ok(())
    }

    pub fn add_remote_index(&mut self, index: RemoteIndex) -> Result<(), IndexError> {
        for project in index.projects {
            self.add_remote_project(project)?;
        }
        Ok(())
    }

    /// Record that a remote project is already checked out in the workspace.
    pub fn mark_workspace_project(&mut self, id: impl Into<ProjectId>) {
        self.workspace_projects.insert(id.into());
    }

    pub fn build(self) -> PackageIndex {
        let mut project_pos = BTreeMap::new();
        let mut remote: BTreeMap<PackageName, Vec<(usize, usize)>> = BTreeMap::new();
        for (pi, project) in self.projects.iter().enumerate() {
            project_pos.insert(project.id.clone(), pi);
            for (ki, pkg) in project.packages.iter().enumerate() {
                remote.entry(pkg.name().clone()).or_default().push((pi, ki));
            }
        }
        debug!(
            "package index: {} workspace packages, {} remote projects, {} remote package names",
            self.workspace.len(),
            self.projects.len(),
            remote.len()
        );
        PackageIndex {
            workspace: self.workspace,
            projects: self.projects,
            project_pos,
            remote,
            workspace_projects: self.workspace_projects,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosws_schema::PackageManifest;

    fn ws(name: &str, path: &str) -> WorkspacePackage {
        WorkspacePackage::new(PackageManifest::new(name), path)
    }

    #[test]
    fn duplicate_workspace_package_is_fatal() {
        let mut builder = PackageIndex::builder();
        builder.add_workspace_package(ws("alpha", "src/a")).unwrap();
        let err = builder
            .add_workspace_package(ws("alpha", "src/b"))
            .unwrap_err();
        match err {
            IndexError::DuplicatePackage {
                name,
                first,
                second,
            } => {
                assert_eq!(name, "alpha");
                assert_eq!(first, std::path::PathBuf::from("src/a"));
                assert_eq!(second, std::path::PathBuf::from("src/b"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_project_is_rejected() {
        let mut builder = PackageIndex::builder();
        builder.add_remote_project(RemoteProject::new("p", "")).unwrap();
        assert!(matches!(
            builder.add_remote_project(RemoteProject::new("p", "")),
            Err(IndexError::DuplicateProject(_))
        ));
    }

    #[test]
    fn project_with_repeated_package_is_rejected() {
        let project = RemoteProject::new("p", "")
            .with_package("a", PackageManifest::new("x"))
            .with_package("b", PackageManifest::new("x"));
        let mut builder = PackageIndex::builder();
        assert!(matches!(
            builder.add_remote_project(project),
            Err(IndexError::DuplicateRemotePackage { .. })
        ));
    }

    #[test]
    fn remote_candidates_keep_project_order() {
        let mut builder = PackageIndex::builder();
        builder
            .add_remote_project(
                RemoteProject::new("second", "").with_package("", PackageManifest::new("shared")),
            )
            .unwrap();
        builder
            .add_remote_project(
                RemoteProject::new("first", "")
                    .with_package("", PackageManifest::new("other"))
                    .with_package("", PackageManifest::new("shared")),
            )
            .unwrap();
        builder.mark_workspace_project("first");
        let index = builder.build();

        let candidates = index.remote_candidates("shared");
        let projects: Vec<_> = candidates.iter().map(|c| c.project.as_str()).collect();
        assert_eq!(projects, vec!["second", "first"]);
        assert!(index.remote_candidates("missing").is_empty());
        assert!(index.is_workspace_project("first"));
        assert!(!index.is_workspace_project("second"));
        assert_eq!(index.project("first").unwrap().packages.len(), 2);
        assert!(index.is_known("other"));
        assert!(!index.is_known("missing"));
    }
}

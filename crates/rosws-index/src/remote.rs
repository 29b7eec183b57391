use crate::IndexError;
use rosws_schema::{PackageManifest, PackageName, ProjectId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A package offered by a remote project, tagged with the project it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePackage {
    pub manifest: PackageManifest,
    /// Path of the package directory relative to the project root.
    #[serde(default)]
    pub path: String,
    /// Back-reference to the containing project, filled in on load.
    #[serde(skip)]
    pub project: ProjectId,
}

impl RemotePackage {
    pub fn name(&self) -> &PackageName {
        &self.manifest.name
    }
}

/// A clonable source-control project bundling one or more packages.
///
/// Cloning is all-or-nothing: selecting any package commits the workspace to
/// the whole project, which makes every sibling package available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub id: ProjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub packages: Vec<RemotePackage>,
}

impl RemoteProject {
    pub fn new(id: impl Into<ProjectId>, url: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            url: url.into(),
            packages: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_package(mut self, path: impl Into<String>, manifest: PackageManifest) -> Self {
        self.add_package(path, manifest);
        self
    }

    pub fn add_package(&mut self, path: impl Into<String>, manifest: PackageManifest) {
        self.packages.push(RemotePackage {
            manifest,
            path: path.into(),
            project: self.id.clone(),
        });
    }

    pub fn package_names(&self) -> impl Iterator<Item = &PackageName> {
        self.packages.iter().map(RemotePackage::name)
    }

    pub fn provides(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p.manifest.name == name)
    }

    /// Sibling package names this project shares with `other`.
    pub fn shared_packages<'a>(&'a self, other: &'a RemoteProject) -> Vec<&'a PackageName> {
        self.package_names()
            .filter(|name| other.provides(name))
            .collect()
    }

    /// Point every package back at this project.
    fn link_packages(&mut self) {
        for pkg in &mut self.packages {
            pkg.project = self.id.clone();
        }
    }
}

/// Snapshot of the remote projects known to the crawler, in crawl order.
///
/// Project order (and package order inside a project) is significant: it is the
/// "first found" order the resolver uses to break ties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIndex {
    #[serde(default)]
    pub projects: Vec<RemoteProject>,
}

impl RemoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, IndexError> {
        let mut index: Self = serde_json::from_slice(data)
            .map_err(|e| IndexError::Serialization(format!("invalid remote index: {e}")))?;
        for project in &mut index.projects {
            project.link_packages();
        }
        Ok(index)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        serde_json::to_vec_pretty(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn push(&mut self, project: RemoteProject) {
        self.projects.push(project);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RemoteIndex {
        let mut index = RemoteIndex::new();
        index.push(
            RemoteProject::new("gitlab/1", "https://gitlab.example.com/robots/drivers.git")
                .with_package(
                    "lidar",
                    PackageManifest::new("lidar_driver").with_depends(["roscpp"]),
                )
                .with_package("camera", PackageManifest::new("camera_driver")),
        );
        index.push(
            RemoteProject::new("gitlab/2", "https://gitlab.example.com/robots/msgs.git")
                .with_package("", PackageManifest::new("robot_msgs")),
        );
        index
    }

    #[test]
    fn packages_point_back_at_project() {
        let index = sample();
        for project in &index.projects {
            for pkg in &project.packages {
                assert_eq!(pkg.project, project.id);
            }
        }
    }

    #[test]
    fn load_relinks_projects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remote.json");
        sample().save(&path).unwrap();

        let loaded = RemoteIndex::load(&path).unwrap();
        assert_eq!(loaded, sample());
        assert_eq!(loaded.projects[0].packages[1].project, "gitlab/1");
    }

    #[test]
    fn minimal_json_is_accepted() {
        let json = br#"{"projects":[{"id":"hub/7","packages":[{"manifest":{"name":"solo"}}]}]}"#;
        let index = RemoteIndex::from_bytes(json).unwrap();
        let project = &index.projects[0];
        assert_eq!(project.packages[0].name(), "solo");
        assert_eq!(project.packages[0].project, "hub/7");
        assert!(project.url.is_empty());
    }

    #[test]
    fn invalid_json_is_a_serialization_error() {
        assert!(matches!(
            RemoteIndex::from_bytes(b"{not json"),
            Err(IndexError::Serialization(_))
        ));
    }

    #[test]
    fn shared_packages_between_projects() {
        let a = RemoteProject::new("a", "")
            .with_package("x", PackageManifest::new("x"))
            .with_package("y", PackageManifest::new("y"));
        let b = RemoteProject::new("b", "")
            .with_package("y", PackageManifest::new("y"))
            .with_package("z", PackageManifest::new("z"));
        assert_eq!(a.shared_packages(&b), vec!["y"]);
        assert!(a.provides("x"));
        assert!(!b.provides("x"));
    }
}

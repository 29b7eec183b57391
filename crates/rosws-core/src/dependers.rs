use rosws_index::PackageIndex;
use rosws_schema::{PackageManifest, PackageName};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// Result of [`find_dependers`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependers {
    /// Packages that directly or transitively depend on any of the input names.
    pub packages: BTreeSet<PackageName>,
    /// Input names unknown to the workspace and remote projects that some
    /// known manifest still declares as a dependency.
    pub system_only: BTreeSet<PackageName>,
}

/// Find every workspace or remote package that depends, directly or
/// transitively, on any of `names`.
///
/// A name present in the workspace is described by its workspace manifest
/// only; remote manifests for it are ignored, matching what the resolver
/// would use.
pub fn find_dependers<I, N>(names: I, index: &PackageIndex) -> Dependers
where
    I: IntoIterator<Item = N>,
    N: Into<PackageName>,
{
    let targets: BTreeSet<PackageName> = names.into_iter().map(Into::into).collect();

    let mut reverse: BTreeMap<&PackageName, BTreeSet<&PackageName>> = BTreeMap::new();
    for manifest in visible_manifests(index) {
        for dep in manifest.dependency_names() {
            reverse.entry(dep).or_default().insert(&manifest.name);
        }
    }

    let mut packages = BTreeSet::new();
    let mut queue: VecDeque<&PackageName> = targets.iter().collect();
    while let Some(name) = queue.pop_front() {
        let Some(direct) = reverse.get(name) else {
            continue;
        };
        for &depender in direct {
            if packages.insert(depender.clone()) {
                queue.push_back(depender);
            }
        }
    }

    let system_only = targets
        .iter()
        .filter(|name| !index.is_known(name) && reverse.contains_key(*name))
        .cloned()
        .collect();

    debug!(
        "{} depender(s) of {} package(s)",
        packages.len(),
        targets.len()
    );
    Dependers {
        packages,
        system_only,
    }
}

fn visible_manifests(index: &PackageIndex) -> impl Iterator<Item = &PackageManifest> {
    let workspace = index.workspace_packages().map(|pkg| &pkg.manifest);
    let remote = index
        .remote_packages()
        .filter(move |pkg| !index.is_workspace_package(pkg.name()))
        .map(|pkg| &pkg.manifest);
    workspace.chain(remote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosws_index::{RemoteProject, WorkspacePackage};

    fn manifest(name: &str, deps: &[&str]) -> PackageManifest {
        PackageManifest::new(name).with_depends(deps.iter().copied())
    }

    fn index() -> PackageIndex {
        let mut builder = PackageIndex::builder();
        for (name, deps) in [
            ("app", &["lib"][..]),
            ("lib", &["core", "boost"][..]),
            ("core", &[][..]),
            ("tool", &["app"][..]),
            ("unrelated", &[][..]),
        ] {
            builder
                .add_workspace_package(WorkspacePackage::new(manifest(name, deps), name))
                .unwrap();
        }
        builder
            .add_remote_project(
                RemoteProject::new("plugins", "https://example.com/plugins.git")
                    .with_package("viz", manifest("viz", &["app"]))
                    .with_package("core", manifest("core", &["unrelated"])),
            )
            .unwrap();
        builder.build()
    }

    fn names(set: &BTreeSet<PackageName>) -> Vec<&str> {
        set.iter().map(PackageName::as_str).collect()
    }

    #[test]
    fn finds_transitive_dependers() {
        let index = index();
        let found = find_dependers(["core"], &index);
        assert_eq!(names(&found.packages), vec!["app", "lib", "tool", "viz"]);
        assert!(found.system_only.is_empty());
    }

    #[test]
    fn workspace_manifest_shadows_remote_one() {
        let index = index();
        // Only the remote copy of `core` depends on `unrelated`.
        let found = find_dependers(["unrelated"], &index);
        assert!(found.packages.is_empty());
    }

    #[test]
    fn reports_system_only_names() {
        let index = index();
        let found = find_dependers(["boost", "eigen"], &index);
        assert_eq!(names(&found.system_only), vec!["boost"]);
        assert_eq!(names(&found.packages), vec!["app", "lib", "tool", "viz"]);
    }

    #[test]
    fn leaf_package_has_no_dependers() {
        let index = index();
        let found = find_dependers(["tool"], &index);
        assert_eq!(found, Dependers::default());
    }

    #[test]
    fn cycles_terminate() {
        let mut builder = PackageIndex::builder();
        builder
            .add_workspace_package(WorkspacePackage::new(manifest("a", &["b"]), "a"))
            .unwrap();
        builder
            .add_workspace_package(WorkspacePackage::new(manifest("b", &["a"]), "b"))
            .unwrap();
        let index = builder.build();
        let found = find_dependers(["a"], &index);
        assert_eq!(names(&found.packages), vec!["a", "b"]);
    }
}

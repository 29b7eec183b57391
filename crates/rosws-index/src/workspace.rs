use crate::IndexError;
use rosws_schema::{parse_manifest_file, ConditionContext, PackageManifest, PackageName};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Marker files that exclude a directory subtree from the workspace.
const IGNORE_MARKERS: &[&str] = &["CATKIN_IGNORE", "COLCON_IGNORE", "AMENT_IGNORE"];

/// A package physically present in the workspace source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePackage {
    pub manifest: PackageManifest,
    /// Directory containing the package's `package.xml`.
    pub path: PathBuf,
}

impl WorkspacePackage {
    pub fn new(manifest: PackageManifest, path: impl Into<PathBuf>) -> Self {
        Self {
            manifest,
            path: path.into(),
        }
    }

    pub fn name(&self) -> &PackageName {
        &self.manifest.name
    }
}

/// Find every package below `src_dir`.
///
/// Hidden directories and directories carrying an ignore marker are skipped,
/// and the scan does not descend into a package once its manifest is found.
/// Symlinked directories are followed, each real directory at most once.
/// Results are ordered by path. Duplicate names are not rejected here; the
/// index builder reports them.
pub fn scan_workspace(
    src_dir: &Path,
    ctx: &ConditionContext,
) -> Result<Vec<WorkspacePackage>, IndexError> {
    let mut found = Vec::new();
    if src_dir.is_dir() {
        scan_dir(src_dir, ctx, &mut BTreeSet::new(), &mut found)?;
    } else {
        debug!("workspace source directory {} does not exist", src_dir.display());
    }
    debug!("found {} packages in {}", found.len(), src_dir.display());
    Ok(found)
}

fn scan_dir(
    dir: &Path,
    ctx: &ConditionContext,
    visited: &mut BTreeSet<PathBuf>,
    found: &mut Vec<WorkspacePackage>,
) -> Result<(), IndexError> {
    if !visited.insert(std::fs::canonicalize(dir)?) {
        debug!("skipping already scanned directory {}", dir.display());
        return Ok(());
    }
    if IGNORE_MARKERS.iter().any(|m| dir.join(m).exists()) {
        trace!("skipping ignored directory {}", dir.display());
        return Ok(());
    }

    let manifest_path = dir.join("package.xml");
    if manifest_path.is_file() {
        let manifest =
            parse_manifest_file(&manifest_path, ctx).map_err(|source| IndexError::Manifest {
                path: manifest_path.clone(),
                source,
            })?;
        trace!("found package {} at {}", manifest.name, dir.display());
        found.push(WorkspacePackage::new(manifest, dir));
        return Ok(());
    }

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    for sub in subdirs {
        scan_dir(&sub, ctx, visited, found)?;
    }
    Ok(())
}

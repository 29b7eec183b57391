use crate::config::WorkspaceConfig;
use crate::CoreError;
use rosws_index::{scan_workspace, PackageIndex, RemoteIndex};
use std::path::Path;
use tracing::{debug, info};

/// Build the package index for a workspace: scan `src_dir` for packages, add
/// the configured remote index (if any) and mark checked-out projects.
///
/// Duplicate workspace package names abort here, before any resolution.
pub fn build_index(src_dir: &Path, config: &WorkspaceConfig) -> Result<PackageIndex, CoreError> {
    let ctx = config.condition_context();
    let packages = scan_workspace(src_dir, &ctx)?;

    let mut builder = PackageIndex::builder();
    builder.add_workspace_packages(packages)?;

    if let Some(path) = &config.remote_index {
        debug!("loading remote index from {}", path.display());
        let remote = RemoteIndex::load(path)?;
        builder.add_remote_index(remote)?;
    }
    for id in &config.checked_out {
        builder.mark_workspace_project(id.clone());
    }

    let index = builder.build();
    info!(
        "indexed {} workspace package(s) and {} remote project(s)",
        index.workspace_packages().count(),
        index.projects().len()
    );
    Ok(index)
}

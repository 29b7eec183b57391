//! Package index for rosws dependency resolution.
//!
//! This crate provides the data the resolver reads: workspace packages found by
//! scanning the source tree, remote projects that bundle clonable packages, and
//! `PackageIndex`, the combined lookup built by `PackageIndexBuilder`, which
//! rejects duplicate workspace packages before resolution ever runs.

pub mod index;
pub mod remote;
pub mod workspace;

pub use index::{PackageIndex, PackageIndexBuilder};
pub use remote::{RemoteIndex, RemotePackage, RemoteProject};
pub use workspace::{scan_workspace, WorkspacePackage};

use rosws_schema::{ManifestError, PackageName, ProjectId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        source: ManifestError,
    },
    #[error(
        "package '{name}' exists twice in the workspace: {} and {}",
        first.display(),
        second.display()
    )]
    DuplicatePackage {
        name: PackageName,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("remote project '{0}' is listed twice")]
    DuplicateProject(ProjectId),
    #[error("remote project '{project}' contains package '{name}' twice")]
    DuplicateRemotePackage { project: ProjectId, name: PackageName },
    #[error("serialization error: {0}")]
    Serialization(String),
}

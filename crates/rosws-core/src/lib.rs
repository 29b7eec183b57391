//! Dependency resolution core for rosws.
//!
//! This crate ties together the package index and the system dependency oracle
//! into the `Resolver`: a worklist search with bounded backtracking that decides,
//! for every requested package, whether it comes from the workspace, from a
//! remote project that must be cloned, or from the host's package manager. It
//! also provides the reverse-dependency finder, report building for callers,
//! and the workspace configuration file.

pub mod config;
pub mod dependers;
pub mod loader;
pub mod report;
pub mod resolver;

pub use config::WorkspaceConfig;
pub use dependers::{find_dependers, Dependers};
pub use loader::build_index;
pub use report::{
    format_conflicts, install_suggestions, projects_to_clone, CloneTarget, InstallSuggestion,
    RemoteSelection, ResolutionReport,
};
pub use resolver::{
    resolve, Chooser, PackageSource, Resolution, ResolveOptions, Resolver,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("index error: {0}")]
    Index(#[from] rosws_index::IndexError),
    #[error("system dependency error: {0}")]
    Sysdep(#[from] rosws_sysdep::SysdepError),
    #[error("config error: {0}")]
    Config(String),
    #[error("{0} package(s) could not be resolved")]
    Unresolved(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

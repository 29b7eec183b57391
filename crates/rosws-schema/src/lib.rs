//! Package identifiers and manifest parsing for rosws.
//!
//! This crate defines the schema layer: string newtypes for package names and
//! remote project ids, `package.xml` parsing (formats 1 to 3) into
//! `PackageManifest`, and evaluation of format 3 `condition` attributes.

pub mod condition;
pub mod manifest;
pub mod types;

pub use condition::ConditionContext;
pub use manifest::{
    parse_manifest_file, parse_manifest_str, DependencyKind, ManifestError, ManifestRef,
    PackageManifest,
};
pub use types::{PackageName, ProjectId};

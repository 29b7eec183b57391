use crate::condition::ConditionContext;
use crate::types::PackageName;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Xml(String),
    #[error("manifest has no <package> root element")]
    MissingPackage,
    #[error("package name must not be empty")]
    MissingName,
    #[error("unsupported package format: {0}, expected 1, 2 or 3")]
    UnsupportedFormat(u32),
    #[error("invalid package format attribute: '{0}'")]
    InvalidFormat(String),
    #[error("invalid condition '{condition}': {reason}")]
    InvalidCondition { condition: String, reason: String },
}

/// Kind of a declared dependency. The resolver treats all kinds alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Buildtool,
    BuildtoolExport,
    Build,
    BuildExport,
    Exec,
    Test,
}

impl DependencyKind {
    /// Kinds implied by a dependency tag, or `None` for tags that are not
    /// dependency declarations (`doc_depend` is deliberately absent).
    fn from_tag(tag: &str) -> Option<&'static [DependencyKind]> {
        use DependencyKind::{Build, BuildExport, Buildtool, BuildtoolExport, Exec, Test};
        let kinds: &'static [DependencyKind] = match tag {
            "buildtool_depend" => &[Buildtool],
            "buildtool_export_depend" => &[BuildtoolExport],
            "build_depend" => &[Build],
            "build_export_depend" => &[BuildExport],
            "run_depend" => &[BuildExport, Exec],
            "exec_depend" => &[Exec],
            "depend" => &[Build, BuildExport, Exec],
            "test_depend" => &[Test],
            _ => return None,
        };
        Some(kinds)
    }
}

/// A single dependency declaration taken from a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestRef {
    pub name: PackageName,
    pub kind: DependencyKind,
}

/// The parts of a `package.xml` that matter for dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: PackageName,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_format")]
    pub format: u32,
    #[serde(default)]
    pub dependencies: Vec<ManifestRef>,
    #[serde(default)]
    pub metapackage: bool,
}

fn default_format() -> u32 {
    2
}

impl PackageManifest {
    pub fn new(name: impl Into<PackageName>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            description: String::new(),
            format: default_format(),
            dependencies: Vec::new(),
            metapackage: false,
        }
    }

    /// Add a dependency declaration; duplicates of (name, kind) are ignored.
    pub fn add_dependency(&mut self, name: impl Into<PackageName>, kind: DependencyKind) {
        let dep = ManifestRef {
            name: name.into(),
            kind,
        };
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
    }

    #[must_use]
    pub fn with_dependency(mut self, name: impl Into<PackageName>, kind: DependencyKind) -> Self {
        self.add_dependency(name, kind);
        self
    }

    /// Add each name the way a format 2 `<depend>` tag would.
    #[must_use]
    pub fn with_depends<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<PackageName>,
    {
        for name in names {
            let name = name.into();
            for kind in DependencyKind::from_tag("depend").unwrap_or_default() {
                self.add_dependency(name.clone(), *kind);
            }
        }
        self
    }

    /// Distinct dependency names in declaration order.
    pub fn dependency_names(&self) -> Vec<&PackageName> {
        let mut names: Vec<&PackageName> = Vec::with_capacity(self.dependencies.len());
        for dep in &self.dependencies {
            if !names.contains(&&dep.name) {
                names.push(&dep.name);
            }
        }
        names
    }

    pub fn depends_on(&self, name: &str) -> bool {
        self.dependencies.iter().any(|d| d.name == name)
    }
}

pub fn parse_manifest_str(
    input: &str,
    ctx: &ConditionContext,
) -> Result<PackageManifest, ManifestError> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(true);

    // Open elements with the condition attribute they carried, if any.
    let mut stack: Vec<(String, Option<String>)> = Vec::new();
    let mut manifest: Option<PackageManifest> = None;
    let mut name = String::new();

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let tag = tag_name(&e);
                if stack.is_empty() && tag == "package" {
                    let mut m = PackageManifest::new("");
                    m.format = package_format(&e)?;
                    manifest = Some(m);
                } else if tag == "metapackage" && is_export(&stack) {
                    if let Some(m) = manifest.as_mut() {
                        m.metapackage = true;
                    }
                }
                let condition = attribute(&e, "condition")?;
                stack.push((tag, condition));
            }
            Event::Empty(e) => {
                let tag = tag_name(&e);
                if stack.is_empty() && tag == "package" {
                    return Err(ManifestError::MissingName);
                }
                if tag == "metapackage" && is_export(&stack) {
                    if let Some(m) = manifest.as_mut() {
                        m.metapackage = true;
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                let (Some(m), [(root, _), (tag, condition)]) = (manifest.as_mut(), stack.as_slice())
                else {
                    continue;
                };
                if root != "package" {
                    continue;
                }
                match tag.as_str() {
                    "name" => name.push_str(text.trim()),
                    "version" => m.version = text.trim().to_owned(),
                    "description" => {
                        if !m.description.is_empty() {
                            m.description.push(' ');
                        }
                        m.description.push_str(text.trim());
                    }
                    other => {
                        let Some(kinds) = DependencyKind::from_tag(other) else {
                            continue;
                        };
                        if let Some(condition) = condition {
                            if !ctx.evaluate(condition)? {
                                continue;
                            }
                        }
                        let dep = text.trim();
                        if dep.is_empty() {
                            continue;
                        }
                        for kind in kinds {
                            m.add_dependency(dep, *kind);
                        }
                    }
                }
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut manifest = manifest.ok_or(ManifestError::MissingPackage)?;
    if name.is_empty() {
        return Err(ManifestError::MissingName);
    }
    manifest.name = PackageName::new(name);
    Ok(manifest)
}

pub fn parse_manifest_file(
    path: impl AsRef<Path>,
    ctx: &ConditionContext,
) -> Result<PackageManifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content, ctx)
}

fn xml_error(e: impl std::fmt::Display) -> ManifestError {
    ManifestError::Xml(e.to_string())
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, ManifestError> {
    match e.try_get_attribute(key).map_err(xml_error)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned())),
        None => Ok(None),
    }
}

fn package_format(e: &BytesStart<'_>) -> Result<u32, ManifestError> {
    let Some(raw) = attribute(e, "format")? else {
        return Ok(1);
    };
    let format: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ManifestError::InvalidFormat(raw.clone()))?;
    if !(1..=3).contains(&format) {
        return Err(ManifestError::UnsupportedFormat(format));
    }
    Ok(format)
}

fn is_export(stack: &[(String, Option<String>)]) -> bool {
    matches!(stack, [(root, _), (export, _)] if root == "package" && export == "export")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ConditionContext {
        ConditionContext::new().with_var("ROS_VERSION", "1")
    }

    #[test]
    fn parses_format2_manifest() {
        let input = r#"<?xml version="1.0"?>
<package format="2">
  <name>alpha</name>
  <version>1.2.3</version>
  <description>The alpha package</description>
  <maintainer email="dev@example.com">Dev</maintainer>
  <license>BSD</license>
  <buildtool_depend>catkin</buildtool_depend>
  <depend>roscpp</depend>
  <exec_depend>rospy</exec_depend>
  <test_depend>rostest</test_depend>
  <doc_depend>rosdoc_lite</doc_depend>
</package>
"#;
        let m = parse_manifest_str(input, &ctx()).expect("should parse");
        assert_eq!(m.name, "alpha");
        assert_eq!(m.version, "1.2.3");
        assert_eq!(m.format, 2);
        assert_eq!(
            m.dependency_names(),
            vec!["catkin", "roscpp", "rospy", "rostest"]
        );
        let roscpp_kinds: Vec<_> = m
            .dependencies
            .iter()
            .filter(|d| d.name == "roscpp")
            .map(|d| d.kind)
            .collect();
        assert_eq!(
            roscpp_kinds,
            vec![
                DependencyKind::Build,
                DependencyKind::BuildExport,
                DependencyKind::Exec
            ]
        );
        assert!(!m.depends_on("rosdoc_lite"));
        assert!(!m.metapackage);
    }

    #[test]
    fn parses_format1_run_depend() {
        let input = r"<package>
  <name>legacy</name>
  <build_depend>std_msgs</build_depend>
  <run_depend>std_msgs</run_depend>
</package>";
        let m = parse_manifest_str(input, &ctx()).unwrap();
        assert_eq!(m.format, 1);
        assert_eq!(m.dependency_names(), vec!["std_msgs"]);
        assert_eq!(m.dependencies.len(), 3);
    }

    #[test]
    fn format3_conditions_are_evaluated() {
        let input = r#"<package format="3">
  <name>bridge</name>
  <depend condition="$ROS_VERSION == 1">roscpp</depend>
  <depend condition="$ROS_VERSION == 2">rclcpp</depend>
  <exec_depend>common</exec_depend>
</package>"#;
        let m = parse_manifest_str(input, &ctx()).unwrap();
        assert!(m.depends_on("roscpp"));
        assert!(!m.depends_on("rclcpp"));
        assert!(m.depends_on("common"));
    }

    #[test]
    fn detects_metapackage() {
        let input = r#"<package format="2">
  <name>meta</name>
  <exec_depend>alpha</exec_depend>
  <export>
    <metapackage/>
  </export>
</package>"#;
        let m = parse_manifest_str(input, &ctx()).unwrap();
        assert!(m.metapackage);
    }

    #[test]
    fn rejects_missing_name() {
        let input = r#"<package format="2"><version>1.0.0</version></package>"#;
        assert!(matches!(
            parse_manifest_str(input, &ctx()),
            Err(ManifestError::MissingName)
        ));
    }

    #[test]
    fn rejects_unsupported_format() {
        let input = r#"<package format="7"><name>x</name></package>"#;
        assert!(matches!(
            parse_manifest_str(input, &ctx()),
            Err(ManifestError::UnsupportedFormat(7))
        ));
    }

    #[test]
    fn rejects_non_package_root() {
        let input = "<library><name>x</name></library>";
        assert!(matches!(
            parse_manifest_str(input, &ctx()),
            Err(ManifestError::MissingPackage)
        ));
    }

    #[test]
    fn rejects_malformed_xml() {
        let input = "<package><name>x</nam></package>";
        assert!(parse_manifest_str(input, &ctx()).is_err());
    }

    #[test]
    fn builder_deduplicates() {
        let m = PackageManifest::new("a")
            .with_depends(["b", "c"])
            .with_dependency("b", DependencyKind::Build)
            .with_dependency("d", DependencyKind::Test);
        assert_eq!(m.dependency_names(), vec!["b", "c", "d"]);
        assert_eq!(m.dependencies.len(), 7);
    }

    #[test]
    fn parses_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.xml");
        fs::write(
            &path,
            "<package format=\"2\"><name>on_disk</name><depend>x</depend></package>",
        )
        .unwrap();
        let m = parse_manifest_file(&path, &ctx()).unwrap();
        assert_eq!(m.name, "on_disk");
        assert!(m.depends_on("x"));
    }
}

use std::fmt;
use std::path::Path;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn rosdep_sources_initialized(root: &Path) -> bool {
    let sources = root.join("etc/ros/rosdep/sources.list.d");
    std::fs::read_dir(sources)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Check what the rosdep-backed oracle needs on this host.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_rosdep_prereqs(rosdep_program: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(rosdep_program) {
        missing.push(MissingPrereq {
            name: "rosdep",
            purpose: "resolving system dependencies",
            install_hint: "apt install python3-rosdep | pip install rosdep",
        });
    } else if !rosdep_sources_initialized(Path::new("/")) {
        missing.push(MissingPrereq {
            name: "rosdep sources",
            purpose: "system dependency rule database",
            install_hint: "sudo rosdep init && rosdep update",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nUse --rules <file> to resolve system dependencies from a static rule table instead.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prereq_display() {
        let m = MissingPrereq {
            name: "rosdep",
            purpose: "system deps",
            install_hint: "pip install rosdep",
        };
        let s = format!("{m}");
        assert!(s.contains("rosdep"));
        assert!(s.contains("system deps"));
        assert!(s.contains("pip install rosdep"));
    }

    #[test]
    fn format_missing_produces_readable_output() {
        let items = vec![MissingPrereq {
            name: "rosdep sources",
            purpose: "rules",
            install_hint: "rosdep update",
        }];
        let output = format_missing(&items);
        assert!(output.contains("missing prerequisites:"));
        assert!(output.contains("rosdep sources"));
        assert!(output.contains("--rules"));
    }

    #[test]
    fn sources_detection_on_fake_root() {
        let root = tempfile::tempdir().unwrap();
        assert!(!rosdep_sources_initialized(root.path()));
        let dir = root.path().join("etc/ros/rosdep/sources.list.d");
        std::fs::create_dir_all(&dir).unwrap();
        assert!(!rosdep_sources_initialized(root.path()));
        std::fs::write(dir.join("20-default.list"), "yaml https://example.com/base.yaml\n").unwrap();
        assert!(rosdep_sources_initialized(root.path()));
    }

    #[test]
    fn unknown_program_is_reported() {
        let missing = check_rosdep_prereqs("rosws-test-no-such-rosdep-binary");
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "rosdep");
    }
}

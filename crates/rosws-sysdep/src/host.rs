//! Host package manager plumbing: detection, installed-state queries and
//! install command rendering.

use crate::SysdepError;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub fn detect_package_manager(root: &Path) -> Option<&'static str> {
    if root.join("usr/bin/apt-get").exists() || root.join("usr/bin/apt").exists() {
        Some("apt")
    } else if root.join("usr/bin/dnf").exists() || root.join("usr/bin/dnf5").exists() {
        Some("dnf")
    } else if root.join("usr/bin/zypper").exists() {
        Some("zypper")
    } else if root.join("usr/bin/pacman").exists() {
        Some("pacman")
    } else {
        None
    }
}

/// Map a rosdep installer id to the host package manager that can report its
/// installed state. Installers such as `pip` or `source` have no query path.
pub fn installer_package_manager(installer: &str) -> Option<&'static str> {
    match installer {
        "apt" => Some("apt"),
        "dnf" | "yum" => Some("dnf"),
        "zypper" => Some("zypper"),
        "pacman" => Some("pacman"),
        _ => None,
    }
}

/// Build a command that lists which of `packages` are installed on the host.
pub fn query_installed_command(pkg_manager: &str, packages: &[String]) -> Vec<String> {
    if packages.is_empty() {
        return Vec::new();
    }
    let mut cmd = match pkg_manager {
        // dpkg-query prints name\tstatus for every package it knows about
        "apt" => vec![
            "dpkg-query".to_owned(),
            "-W".to_owned(),
            "-f".to_owned(),
            "${Package}\\t${db:Status-Status}\\n".to_owned(),
        ],
        "dnf" | "zypper" => vec![
            "rpm".to_owned(),
            "-q".to_owned(),
            "--qf".to_owned(),
            "%{NAME}\\n".to_owned(),
        ],
        "pacman" => vec!["pacman".to_owned(), "-Q".to_owned()],
        _ => return Vec::new(),
    };
    cmd.extend(packages.iter().cloned());
    cmd
}

/// Parse the output of [`query_installed_command`] into installed package names.
pub fn parse_installed_output(pkg_manager: &str, output: &str) -> BTreeSet<String> {
    let mut installed = BTreeSet::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let name = match pkg_manager {
            "apt" => match line.split_once('\t') {
                Some((name, "installed")) => name,
                _ => continue,
            },
            // rpm reports missing packages as "package foo is not installed"
            "dnf" | "zypper" => {
                if line.contains(char::is_whitespace) {
                    continue;
                }
                line
            }
            "pacman" => match line.split_once(' ') {
                Some((name, _version)) => name,
                None => continue,
            },
            _ => continue,
        };
        installed.insert(name.to_owned());
    }
    installed
}

/// Run the installed-state query for `packages` on the host.
pub fn query_installed(
    pkg_manager: &str,
    packages: &[String],
) -> Result<BTreeSet<String>, SysdepError> {
    let cmd = query_installed_command(pkg_manager, packages);
    let Some((program, args)) = cmd.split_first() else {
        return Ok(BTreeSet::new());
    };
    debug!("querying installed packages: {}", cmd.join(" "));
    // Exit status is non-zero whenever one package is missing; stdout still
    // lists the installed ones.
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| SysdepError::Query(format!("failed to run {program}: {e}")))?;
    Ok(parse_installed_output(
        pkg_manager,
        &String::from_utf8_lossy(&output.stdout),
    ))
}

/// Render the command a user runs to install `packages` via a rosdep installer.
pub fn install_command(installer: &str, packages: &[String]) -> Vec<String> {
    if packages.is_empty() {
        return Vec::new();
    }
    let mut cmd: Vec<String> = match installer {
        "apt" => vec!["sudo", "apt-get", "install", "-y", "--no-install-recommends"],
        "dnf" | "yum" => vec!["sudo", "dnf", "install", "-y"],
        "zypper" => vec!["sudo", "zypper", "--non-interactive", "install"],
        "pacman" => vec!["sudo", "pacman", "-S", "--noconfirm", "--needed"],
        "pip" => vec!["pip", "install", "-U"],
        "gem" => vec!["gem", "install"],
        _ => return Vec::new(),
    }
    .into_iter()
    .map(str::to_owned)
    .collect();
    cmd.extend(packages.iter().cloned());
    cmd
}

pub mod completions;
pub mod dependers;
pub mod doctor;
pub mod list;
pub mod resolve;

use indicatif::{ProgressBar, ProgressStyle};
use rosws_core::{build_index, WorkspaceConfig};
use rosws_index::PackageIndex;
use rosws_sysdep::{check_rosdep_prereqs, format_missing, RosdepOracle, RuleTable, SystemOracle};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_CONFLICTS: u8 = 3;

/// Settings shared by every workspace command, after merging CLI flags over
/// the config file.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    pub src_dir: PathBuf,
    pub config: WorkspaceConfig,
    /// Static rule table used instead of rosdep.
    pub rules: Option<PathBuf>,
}

impl WorkspaceContext {
    pub fn new(
        src_dir: PathBuf,
        config_path: Option<&Path>,
        remote_index: Option<PathBuf>,
        rules: Option<PathBuf>,
        checked_out: &[String],
    ) -> Result<Self, String> {
        let mut config = match config_path {
            Some(path) => WorkspaceConfig::load(path),
            None => WorkspaceConfig::load_default(),
        }
        .map_err(|e| e.to_string())?;

        if remote_index.is_some() {
            config.remote_index = remote_index;
        }
        config
            .checked_out
            .extend(checked_out.iter().map(|id| id.as_str().into()));

        Ok(Self {
            src_dir,
            config,
            rules,
        })
    }

    pub fn index(&self) -> Result<PackageIndex, String> {
        build_index(&self.src_dir, &self.config).map_err(|e| e.to_string())
    }

    /// The system dependency oracle: the `--rules` table if given, rosdep
    /// otherwise (after checking it is usable).
    pub fn oracle(&self) -> Result<Box<dyn SystemOracle>, String> {
        if let Some(path) = &self.rules {
            let table = RuleTable::load(path)
                .map_err(|e| format!("failed to load rules {}: {e}", path.display()))?;
            return Ok(Box::new(table));
        }

        let program = self
            .config
            .rosdep_command
            .split_whitespace()
            .next()
            .unwrap_or("rosdep");
        if std::env::var("ROSWS_SKIP_PREREQS").as_deref() != Ok("1") {
            let missing = check_rosdep_prereqs(program);
            if !missing.is_empty() {
                return Err(format_missing(&missing));
            }
        }

        let mut oracle = RosdepOracle::new(&self.config.rosdep_command);
        if let Some(distro) = &self.config.rosdistro {
            oracle = oracle.with_rosdistro(distro);
        }
        Ok(Box::new(oracle))
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish_plain(pb, &format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish_plain(pb, &format!("✗ {msg}"));
}

fn finish_plain(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg.to_owned());
}

/// Color a package origin label for terminal output.
pub fn colorize_origin(origin: &str) -> String {
    use console::Style;
    match origin {
        "workspace" => Style::new().green().apply_to(origin).to_string(),
        "remote" => Style::new().cyan().apply_to(origin).to_string(),
        "system" => Style::new().yellow().apply_to(origin).to_string(),
        "conflict" => Style::new().red().bold().apply_to(origin).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn colorize_origin_keeps_label() {
        for origin in ["workspace", "remote", "system", "conflict"] {
            assert!(colorize_origin(origin).contains(origin));
        }
        assert_eq!(colorize_origin("unknown"), "unknown");
    }

    #[test]
    fn exit_codes_are_distinct() {
        assert_ne!(EXIT_SUCCESS, EXIT_FAILURE);
        assert_ne!(EXIT_FAILURE, EXIT_MANIFEST_ERROR);
        assert_ne!(EXIT_MANIFEST_ERROR, EXIT_CONFLICTS);
    }

    #[test]
    fn context_merges_flags_over_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "checked_out = [\"1\"]\nremote_index = \"/old.json\"\n",
        )
        .unwrap();

        let ctx = WorkspaceContext::new(
            dir.path().join("src"),
            Some(config_path.as_path()),
            Some(PathBuf::from("/new.json")),
            None,
            &["2".to_owned()],
        )
        .unwrap();
        assert_eq!(ctx.config.remote_index, Some(PathBuf::from("/new.json")));
        assert_eq!(ctx.config.checked_out.len(), 2);
    }

    #[test]
    fn rules_file_selects_static_oracle() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.toml");
        std::fs::write(
            &rules,
            "[rules.boost]\ninstaller = \"apt\"\npackages = [\"libboost-dev\"]\n",
        )
        .unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "").unwrap();

        let ctx = WorkspaceContext::new(
            dir.path().join("src"),
            Some(config_path.as_path()),
            None,
            Some(rules),
            &[],
        )
        .unwrap();
        let oracle = ctx.oracle().unwrap();
        assert!(oracle.contains("boost").unwrap());
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}

use super::{WorkspaceContext, EXIT_FAILURE, EXIT_SUCCESS};
use rosws_sysdep::host::detect_package_manager;
use rosws_sysdep::{check_rosdep_prereqs, format_missing};
use std::path::Path;

pub fn run(ctx: &WorkspaceContext, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    check_oracle(ctx, &mut checks, &mut all_pass);
    check_package_manager(&mut checks);
    check_workspace(ctx, &mut checks, &mut all_pass);

    print_results(&checks, all_pass, json_output)
}

fn check_oracle(ctx: &WorkspaceContext, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if let Some(rules) = &ctx.rules {
        match ctx.oracle() {
            Ok(_) => checks.push(Check::pass(
                "sysdep_oracle",
                &format!("Using static rule table {}", rules.display()),
            )),
            Err(e) => {
                *all_pass = false;
                checks.push(Check::fail("sysdep_oracle", &e));
            }
        }
        return;
    }

    let program = ctx
        .config
        .rosdep_command
        .split_whitespace()
        .next()
        .unwrap_or("rosdep");
    let missing = check_rosdep_prereqs(program);
    if missing.is_empty() {
        checks.push(Check::pass("sysdep_oracle", "rosdep is installed and initialized"));
    } else {
        *all_pass = false;
        checks.push(Check::fail("sysdep_oracle", &format_missing(&missing)));
    }
}

fn check_package_manager(checks: &mut Vec<Check>) {
    match detect_package_manager(Path::new("/")) {
        Some(pm) => checks.push(Check::pass(
            "package_manager",
            &format!("Host package manager: {pm}"),
        )),
        None => checks.push(Check::warn(
            "package_manager",
            "No supported package manager found; installed state cannot be queried",
        )),
    }
}

fn check_workspace(ctx: &WorkspaceContext, checks: &mut Vec<Check>, all_pass: &mut bool) {
    if !ctx.src_dir.is_dir() {
        *all_pass = false;
        checks.push(Check::fail(
            "workspace",
            &format!("Workspace source directory {} not found", ctx.src_dir.display()),
        ));
        return;
    }

    match ctx.index() {
        Ok(index) => {
            checks.push(Check::pass(
                "workspace",
                &format!(
                    "{} packages in {}",
                    index.workspace_packages().count(),
                    ctx.src_dir.display()
                ),
            ));
            if ctx.config.remote_index.is_some() {
                checks.push(Check::info(
                    "remote_index",
                    &format!("{} remote projects indexed", index.projects().len()),
                ));
            } else {
                checks.push(Check::info(
                    "remote_index",
                    "No remote index configured; only workspace and system packages resolve",
                ));
            }
        }
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("workspace", &e));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("rosws doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}

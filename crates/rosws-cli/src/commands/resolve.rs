use super::{
    colorize_origin, json_pretty, spin_fail, spin_ok, spinner, WorkspaceContext, EXIT_CONFLICTS,
    EXIT_SUCCESS,
};
use console::Style;
use dialoguer::Select;
use rosws_core::{format_conflicts, ResolutionReport, ResolveOptions, Resolver};
use rosws_index::RemotePackage;
use rosws_schema::PackageName;
use std::io::{stderr, stdin, IsTerminal};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveFlags {
    pub auto: bool,
    pub missing_only: bool,
    pub json: bool,
}

pub fn run(ctx: &WorkspaceContext, packages: &[String], flags: ResolveFlags) -> Result<u8, String> {
    let requested: Vec<PackageName> = if packages.is_empty() {
        ctx.config.default_packages.clone()
    } else {
        packages.iter().map(|p| p.as_str().into()).collect()
    };
    if requested.is_empty() {
        return Err("no packages given and no default_packages configured".to_owned());
    }

    let index = ctx.index()?;
    let oracle = ctx.oracle()?;

    let auto_resolve = flags.auto || ctx.config.auto_resolve;
    let interactive =
        !auto_resolve && !flags.json && stdin().is_terminal() && stderr().is_terminal();

    let chooser = |name: &PackageName, candidates: &[&RemotePackage]| prompt_choice(name, candidates);
    let mut resolver =
        Resolver::new(&index, oracle.as_ref()).with_options(ResolveOptions { auto_resolve });
    if interactive {
        resolver = resolver.with_chooser(&chooser);
    }

    // A spinner would fight with the selection prompt.
    let pb = (!flags.json && !interactive).then(|| spinner("resolving dependencies..."));
    let resolution = match resolver.resolve(requested) {
        Ok(resolution) => resolution,
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, "resolution failed");
            }
            return Err(e.to_string());
        }
    };
    let report = ResolutionReport::build(&resolution, &index, oracle.as_ref(), flags.missing_only)
        .map_err(|e| e.to_string())?;
    if let Some(pb) = &pb {
        spin_ok(
            pb,
            &format!("resolved {} package(s)", resolution.depends.len()),
        );
    }

    if flags.json {
        println!("{}", json_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.is_resolved() {
        Ok(EXIT_SUCCESS)
    } else {
        if !flags.json {
            eprintln!(
                "{}",
                Style::new().red().bold().apply_to("cannot resolve dependencies:")
            );
            eprint!("{}", format_conflicts(&report.conflicts));
        }
        Ok(EXIT_CONFLICTS)
    }
}

fn prompt_choice(name: &PackageName, candidates: &[&RemotePackage]) -> Option<usize> {
    let items: Vec<String> = candidates
        .iter()
        .map(|c| {
            if c.path.is_empty() {
                c.project.to_string()
            } else {
                format!("{} ({})", c.project, c.path)
            }
        })
        .collect();
    match Select::new()
        .with_prompt(format!("'{name}' is available from several projects"))
        .items(&items)
        .default(0)
        .interact_opt()
    {
        Ok(choice) => choice,
        Err(e) => {
            warn!("prompt failed, choosing automatically: {e}");
            None
        }
    }
}

fn print_report(report: &ResolutionReport) {
    let heading = Style::new().bold();

    if !report.workspace.is_empty() || !report.remote.is_empty() {
        println!("{}", heading.apply_to("packages:"));
        for name in &report.workspace {
            println!("  {name:<32} {}", colorize_origin("workspace"));
        }
        for sel in &report.remote {
            println!(
                "  {:<32} {} {}",
                sel.package,
                colorize_origin("remote"),
                sel.project
            );
        }
    }

    if !report.projects_to_clone.is_empty() {
        println!("{}", heading.apply_to("projects to clone:"));
        for project in &report.projects_to_clone {
            println!("  {:<24} {}", project.id, project.url);
        }
    }

    if !report.system_depends.is_empty() {
        println!("{}", heading.apply_to("system dependencies:"));
        for name in &report.system_depends {
            println!("  {name:<32} {}", colorize_origin("system"));
        }
    }

    if !report.install.is_empty() {
        println!("{}", heading.apply_to("install with:"));
        for suggestion in &report.install {
            println!("  {suggestion}");
        }
    }
}

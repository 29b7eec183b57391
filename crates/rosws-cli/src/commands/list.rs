use super::{colorize_origin, json_pretty, WorkspaceContext, EXIT_SUCCESS};
use rosws_schema::PackageName;

pub fn run(ctx: &WorkspaceContext, json: bool) -> Result<u8, String> {
    let index = ctx.index()?;

    if json {
        let workspace: Vec<_> = index
            .workspace_packages()
            .map(|pkg| {
                serde_json::json!({
                    "name": pkg.name(),
                    "path": pkg.path,
                    "version": pkg.manifest.version,
                })
            })
            .collect();
        let payload = serde_json::json!({
            "workspace": workspace,
            "projects": index.projects(),
            "checked_out": index.workspace_projects(),
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if index.workspace_packages().next().is_none() {
        println!("no packages in {}", ctx.src_dir.display());
    } else {
        println!("{:<32} {:<10} PATH", "NAME", "VERSION");
        for pkg in index.workspace_packages() {
            println!(
                "{:<32} {:<10} {}",
                pkg.name(),
                pkg.manifest.version,
                pkg.path.display()
            );
        }
    }

    if !index.projects().is_empty() {
        println!();
        println!("{:<24} {:<10} PACKAGES", "PROJECT", "STATE");
        for project in index.projects() {
            let state = if index.is_workspace_project(&project.id) {
                colorize_origin("workspace")
            } else {
                colorize_origin("remote")
            };
            let names: Vec<&str> = project.package_names().map(PackageName::as_str).collect();
            println!("{:<24} {state:<10} {}", project.id, names.join(" "));
        }
    }
    Ok(EXIT_SUCCESS)
}

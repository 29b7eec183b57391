use super::{json_pretty, WorkspaceContext, EXIT_SUCCESS};
use rosws_core::find_dependers;

pub fn run(ctx: &WorkspaceContext, packages: &[String], json: bool) -> Result<u8, String> {
    let index = ctx.index()?;
    let found = find_dependers(packages.iter().map(String::as_str), &index);

    if json {
        let payload = serde_json::json!({
            "packages": found.packages,
            "system_only": found.system_only,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    if found.packages.is_empty() {
        println!("no packages depend on {}", packages.join(", "));
    } else {
        for name in &found.packages {
            let origin = if index.is_workspace_package(name) {
                "workspace"
            } else {
                "remote"
            };
            println!("{name:<32} {origin}");
        }
    }
    for name in &found.system_only {
        println!("{name:<32} system dependency only");
    }
    Ok(EXIT_SUCCESS)
}

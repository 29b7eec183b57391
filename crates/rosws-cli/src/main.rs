mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::resolve::ResolveFlags;
use commands::{WorkspaceContext, EXIT_FAILURE, EXIT_MANIFEST_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "rosws",
    version,
    about = "Dependency resolution for layered ROS/catkin workspaces"
)]
struct Cli {
    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct WorkspaceArgs {
    /// Workspace source directory to scan for packages.
    #[arg(short, long, default_value = "src")]
    workspace: PathBuf,
    /// Config file (defaults to ~/.config/rosws/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Remote project index (JSON); overrides the config file.
    #[arg(long)]
    remote_index: Option<PathBuf>,
    /// Static system dependency rule table (TOML) used instead of rosdep.
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Remote project id already checked out in the workspace (repeatable).
    #[arg(long = "checked-out", value_name = "ID")]
    checked_out: Vec<String>,
}

impl WorkspaceArgs {
    fn context(self) -> Result<WorkspaceContext, String> {
        WorkspaceContext::new(
            self.workspace,
            self.config.as_deref(),
            self.remote_index,
            self.rules,
            &self.checked_out,
        )
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve packages and everything they depend on.
    Resolve {
        /// Packages to resolve (defaults to `default_packages` from the config).
        packages: Vec<String>,
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Pick among ambiguous remote projects without asking.
        #[arg(long, default_value_t = false)]
        auto: bool,
        /// Only suggest installing system packages that are not installed yet.
        #[arg(long, default_value_t = false)]
        missing_only: bool,
    },
    /// List packages that depend, directly or transitively, on the given ones.
    Dependers {
        #[arg(required = true)]
        packages: Vec<String>,
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
    /// List workspace packages and known remote projects.
    List {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
    /// Check rosdep, the host package manager and the workspace layout.
    Doctor {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("ROSWS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let json_output = cli.json;
    let result = match cli.command {
        Commands::Resolve {
            packages,
            workspace,
            auto,
            missing_only,
        } => workspace.context().and_then(|ctx| {
            commands::resolve::run(
                &ctx,
                &packages,
                ResolveFlags {
                    auto,
                    missing_only,
                    json: json_output,
                },
            )
        }),
        Commands::Dependers {
            packages,
            workspace,
        } => workspace
            .context()
            .and_then(|ctx| commands::dependers::run(&ctx, &packages, json_output)),
        Commands::List { workspace } => workspace
            .context()
            .and_then(|ctx| commands::list::run(&ctx, json_output)),
        Commands::Doctor { workspace } => workspace
            .context()
            .and_then(|ctx| commands::doctor::run(&ctx, json_output)),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("index error: invalid manifest")
                || msg.starts_with("index error: package '")
            {
                EXIT_MANIFEST_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use fleetstack_core::{LoadOptions, Variables, parse_assignment};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleetstack")]
#[command(
    about = "Declare a cloud deployment topology in KDL and synthesize it",
    long_about = None
)]
struct Cli {
    /// Stack file (searched from the current directory when omitted)
    #[arg(short, long, global = true, env = "FLEETSTACK_FILE")]
    file: Option<PathBuf>,

    /// Context variable for the stack template (repeatable)
    #[arg(short, long = "context", global = true, value_name = "KEY=VALUE")]
    context: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the engine template into .fleetstack/out
    Synth {
        /// Print the template instead of writing it
        #[arg(long)]
        stdout: bool,
    },
    /// Check the stack file and print a summary
    Validate,
    /// List the stack outputs
    Outputs,
    /// Print resources in dependency order
    Graph,
    /// Show version information
    Version,
}

/// Where the stack comes from and with which context
pub struct Invocation {
    pub stack_file: PathBuf,
    pub options: LoadOptions,
}

impl Invocation {
    fn resolve(file: Option<PathBuf>, context: &[String]) -> anyhow::Result<Self> {
        let stack_file = match file {
            Some(path) => path,
            None => fleetstack_config::find_stack_file()?,
        };

        let user_context = fleetstack_config::load_user_context()
            .context("failed to read the user context file")?;

        let mut overrides = Variables::new();
        for assignment in context {
            let (key, value) = parse_assignment(assignment)?;
            overrides.insert(key, value);
        }

        Ok(Self {
            stack_file,
            options: LoadOptions {
                user_context,
                overrides,
            },
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // logs go to stderr so that `synth --stdout` stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Commands::Version) {
        println!("fleetstack {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let invocation = Invocation::resolve(cli.file, &cli.context)?;
    tracing::debug!(
        stack_file = %invocation.stack_file.display(),
        overrides = invocation.options.overrides.len(),
        "Resolved invocation"
    );

    match cli.command {
        Commands::Synth { stdout } => commands::synth::handle(&invocation, stdout).await?,
        Commands::Validate => commands::validate::handle(&invocation),
        Commands::Outputs => commands::outputs::handle(&invocation)?,
        Commands::Graph => commands::graph::handle(&invocation)?,
        Commands::Version => {}
    }

    Ok(())
}

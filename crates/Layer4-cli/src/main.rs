//! relay CLI - Main entry point

mod cli;
mod console;
mod notifier;
mod tools;

use clap::{Parser, Subcommand};
use relay_foundation::RelayConfig;
use relay_task::{ProcessSupervisor, SupervisorConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// relay - run shell commands in the background and keep track of them
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Grace period before a cancelled task is force killed (milliseconds)
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Per-stream output buffer size (characters)
    #[arg(long)]
    max_buffer: Option<usize>,

    /// Shell used to run commands
    #[arg(long)]
    shell: Option<String>,

    /// Do not print task lifecycle events
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one command under supervision and wait for it
    Exec {
        /// Description shown in status output
        #[arg(short = 'm', long)]
        description: Option<String>,

        /// Command line (joined with spaces and passed to the shell)
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Print the tool definitions as JSON
    Tools,
    /// Print the effective configuration as JSON
    Config,
}

impl Args {
    /// Command-line values as a config layer
    fn overrides(&self) -> RelayConfig {
        RelayConfig {
            grace_period_ms: self.grace_ms,
            max_buffer_chars: self.max_buffer,
            shell: self.shell.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration (global, then project, then flags)
    let mut config = RelayConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        RelayConfig::default()
    });
    config.merge(args.overrides());

    // Initialize logging
    let log_level = if args.debug {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let supervisor = ProcessSupervisor::new(SupervisorConfig::from(&config))?;

    let code = match args.command {
        Some(Command::Tools) => {
            let tools = tools::TaskTools::new(supervisor);
            println!("{}", serde_json::to_string_pretty(&tools.definitions())?);
            0
        }
        Some(Command::Config) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            0
        }
        Some(Command::Exec {
            description,
            command,
        }) => {
            let command = command.join(" ");
            let description = description.unwrap_or_default();
            cli::run_once(&supervisor, &command, &description).await?
        }
        None => {
            if !args.quiet {
                let notifier = notifier::ConsoleNotifier::new(supervisor.formatter());
                supervisor.subscribe(Arc::new(notifier));
            }
            console::Console::new(supervisor).run().await?;
            0
        }
    };

    // Skip runtime teardown; a pending stdin read would otherwise block it
    std::process::exit(code)
}

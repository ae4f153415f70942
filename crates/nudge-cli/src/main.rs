use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use nudge_core::NudgeConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "nudge-cli", version, about = "Nudge engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and export the rule catalog
    Catalog {
        #[command(subcommand)]
        action: commands::catalog::CatalogAction,
    },
    /// Evaluate the catalog once against a synthetic session
    Simulate(commands::simulate::SimulateArgs),
    /// Manage the dismissal record
    Dismissed {
        #[command(subcommand)]
        action: commands::dismissed::DismissedAction,
    },
    /// Run the periodic engine, reading host signals from stdin
    Run(commands::run::RunArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: Shell,
    },
}

fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env("NUDGE_LOG")
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    let config = NudgeConfig::load_or_default();
    init_logging(&config.logging.filter);

    let result = match cli.command {
        Commands::Catalog { action } => commands::catalog::run(action, &config),
        Commands::Simulate(args) => commands::simulate::run(args, &config),
        Commands::Dismissed { action } => commands::dismissed::run(action, &config),
        Commands::Run(args) => commands::run::run(args, &config),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "nudge-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

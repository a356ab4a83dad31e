use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use snoopy_log_collator::commands;
use snoopy_log_collator::config::Config;

#[derive(Parser)]
#[command(name = "snoopy-log-collator")]
#[command(about = "Collate snoopy command logs into per-command histories", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $SNOOPY_LOG_COLLATOR_CONFIG, then the usual locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collate new snoopy log files from this host into per-command files
    Collate,

    /// Merge every host's collated files into one timeline per command
    ///
    /// Source files are moved into per-host archives once merged.
    Consolidate {
        /// Classes to consolidate (default: all)
        classes: Vec<String>,
    },

    /// List the commands that have recorded history
    ListFiles {
        /// Classes to list (default: all)
        classes: Vec<String>,
    },

    /// List commands owned by a package, with the package's repositories
    ListPackages {
        /// Classes to list (default: all)
        classes: Vec<String>,

        /// Export the listing as CSV instead of printing it
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List commands excluded by each class's policy
    ListExcluded {
        /// Classes to check (default: all)
        classes: Vec<String>,
    },

    /// Delete the history of commands excluded by each class's policy
    PurgeExcluded {
        /// Classes to purge (default: all)
        classes: Vec<String>,
    },

    /// Generate shell completion scripts
    ///
    /// Install:
    ///   snoopy-log-collator generate-completion bash > ~/.local/share/bash-completion/completions/snoopy-log-collator
    ///   snoopy-log-collator generate-completion zsh > ~/.zfunc/_snoopy-log-collator
    ///   snoopy-log-collator generate-completion fish > ~/.config/fish/completions/snoopy-log-collator.fish
    GenerateCompletion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::GenerateCompletion { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "snoopy-log-collator", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(path = %config.path.display(), "loaded configuration");

    match cli.command {
        Commands::Collate => commands::collate::run(&config),
        Commands::Consolidate { classes } => commands::consolidate::run(&config, &classes),
        Commands::ListFiles { classes } => commands::list_files::run(&config, &classes),
        Commands::ListPackages { classes, output } => {
            commands::list_packages::run(&config, &classes, output.as_deref())
        }
        Commands::ListExcluded { classes } => {
            commands::list_excluded::run(&config, &classes, false)
        }
        Commands::PurgeExcluded { classes } => {
            commands::list_excluded::run(&config, &classes, true)
        }
        Commands::GenerateCompletion { .. } => Ok(()),
    }
}

//! Article Harvest: entry point.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use article_harvest_cli::logging;
use article_harvest_cli::run;
use article_harvest_cli::settings::Settings;

#[derive(Parser)]
#[command(
    name = "article-harvest",
    about = "Harvest recent articles from a load-more search page into a spreadsheet",
    version
)]
struct Cli {
    /// Path to a JSON settings file (also ARTICLE_HARVEST_CONFIG).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for QUERY and export every article inside the window.
    Run {
        /// Free-text search query.
        query: String,

        /// Retention window in months, counted back from now.
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        months: u32,

        /// Output root; each run gets its own directory below it.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after examining this many items.
        #[arg(long)]
        max_items: Option<usize>,
    },

    /// Print the resolved settings as JSON.
    Settings,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   article-harvest completions bash > ~/.local/share/bash-completion/completions/article-harvest
    ///   article-harvest completions zsh > ~/.zfunc/_article-harvest
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

/// Settings file and environment, then CLI flags.
fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    if let Commands::Run {
        output, max_items, ..
    } = &cli.command
    {
        if let Some(output) = output {
            settings.output_root = output.clone();
        }
        if max_items.is_some() {
            settings.max_items = *max_items;
        }
    }
    Ok(settings)
}

/// Logging is not available yet: leave a trace on disk and bail out.
fn startup_failure(error: anyhow::Error) -> ! {
    eprintln!("Error: {error:#}");
    if let Err(e) = logging::write_startup_failure(Path::new("."), &error) {
        eprintln!("could not write {}: {e}", logging::STARTUP_ERROR_LOG);
    }
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "article-harvest", &mut std::io::stdout());
        return;
    }

    let settings = resolve_settings(&cli).unwrap_or_else(|e| startup_failure(e));

    if let Commands::Settings = cli.command {
        match serde_json::to_string_pretty(&settings) {
            Ok(json) => println!("{json}"),
            Err(e) => startup_failure(e.into()),
        }
        return;
    }

    if let Err(e) = logging::init(&settings.log_level, &settings.log_file) {
        startup_failure(e);
    }

    if let Commands::Run { query, months, .. } = &cli.command {
        tracing::info!("starting article-harvest v{}", env!("CARGO_PKG_VERSION"));
        match run::run(&settings, query, *months).await {
            Ok(summary) => {
                println!("{}", summary.export_path.display());
                tracing::info!(
                    "{} records ({} examined, {} skipped, {:?})",
                    summary.report.records.len(),
                    summary.report.items_examined,
                    summary.report.items_skipped,
                    summary.report.stop_reason
                );
            }
            Err(e) => {
                tracing::error!("run failed: {e:#}");
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}

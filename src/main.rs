use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{
    filter::EnvFilter, fmt::writer::BoxMakeWriter, layer::SubscriberExt, Registry,
};

use seo_scout::cli::{Prompter, TerminalPrompter};
use seo_scout::core::config::load_first_config;
use seo_scout::workflows::{self, select_mode_interactive};
use seo_scout::{AppState, Mode, SeoError};

const LOG_FILE: &str = "logs/seo_scout.log";

#[derive(Parser, Debug)]
#[command(
    name = "seo-scout",
    version,
    about = "SEO content analysis & optimization for Persian sites",
    after_help = "Examples:\n  seo-scout                               # Interactive mode selection\n  seo-scout --mode content                # Content optimization mode\n  seo-scout --mode scraping               # SEO data collection mode\n  seo-scout --mode content --test         # Test mode (10 items)\n  seo-scout --config custom_config.yaml   # Use custom config"
)]
struct Cli {
    /// Operational mode; asked interactively when omitted.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Path to the configuration file.
    #[arg(long, env = "SEO_SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Process only 10 items for a quick validation run.
    #[arg(long)]
    test: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,

    /// Knowledge-base project name (overrides `app.project_name`).
    #[arg(long)]
    project: Option<String>,
}

/// Console plus `logs/seo_scout.log`. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{},hyper=warn,reqwest=warn", default_level))
        })
    };

    let log_file = Path::new(LOG_FILE)
        .parent()
        .map(std::fs::create_dir_all)
        .transpose()
        .ok()
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(LOG_FILE)
                .ok()
        });

    match log_file {
        Some(file) => {
            let subscriber = Registry::default()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(BoxMakeWriter::new(Arc::new(file)))
                        .with_ansi(false),
                );
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        None => {
            let subscriber = Registry::default()
                .with(env_filter())
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }
}

/// Ctrl-C ends the process from a separate task so it works while a prompt
/// blocks the workflow.
fn install_interrupt_handler(mode: Mode) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n\n⚠️  Process interrupted by user");
            if mode == Mode::Scraping {
                println!("   You can resume by running the program again.");
            }
            info!("Process interrupted by user");
            std::process::exit(0);
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_first_config(cli.config.as_deref()) {
        Ok((path, cfg)) => {
            info!("Using configuration {}", path.display());
            cfg
        }
        Err(SeoError::ConfigNotFound(path)) => {
            println!("\n❌ Configuration file '{}' not found", path.display());
            println!("\n   Please create config.yaml based on config.sample.yaml");
            println!("   Example: cp config.sample.yaml config.yaml\n");
            std::process::exit(1);
        }
        Err(e) => {
            println!("\n❌ {}", e);
            std::process::exit(1);
        }
    };

    let prompter: Arc<dyn Prompter> = Arc::new(TerminalPrompter::new());
    let mut state = AppState::new(config, prompter)
        .with_test_mode(cli.test)
        .with_project_name(cli.project);

    let mode = match cli.mode {
        Some(m) => m,
        None => select_mode_interactive(state.prompter())?,
    };
    install_interrupt_handler(mode);

    if let Err(e) = workflows::run(mode, &mut state).await {
        error!("Fatal error: {:#}", e);
        println!("\n\n❌ Fatal error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

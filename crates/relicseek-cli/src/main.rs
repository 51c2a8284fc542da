//! RelicSeek CLI - Iterative cultural relic research from the command line.

use clap::Parser;
use relicseek_cli::app::build_engine;
use relicseek_cli::commands;
use relicseek_cli::repl;
use relicseek_cli::{AppConfig, Cli, Command, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> relicseek_cli::Result<()> {
    let cli = Cli::parse();

    let path = AppConfig::resolve_path(cli.config.as_deref())?;
    let mut config = AppConfig::load_from(&path)?;
    config.apply_env();

    init_logging(&config.logging.level, cli.verbose);

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Some(Command::Init(args)) => commands::execute_init(args, &path, &formatter)?,
        Some(Command::Config(args)) => commands::execute_config(args, &config, &path, &formatter)?,
        Some(Command::Validate) => {
            commands::execute_validate(&config, &formatter).await?;
        }
        Some(Command::Status) => {
            let engine = build_engine(&config)?;
            commands::execute_status(&config, &engine, &formatter)?;
        }
        Some(Command::Search(args)) => {
            let engine = build_engine(&config)?;
            let response = commands::execute_search(args, &engine, &formatter).await?;
            if !response.success {
                std::process::exit(2);
            }
        }
        None | Some(Command::Repl) => {
            let engine = build_engine(&config)?;
            repl::run_repl(&config, &engine, &formatter).await?;
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over the configured level, `--verbose` over both.
fn init_logging(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use relicseek_engine::SessionConfig;
use std::path::PathBuf;

/// RelicSeek - Iterative web research on cultural relics.
#[derive(Debug, Parser)]
#[command(name = "relicseek")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "RELICSEEK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (report only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Research a cultural relic query
    Search(SearchArgs),

    /// Check API keys, SearXNG, prompts and session settings
    Validate,

    /// Show configuration and model wiring
    Status,

    /// Show the effective configuration
    Config(ConfigArgs),

    /// Write a default configuration file
    Init(InitArgs),

    /// Enter interactive REPL mode
    Repl,
}

/// Arguments for the search command.
#[derive(Debug, Clone, Parser)]
pub struct SearchArgs {
    /// Research query text
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Session preset
    #[arg(short, long, value_enum)]
    pub preset: Option<PresetArg>,

    /// Maximum verification rounds
    #[arg(short, long)]
    pub rounds: Option<u32>,

    /// Time budget in seconds
    #[arg(short = 't', long)]
    pub max_time: Option<u64>,

    /// Write the full result as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl SearchArgs {
    /// The query words joined back into one string
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }

    /// Session settings: preset (or configured defaults) plus flag overrides
    pub fn session_config(&self, defaults: &SessionConfig) -> SessionConfig {
        let mut config = match self.preset {
            Some(PresetArg::Quick) => SessionConfig::quick(),
            Some(PresetArg::Thorough) => SessionConfig::thorough(),
            Some(PresetArg::Default) => SessionConfig::default(),
            None => defaults.clone(),
        };
        if let Some(rounds) = self.rounds {
            config.verification_rounds = rounds;
            config.max_iterations = config.max_iterations.max(rounds);
        }
        if let Some(secs) = self.max_time {
            config.max_execution_time_secs = secs;
        }
        config
    }
}

/// Session presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PresetArg {
    /// One round, few results
    Quick,
    /// Built-in defaults
    Default,
    /// More rounds and sources
    Thorough,
}

/// Arguments for the config command.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (default)
    Show,

    /// Print the configuration file path
    Path,
}

/// Arguments for the init command.
#[derive(Debug, Parser)]
pub struct InitArgs {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,

    /// Also write the built-in prompt templates to this directory
    #[arg(long)]
    pub prompts: Option<PathBuf>,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_repl() {
        let cli = Cli::parse_from(["relicseek"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_search_command() {
        let cli = Cli::parse_from([
            "relicseek",
            "search",
            "马踏飞燕",
            "材质",
            "--preset",
            "quick",
            "--output",
            "horse.json",
        ]);
        match cli.command {
            Some(Command::Search(args)) => {
                assert_eq!(args.query_text(), "马踏飞燕 材质");
                assert_eq!(args.preset, Some(PresetArg::Quick));
                assert_eq!(args.output, Some(PathBuf::from("horse.json")));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_search_requires_query() {
        assert!(Cli::try_parse_from(["relicseek", "search"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["relicseek", "status", "-v", "--format", "json", "--no-color"]);
        assert!(cli.verbose);
        assert!(cli.no_color);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
    }

    #[test]
    fn test_session_config_overrides() {
        let cli = Cli::parse_from(["relicseek", "search", "铜奔马", "--rounds", "7", "--max-time", "90"]);
        let Some(Command::Search(args)) = cli.command else {
            panic!("Expected Search command");
        };

        let defaults = SessionConfig::default();
        let config = args.session_config(&defaults);
        assert_eq!(config.verification_rounds, 7);
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.max_execution_time_secs, 90);
        assert_eq!(config.round_limit(), 7);
    }

    #[test]
    fn test_preset_replaces_defaults() {
        let args = SearchArgs {
            query: vec!["四羊方尊".to_string()],
            preset: Some(PresetArg::Thorough),
            rounds: None,
            max_time: None,
            output: None,
        };
        let mut defaults = SessionConfig::default();
        defaults.topic_hint = "青铜器".to_string();

        assert_eq!(args.session_config(&defaults), SessionConfig::thorough());
    }

    #[test]
    fn test_init_and_config_commands() {
        let cli = Cli::parse_from(["relicseek", "init", "--force", "--prompts", "prompts"]);
        match cli.command {
            Some(Command::Init(args)) => {
                assert!(args.force);
                assert_eq!(args.prompts, Some(PathBuf::from("prompts")));
            }
            _ => panic!("Expected Init command"),
        }

        let cli = Cli::parse_from(["relicseek", "config", "path"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigArgs {
                action: Some(ConfigAction::Path)
            }))
        ));
    }
}

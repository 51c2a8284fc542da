//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::{AppConfig, OutputFormat};
use crate::error::Result;
use crate::output::Formatter;
use std::path::Path;

/// Execute the config command.
pub fn execute_config(args: ConfigArgs, config: &AppConfig, path: &Path, formatter: &Formatter) -> Result<()> {
    match args.action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Path => {
            println!("{}", path.display());
            if !path.exists() {
                eprintln!("{}", formatter.warning("File does not exist yet; run 'relicseek init'"));
            }
        }
        ConfigAction::Show => println!("{}", render_config(config, formatter.format())?),
    }
    Ok(())
}

/// The effective configuration, secrets masked.
pub fn render_config(config: &AppConfig, format: OutputFormat) -> Result<String> {
    let redacted = config.redacted();
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&redacted)?),
        OutputFormat::Table | OutputFormat::Quiet => redacted.to_toml(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_masks_key() {
        let mut config = AppConfig::default();
        config.model.api_key = "sk-abcdefghijkl".to_string();

        let toml = render_config(&config, OutputFormat::Table).unwrap();
        assert!(toml.contains("sk-...ijkl"));
        assert!(toml.contains("[session]"));

        let json = render_config(&config, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["model"]["api_key"], "sk-...ijkl");
        assert_eq!(value["session"]["verification_rounds"], 3);
    }
}

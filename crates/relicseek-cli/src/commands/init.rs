//! Init command implementation.

use crate::cli::InitArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use relicseek_engine::{PromptLibrary, PromptName};
use std::fs;
use std::path::Path;

/// Execute the init command.
pub fn execute_init(args: InitArgs, path: &Path, formatter: &Formatter) -> Result<()> {
    let mut config = AppConfig::default();

    if let Some(dir) = &args.prompts {
        let written = write_prompts(dir, args.force)?;
        println!(
            "{}",
            formatter.success(&format!("Wrote {} prompt template(s) to {}", written, dir.display()))
        );
        config.prompts_dir = Some(dir.clone());
    }

    write_config(&config, path, args.force)?;
    println!("{}", formatter.success(&format!("Created {}", path.display())));
    println!(
        "{}",
        formatter.info("Set OPENAI_API_KEY and SEARXNG_URL, then run 'relicseek validate'")
    );
    Ok(())
}

/// Write `config` to `path` unless a file is there and `force` is off.
pub fn write_config(config: &AppConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(CliError::InvalidInput(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }
    config.save_to(path)
}

/// Write the built-in templates as `<name>.txt`; returns how many were written.
///
/// Existing files are kept unless `force` is set.
pub fn write_prompts(dir: &Path, force: bool) -> Result<usize> {
    fs::create_dir_all(dir)?;
    let library = PromptLibrary::builtin();
    let mut written = 0;
    for name in PromptName::ALL {
        let file = dir.join(format!("{}.txt", name.as_str()));
        if file.exists() && !force {
            continue;
        }
        fs::write(&file, library.template(name))?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_default_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".relicseek").join("config.toml");
        let formatter = Formatter::new(OutputFormat::Table, false);

        execute_init(InitArgs { force: false, prompts: None }, &path, &formatter).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[session]\nverification_rounds = 1\n").unwrap();

        assert!(write_config(&AppConfig::default(), &path, false).is_err());
        assert_eq!(AppConfig::load_from(&path).unwrap().session.verification_rounds, 1);

        write_config(&AppConfig::default(), &path, true).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap().session.verification_rounds, 3);
    }

    #[test]
    fn test_write_prompts_round_trips_through_library() {
        let dir = TempDir::new().unwrap();
        let prompts = dir.path().join("prompts");

        assert_eq!(write_prompts(&prompts, false).unwrap(), PromptName::ALL.len());
        fs::write(prompts.join("reflection.txt"), "edited").unwrap();
        assert_eq!(write_prompts(&prompts, false).unwrap(), 0);

        let library = PromptLibrary::from_dir(&prompts).unwrap();
        assert_eq!(library.template(PromptName::Reflection), "edited");
        assert_eq!(
            library.template(PromptName::FinalSummary),
            PromptLibrary::builtin().template(PromptName::FinalSummary)
        );
    }

    #[test]
    fn test_init_with_prompts_records_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let prompts = dir.path().join("prompts");
        let formatter = Formatter::new(OutputFormat::Table, false);

        execute_init(
            InitArgs {
                force: false,
                prompts: Some(prompts.clone()),
            },
            &path,
            &formatter,
        )
        .unwrap();

        assert_eq!(AppConfig::load_from(&path).unwrap().prompts_dir, Some(prompts));
    }
}

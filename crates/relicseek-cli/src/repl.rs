//! Interactive REPL (Read-Eval-Print Loop) mode.

use crate::cli::SearchArgs;
use crate::commands;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use relicseek_engine::{ResearchEngine, SessionResponse};
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;

/// Run the interactive REPL.
pub async fn run_repl(config: &AppConfig, engine: &ResearchEngine, formatter: &Formatter) -> Result<()> {
    println!(
        "{}",
        formatter.info("RelicSeek REPL - Type a question to research it, 'help' for commands, 'exit' to quit")
    );
    println!();

    let mut editor = DefaultEditor::new()
        .map_err(|e| CliError::Io(std::io::Error::other(format!("Failed to initialize editor: {}", e))))?;
    editor.set_max_history_size(config.settings.history_size).ok();

    let history_path = get_history_path()?;
    let _ = editor.load_history(&history_path);

    let mut last: Option<SessionResponse> = None;

    loop {
        match editor.readline("relicseek> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).ok();

                match parse_repl_command(line) {
                    Ok(ReplCommand::Exit) => {
                        println!("{}", formatter.info("Goodbye!"));
                        break;
                    }
                    Ok(ReplCommand::Help) => print_help(formatter),
                    Ok(ReplCommand::Clear) => {
                        // ANSI clear screen and home cursor
                        print!("\x1B[2J\x1B[1;1H");
                        last = None;
                    }
                    Ok(ReplCommand::Status) => {
                        if let Err(e) = commands::execute_status(config, engine, formatter) {
                            eprintln!("{}", formatter.error(&e.to_string()));
                        }
                    }
                    Ok(ReplCommand::Save(path)) => match &last {
                        Some(response) => match commands::save_response(response, &path) {
                            Ok(()) => println!("{}", formatter.success(&format!("Saved to {}", path.display()))),
                            Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                        },
                        None => eprintln!("{}", formatter.error(&CliError::NoResult.to_string())),
                    },
                    Ok(ReplCommand::Search(args)) => match commands::execute_search(args, engine, formatter).await {
                        Ok(response) => {
                            println!("{}", formatter.format_rounds(&response));
                            last = Some(response);
                        }
                        Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                    },
                    Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", formatter.info("Use 'exit' to quit"));
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", formatter.error(&format!("Error: {}", err)));
                break;
            }
        }
    }

    editor.save_history(&history_path).ok();
    Ok(())
}

/// REPL command type.
#[derive(Debug)]
enum ReplCommand {
    Exit,
    Help,
    Clear,
    Status,
    Save(PathBuf),
    Search(SearchArgs),
}

/// Parse a REPL command line; anything that is not a command is a query.
fn parse_repl_command(line: &str) -> Result<ReplCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Err(CliError::InvalidInput("Empty command".to_string()));
    };

    match *first {
        "exit" | "quit" | "q" => Ok(ReplCommand::Exit),
        "help" | "?" => Ok(ReplCommand::Help),
        "clear" => Ok(ReplCommand::Clear),
        "status" => Ok(ReplCommand::Status),
        "save" => match parts.get(1) {
            Some(path) => Ok(ReplCommand::Save(PathBuf::from(path))),
            None => Err(CliError::InvalidInput("Usage: save <file>".to_string())),
        },
        "search" if parts.len() == 1 => Err(CliError::InvalidInput("Usage: search <query>".to_string())),
        "search" => Ok(ReplCommand::Search(search_args(&parts[1..]))),
        _ => Ok(ReplCommand::Search(search_args(&parts))),
    }
}

fn search_args(words: &[&str]) -> SearchArgs {
    SearchArgs {
        query: words.iter().map(|w| w.to_string()).collect(),
        preset: None,
        rounds: None,
        max_time: None,
        output: None,
    }
}

fn get_history_path() -> Result<PathBuf> {
    let dir = AppConfig::dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("history.txt"))
}

fn print_help(formatter: &Formatter) {
    println!("{}", formatter.info("Available commands:"));
    println!();
    println!("  <question>                     - Research a question, e.g. 马踏飞燕的材质是什么？");
    println!("  search <question>              - Same as above");
    println!("  save <file>                    - Save the last result as JSON");
    println!("  status                         - Show configuration and model wiring");
    println!("  clear                          - Clear the screen and the last result");
    println!("  help, ?                        - Show this help");
    println!("  exit, quit, q                  - Exit REPL");
    println!();
}

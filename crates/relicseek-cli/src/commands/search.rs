//! Search command implementation.

use crate::cli::SearchArgs;
use crate::error::{CliError, Result};
use crate::output::{response_json, Formatter};
use relicseek_engine::{ResearchEngine, SessionRequest, SessionResponse};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Execute the search command.
///
/// Ctrl-C cancels the running session; whatever was gathered is still printed.
pub async fn execute_search(
    args: SearchArgs,
    engine: &ResearchEngine,
    formatter: &Formatter,
) -> Result<SessionResponse> {
    let query = args.query_text();
    if query.trim().is_empty() {
        return Err(CliError::InvalidInput("Query must not be empty".to_string()));
    }

    let config = args.session_config(engine.defaults());
    let request = SessionRequest::new(query).with_config(config);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let result = engine.search(request, cancel).await;
    watcher.abort();
    let response = result?;

    println!("{}", formatter.format_response(&response)?);

    if let Some(path) = &args.output {
        save_response(&response, path)?;
        eprintln!("{}", formatter.success(&format!("Saved result to {}", path.display())));
    }

    Ok(response)
}

/// Write a session result as pretty JSON.
pub fn save_response(response: &SessionResponse, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&response_json(response))?;
    std::fs::write(path, json)?;
    info!("Exported session {} to {}", response.session_id, path.display());
    Ok(())
}

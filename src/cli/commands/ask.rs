//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{AskRequest, Orchestrator};
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, top_k: Option<usize>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(&settings)?;

    let mut request = AskRequest::new(question);
    request.top_k = top_k;

    let spinner = Output::spinner("Searching lectures...");
    let response = orchestrator.answer(&request).await;
    spinner.finish_and_clear();

    println!("\n{}\n", response.answer);

    // The answer text already carries the sources block unless disabled.
    if !settings.answer.append_sources && !response.sources.is_empty() {
        Output::header("Sources");
        for (i, url) in response.sources.iter().enumerate() {
            Output::source(i + 1, url);
        }
    }

    Ok(())
}

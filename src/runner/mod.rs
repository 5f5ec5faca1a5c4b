pub mod checkpoint;
pub mod context;
pub mod coordinator;
pub mod events;
pub mod executor;
pub mod signal;
pub mod state;
pub mod status;
pub mod task;
pub mod variations;

#[cfg(test)]
pub(crate) mod testing;

use crate::driver::traits::SessionProvider;
use crate::driver::HttpAutomation;
use crate::error::EngineError;
use crate::parser::types::TestCase;
use crate::utils::config::Config;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

pub use context::RunContext;
pub use coordinator::RunCoordinator;
pub use events::*;
pub use signal::{ShutdownSignal, StopReason};
pub use state::*;
pub use status::{ConsoleSink, StatusReporter};

/// Run a usability test matrix against the automation bridge named in `config`
pub async fn run_usability_tests(
    target_url: &str,
    cases: &[TestCase],
    config: &Config,
    output: &Path,
    resume: bool,
) -> Result<RunState> {
    if cases.is_empty() {
        anyhow::bail!("The matrix does not produce any test case");
    }

    let context = RunContext::new(output, target_url);
    context
        .prepare()
        .with_context(|| format!("Cannot create output directory {}", output.display()))?;

    let provider = HttpAutomation::new(&config.endpoint, config.headless)?;
    provider
        .ping()
        .await
        .map_err(|e| EngineError::Unreachable {
            endpoint: config.endpoint.clone(),
            reason: e.to_string(),
        })?;
    log::info!("Automation bridge reachable at {}", config.endpoint);

    let previous = if resume {
        let path = context.results_path();
        if path.exists() {
            let state = checkpoint::load(&path)
                .with_context(|| format!("Cannot resume from {}", path.display()))?;
            println!(
                "{} Resuming run {} ({} sealed)",
                "↻".yellow(),
                state.run_id,
                state.sealed_count()
            );
            Some(state)
        } else {
            log::warn!("Nothing to resume at {}, starting a new run", path.display());
            None
        }
    } else {
        None
    };

    let shutdown = ShutdownSignal::new();
    shutdown.install_ctrlc()?;

    let (events, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let provider: Arc<dyn SessionProvider> = Arc::new(provider);
    let coordinator = RunCoordinator::new(provider, config, context, shutdown).with_events(events);
    let reporter = StatusReporter::spawn(config.status_interval, coordinator.progress(), ConsoleSink);

    let outcome = coordinator.run_all(cases, config.run_timeout, previous).await;

    reporter.stop().await;
    // Dropping the coordinator closes the event channel
    drop(coordinator);
    let _ = listener.await;

    Ok(outcome?)
}

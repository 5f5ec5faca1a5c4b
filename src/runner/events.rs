use super::state::{Outcome, Resolution, RunStatus, RunSummary, StopCause, TestStatus};
use tokio::sync::broadcast;

/// Run execution events for real-time updates
#[derive(Debug, Clone)]
pub enum RunEvent {
    // Run events
    RunStarted {
        run_id: String,
        target_url: String,
        total: usize,
        resumed: usize,
    },
    RunFinished {
        status: RunStatus,
        summary: RunSummary,
    },
    ShutdownRequested {
        reason: StopCause,
    },

    // Test events
    TestStarted {
        index: usize,
        total: usize,
        persona: String,
        task: String,
        concepts: usize,
    },
    TestSealed {
        persona: String,
        task: String,
        status: TestStatus,
        reason: Option<StopCause>,
        steps: usize,
        duration_ms: u64,
    },

    // Step events
    StepFinished {
        concept: String,
        attempt: usize,
        instruction: String,
        outcome: Outcome,
        duration_ms: u64,
    },
    ConceptResolved {
        concept: String,
        resolution: Resolution,
        attempts: usize,
    },
}

/// Event emitter for broadcasting run events
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<RunEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<RunEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<RunEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden draw target when piped, to avoid terminal escape codes
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        let mut spinner: Option<ProgressBar> = None;
        let mut test_label = String::new();

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("Console listener skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                RunEvent::RunStarted {
                    run_id,
                    target_url,
                    total,
                    resumed,
                } => {
                    multi
                        .println(format!(
                            "\n{} Usability run started: {}",
                            "▶".green().bold(),
                            run_id.cyan()
                        ))
                        .ok();
                    multi.println(format!("  Target: {}", target_url)).ok();
                    if resumed > 0 {
                        multi
                            .println(format!(
                                "  {} test(s), {} already sealed",
                                total,
                                resumed.to_string().yellow()
                            ))
                            .ok();
                    } else {
                        multi.println(format!("  {} test(s)", total)).ok();
                    }
                }

                RunEvent::TestStarted {
                    index,
                    total,
                    persona,
                    task,
                    concepts,
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }

                    println!(
                        "\n  {} [{}/{}] {} / {} ({} concepts)",
                        "→".blue(),
                        index + 1,
                        total,
                        persona.white().bold(),
                        task,
                        concepts
                    );

                    let pb = multi.add(ProgressBar::new_spinner());
                    let style = ProgressStyle::default_spinner()
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .template("      {spinner} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                    pb.set_style(style);
                    pb.set_message("starting...");
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinner = Some(pb);
                    test_label = format!("{} / {}", persona, task);
                }

                RunEvent::StepFinished {
                    concept,
                    attempt,
                    instruction,
                    outcome,
                    duration_ms,
                } => {
                    let mark = match outcome {
                        Outcome::Success => "✓".green(),
                        Outcome::Negative => "✗".red(),
                        Outcome::Ambiguous => "?".yellow(),
                        Outcome::Timeout => "⏱".yellow(),
                        Outcome::CapabilityError => "!".red(),
                    };
                    let line = format!(
                        "      {} [{}#{}] {} ({}ms)",
                        mark,
                        concept,
                        attempt,
                        instruction.dimmed(),
                        duration_ms
                    );
                    match &spinner {
                        Some(pb) => {
                            pb.println(line);
                            pb.set_message(format!("{} step(s) on {}", attempt, concept));
                        }
                        None => println!("{}", line),
                    }
                }

                RunEvent::ConceptResolved {
                    concept,
                    resolution,
                    attempts,
                } => {
                    if let Some(pb) = &spinner {
                        pb.set_message(format!(
                            "{} {:?} after {} attempt(s)",
                            concept, resolution, attempts
                        ));
                    }
                }

                RunEvent::TestSealed {
                    status,
                    reason,
                    steps,
                    duration_ms,
                    ..
                } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                        // Let the clear render before printing below it
                        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
                    }

                    let status_str = match status {
                        TestStatus::Completed => "COMPLETED".green().bold(),
                        TestStatus::TimedOut => "TIMED OUT".yellow().bold(),
                        TestStatus::Aborted => "ABORTED".red().bold(),
                    };
                    let reason_str = reason
                        .map(|r| format!(" ({:?})", r).dimmed().to_string())
                        .unwrap_or_default();
                    println!(
                        "  {} {} [{}]{} {} steps, {}ms",
                        "←".blue(),
                        test_label,
                        status_str,
                        reason_str,
                        steps,
                        duration_ms
                    );
                }

                RunEvent::ShutdownRequested { reason } => {
                    multi
                        .println(format!(
                            "\n{} Stopping run: {:?}",
                            "⏹".yellow().bold(),
                            reason
                        ))
                        .ok();
                }

                RunEvent::RunFinished { status, summary } => {
                    if let Some(pb) = spinner.take() {
                        pb.finish_and_clear();
                    }

                    // Small delay to ensure spinner clears are rendered
                    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

                    println!("\n{} Usability run finished ({:?})", "■".blue().bold(), status);
                    println!("  Tests: {}/{} sealed", summary.sealed, summary.total_tests);
                    println!(
                        "  {} completed, {} timed out, {} aborted",
                        summary.completed.to_string().green(),
                        summary.timed_out.to_string().yellow(),
                        summary.aborted.to_string().red()
                    );
                    println!(
                        "  Concepts: {} success, {} negative, {} undecided, {} skipped",
                        summary.concepts_success,
                        summary.concepts_negative,
                        summary.concepts_undecided,
                        summary.concepts_skipped
                    );
                    println!("  Steps: {}", summary.total_steps);
                    println!("  Duration: {}ms", summary.total_duration_ms);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emitter_broadcasts_to_subscribers() {
        let (emitter, mut first) = EventEmitter::new();
        let mut second = emitter.subscribe();

        emitter.emit(RunEvent::ShutdownRequested {
            reason: StopCause::RunTimeout,
        });

        for receiver in [&mut first, &mut second] {
            match receiver.recv().await.unwrap() {
                RunEvent::ShutdownRequested { reason } => {
                    assert_eq!(reason, StopCause::RunTimeout)
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let emitter = EventEmitter::default();
        emitter.emit(RunEvent::ShutdownRequested {
            reason: StopCause::Interrupted,
        });
    }
}

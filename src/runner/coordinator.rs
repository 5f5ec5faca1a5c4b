//! Run coordinator
//!
//! Owns the test matrix and the run state. Dispatches test cases one at a
//! time, scopes a session around each of them, checkpoints after every
//! sealed result and handles interrupts and the run timeout.

use super::checkpoint::Checkpointer;
use super::context::RunContext;
use super::events::{EventEmitter, RunEvent};
use super::signal::{ShutdownSignal, StopReason};
use super::state::{
    ProgressSnapshot, RunState, RunStatus, StopCause, TestRecorder, TestResult, TestStatus,
};
use super::task::{skip_unresolved, trace_path, TaskRunner};
use crate::driver::traits::{AutomationSession, SessionProvider};
use crate::error::{EngineError, EngineResult};
use crate::parser::types::{TestCase, TestCaseId};
use crate::utils::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct RunCoordinator {
    provider: Arc<dyn SessionProvider>,
    runner: TaskRunner,
    context: RunContext,
    grace_period: Duration,
    shutdown: ShutdownSignal,
    events: EventEmitter,
    progress: watch::Sender<ProgressSnapshot>,
}

impl RunCoordinator {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        config: &Config,
        context: RunContext,
        shutdown: ShutdownSignal,
    ) -> Self {
        let (progress, _) = watch::channel(ProgressSnapshot::default());
        Self {
            provider,
            runner: TaskRunner::new(config),
            context,
            grace_period: config.grace_period,
            shutdown,
            events: EventEmitter::default(),
            progress,
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.runner = self.runner.with_events(events.clone());
        self.events = events;
        self
    }

    /// Progress snapshots, republished on every dispatch and seal
    pub fn progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Execute `cases` in order and return the final, persisted run state.
    ///
    /// With `previous`, sealed results are kept and only the remaining cases
    /// run; tests cut short by an interrupt or the run timeout are re-queued.
    pub async fn run_all(
        &self,
        cases: &[TestCase],
        global_timeout: Option<Duration>,
        previous: Option<RunState>,
    ) -> EngineResult<RunState> {
        let results_path = self.context.results_path();
        let (mut state, mut checkpointer) = match previous {
            Some(previous) => {
                let state = self.resume_state(previous, cases);
                let checkpointer = Checkpointer::resume_from(&results_path, &state);
                (state, checkpointer)
            }
            None => {
                let run_id = uuid::Uuid::new_v4().to_string();
                let state = RunState::new(&run_id, &self.context.target_url, cases);
                (state, Checkpointer::new(&results_path))
            }
        };

        let pending: Vec<&TestCase> = cases
            .iter()
            .filter(|case| state.remaining.contains(&case.id()))
            .collect();
        let total = state.sealed_count() + pending.len();

        self.events.emit(RunEvent::RunStarted {
            run_id: state.run_id.clone(),
            target_url: state.target_url.clone(),
            total,
            resumed: state.sealed_count(),
        });
        self.publish(total, &state, None);

        let timer = global_timeout.map(|after| self.shutdown.arm_timeout(after));
        let mut acquired_any = false;

        for (index, case) in pending.iter().enumerate() {
            if let Some(reason) = self.shutdown.reason() {
                log::info!("Not dispatching further tests ({:?})", reason);
                break;
            }

            self.publish(total, &state, Some(case.id()));
            self.events.emit(RunEvent::TestStarted {
                index: state.sealed_count(),
                total,
                persona: case.persona.name.clone(),
                task: case.task.description.clone(),
                concepts: case.task.concepts.len(),
            });
            log::info!("Test {}/{}: {}", index + 1, pending.len(), case.id());

            let acquired = tokio::select! {
                biased;
                reason = self.shutdown.triggered() => {
                    log::info!(
                        "Stop requested ({:?}) while opening a session for {}",
                        reason,
                        case.id()
                    );
                    break;
                }
                acquired = self
                    .provider
                    .acquire(&self.context.target_url, &self.context.traces_dir) => acquired,
            };
            let session = match acquired {
                Ok(session) => session,
                Err(e) if !acquired_any => {
                    if let Some(timer) = &timer {
                        timer.abort();
                    }
                    return Err(EngineError::FatalStartup(e.to_string()));
                }
                Err(e) => {
                    log::warn!("Cannot acquire session for {}: {}", case.id(), e);
                    let mut recorder = TestRecorder::start(case);
                    skip_unresolved(&mut recorder, &case.task.concepts);
                    let result = recorder.seal(
                        TestStatus::Aborted,
                        Some(StopCause::SessionUnavailable),
                        None,
                    );
                    self.seal(&mut state, &mut checkpointer, total, result)?;
                    continue;
                }
            };
            acquired_any = true;

            let result = self.run_one(case, session.as_ref()).await;

            self.release(session).await;

            self.seal(&mut state, &mut checkpointer, total, result)?;
        }

        if let Some(timer) = timer {
            timer.abort();
        }

        state.status = self.final_status(&state);
        checkpointer.persist(&mut state)?;
        self.publish(total, &state, None);

        log::info!(
            "Run {} finished: {:?}, {} sealed, results at {}",
            state.run_id,
            state.status,
            state.sealed_count(),
            results_path.display()
        );
        self.events.emit(RunEvent::RunFinished {
            status: state.status,
            summary: state.summary(),
        });

        Ok(state)
    }

    /// Run one test, racing it against the shutdown signal.
    ///
    /// Once a stop is requested the test gets the grace period to seal
    /// itself; after that it is sealed aborted with the steps it recorded.
    async fn run_one(&self, case: &TestCase, session: &dyn AutomationSession) -> TestResult {
        let mut recorder = TestRecorder::start(case);

        let outcome = {
            let drive = self
                .runner
                .drive(case, session, &mut recorder, &self.shutdown);
            tokio::pin!(drive);

            tokio::select! {
                biased;
                outcome = &mut drive => Some(outcome),
                reason = self.shutdown.triggered() => {
                    self.events.emit(RunEvent::ShutdownRequested {
                        reason: reason.into(),
                    });
                    log::info!(
                        "Stop requested ({:?}), giving the running test {}s to finish",
                        reason,
                        self.grace_period.as_secs()
                    );
                    tokio::time::timeout(self.grace_period, &mut drive).await.ok()
                }
            }
        };

        let (status, reason) = match outcome {
            Some(outcome) => outcome,
            None => {
                log::warn!("Grace period elapsed, force-sealing {}", case.id());
                skip_unresolved(&mut recorder, &case.task.concepts);
                (TestStatus::Aborted, Some(StopCause::GracePeriodElapsed))
            }
        };

        recorder.seal(status, reason, trace_path(session))
    }

    /// Close a session, waiting at most the grace period for the bridge
    async fn release(&self, session: Box<dyn AutomationSession>) {
        let session_id = session.session_id().to_string();
        match tokio::time::timeout(self.grace_period, self.provider.release(session)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("Failed to release session {}: {}", session_id, e),
            Err(_) => log::warn!(
                "Releasing session {} did not finish within {}s, moving on",
                session_id,
                self.grace_period.as_secs()
            ),
        }
    }

    fn seal(
        &self,
        state: &mut RunState,
        checkpointer: &mut Checkpointer,
        total: usize,
        result: TestResult,
    ) -> EngineResult<()> {
        self.events.emit(RunEvent::TestSealed {
            persona: result.persona.clone(),
            task: result.task.clone(),
            status: result.status,
            reason: result.reason,
            steps: result.steps.len(),
            duration_ms: result.duration_ms,
        });

        state.seal(result);
        checkpointer.persist(state)?;
        self.publish(total, state, None);
        Ok(())
    }

    fn publish(&self, total: usize, state: &RunState, current: Option<TestCaseId>) {
        self.progress.send_replace(ProgressSnapshot {
            total,
            sealed: state.sealed_count(),
            current,
        });
    }

    fn final_status(&self, state: &RunState) -> RunStatus {
        let cut_short = !state.remaining.is_empty()
            || state
                .tests
                .iter()
                .any(|t| t.reason.map_or(false, |r| r.is_external()));

        if !cut_short {
            return RunStatus::Completed;
        }
        match self.shutdown.reason() {
            Some(StopReason::RunTimeout) => RunStatus::TimedOut,
            _ => RunStatus::Interrupted,
        }
    }

    /// Keep the sealed results of a previous run and re-queue what is left
    fn resume_state(&self, mut previous: RunState, cases: &[TestCase]) -> RunState {
        if previous.target_url != self.context.target_url {
            log::warn!(
                "Resuming run {} recorded against {}, now targeting {}",
                previous.run_id,
                previous.target_url,
                self.context.target_url
            );
        }

        let requeued: Vec<TestCaseId> = previous
            .tests
            .iter()
            .filter(|t| t.reason.map_or(false, |r| r.is_external()))
            .map(|t| t.id())
            .collect();
        if !requeued.is_empty() {
            log::info!("Re-queueing {} interrupted test(s)", requeued.len());
        }
        previous.tests.retain(|t| !requeued.contains(&t.id()));

        previous.remaining = cases
            .iter()
            .map(|c| c.id())
            .filter(|id| !previous.is_sealed(id))
            .collect();
        previous.status = RunStatus::InProgress;
        previous
    }
}

//! Task runner
//!
//! Drives one (persona, task) test case: each concept is attempted with the
//! phrasings from the variation generator until a decisive answer or the
//! attempt cap, under a per-test step budget.

use super::events::{EventEmitter, RunEvent};
use super::executor::{StepExecutor, StepRequest};
use super::signal::ShutdownSignal;
use super::state::{
    Outcome, Resolution, StepJournal, StepKind, StopCause, TestRecorder, TestResult, TestStatus,
};
use super::variations::variations;
use crate::driver::traits::AutomationSession;
use crate::parser::types::{Concept, ConceptKind, TestCase};
use crate::utils::config::Config;
use std::time::Duration;

pub struct TaskRunner {
    executor: StepExecutor,
    step_budget: usize,
    max_attempts: usize,
    step_timeout: Duration,
    scroll_loop_window: usize,
    capability_error_limit: usize,
    events: EventEmitter,
}

impl TaskRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            executor: StepExecutor::new(config.health_check_timeout),
            step_budget: config.step_budget,
            max_attempts: config.max_attempts_per_concept,
            step_timeout: config.step_timeout,
            scroll_loop_window: config.scroll_loop_window,
            capability_error_limit: config.capability_error_limit,
            events: EventEmitter::default(),
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    /// Run a test case to completion and seal it
    pub async fn run(
        &self,
        case: &TestCase,
        session: &dyn AutomationSession,
        shutdown: &ShutdownSignal,
    ) -> TestResult {
        let mut recorder = TestRecorder::start(case);
        let (status, reason) = self.drive(case, session, &mut recorder, shutdown).await;
        recorder.seal(status, reason, trace_path(session))
    }

    /// Drive a test case, recording into a caller-owned recorder.
    ///
    /// The recorder outlives this future, so a caller that stops waiting
    /// still holds every step recorded so far.
    pub async fn drive(
        &self,
        case: &TestCase,
        session: &dyn AutomationSession,
        recorder: &mut TestRecorder,
        shutdown: &ShutdownSignal,
    ) -> (TestStatus, Option<StopCause>) {
        let concepts = &case.task.concepts;
        let mut capability_errors = 0;

        for (index, concept) in concepts.iter().enumerate() {
            let (kind, scroll) = match concept.kind {
                ConceptKind::Query => (StepKind::Query, false),
                ConceptKind::Navigate => (StepKind::Action, false),
                ConceptKind::Scroll => (StepKind::Action, true),
            };

            let mut attempts = 0;
            let mut resolution = Resolution::Undecided;

            for instruction in variations(concept, &case.persona).take(self.max_attempts) {
                if let Some(reason) = shutdown.reason() {
                    return self.stop(
                        recorder,
                        concepts,
                        index,
                        attempts,
                        TestStatus::Aborted,
                        reason.into(),
                    );
                }
                if recorder.journal.len() >= self.step_budget {
                    return self.stop(
                        recorder,
                        concepts,
                        index,
                        attempts,
                        TestStatus::TimedOut,
                        StopCause::StepBudgetExhausted,
                    );
                }

                attempts += 1;
                let request = StepRequest {
                    concept: &concept.name,
                    instruction: &instruction,
                    kind,
                    attempt: attempts,
                    scroll,
                    schema: concept.schema.as_ref(),
                };
                let step = self
                    .executor
                    .execute(session, request, self.step_timeout, &mut recorder.journal)
                    .await;
                let (outcome, healthy) = (step.outcome, step.session_healthy);

                self.events.emit(RunEvent::StepFinished {
                    concept: step.concept.clone(),
                    attempt: step.attempt,
                    instruction: step.instruction.clone(),
                    outcome,
                    duration_ms: step.duration_ms,
                });

                match outcome {
                    Outcome::Success => {
                        resolution = Resolution::Success;
                        break;
                    }
                    Outcome::Negative => {
                        resolution = Resolution::Negative;
                        break;
                    }
                    Outcome::Timeout if healthy == Some(false) => {
                        log::warn!("Session lost during '{}'", concept.name);
                        return self.stop(
                            recorder,
                            concepts,
                            index,
                            attempts,
                            TestStatus::Aborted,
                            StopCause::SessionLost,
                        );
                    }
                    Outcome::CapabilityError => {
                        capability_errors += 1;
                        if capability_errors >= self.capability_error_limit {
                            log::warn!(
                                "{} capability errors in one test, giving up",
                                capability_errors
                            );
                            return self.stop(
                                recorder,
                                concepts,
                                index,
                                attempts,
                                TestStatus::Aborted,
                                StopCause::RepeatedCapabilityErrors,
                            );
                        }
                    }
                    Outcome::Ambiguous | Outcome::Timeout => {}
                }

                if self.in_scroll_loop(&recorder.journal) {
                    log::warn!(
                        "{} scrolls without content change, stopping test",
                        self.scroll_loop_window
                    );
                    return self.stop(
                        recorder,
                        concepts,
                        index,
                        attempts,
                        TestStatus::TimedOut,
                        StopCause::ScrollLoop,
                    );
                }
            }

            self.resolve(recorder, concept, resolution, attempts);
        }

        (TestStatus::Completed, None)
    }

    /// The last `scroll_loop_window` steps were all scrolls that moved nothing
    fn in_scroll_loop(&self, journal: &StepJournal) -> bool {
        let recent = journal.recent(self.scroll_loop_window);
        self.scroll_loop_window > 0
            && recent.len() == self.scroll_loop_window
            && recent.iter().all(|step| step.is_stalled_scroll())
    }

    fn resolve(
        &self,
        recorder: &mut TestRecorder,
        concept: &Concept,
        resolution: Resolution,
        attempts: usize,
    ) {
        recorder.resolve(&concept.name, resolution, attempts);
        self.events.emit(RunEvent::ConceptResolved {
            concept: concept.name.clone(),
            resolution,
            attempts,
        });
    }

    /// End the test early: the interrupted concept is undecided if it was
    /// attempted at all, everything after it is skipped
    fn stop(
        &self,
        recorder: &mut TestRecorder,
        concepts: &[Concept],
        index: usize,
        attempts: usize,
        status: TestStatus,
        cause: StopCause,
    ) -> (TestStatus, Option<StopCause>) {
        let mut rest = concepts[index..].iter();
        if attempts > 0 {
            if let Some(current) = rest.next() {
                self.resolve(recorder, current, Resolution::Undecided, attempts);
            }
        }
        for concept in rest {
            recorder.resolve(&concept.name, Resolution::Skipped, 0);
        }
        (status, Some(cause))
    }
}

pub fn trace_path(session: &dyn AutomationSession) -> Option<String> {
    session.trace_path().map(|p| p.display().to_string())
}

/// Record remaining concepts as skipped on a recorder whose runner was abandoned
pub fn skip_unresolved(recorder: &mut TestRecorder, concepts: &[Concept]) {
    for concept in concepts {
        if recorder.concepts.iter().all(|c| c.concept != concept.name) {
            let attempts = recorder
                .journal
                .steps()
                .iter()
                .filter(|s| s.concept == concept.name)
                .count();
            let resolution = if attempts > 0 {
                Resolution::Undecided
            } else {
                Resolution::Skipped
            };
            recorder.resolve(&concept.name, resolution, attempts);
        }
    }
}

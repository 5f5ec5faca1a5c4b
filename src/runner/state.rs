use crate::parser::types::{Proficiency, TestCase, TestCaseId};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Kind of automation call a step issued
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Action,
    Query,
}

/// Protocol-level classification of a step's response
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Negative,
    Ambiguous,
    Timeout,
    CapabilityError,
}

/// One attempted interaction. Never mutated after it is recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub concept: String,
    pub instruction: String,
    pub kind: StepKind,
    pub raw_text: String,
    pub outcome: Outcome,
    pub duration_ms: u64,

    /// 1-based position within the concept's variation sequence
    pub attempt: usize,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub scroll: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_changed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Health verdict of the session, checked after a timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_healthy: Option<bool>,
}

impl Step {
    /// Scroll action without a positive content-change signal
    pub fn is_stalled_scroll(&self) -> bool {
        self.scroll && self.content_changed != Some(true)
    }
}

/// Append-only step log of one running test
#[derive(Debug, Clone, Default)]
pub struct StepJournal {
    steps: Vec<Step>,
}

impl StepJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step) -> &Step {
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Up to `n` most recent steps, oldest first
    pub fn recent(&self, n: usize) -> &[Step] {
        &self.steps[self.steps.len().saturating_sub(n)..]
    }

    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}

/// Terminal status of a test case
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Completed,
    TimedOut,
    Aborted,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Completed => "completed",
            TestStatus::TimedOut => "timed_out",
            TestStatus::Aborted => "aborted",
        }
    }
}

/// Why a test ended before running all of its concepts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    StepBudgetExhausted,
    ScrollLoop,
    SessionLost,
    SessionUnavailable,
    RepeatedCapabilityErrors,
    Interrupted,
    RunTimeout,
    GracePeriodElapsed,
}

impl StopCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopCause::StepBudgetExhausted => "step_budget_exhausted",
            StopCause::ScrollLoop => "scroll_loop",
            StopCause::SessionLost => "session_lost",
            StopCause::SessionUnavailable => "session_unavailable",
            StopCause::RepeatedCapabilityErrors => "repeated_capability_errors",
            StopCause::Interrupted => "interrupted",
            StopCause::RunTimeout => "run_timeout",
            StopCause::GracePeriodElapsed => "grace_period_elapsed",
        }
    }

    /// Stops caused by the operator or the run clock rather than the test itself
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            StopCause::Interrupted | StopCause::RunTimeout | StopCause::GracePeriodElapsed
        )
    }
}

/// How a concept ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Success,
    Negative,
    Undecided,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConceptResult {
    pub concept: String,
    pub resolution: Resolution,
    pub attempts: usize,
}

/// Sealed result of one test case
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub persona: String,
    pub proficiency: Proficiency,
    pub task: String,
    pub status: TestStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StopCause>,

    pub steps: Vec<Step>,
    pub concepts: Vec<ConceptResult>,
    pub duration_ms: u64,

    #[serde(default)]
    pub trace_path: Option<String>,

    pub started_at: String,
}

impl TestResult {
    pub fn id(&self) -> TestCaseId {
        TestCaseId {
            persona: self.persona.clone(),
            task: self.task.clone(),
        }
    }
}

/// In-progress test result; only `seal` turns it into something persistable
#[derive(Debug)]
pub struct TestRecorder {
    persona: String,
    proficiency: Proficiency,
    task: String,
    pub journal: StepJournal,
    pub concepts: Vec<ConceptResult>,
    started: Instant,
    started_at: String,
}

impl TestRecorder {
    pub fn start(case: &TestCase) -> Self {
        Self {
            persona: case.persona.name.clone(),
            proficiency: case.persona.proficiency,
            task: case.task.description.clone(),
            journal: StepJournal::new(),
            concepts: Vec::new(),
            started: Instant::now(),
            started_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn resolve(&mut self, concept: &str, resolution: Resolution, attempts: usize) {
        self.concepts.push(ConceptResult {
            concept: concept.to_string(),
            resolution,
            attempts,
        });
    }

    pub fn seal(
        self,
        status: TestStatus,
        reason: Option<StopCause>,
        trace_path: Option<String>,
    ) -> TestResult {
        TestResult {
            persona: self.persona,
            proficiency: self.proficiency,
            task: self.task,
            status,
            reason,
            steps: self.journal.into_steps(),
            concepts: self.concepts,
            duration_ms: self.started.elapsed().as_millis() as u64,
            trace_path,
            started_at: self.started_at,
        }
    }
}

/// Status of the whole run as recorded in the artifact
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Interrupted,
    TimedOut,
}

/// Process-wide run state; the persisted artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub run_id: String,
    pub target_url: String,
    pub started_at: String,
    pub status: RunStatus,

    /// Monotonic checkpoint number, bumped on every persist
    pub checkpoint: u64,

    /// Sealed results in dispatch order
    pub tests: Vec<TestResult>,

    /// Test cases not yet dispatched
    pub remaining: Vec<TestCaseId>,
}

impl RunState {
    pub fn new(run_id: &str, target_url: &str, cases: &[TestCase]) -> Self {
        Self {
            run_id: run_id.to_string(),
            target_url: target_url.to_string(),
            started_at: chrono::Local::now().to_rfc3339(),
            status: RunStatus::InProgress,
            checkpoint: 0,
            tests: Vec::new(),
            remaining: cases.iter().map(|c| c.id()).collect(),
        }
    }

    /// Append a sealed result and advance the cursor past it
    pub fn seal(&mut self, result: TestResult) {
        let id = result.id();
        if let Some(pos) = self.remaining.iter().position(|r| *r == id) {
            self.remaining.remove(pos);
        }
        self.tests.push(result);
    }

    pub fn sealed_count(&self) -> usize {
        self.tests.len()
    }

    pub fn is_sealed(&self, id: &TestCaseId) -> bool {
        self.tests.iter().any(|t| t.id() == *id)
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            run_id: self.run_id.clone(),
            total_tests: self.tests.len() + self.remaining.len(),
            sealed: self.tests.len(),
            remaining: self.remaining.len(),
            ..Default::default()
        };

        for test in &self.tests {
            match test.status {
                TestStatus::Completed => summary.completed += 1,
                TestStatus::TimedOut => summary.timed_out += 1,
                TestStatus::Aborted => summary.aborted += 1,
            }
            summary.total_steps += test.steps.len();
            for concept in &test.concepts {
                match concept.resolution {
                    Resolution::Success => summary.concepts_success += 1,
                    Resolution::Negative => summary.concepts_negative += 1,
                    Resolution::Undecided => summary.concepts_undecided += 1,
                    Resolution::Skipped => summary.concepts_skipped += 1,
                }
            }
            summary.total_duration_ms += test.duration_ms;
        }

        summary
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub total_tests: usize,
    pub sealed: usize,
    pub remaining: usize,
    pub completed: usize,
    pub timed_out: usize,
    pub aborted: usize,
    pub total_steps: usize,
    pub concepts_success: usize,
    pub concepts_negative: usize,
    pub concepts_undecided: usize,
    pub concepts_skipped: usize,
    pub total_duration_ms: u64,
}

/// Immutable progress view handed to the status reporter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub sealed: usize,
    pub current: Option<TestCaseId>,
}

impl ProgressSnapshot {
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.sealed)
    }
}

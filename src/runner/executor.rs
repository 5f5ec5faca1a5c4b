//! Step executor
//!
//! Issues exactly one automation call per step under a hard time budget,
//! classifies the response and appends the observation to the journal.
//! Failures are data: every call produces a step, and nothing is retried here.

use super::state::{Outcome, Step, StepJournal, StepKind};
use crate::driver::traits::{ActOutcome, AutomationSession, QueryOutcome};
use crate::error::AutomationError;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Query used to decide whether a session survived a timeout
pub const HEALTH_CHECK_QUERY: &str = "Is there any text visible on the page?";

/// What a single step should do
#[derive(Debug, Clone)]
pub struct StepRequest<'a> {
    pub concept: &'a str,
    pub instruction: &'a str,
    pub kind: StepKind,
    pub attempt: usize,
    pub scroll: bool,
    pub schema: Option<&'a Value>,
}

pub struct StepExecutor {
    health_check_timeout: Duration,
    boolean_schema: Value,
}

impl StepExecutor {
    pub fn new(health_check_timeout: Duration) -> Self {
        Self {
            health_check_timeout,
            boolean_schema: serde_json::json!({ "type": "boolean" }),
        }
    }

    /// Execute one step within `budget` and record it
    pub async fn execute<'j>(
        &self,
        session: &dyn AutomationSession,
        request: StepRequest<'_>,
        budget: Duration,
        journal: &'j mut StepJournal,
    ) -> &'j Step {
        let started = Instant::now();
        let mut step = Step {
            concept: request.concept.to_string(),
            instruction: request.instruction.to_string(),
            kind: request.kind,
            raw_text: String::new(),
            outcome: Outcome::Ambiguous,
            duration_ms: 0,
            attempt: request.attempt,
            scroll: request.scroll,
            content_changed: None,
            error: None,
            session_healthy: None,
        };

        match request.kind {
            StepKind::Action => {
                let call = tokio::time::timeout(budget, session.act(request.instruction)).await;
                step.duration_ms = elapsed_ms(started, budget);
                match call {
                    Ok(result) => apply_act(&mut step, result),
                    Err(_) => step.outcome = Outcome::Timeout,
                }
            }
            StepKind::Query => {
                let schema = request.schema.unwrap_or(&self.boolean_schema);
                let call = tokio::time::timeout(
                    budget,
                    session.query(request.instruction, Some(schema)),
                )
                .await;
                step.duration_ms = elapsed_ms(started, budget);
                match call {
                    Ok(result) => apply_query(&mut step, result, schema),
                    Err(_) => step.outcome = Outcome::Timeout,
                }
            }
        }

        if step.outcome == Outcome::Timeout {
            log::warn!(
                "Step timed out after {}ms: {}",
                budget.as_millis(),
                request.instruction
            );
            step.session_healthy = Some(self.check_health(session).await);
        }

        log::debug!(
            "[{}#{}] {:?} in {}ms",
            step.concept,
            step.attempt,
            step.outcome,
            step.duration_ms
        );

        journal.record(step)
    }

    /// A session is healthy when a trivial query answers decisively within budget
    pub async fn check_health(&self, session: &dyn AutomationSession) -> bool {
        let call = tokio::time::timeout(
            self.health_check_timeout,
            session.query(HEALTH_CHECK_QUERY, Some(&self.boolean_schema)),
        )
        .await;

        match call {
            Ok(Ok(outcome)) => outcome.error.is_none() && outcome.parsed.is_some(),
            Ok(Err(e)) => {
                log::warn!("Session health check failed: {}", e);
                false
            }
            Err(_) => {
                log::warn!("Session health check timed out");
                false
            }
        }
    }
}

/// Elapsed time, capped at the budget so a cut-off call records the budget
fn elapsed_ms(started: Instant, budget: Duration) -> u64 {
    started.elapsed().min(budget).as_millis() as u64
}

fn apply_act(step: &mut Step, result: Result<ActOutcome, AutomationError>) {
    match result {
        Err(e) => {
            step.outcome = Outcome::CapabilityError;
            step.error = Some(e.to_string());
        }
        Ok(act) => {
            step.content_changed = act.content_changed;
            step.outcome = classify_act(&act, step.scroll);
            if let Some(error) = act.error {
                step.raw_text = error.clone();
                step.error = Some(error);
            }
        }
    }
}

fn apply_query(step: &mut Step, result: Result<QueryOutcome, AutomationError>, schema: &Value) {
    match result {
        Err(e) => {
            step.outcome = Outcome::CapabilityError;
            step.error = Some(e.to_string());
        }
        Ok(query) => {
            step.outcome = classify_query(&query, schema);
            step.raw_text = query.raw_text;
            step.error = query.error;
        }
    }
}

/// Classify an action outcome
pub fn classify_act(act: &ActOutcome, scroll: bool) -> Outcome {
    if act.error.is_some() {
        return Outcome::CapabilityError;
    }
    if !act.completed {
        return Outcome::Negative;
    }
    if scroll && act.content_changed == Some(false) {
        return Outcome::Ambiguous;
    }
    Outcome::Success
}

/// Classify a query outcome against the expected schema
pub fn classify_query(query: &QueryOutcome, schema: &Value) -> Outcome {
    if query.error.is_some() {
        return Outcome::CapabilityError;
    }
    match &query.parsed {
        None | Some(Value::Null) => Outcome::Ambiguous,
        Some(Value::Bool(false)) => Outcome::Negative,
        Some(value) => {
            if conforms(value, schema) {
                Outcome::Success
            } else {
                Outcome::Ambiguous
            }
        }
    }
}

/// Structural check of a parsed value against the subset of JSON schema the capability uses
fn conforms(value: &Value, schema: &Value) -> bool {
    let expected = schema.get("type").and_then(Value::as_str);
    match expected {
        Some("boolean") => value.is_boolean(),
        Some("string") => value.as_str().map_or(false, |s| !s.trim().is_empty()),
        Some("number") | Some("integer") => value.is_number(),
        Some("array") => value.is_array(),
        Some("object") => {
            let Some(object) = value.as_object() else {
                return false;
            };
            schema
                .get("required")
                .and_then(Value::as_array)
                .map_or(true, |required| {
                    required
                        .iter()
                        .filter_map(Value::as_str)
                        .all(|key| object.get(key).map_or(false, |v| !v.is_null()))
                })
        }
        _ => true,
    }
}

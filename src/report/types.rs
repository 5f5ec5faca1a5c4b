use crate::parser::types::Proficiency;
use crate::runner::state::{Resolution, RunState, RunStatus, RunSummary, TestStatus};
use serde::{Deserialize, Serialize};

/// Run summary for report generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsabilityReport {
    pub run_id: String,
    pub target_url: String,
    pub status: RunStatus,
    pub summary: RunSummary,
    pub personas: Vec<PersonaBreakdown>,
    pub generated_at: String,
}

/// Per-persona totals, in first-seen order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonaBreakdown {
    pub persona: String,
    pub proficiency: Proficiency,
    pub tests: usize,
    pub completed: usize,
    pub timed_out: usize,
    pub aborted: usize,
    pub concepts_success: usize,
    pub concepts_negative: usize,
    pub concepts_undecided: usize,
    pub steps: usize,
}

impl UsabilityReport {
    pub fn from_state(state: &RunState) -> Self {
        let mut personas: Vec<PersonaBreakdown> = Vec::new();

        for test in &state.tests {
            let index = match personas.iter().position(|p| p.persona == test.persona) {
                Some(index) => index,
                None => {
                    personas.push(PersonaBreakdown {
                        persona: test.persona.clone(),
                        proficiency: test.proficiency,
                        ..Default::default()
                    });
                    personas.len() - 1
                }
            };
            let entry = &mut personas[index];

            entry.tests += 1;
            entry.steps += test.steps.len();
            match test.status {
                TestStatus::Completed => entry.completed += 1,
                TestStatus::TimedOut => entry.timed_out += 1,
                TestStatus::Aborted => entry.aborted += 1,
            }
            for concept in &test.concepts {
                match concept.resolution {
                    Resolution::Success => entry.concepts_success += 1,
                    Resolution::Negative => entry.concepts_negative += 1,
                    Resolution::Undecided => entry.concepts_undecided += 1,
                    Resolution::Skipped => {}
                }
            }
        }

        Self {
            run_id: state.run_id.clone(),
            target_url: state.target_url.clone(),
            status: state.status,
            summary: state.summary(),
            personas,
            generated_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

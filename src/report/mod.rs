pub mod json;
pub mod junit;
pub mod types;

use crate::runner::checkpoint;
use anyhow::{Context, Result};
use std::path::Path;

pub use types::UsabilityReport;

/// Generate a report from a persisted run state
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let state = checkpoint::load(results_path)
        .with_context(|| format!("Failed to read results from {}", results_path.display()))?;

    match format {
        "json" => json::generate(&UsabilityReport::from_state(&state), output),
        "junit" => match output {
            Some(path) => junit::write_report(&state, path),
            None => {
                println!("{}", junit::generate_junit_xml(&state)?);
                Ok(())
            }
        },
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{PersonaProfile, Proficiency, TaskDescription, TestCase};
    use crate::runner::checkpoint::Checkpointer;
    use crate::runner::state::{Resolution, RunState, StopCause, TestRecorder, TestStatus};

    fn persisted_state(dir: &Path) -> std::path::PathBuf {
        let cases = vec![
            TestCase::new(
                PersonaProfile::new("Maria", Proficiency::Low),
                TaskDescription::new("Find pricing"),
            ),
            TestCase::new(
                PersonaProfile::new("Dev", Proficiency::High),
                TaskDescription::new("Find pricing"),
            ),
        ];
        let mut state = RunState::new("run-1", "https://example.com", &cases);

        let mut first = TestRecorder::start(&cases[0]);
        first.resolve("pricing_link", Resolution::Success, 2);
        state.seal(first.seal(TestStatus::Completed, None, None));

        let mut second = TestRecorder::start(&cases[1]);
        second.resolve("pricing_link", Resolution::Undecided, 3);
        state.seal(second.seal(TestStatus::TimedOut, Some(StopCause::ScrollLoop), None));

        let path = dir.join("test-results.json");
        Checkpointer::new(&path).persist(&mut state).unwrap();
        path
    }

    #[test]
    fn test_persona_breakdown() {
        let dir = tempfile::tempdir().unwrap();
        let state = checkpoint::load(&persisted_state(dir.path())).unwrap();
        let report = UsabilityReport::from_state(&state);

        assert_eq!(report.summary.completed, 1);
        assert_eq!(report.summary.timed_out, 1);
        assert_eq!(report.personas.len(), 2);
        assert_eq!(report.personas[0].persona, "Maria");
        assert_eq!(report.personas[0].concepts_success, 1);
        assert_eq!(report.personas[1].timed_out, 1);
        assert_eq!(report.personas[1].concepts_undecided, 1);
    }

    #[test]
    fn test_generate_report_writes_requested_format() {
        let dir = tempfile::tempdir().unwrap();
        let results = persisted_state(dir.path());

        let json_out = dir.path().join("summary.json");
        generate_report(&results, "json", Some(&json_out)).unwrap();
        let report: UsabilityReport =
            serde_json::from_str(&std::fs::read_to_string(&json_out).unwrap()).unwrap();
        assert_eq!(report.run_id, "run-1");

        let junit_out = dir.path().join("junit.xml");
        generate_report(&results, "junit", Some(&junit_out)).unwrap();
        assert!(std::fs::read_to_string(&junit_out)
            .unwrap()
            .contains("timed_out: scroll_loop"));

        assert!(generate_report(&results, "html", None).is_err());
    }
}

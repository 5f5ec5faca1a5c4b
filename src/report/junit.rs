use crate::runner::state::{Resolution, RunState, TestResult, TestStatus};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::Path;

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

/// Generate JUnit XML report string from a run state.
///
/// One testsuite per persona, one testcase per test. Timed out and aborted
/// tests are failures; tests never dispatched are skipped.
pub fn generate_junit_xml(state: &RunState) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let total_tests = state.tests.len() + state.remaining.len();
    let failures = state
        .tests
        .iter()
        .filter(|t| t.status != TestStatus::Completed)
        .count();
    let skipped = state.remaining.len();
    let total_duration: u64 = state.tests.iter().map(|t| t.duration_ms).sum();

    // <testsuites>
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "lumi-usability-run"));
    suites_start.push_attribute(("id", state.run_id.as_str()));
    suites_start.push_attribute(("tests", total_tests.to_string().as_str()));
    suites_start.push_attribute(("failures", failures.to_string().as_str()));
    suites_start.push_attribute(("skipped", skipped.to_string().as_str()));
    suites_start.push_attribute(("time", seconds(total_duration).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    let mut personas: Vec<&str> = Vec::new();
    for name in state
        .tests
        .iter()
        .map(|t| t.persona.as_str())
        .chain(state.remaining.iter().map(|r| r.persona.as_str()))
    {
        if !personas.contains(&name) {
            personas.push(name);
        }
    }

    for persona in personas {
        let tests: Vec<&TestResult> = state.tests.iter().filter(|t| t.persona == persona).collect();
        let pending: Vec<&str> = state
            .remaining
            .iter()
            .filter(|r| r.persona == persona)
            .map(|r| r.task.as_str())
            .collect();
        let suite_failures = tests
            .iter()
            .filter(|t| t.status != TestStatus::Completed)
            .count();
        let suite_duration: u64 = tests.iter().map(|t| t.duration_ms).sum();

        let mut suite_start = BytesStart::new("testsuite");
        suite_start.push_attribute(("name", persona));
        suite_start.push_attribute(("tests", (tests.len() + pending.len()).to_string().as_str()));
        suite_start.push_attribute(("failures", suite_failures.to_string().as_str()));
        suite_start.push_attribute(("skipped", pending.len().to_string().as_str()));
        suite_start.push_attribute(("time", seconds(suite_duration).as_str()));
        suite_start.push_attribute(("timestamp", state.started_at.as_str()));
        writer.write_event(Event::Start(suite_start))?;

        for test in tests {
            write_test_case(&mut writer, test)?;
        }
        for task in pending {
            let mut case_start = BytesStart::new("testcase");
            case_start.push_attribute(("name", task));
            case_start.push_attribute(("classname", persona));
            writer.write_event(Event::Start(case_start))?;
            let mut skip = BytesStart::new("skipped");
            skip.push_attribute(("message", "not dispatched"));
            writer.write_event(Event::Empty(skip))?;
            writer.write_event(Event::End(BytesEnd::new("testcase")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    let xml = String::from_utf8(result)?;
    Ok(xml)
}

fn write_test_case<W: std::io::Write>(writer: &mut Writer<W>, test: &TestResult) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    case_start.push_attribute(("name", test.task.as_str()));
    case_start.push_attribute(("classname", test.persona.as_str()));
    case_start.push_attribute(("time", seconds(test.duration_ms).as_str()));
    writer.write_event(Event::Start(case_start))?;

    if test.status != TestStatus::Completed {
        let message = match test.reason {
            Some(reason) => format!("{}: {}", test.status.as_str(), reason.as_str()),
            None => test.status.as_str().to_string(),
        };
        let mut fail_start = BytesStart::new("failure");
        fail_start.push_attribute(("message", message.as_str()));
        fail_start.push_attribute(("type", test.status.as_str()));
        writer.write_event(Event::Start(fail_start))?;

        let unresolved: Vec<&str> = test
            .concepts
            .iter()
            .filter(|c| matches!(c.resolution, Resolution::Undecided | Resolution::Skipped))
            .map(|c| c.concept.as_str())
            .collect();
        if !unresolved.is_empty() {
            let text = format!("Unresolved concepts: {}", unresolved.join(", "));
            writer.write_event(Event::Text(BytesText::new(&text)))?;
        }

        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    // Step log goes to system-out so CI shows what was tried
    if !test.steps.is_empty() {
        let log: Vec<String> = test
            .steps
            .iter()
            .map(|s| {
                format!(
                    "[{}#{}] {:?} {}ms: {}",
                    s.concept, s.attempt, s.outcome, s.duration_ms, s.instruction
                )
            })
            .collect();
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&log.join("\n"))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write report to file
pub fn write_report(state: &RunState, path: &Path) -> Result<()> {
    let xml = generate_junit_xml(state)?;
    std::fs::write(path, xml)?;
    println!("JUnit report saved to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{PersonaProfile, Proficiency, TaskDescription, TestCase};
    use crate::runner::state::{StopCause, TestRecorder};

    #[test]
    fn test_generate_junit_xml() {
        let maria = PersonaProfile::new("Maria", Proficiency::Low);
        let cases = vec![
            TestCase::new(maria.clone(), TaskDescription::new("Find pricing")),
            TestCase::new(maria.clone(), TaskDescription::new("Get help & support")),
            TestCase::new(maria, TaskDescription::new("Try the demo")),
        ];
        let mut state = RunState::new("run-42", "https://example.com", &cases);
        state.seal(TestRecorder::start(&cases[0]).seal(TestStatus::Completed, None, None));
        let mut aborted = TestRecorder::start(&cases[1]);
        aborted.resolve("help_link", Resolution::Skipped, 0);
        state.seal(aborted.seal(TestStatus::Aborted, Some(StopCause::SessionLost), None));

        let xml = generate_junit_xml(&state).expect("Failed to generate XML");

        assert!(xml.contains(r#"<testsuites name="lumi-usability-run" id="run-42""#));
        assert!(xml.contains(r#"tests="3""#));
        assert!(xml.contains(r#"failures="1""#));
        assert!(xml.contains(r#"skipped="1""#));
        assert!(xml.contains(r#"<testsuite name="Maria""#));
        assert!(xml.contains(r#"<testcase name="Find pricing" classname="Maria""#));
        assert!(xml.contains(r#"message="aborted: session_lost""#));
        assert!(xml.contains("Get help &amp; support"));
        assert!(xml.contains("Unresolved concepts: help_link"));
        assert!(xml.contains(r#"<skipped message="not dispatched"/>"#));
    }
}

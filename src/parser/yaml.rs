use super::catalog::derive_concepts;
use super::types::{TestCase, TestMatrix};
use crate::error::EngineError;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Parse a matrix file, or every YAML file of a directory merged in path order
pub fn parse_matrix_path(path: &Path) -> Result<TestMatrix> {
    if !path.is_dir() {
        return parse_matrix_file(path);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matrix files found in {}", path.display());
    }

    let mut merged = TestMatrix::default();
    for file in &files {
        let matrix = parse_matrix_file(file)?;
        merge_into(&mut merged, matrix);
    }
    Ok(merged)
}

/// Parse a single YAML matrix file
pub fn parse_matrix_file(path: &Path) -> Result<TestMatrix> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_matrix_content(&content)
        .with_context(|| format!("Failed to parse matrix file: {}", path.display()))
}

/// Parse YAML content into a TestMatrix
pub fn parse_matrix_content(content: &str) -> Result<TestMatrix> {
    let matrix: TestMatrix =
        serde_yaml::from_str(content).context("Failed to parse YAML content")?;
    Ok(matrix)
}

fn merge_into(target: &mut TestMatrix, other: TestMatrix) {
    if target.url.is_none() {
        target.url = other.url;
    }

    // Later files only fill settings the earlier ones left open
    let s = &mut target.settings;
    let o = other.settings;
    s.step_budget = s.step_budget.or(o.step_budget);
    s.max_attempts_per_concept = s.max_attempts_per_concept.or(o.max_attempts_per_concept);
    s.step_timeout_ms = s.step_timeout_ms.or(o.step_timeout_ms);
    s.run_timeout_secs = s.run_timeout_secs.or(o.run_timeout_secs);
    s.grace_period_secs = s.grace_period_secs.or(o.grace_period_secs);
    s.status_interval_secs = s.status_interval_secs.or(o.status_interval_secs);
    s.headless = s.headless.or(o.headless);

    target.personas.extend(other.personas);
    target.tasks.extend(other.tasks);
}

/// Expand the matrix into test cases, persona-major and task-minor.
///
/// Tasks without explicit concepts get the catalog's concepts for that persona.
pub fn build_test_cases(matrix: &TestMatrix) -> Result<Vec<TestCase>> {
    let mut cases = Vec::new();
    let mut seen = HashSet::new();

    for entry in &matrix.personas {
        let tasks = if entry.tasks.is_empty() {
            &matrix.tasks
        } else {
            &entry.tasks
        };

        for task_entry in tasks {
            let mut task = task_entry.clone().into_task();
            if task.concepts.is_empty() {
                task.concepts = derive_concepts(&task.description, &entry.profile);
            }

            let case = TestCase::new(entry.profile.clone(), task);
            let id = case.id();
            if !seen.insert(id.clone()) {
                return Err(EngineError::DuplicateTestCase {
                    persona: id.persona,
                    task: id.task,
                }
                .into());
            }
            cases.push(case);
        }
    }

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::{ConceptKind, Proficiency};

    const MATRIX: &str = r#"
url: https://example.com
settings:
  stepBudget: 12
  maxAttemptsPerConcept: 2
personas:
  - name: Alex Chen
    proficiency: high
    archetype: developer
    goals: [Integrate API]
  - name: Sarah Williams
    techProficiency: low
    tasks:
      - Find help or support if confused
tasks:
  - Find pricing information to evaluate cost
  - description: Check the login button
    concepts:
      - name: login_button
        kind: navigate
        prompt: Click the login button
        target: Log in
"#;

    #[test]
    fn test_parse_matrix_content() {
        let matrix = parse_matrix_content(MATRIX).unwrap();
        assert_eq!(matrix.url.as_deref(), Some("https://example.com"));
        assert_eq!(matrix.settings.step_budget, Some(12));
        assert_eq!(matrix.settings.max_attempts_per_concept, Some(2));
        assert_eq!(matrix.personas.len(), 2);
        assert_eq!(matrix.personas[0].profile.proficiency, Proficiency::High);
        assert_eq!(matrix.personas[1].profile.proficiency, Proficiency::Low);
        assert_eq!(matrix.tasks.len(), 2);
    }

    #[test]
    fn test_build_test_cases_is_persona_major() {
        let matrix = parse_matrix_content(MATRIX).unwrap();
        let cases = build_test_cases(&matrix).unwrap();

        let ids: Vec<(String, String)> = cases
            .iter()
            .map(|c| (c.persona.name.clone(), c.task.description.clone()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (
                    "Alex Chen".to_string(),
                    "Find pricing information to evaluate cost".to_string()
                ),
                ("Alex Chen".to_string(), "Check the login button".to_string()),
                (
                    "Sarah Williams".to_string(),
                    "Find help or support if confused".to_string()
                ),
            ]
        );

        // Explicit concepts are kept verbatim
        assert_eq!(cases[1].task.concepts.len(), 1);
        assert_eq!(cases[1].task.concepts[0].kind, ConceptKind::Navigate);
        assert_eq!(cases[1].task.concepts[0].target.as_deref(), Some("Log in"));

        // Catalog fills in the rest
        assert!(!cases[0].task.concepts.is_empty());
        assert!(!cases[2].task.concepts.is_empty());
    }

    #[test]
    fn test_duplicate_test_case_rejected() {
        let yaml = r#"
personas:
  - name: A
tasks:
  - Find pricing
  - Find pricing
"#;
        let matrix = parse_matrix_content(yaml).unwrap();
        let err = build_test_cases(&matrix).unwrap_err();
        assert!(err.to_string().contains("duplicate test case"));
    }

    #[test]
    fn test_parse_matrix_directory_merges_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "url: https://a.example\npersonas:\n  - name: A\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "url: https://b.example\nsettings:\n  stepBudget: 5\ntasks:\n  - Find docs\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let matrix = parse_matrix_path(dir.path()).unwrap();
        assert_eq!(matrix.url.as_deref(), Some("https://a.example"));
        assert_eq!(matrix.settings.step_budget, Some(5));
        assert_eq!(matrix.personas.len(), 1);
        assert_eq!(matrix.tasks.len(), 1);
    }
}

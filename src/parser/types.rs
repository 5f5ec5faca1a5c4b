use serde::{Deserialize, Serialize};

/// Technical proficiency of a persona
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Proficiency {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Proficiency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Proficiency::Low => "low",
            Proficiency::Medium => "medium",
            Proficiency::High => "high",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Proficiency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "beginner" => Ok(Proficiency::Low),
            "medium" | "intermediate" => Ok(Proficiency::Medium),
            "high" | "expert" => Ok(Proficiency::High),
            other => anyhow::bail!("Unknown proficiency: {}", other),
        }
    }
}

/// A fictional user the tests are executed as
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonaProfile {
    pub name: String,

    #[serde(default, alias = "techProficiency")]
    pub proficiency: Proficiency,

    #[serde(default)]
    pub goals: Vec<String>,

    /// e.g. "developer", "business_professional", "beginner"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PersonaProfile {
    pub fn new(name: &str, proficiency: Proficiency) -> Self {
        Self {
            name: name.to_string(),
            proficiency,
            goals: Vec::new(),
            archetype: None,
            description: None,
        }
    }

    pub fn with_archetype(mut self, archetype: &str) -> Self {
        self.archetype = Some(archetype.to_string());
        self
    }

    pub fn is_archetype(&self, archetype: &str) -> bool {
        self.archetype.as_deref() == Some(archetype)
    }
}

/// How a concept is exercised against the page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConceptKind {
    /// Ask the capability a question about the page
    #[default]
    Query,
    /// Perform an action (click, open, go to)
    Navigate,
    /// Scroll the page; completion without content change is not decisive
    Scroll,
}

/// A single verifiable sub-goal within a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub name: String,

    #[serde(default)]
    pub kind: ConceptKind,

    /// Broadest phrasing of the instruction
    pub prompt: String,

    /// Alternative phrasings, tried in order after the primary prompt
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<String>,

    /// Literal label of the element, used for the most exact phrasing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// JSON schema the query answer must satisfy (boolean when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

impl Concept {
    pub fn query(name: &str, prompt: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ConceptKind::Query,
            prompt: prompt.to_string(),
            fallbacks: Vec::new(),
            target: None,
            schema: None,
        }
    }

    pub fn navigate(name: &str, prompt: &str) -> Self {
        Self {
            kind: ConceptKind::Navigate,
            ..Self::query(name, prompt)
        }
    }

    pub fn scroll(name: &str, prompt: &str) -> Self {
        Self {
            kind: ConceptKind::Scroll,
            ..Self::query(name, prompt)
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: &[&str]) -> Self {
        self.fallbacks = fallbacks.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }
}

/// A goal the persona tries to achieve on the page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescription {
    pub description: String,

    /// Explicit concepts; derived from the description when empty
    #[serde(default)]
    pub concepts: Vec<Concept>,
}

impl TaskDescription {
    pub fn new(description: &str) -> Self {
        Self {
            description: description.to_string(),
            concepts: Vec::new(),
        }
    }

    pub fn with_concepts(mut self, concepts: Vec<Concept>) -> Self {
        self.concepts = concepts;
        self
    }
}

/// Identity of a test case: (persona name, task description)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseId {
    pub persona: String,
    pub task: String,
}

impl std::fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.persona, self.task)
    }
}

/// One cell of the persona x task matrix
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub persona: PersonaProfile,
    pub task: TaskDescription,
}

impl TestCase {
    pub fn new(persona: PersonaProfile, task: TaskDescription) -> Self {
        Self { persona, task }
    }

    pub fn id(&self) -> TestCaseId {
        TestCaseId {
            persona: self.persona.name.clone(),
            task: self.task.description.clone(),
        }
    }
}

/// Per-matrix overrides of the run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatrixSettings {
    #[serde(default)]
    pub step_budget: Option<usize>,

    #[serde(default)]
    pub max_attempts_per_concept: Option<usize>,

    #[serde(default, alias = "stepTimeout")]
    pub step_timeout_ms: Option<u64>,

    #[serde(default, alias = "runTimeout")]
    pub run_timeout_secs: Option<u64>,

    #[serde(default)]
    pub grace_period_secs: Option<u64>,

    #[serde(default)]
    pub status_interval_secs: Option<u64>,

    #[serde(default)]
    pub headless: Option<bool>,
}

/// A persona entry in the matrix file, optionally carrying its own tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaEntry {
    #[serde(flatten)]
    pub profile: PersonaProfile,

    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

/// Tasks may be written as a bare string or as a full description
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskEntry {
    Simple(String),
    Full(TaskDescription),
}

impl TaskEntry {
    pub fn into_task(self) -> TaskDescription {
        match self {
            TaskEntry::Simple(description) => TaskDescription::new(&description),
            TaskEntry::Full(task) => task,
        }
    }
}

/// Parsed matrix file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMatrix {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub settings: MatrixSettings,

    #[serde(default)]
    pub personas: Vec<PersonaEntry>,

    /// Tasks applied to every persona without its own task list
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

use crate::error::AutomationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of an `act` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActOutcome {
    /// The capability carried out the instruction
    pub completed: bool,

    /// Whether visible content changed (reported for scroll actions)
    #[serde(default)]
    pub content_changed: Option<bool>,

    /// Capability-level error that did not fail the transport
    #[serde(default)]
    pub error: Option<String>,
}

impl ActOutcome {
    pub fn completed() -> Self {
        Self {
            completed: true,
            ..Default::default()
        }
    }
}

/// Result of a `query` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutcome {
    #[serde(default)]
    pub raw_text: String,

    /// Value extracted against the requested schema
    #[serde(default)]
    pub parsed: Option<serde_json::Value>,

    #[serde(default)]
    pub error: Option<String>,
}

impl QueryOutcome {
    pub fn parsed(raw_text: &str, value: serde_json::Value) -> Self {
        Self {
            raw_text: raw_text.to_string(),
            parsed: Some(value),
            error: None,
        }
    }

    pub fn unparsed(raw_text: &str) -> Self {
        Self {
            raw_text: raw_text.to_string(),
            parsed: None,
            error: None,
        }
    }
}

/// One live browser context bound to a single test case.
///
/// The engine treats it as an exclusively owned slot: one caller, one call at a
/// time. Both calls may block for a long time; callers enforce their own budget.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    /// Identifier assigned by the provider
    fn session_id(&self) -> &str;

    /// Trace artifact written for this session, if any
    fn trace_path(&self) -> Option<&Path>;

    /// Issue a natural-language instruction against the live page
    async fn act(&self, instruction: &str) -> Result<ActOutcome, AutomationError>;

    /// Ask a question about the page, optionally constrained by a JSON schema
    async fn query(
        &self,
        instruction: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<QueryOutcome, AutomationError>;
}

/// Source of browser sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Check that the capability is reachable at all
    async fn ping(&self) -> Result<(), AutomationError>;

    /// Open a browser context on `target_url`, writing traces under `traces_dir`
    async fn acquire(
        &self,
        target_url: &str,
        traces_dir: &Path,
    ) -> Result<Box<dyn AutomationSession>, AutomationError>;

    /// Close the session; the trace artifact must be flushed when this returns
    async fn release(&self, session: Box<dyn AutomationSession>) -> Result<(), AutomationError>;
}

//! HTTP client for a remote automation bridge
//!
//! The bridge owns the real browser. Protocol (JSON, camelCase):
//!
//! - `GET  /health`
//! - `POST /sessions`               `{url, tracesDir, headless}` -> `{sessionId, tracePath?}`
//! - `POST /sessions/{id}/act`      `{instruction}` -> `ActOutcome`
//! - `POST /sessions/{id}/query`    `{instruction, schema?}` -> `QueryOutcome`
//! - `DELETE /sessions/{id}`        closes the context and flushes its trace

use crate::driver::traits::{ActOutcome, AutomationSession, QueryOutcome, SessionProvider};
use crate::error::AutomationError;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenSessionRequest<'a> {
    url: &'a str,
    traces_dir: String,
    headless: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSessionResponse {
    session_id: String,
    #[serde(default)]
    trace_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstructionRequest<'a> {
    instruction: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a serde_json::Value>,
}

/// Session provider backed by the HTTP bridge
pub struct HttpAutomation {
    client: Client,
    endpoint: String,
    headless: bool,
}

impl HttpAutomation {
    pub fn new(endpoint: &str, headless: bool) -> Result<Self, AutomationError> {
        // Per-call budgets are enforced by the step executor; this only bounds connects
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            headless,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }
}

#[async_trait]
impl SessionProvider for HttpAutomation {
    async fn ping(&self) -> Result<(), AutomationError> {
        let response = self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    async fn acquire(
        &self,
        target_url: &str,
        traces_dir: &Path,
    ) -> Result<Box<dyn AutomationSession>, AutomationError> {
        let request = OpenSessionRequest {
            url: target_url,
            traces_dir: traces_dir.display().to_string(),
            headless: self.headless,
        };

        let response = self
            .client
            .post(self.url("/sessions"))
            .json(&request)
            .send()
            .await?;
        let opened: OpenSessionResponse = check_status(response).await?.json().await?;

        log::debug!("Opened automation session {}", opened.session_id);

        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            base: self.url(&format!("/sessions/{}", opened.session_id)),
            session_id: opened.session_id,
            trace_path: opened.trace_path.map(PathBuf::from),
        }))
    }

    async fn release(&self, session: Box<dyn AutomationSession>) -> Result<(), AutomationError> {
        let id = session.session_id().to_string();
        let response = self
            .client
            .delete(self.url(&format!("/sessions/{}", id)))
            .send()
            .await?;
        check_status(response).await?;
        log::debug!("Released automation session {}", id);
        Ok(())
    }
}

/// A session opened on the HTTP bridge
pub struct HttpSession {
    client: Client,
    base: String,
    session_id: String,
    trace_path: Option<PathBuf>,
}

#[async_trait]
impl AutomationSession for HttpSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn trace_path(&self) -> Option<&Path> {
        self.trace_path.as_deref()
    }

    async fn act(&self, instruction: &str) -> Result<ActOutcome, AutomationError> {
        let response = self
            .client
            .post(format!("{}/act", self.base))
            .json(&InstructionRequest {
                instruction,
                schema: None,
            })
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn query(
        &self,
        instruction: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<QueryOutcome, AutomationError> {
        let response = self
            .client
            .post(format!("{}/query", self.base))
            .json(&InstructionRequest {
                instruction,
                schema,
            })
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, AutomationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(status, body))
}

/// Map a non-success HTTP status to the capability error taxonomy
pub fn error_for_status(status: StatusCode, body: String) -> AutomationError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AutomationError::RateLimited,
        StatusCode::NOT_FOUND | StatusCode::GONE => AutomationError::SessionInvalid(body),
        _ => AutomationError::Status {
            status: status.as_u16(),
            body,
        },
    }
}

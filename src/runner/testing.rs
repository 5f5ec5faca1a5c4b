//! Scripted automation capability for unit tests

use crate::driver::traits::{ActOutcome, AutomationSession, QueryOutcome, SessionProvider};
use crate::error::AutomationError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Reply {
    /// Completed action or `true` query
    Success,
    Act(ActOutcome),
    Query(QueryOutcome),
    Error(AutomationError),
    Delayed(Duration, Box<Reply>),
    /// Never answers
    Hang,
}

impl Reply {
    pub fn yes() -> Self {
        Reply::Query(QueryOutcome::parsed("yes", serde_json::json!(true)))
    }

    pub fn no() -> Self {
        Reply::Query(QueryOutcome::parsed("no", serde_json::json!(false)))
    }

    pub fn unclear() -> Self {
        Reply::Query(QueryOutcome::unparsed("it is hard to tell"))
    }

    pub fn scrolled(changed: bool) -> Self {
        Reply::Act(ActOutcome {
            completed: true,
            content_changed: Some(changed),
            error: None,
        })
    }
}

/// Session answering from a fixed script; `Success` once the script runs out
pub struct ScriptedSession {
    id: String,
    trace_path: PathBuf,
    replies: Mutex<VecDeque<Reply>>,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedSession {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self::with_id("scripted", replies)
    }

    pub fn with_id(id: &str, replies: Vec<Reply>) -> Self {
        Self {
            id: id.to_string(),
            trace_path: PathBuf::from(format!("traces/{}.html", id)),
            replies: Mutex::new(replies.into()),
            instructions: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.instructions.lock().unwrap().len()
    }

    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().unwrap().clone()
    }

    fn next_reply(&self, instruction: &str) -> Reply {
        self.instructions
            .lock()
            .unwrap()
            .push(instruction.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Reply::Success)
    }
}

async fn resolve(mut reply: Reply) -> Reply {
    loop {
        match reply {
            Reply::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                reply = *inner;
            }
            Reply::Hang => std::future::pending::<()>().await,
            other => return other,
        }
    }
}

#[async_trait]
impl AutomationSession for ScriptedSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn trace_path(&self) -> Option<&Path> {
        Some(&self.trace_path)
    }

    async fn act(&self, instruction: &str) -> Result<ActOutcome, AutomationError> {
        let reply = self.next_reply(instruction);
        match resolve(reply).await {
            Reply::Success => Ok(ActOutcome::completed()),
            Reply::Act(outcome) => Ok(outcome),
            Reply::Error(e) => Err(e),
            other => panic!("scripted reply {:?} does not answer an action", other),
        }
    }

    async fn query(
        &self,
        instruction: &str,
        _schema: Option<&serde_json::Value>,
    ) -> Result<QueryOutcome, AutomationError> {
        let reply = self.next_reply(instruction);
        match resolve(reply).await {
            Reply::Success => Ok(QueryOutcome::parsed("yes", serde_json::json!(true))),
            Reply::Query(outcome) => Ok(outcome),
            Reply::Error(e) => Err(e),
            other => panic!("scripted reply {:?} does not answer a query", other),
        }
    }
}

type Script = Box<dyn Fn(usize) -> Result<Vec<Reply>, AutomationError> + Send + Sync>;

/// Provider handing out one scripted session per acquire, in order
pub struct ScriptedProvider {
    script: Script,
    acquired: AtomicUsize,
    hang_acquire_from: Option<usize>,
    hang_release: bool,
    pub events: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProvider {
    /// `script(n)` yields the replies of the n-th acquired session (0-based)
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(usize) -> Result<Vec<Reply>, AutomationError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            acquired: AtomicUsize::new(0),
            hang_acquire_from: None,
            hang_release: false,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The n-th acquire and every later one never answer
    pub fn hanging_acquire_from(mut self, n: usize) -> Self {
        self.hang_acquire_from = Some(n);
        self
    }

    /// Release never answers
    pub fn hanging_release(mut self) -> Self {
        self.hang_release = true;
        self
    }

    pub fn always_succeeding() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionProvider for ScriptedProvider {
    async fn ping(&self) -> Result<(), AutomationError> {
        Ok(())
    }

    async fn acquire(
        &self,
        _target_url: &str,
        _traces_dir: &Path,
    ) -> Result<Box<dyn AutomationSession>, AutomationError> {
        let n = self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.hang_acquire_from.map_or(false, |from| n >= from) {
            std::future::pending::<()>().await;
        }
        let replies = (self.script)(n)?;
        let id = format!("session-{}", n);
        self.events.lock().unwrap().push(format!("acquire {}", id));
        Ok(Box::new(ScriptedSession::with_id(&id, replies)))
    }

    async fn release(&self, session: Box<dyn AutomationSession>) -> Result<(), AutomationError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("release {}", session.session_id()));
        if self.hang_release {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

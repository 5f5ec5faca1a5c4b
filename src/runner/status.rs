//! Periodic liveness reporting

use super::state::ProgressSnapshot;
use crate::parser::types::TestCaseId;
use colored::Colorize;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// One liveness report
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub elapsed: Duration,
    pub sealed: usize,
    pub remaining: usize,
    pub current: Option<TestCaseId>,
}

impl StatusLine {
    pub fn new(elapsed: Duration, snapshot: &ProgressSnapshot) -> Self {
        Self {
            elapsed,
            sealed: snapshot.sealed,
            remaining: snapshot.remaining(),
            current: snapshot.current.clone(),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        write!(
            f,
            "[{:02}:{:02}:{:02}] {} sealed, {} remaining",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60,
            self.sealed,
            self.remaining
        )?;
        if let Some(current) = &self.current {
            write!(f, ", running {}", current)?;
        }
        Ok(())
    }
}

/// Destination of status lines
pub trait StatusSink: Send + 'static {
    fn emit(&mut self, line: &StatusLine) -> std::io::Result<()>;
}

/// Writes status lines to stderr
pub struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn emit(&mut self, line: &StatusLine) -> std::io::Result<()> {
        use std::io::Write;
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "{} {}", "⏲".cyan(), line.to_string().dimmed())
    }
}

/// Background task emitting a status line every interval
pub struct StatusReporter {
    handle: JoinHandle<()>,
}

impl StatusReporter {
    /// Start reporting; ends on `stop` or when the progress sender is dropped
    pub fn spawn<S: StatusSink>(
        interval: Duration,
        mut progress: watch::Receiver<ProgressSnapshot>,
        mut sink: S,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval_at(started + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let line = StatusLine::new(started.elapsed(), &progress.borrow());
                        if let Err(e) = sink.emit(&line) {
                            log::warn!("Status sink failed: {}", e);
                        }
                    }
                    changed = progress.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { handle }
    }

    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Collecting(Arc<Mutex<Vec<StatusLine>>>);

    impl StatusSink for Collecting {
        fn emit(&mut self, line: &StatusLine) -> std::io::Result<()> {
            self.0.lock().unwrap().push(line.clone());
            Ok(())
        }
    }

    struct Broken(Arc<Mutex<usize>>);

    impl StatusSink for Broken {
        fn emit(&mut self, _line: &StatusLine) -> std::io::Result<()> {
            *self.0.lock().unwrap() += 1;
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_status_line_display() {
        let line = StatusLine {
            elapsed: Duration::from_secs(3725),
            sealed: 4,
            remaining: 5,
            current: Some(TestCaseId {
                persona: "Maria".to_string(),
                task: "Find pricing".to_string(),
            }),
        };
        assert_eq!(
            line.to_string(),
            "[01:02:05] 4 sealed, 5 remaining, running Maria / Find pricing"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_every_interval_with_latest_snapshot() {
        let (tx, rx) = watch::channel(ProgressSnapshot {
            total: 9,
            ..Default::default()
        });
        let sink = Collecting::default();
        let reporter = StatusReporter::spawn(Duration::from_secs(60), rx, sink.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        tx.send_replace(ProgressSnapshot {
            total: 9,
            sealed: 3,
            current: None,
        });
        tokio::time::sleep(Duration::from_secs(60)).await;
        reporter.stop().await;

        let lines = sink.0.lock().unwrap().clone();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].sealed, 0);
        assert_eq!(lines[0].remaining, 9);
        assert_eq!(lines[0].elapsed, Duration::from_secs(60));
        assert_eq!(lines[1].sealed, 3);
        assert_eq!(lines[1].remaining, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failures_are_swallowed() {
        let (_tx, rx) = watch::channel(ProgressSnapshot::default());
        let attempts = Arc::new(Mutex::new(0));
        let reporter =
            StatusReporter::spawn(Duration::from_secs(10), rx, Broken(attempts.clone()));

        tokio::time::sleep(Duration::from_secs(35)).await;
        reporter.stop().await;

        assert_eq!(*attempts.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ends_when_progress_sender_dropped() {
        let (tx, rx) = watch::channel(ProgressSnapshot::default());
        let reporter = StatusReporter::spawn(Duration::from_secs(10), rx, Collecting::default());
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), reporter.handle)
            .await
            .expect("reporter should end")
            .unwrap();
    }
}

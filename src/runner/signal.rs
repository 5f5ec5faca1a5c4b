//! Cooperative shutdown signal shared by the coordinator and task runners

use super::state::StopCause;
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why the run was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    RunTimeout,
}

impl From<StopReason> for StopCause {
    fn from(reason: StopReason) -> Self {
        match reason {
            StopReason::Interrupted => StopCause::Interrupted,
            StopReason::RunTimeout => StopCause::RunTimeout,
        }
    }
}

/// Shutdown flag backed by a watch channel. The first reason wins.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<Option<StopReason>>>,
    receiver: watch::Receiver<Option<StopReason>>,
    interrupted: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
            receiver,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn trigger(&self, reason: StopReason) {
        let changed = self.sender.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if changed {
            log::info!("Shutdown requested: {:?}", reason);
        }
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.receiver.borrow()
    }

    pub fn is_triggered(&self) -> bool {
        self.reason().is_some()
    }

    /// Resolves once the signal has been triggered
    pub async fn triggered(&self) -> StopReason {
        let mut receiver = self.receiver.clone();
        loop {
            if let Some(reason) = *receiver.borrow_and_update() {
                return reason;
            }
            if receiver.changed().await.is_err() {
                // Sender lives as long as any clone of this signal
                std::future::pending::<()>().await;
            }
        }
    }

    /// Record an operator interrupt. Returns true if the operator had
    /// already interrupted once, whatever stopped the run first.
    pub fn interrupt(&self) -> bool {
        if self.interrupted.swap(true, Ordering::SeqCst) {
            return true;
        }
        self.trigger(StopReason::Interrupted);
        false
    }

    /// Route SIGINT/SIGTERM into the signal
    pub fn install_ctrlc(&self) -> anyhow::Result<()> {
        let signal = self.clone();
        ctrlc::set_handler(move || {
            if signal.interrupt() {
                eprintln!("\n{} Forced exit", "✗".red().bold());
                std::process::exit(130);
            }
            eprintln!(
                "\n{} Interrupt received, finishing current test (press Ctrl+C again to force)",
                "⏹".yellow()
            );
        })?;
        Ok(())
    }

    /// Trigger `RunTimeout` after `after` has elapsed
    pub fn arm_timeout(&self, after: Duration) -> JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            signal.trigger(StopReason::RunTimeout);
        })
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        let clone = signal.clone();
        clone.trigger(StopReason::RunTimeout);
        signal.trigger(StopReason::Interrupted);

        assert_eq!(signal.reason(), Some(StopReason::RunTimeout));
        assert_eq!(StopCause::from(StopReason::RunTimeout), StopCause::RunTimeout);
    }

    #[test]
    fn test_first_interrupt_after_timeout_is_not_forced() {
        let signal = ShutdownSignal::new();
        signal.trigger(StopReason::RunTimeout);

        assert!(!signal.interrupt());
        assert_eq!(signal.reason(), Some(StopReason::RunTimeout));

        assert!(signal.interrupt());
    }

    #[test]
    fn test_second_interrupt_is_forced() {
        let signal = ShutdownSignal::new();
        assert!(!signal.clone().interrupt());
        assert_eq!(signal.reason(), Some(StopReason::Interrupted));
        assert!(signal.interrupt());
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_timeout_fires() {
        let signal = ShutdownSignal::new();
        let _timer = signal.arm_timeout(Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(!signal.is_triggered());

        let reason = signal.triggered().await;
        assert_eq!(reason, StopReason::RunTimeout);
    }
}

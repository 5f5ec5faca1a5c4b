use crate::parser::types::MatrixSettings;
use std::time::Duration;

/// Default remote automation endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8765";

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the remote automation capability
    pub endpoint: String,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Maximum steps recorded per test before it is sealed as timed out
    pub step_budget: usize,

    /// Maximum variations attempted per concept
    pub max_attempts_per_concept: usize,

    /// Hard timeout of a single automation call
    pub step_timeout: Duration,

    /// Budget of the session health check issued after a timeout
    pub health_check_timeout: Duration,

    /// Whole-run timeout; None runs until the matrix is exhausted
    pub run_timeout: Option<Duration>,

    /// Time the running test gets to seal itself after a stop request
    pub grace_period: Duration,

    /// Interval of the liveness status line
    pub status_interval: Duration,

    /// Consecutive scroll steps without content change that count as a loop
    pub scroll_loop_window: usize,

    /// Capability errors within one test before the test is aborted
    pub capability_error_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            headless: true,
            step_budget: 30,
            max_attempts_per_concept: 3,
            step_timeout: Duration::from_secs(15),
            health_check_timeout: Duration::from_secs(10),
            run_timeout: None,
            grace_period: Duration::from_secs(30),
            status_interval: Duration::from_secs(60),
            scroll_loop_window: 3,
            capability_error_limit: 4,
        }
    }
}

impl Config {
    /// Defaults overlaid with `LUMI_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment lookup; unparsable values are ignored
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("LUMI_AUTOMATION_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(v) = lookup("LUMI_HEADLESS") {
            self.headless = v == "true" || v == "1";
        }
        if let Some(n) = parse_env(&lookup, "LUMI_STEP_BUDGET") {
            self.step_budget = n as usize;
        }
        if let Some(n) = parse_env(&lookup, "LUMI_MAX_ATTEMPTS") {
            self.max_attempts_per_concept = n as usize;
        }
        if let Some(ms) = parse_env(&lookup, "LUMI_STEP_TIMEOUT_MS") {
            self.step_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_env(&lookup, "LUMI_RUN_TIMEOUT_SECS") {
            self.run_timeout = Some(Duration::from_secs(secs));
        }
        self
    }

    /// Overlay the `settings` block of a matrix file
    pub fn apply_settings(&mut self, settings: &MatrixSettings) {
        if let Some(n) = settings.step_budget {
            self.step_budget = n;
        }
        if let Some(n) = settings.max_attempts_per_concept {
            self.max_attempts_per_concept = n;
        }
        if let Some(ms) = settings.step_timeout_ms {
            self.step_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = settings.run_timeout_secs {
            self.run_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = settings.grace_period_secs {
            self.grace_period = Duration::from_secs(secs);
        }
        if let Some(secs) = settings.status_interval_secs {
            self.status_interval = Duration::from_secs(secs);
        }
        if let Some(headless) = settings.headless {
            self.headless = headless;
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.step_budget == 0 {
            anyhow::bail!("step budget must be at least 1");
        }
        if self.max_attempts_per_concept == 0 {
            anyhow::bail!("max attempts per concept must be at least 1");
        }
        if self.step_timeout.is_zero() {
            anyhow::bail!("step timeout must be greater than zero");
        }
        if self.status_interval.is_zero() {
            anyhow::bail!("status interval must be greater than zero");
        }
        Ok(())
    }
}

fn parse_env<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("LUMI_AUTOMATION_ENDPOINT", "http://bridge:9000"),
            ("LUMI_HEADLESS", "0"),
            ("LUMI_STEP_BUDGET", "12"),
            ("LUMI_STEP_TIMEOUT_MS", "5000"),
            ("LUMI_MAX_ATTEMPTS", "oops"),
        ]
        .into_iter()
        .collect();

        let config = Config::default().with_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.endpoint, "http://bridge:9000");
        assert!(!config.headless);
        assert_eq!(config.step_budget, 12);
        assert_eq!(config.step_timeout, Duration::from_secs(5));
        // Unparsable value keeps the default
        assert_eq!(config.max_attempts_per_concept, 3);
    }

    #[test]
    fn test_settings_overlay_and_validate() {
        let mut config = Config::default();
        config.apply_settings(&MatrixSettings {
            step_budget: Some(10),
            run_timeout_secs: Some(600),
            ..Default::default()
        });
        assert_eq!(config.step_budget, 10);
        assert_eq!(config.run_timeout, Some(Duration::from_secs(600)));
        assert!(config.validate().is_ok());

        config.max_attempts_per_concept = 0;
        assert!(config.validate().is_err());
    }
}

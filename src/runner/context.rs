use std::path::{Path, PathBuf};

/// File name of the persisted run state inside the output directory
pub const RESULTS_FILE: &str = "test-results.json";

/// Where a run writes its artifacts
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Output directory for the results artifact and reports
    pub output_dir: PathBuf,

    /// Directory the automation capability writes session traces into
    pub traces_dir: PathBuf,

    /// Target page under test
    pub target_url: String,
}

impl RunContext {
    pub fn new(output_dir: &Path, target_url: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            traces_dir: output_dir.join("traces"),
            target_url: target_url.to_string(),
        }
    }

    /// Create the output and trace directories
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.traces_dir)
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(RESULTS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let dir = tempfile::tempdir().unwrap();
        let context = RunContext::new(dir.path(), "https://example.com");
        context.prepare().unwrap();

        assert!(context.traces_dir.is_dir());
        assert_eq!(context.results_path(), dir.path().join("test-results.json"));
    }
}

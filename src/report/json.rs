use super::types::UsabilityReport;
use anyhow::{Context, Result};
use std::path::Path;

/// Generate JSON summary report
pub fn generate(report: &UsabilityReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(path) = output {
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

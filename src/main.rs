use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use lumi_usability::parser::{self, catalog, Proficiency};
use lumi_usability::runner::variations::variations;
use lumi_usability::utils::config::Config;
use lumi_usability::{report, runner};

#[derive(Parser)]
#[command(name = "lumi-usability")]
#[command(author = "NL Team")]
#[command(version = "0.1.0")]
#[command(about = "Adaptive usability test runner for web pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a persona x task matrix against a page
    Run {
        /// Page under test. Falls back to the matrix file's url.
        url: Option<String>,

        /// Matrix file or directory of matrix files
        #[arg(short, long)]
        matrix: PathBuf,

        /// Output directory for results and traces
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Whole-run timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Maximum steps per test
        #[arg(long)]
        step_budget: Option<usize>,

        /// Maximum phrasings tried per concept
        #[arg(long)]
        max_attempts: Option<usize>,

        /// Automation bridge endpoint
        #[arg(long)]
        endpoint: Option<String>,

        /// Continue a previous run found in the output directory
        #[arg(long, default_value = "false")]
        resume: bool,

        /// Seconds between status lines
        #[arg(long)]
        status_interval: Option<u64>,

        /// Write JSON summary and JUnit reports after the run
        #[arg(long, default_value = "false")]
        report: bool,
    },

    /// Generate report from test results
    Report {
        /// Path to test results JSON
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the concepts and phrasings derived for a task
    Concepts {
        /// Task description
        task: String,

        /// Persona proficiency (low, medium, high)
        #[arg(short, long, default_value = "medium")]
        proficiency: String,

        /// Persona archetype, e.g. business_professional
        #[arg(short, long)]
        archetype: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            url,
            matrix,
            output,
            timeout,
            step_budget,
            max_attempts,
            endpoint,
            resume,
            status_interval,
            report,
        } => {
            let test_matrix = parser::parse_matrix_path(&matrix)?;

            let mut config = Config::from_env();
            config.apply_settings(&test_matrix.settings);
            if let Some(secs) = timeout {
                config.run_timeout = Some(Duration::from_secs(secs));
            }
            if let Some(n) = step_budget {
                config.step_budget = n;
            }
            if let Some(n) = max_attempts {
                config.max_attempts_per_concept = n;
            }
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            if let Some(secs) = status_interval {
                config.status_interval = Duration::from_secs(secs);
            }
            config.validate()?;

            let target_url = url
                .or_else(|| test_matrix.url.clone())
                .context("No target URL: pass one or set `url` in the matrix file")?;
            let cases = parser::build_test_cases(&test_matrix)?;

            println!(
                "{} Running usability tests against: {}",
                "▶".green().bold(),
                target_url.cyan()
            );
            println!("  Matrix: {}", matrix.display());
            println!("  Test cases: {}", cases.len().to_string().cyan());
            println!("  Endpoint: {}", config.endpoint.cyan());
            println!(
                "  Step budget: {}, attempts per concept: {}",
                config.step_budget, config.max_attempts_per_concept
            );
            if let Some(run_timeout) = config.run_timeout {
                println!("  Run timeout: {}s", run_timeout.as_secs().to_string().yellow());
            }
            println!("  Output: {}", output.display().to_string().cyan());
            if resume {
                println!("  Resume: {}", "Enabled".yellow());
            }

            let state =
                runner::run_usability_tests(&target_url, &cases, &config, &output, resume).await?;

            if report {
                let results = runner::context::RunContext::new(&output, &target_url).results_path();
                report::generate_report(&results, "json", Some(&output.join("summary.json")))?;
                report::generate_report(&results, "junit", Some(&output.join("junit.xml")))?;
            }

            if state.status != runner::RunStatus::Completed {
                println!(
                    "{} Partial results saved ({} of {} tests sealed)",
                    "⚠".yellow(),
                    state.sealed_count(),
                    state.sealed_count() + state.remaining.len()
                );
            }
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())?;
        }

        Commands::Concepts {
            task,
            proficiency,
            archetype,
        } => {
            let proficiency: Proficiency = proficiency.parse()?;
            let mut persona = parser::PersonaProfile::new("cli", proficiency);
            if let Some(archetype) = archetype {
                persona = persona.with_archetype(&archetype);
            }

            println!(
                "{} {} ({:?})",
                "→".blue(),
                task.white().bold(),
                catalog::categorize(&task)
            );
            for concept in catalog::derive_concepts(&task, &persona) {
                println!("\n  {} [{:?}]", concept.name.cyan(), concept.kind);
                for (i, instruction) in variations(&concept, &persona).enumerate() {
                    println!("    {}. {}", i + 1, instruction);
                }
            }
        }
    }

    Ok(())
}

pub mod driver;
pub mod error;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use error::{EngineError, EngineResult};
pub use report::generate_report;
pub use runner::run_usability_tests;

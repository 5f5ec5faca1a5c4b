pub mod catalog;
pub mod types;
pub mod yaml;

pub use types::*;
pub use yaml::{build_test_cases, parse_matrix_path};

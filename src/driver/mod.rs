pub mod http;
pub mod traits;

pub use http::HttpAutomation;
pub use traits::{ActOutcome, AutomationSession, QueryOutcome, SessionProvider};

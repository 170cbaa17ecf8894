//! Configuration and the request-facing repository session.

pub mod config;
pub mod error;
pub mod secret;
pub mod session;

pub use config::Config;
pub use error::SessionError;
pub use session::{LoadSummary, Session};

// Core modules
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod models;
pub mod oracle;
pub mod portfolio;
pub mod risk;
pub mod session;

// Re-export commonly used types
pub use crate::config::SessionConfig;
pub use engine::DecisionEngine;
pub use error::{ConfigError, LedgerError, OracleError, SessionError};
pub use models::*;
pub use portfolio::{Portfolio, Position, Trade};
pub use session::{SessionController, SessionSummary};

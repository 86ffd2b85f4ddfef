// Session controller, metrics and reporting
pub mod controller;
pub mod metrics;
pub mod report;

pub use controller::{SessionController, SessionState};
pub use metrics::PerformanceMetrics;
pub use report::{PositionView, SessionSummary, StatusSnapshot, StopCause};

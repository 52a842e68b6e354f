//! Analysis over the run history: shared statistics, the rolling summary,
//! long-run trends and failure grouping.

pub mod failures;
pub mod stats;
pub mod summary;
pub mod trend;

pub use self::failures::{analyze_failures, ErrorCategory, FailureAnalysis};
pub use self::summary::{health_status, HealthStatus, Summary, TrendLabel};
pub use self::trend::{TrendAnalysis, TrendEngine};

pub mod config;
pub mod logging;

pub mod candidate;
pub mod control;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod outcome_log;
pub mod retry;
pub mod transport;
pub mod validate;

pub use candidate::Candidate;
pub use control::CancelToken;
pub use dispatch::{concurrency_for, Dispatcher, RunReport};
pub use error::PipelineError;
pub use metrics::{Metrics, MetricsSnapshot};

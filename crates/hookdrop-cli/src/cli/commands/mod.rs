//! CLI command handlers, one file per command.

mod check;
mod config;
mod upload;

pub use check::run_check;
pub use config::run_config;
pub use upload::run_upload;

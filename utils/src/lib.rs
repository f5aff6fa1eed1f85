//! Shared utilities for the review marketplace client.

pub mod format;
pub mod logging;

pub use format::{format_average, format_days_ago, format_time_ago, truncate_middle};
pub use logging::{init_logging, LogFormat};

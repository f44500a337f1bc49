//! Task distribution
//!
//! Expands each group's request quota over its shuffled task list and feeds
//! tasks to the search-session state machine one at a time.

mod runner;

pub use runner::{expand_quota, TaskScheduler};

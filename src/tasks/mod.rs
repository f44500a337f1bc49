//! Task file parsing
//!
//! Turns the `;`-delimited task list into named groups sharing a request
//! quota, preserving the order groups first appear in the file.

mod parser;

pub use parser::{parse_task_file, Task, TaskGroup, TaskParseError};

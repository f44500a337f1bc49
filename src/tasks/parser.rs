//! Task list parser
//!
//! Line format: `group;requestsLimit;url;request;additionalRequest;region`.
//! Malformed lines are reported and skipped rather than failing the run.

use thiserror::Error;
use tracing::warn;

/// One verification job: find `url` in search results for `request`
/// (or `request + additional_request` on a first-pass miss) within `region`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub url: String,
    pub request: String,
    pub additional_request: String,
    pub region: String,
}

/// A named batch of tasks sharing a request quota.
#[derive(Debug, Clone)]
pub struct TaskGroup {
    pub name: String,
    /// Quota for the group. `None` when the field is missing or non-numeric,
    /// in which case distribution degrades to one pass over the tasks.
    pub requests_limit: Option<u32>,
    /// Number of query submissions actually performed for this group.
    pub requests_sent: u32,
    pub tasks: Vec<Task>,
}

/// Task-line parse errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TaskParseError {
    #[error("line {line}: expected 6 fields, got {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: empty {field} field")]
    EmptyField { line: usize, field: &'static str },
}

/// Parse a raw task file into groups, preserving first-seen group order.
///
/// Blank lines are ignored; malformed lines are logged and skipped.
pub fn parse_task_file(text: &str) -> Vec<TaskGroup> {
    let mut groups: Vec<TaskGroup> = Vec::new();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (group_name, requests_limit, task) = match parse_line(index + 1, line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping malformed task line: {}", e);
                continue;
            }
        };

        match groups.iter_mut().find(|g| g.name == group_name) {
            Some(group) => group.tasks.push(task),
            None => groups.push(TaskGroup {
                name: group_name,
                requests_limit,
                requests_sent: 0,
                tasks: vec![task],
            }),
        }
    }

    groups
}

/// Parse one task line. The quota comes from the first line a group appears
/// on; a non-numeric quota field is tolerated as "no quota".
fn parse_line(line_no: usize, line: &str) -> Result<(String, Option<u32>, Task), TaskParseError> {
    let fields: Vec<&str> = line.split(';').map(str::trim).collect();

    if fields.len() != 6 {
        return Err(TaskParseError::FieldCount {
            line: line_no,
            found: fields.len(),
        });
    }

    let required = [("group", fields[0]), ("url", fields[2]), ("request", fields[3])];
    for (name, value) in required {
        if value.is_empty() {
            return Err(TaskParseError::EmptyField {
                line: line_no,
                field: name,
            });
        }
    }

    let requests_limit = fields[1].parse::<u32>().ok();

    Ok((
        fields[0].to_string(),
        requests_limit,
        Task {
            url: fields[2].to_string(),
            request: fields[3].to_string(),
            additional_request: fields[4].to_string(),
            region: fields[5].to_string(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_groups_in_first_seen_order() {
        let text = "\
groupB;5;shop.com/b;blue boots;size 9;213\n\
groupA;3;shop.com/item;red shoes;size 10;213\n\
groupB;5;shop.com/c;green hats;wool;2\n";

        let groups = parse_task_file(text);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "groupB");
        assert_eq!(groups[0].tasks.len(), 2);
        assert_eq!(groups[0].requests_limit, Some(5));
        assert_eq!(groups[1].name, "groupA");
        assert_eq!(groups[1].tasks.len(), 1);

        let task = &groups[1].tasks[0];
        assert_eq!(task.url, "shop.com/item");
        assert_eq!(task.request, "red shoes");
        assert_eq!(task.additional_request, "size 10");
        assert_eq!(task.region, "213");
    }

    #[test]
    fn skips_blank_and_malformed_lines() {
        let text = "\
groupA;3;shop.com/item;red shoes;size 10;213\n\
\n\
only;two\n\
groupA;3;;red shoes;size 10;213\n";

        let groups = parse_task_file(text);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tasks.len(), 1);
    }

    #[test]
    fn non_numeric_quota_becomes_none() {
        let text = "groupA;lots;shop.com/item;red shoes;size 10;213\n";
        let groups = parse_task_file(text);

        assert_eq!(groups[0].requests_limit, None);
    }

    #[test]
    fn empty_optional_fields_are_tolerated() {
        let text = "groupA;3;shop.com/item;red shoes;;\n";
        let groups = parse_task_file(text);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tasks[0].additional_request, "");
        assert_eq!(groups[0].tasks[0].region, "");
    }

    #[test]
    fn field_count_error_reports_line_number() {
        let err = parse_line(4, "a;b;c").unwrap_err();
        assert_eq!(err, TaskParseError::FieldCount { line: 4, found: 3 });
    }
}

//! Task distribution runner
//!
//! Groups run in the order they first appear in the task file. Within a
//! group, the shuffled task list is expanded to the group's request quota
//! and executed strictly sequentially: a task's session is fully closed
//! before the next task starts.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bot::{self, TaskOutcome};
use crate::profiles::ProfileClient;
use crate::stats::RunStats;
use crate::tasks::{Task, TaskGroup};
use crate::{util, AppConfig};

/// Sequential, quota-honoring task scheduler
pub struct TaskScheduler {
    config: AppConfig,
    provider: ProfileClient,
    stats: Arc<RunStats>,
}

impl TaskScheduler {
    pub fn new(config: AppConfig, provider: ProfileClient, stats: Arc<RunStats>) -> Self {
        Self {
            config,
            provider,
            stats,
        }
    }

    /// Run every group to completion, in insertion order.
    pub async fn run(&self, mut groups: Vec<TaskGroup>) {
        for group in &mut groups {
            if group.tasks.is_empty() {
                warn!("Group {} has no tasks, skipping", group.name);
                continue;
            }

            info!(
                "Start processing group: {} ({} tasks, limit {:?})",
                group.name,
                group.tasks.len(),
                group.requests_limit
            );

            util::shuffle(&mut group.tasks);
            let plan = expand_quota(&group.tasks, group.requests_limit);
            debug!("Group {} execution plan: {} requests", group.name, plan.len());

            for task in &plan {
                let outcome = bot::process_task(&self.config, &self.provider, &group.name, task).await;
                group.requests_sent += 1;

                match outcome {
                    TaskOutcome::Found { .. } => self.stats.record_found(),
                    TaskOutcome::NotFound => self.stats.record_not_found(),
                    TaskOutcome::ChallengeDetected => self.stats.record_challenge(),
                    TaskOutcome::Failed => self.stats.record_failure(),
                }
            }

            info!(
                "Group {} finished: {} of {} requests sent",
                group.name,
                group.requests_sent,
                plan.len()
            );
        }
    }
}

/// Expand a shuffled task list to its request quota: whole repetitions of
/// the list, then a head slice for the remainder. Without a usable quota the
/// plan is a single pass over the tasks.
pub fn expand_quota(tasks: &[Task], requests_limit: Option<u32>) -> Vec<Task> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let limit = match requests_limit {
        Some(limit) => limit as usize,
        None => return tasks.to_vec(),
    };

    let mut plan = Vec::with_capacity(limit);
    for _ in 0..limit / tasks.len() {
        plan.extend_from_slice(tasks);
    }
    plan.extend_from_slice(&tasks[..limit % tasks.len()]);
    plan
}

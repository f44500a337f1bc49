//! Per-task search-session orchestration.
//!
//! Runs one task end to end: acquire a profile, connect, configure region,
//! search with retry-on-miss, visit the matched result, humanize, clean up.
//! Task failures never propagate to the scheduler; every outcome is logged
//! and the browser session is closed on all exit paths.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::browser::{
    resolve_target, ScrollSimulator, SearchActions, SearchResultItem, SearchSession, SessionError,
};
use crate::profiles::{Profile, ProfileClient};
use crate::tasks::Task;
use crate::{util, AppConfig};

/// How one task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Target URL located at `index` in the results
    Found { index: usize },
    /// Target URL absent even after the broadened retry
    NotFound,
    /// A challenge page blocked the search
    ChallengeDetected,
    /// Profile acquisition or a driver call failed
    Failed,
}

impl From<&SessionError> for TaskOutcome {
    fn from(err: &SessionError) -> Self {
        match err {
            SessionError::ChallengeDetected(_) => TaskOutcome::ChallengeDetected,
            SessionError::TargetNotFound(_) => TaskOutcome::NotFound,
            _ => TaskOutcome::Failed,
        }
    }
}

/// Process a single task through a dedicated browser session.
pub async fn process_task(
    config: &AppConfig,
    provider: &ProfileClient,
    group: &str,
    task: &Task,
) -> TaskOutcome {
    info!(
        "Processing task: group={} url={} request={} additional={} region={}",
        group, task.url, task.request, task.additional_request, task.region
    );

    let profile = match acquire_profile(provider).await {
        Ok(profile) => profile,
        Err(e) => {
            error!("Task {} aborted: {}", task.url, e);
            return TaskOutcome::Failed;
        }
    };

    let mut session = match SearchSession::connect(&profile.id, &profile.websocket_link).await {
        Ok(session) => session,
        Err(e) => {
            error!("Task {} aborted: {}", task.url, e);
            return TaskOutcome::Failed;
        }
    };

    let result = run_session(&mut session, config, task).await;
    let connection_alive = session.is_alive();

    // teardown runs on every exit path, releasing the profile's browser
    tokio::time::sleep(Duration::from_millis(config.close_delay_ms)).await;
    session.close().await;

    match result {
        Ok((index, item)) => {
            info!(
                "Target item for {} found at index {}: {} ({})",
                task.url, index, item.title, item.url
            );
            TaskOutcome::Found { index }
        }
        Err(e) => {
            match &e {
                SessionError::ChallengeDetected(msg) => {
                    warn!("Task {} blocked by challenge page: {}", task.url, msg)
                }
                SessionError::TargetNotFound(url) => {
                    warn!("Target {} not present in results after retry", url)
                }
                SessionError::NavigationTimeout(msg) => {
                    warn!("Task {} visit timed out: {}", task.url, msg)
                }
                _ if !connection_alive => {
                    warn!("Task {} failed with dead browser connection: {}", task.url, e)
                }
                _ => warn!("Task {} failed: {}", task.url, e),
            }
            TaskOutcome::from(&e)
        }
    }
}

/// Pick a profile uniformly at random and start it.
async fn acquire_profile(provider: &ProfileClient) -> Result<Profile, SessionError> {
    let ids = provider.list().await;

    let chosen = util::choose(&ids)
        .ok_or_else(|| SessionError::ProfileUnavailable("no profiles available".into()))?;

    provider.start(&chosen).await.ok_or_else(|| {
        SessionError::ProfileUnavailable(format!("failed to start profile {}", chosen))
    })
}

/// The fallible middle of the state machine, bracketed by connect and close.
async fn run_session(
    session: &mut SearchSession,
    config: &AppConfig,
    task: &Task,
) -> Result<(usize, SearchResultItem), SessionError> {
    session
        .open(&config.search_url, Duration::from_millis(config.settle_delay_ms))
        .await?;

    if !task.region.is_empty() {
        SearchActions::set_region(session, &task.region).await?;
    }

    if SearchActions::check_challenge(session).await? {
        return Err(SessionError::ChallengeDetected(
            "challenge form present before search".into(),
        ));
    }

    let session_ref: &SearchSession = session;
    let (index, item) = resolve_target(task, |query, first_try| async move {
        SearchActions::submit_query(session_ref, &query, first_try, config).await?;
        SearchActions::collect_results(session_ref).await
    })
    .await?;

    SearchActions::open_target(session, &task.url, config).await?;

    ScrollSimulator::run(session).await;

    Ok((index, item))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_and_miss_map_to_their_own_outcomes() {
        assert_eq!(
            TaskOutcome::from(&SessionError::ChallengeDetected("form present".into())),
            TaskOutcome::ChallengeDetected
        );
        assert_eq!(
            TaskOutcome::from(&SessionError::TargetNotFound("shop.com/item".into())),
            TaskOutcome::NotFound
        );
    }

    #[test]
    fn driver_errors_map_to_failed() {
        let errors = [
            SessionError::ProfileUnavailable("no profiles".into()),
            SessionError::ConnectFailed("refused".into()),
            SessionError::NavigationTimeout("target page did not render".into()),
            SessionError::ConnectionLost("stream ended".into()),
            SessionError::ElementNotFound("input".into()),
        ];

        for err in &errors {
            assert_eq!(TaskOutcome::from(err), TaskOutcome::Failed, "{}", err);
        }
    }
}

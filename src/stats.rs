//! Lock-free run statistics using atomic counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters aggregated over a whole run.
#[derive(Debug, Default)]
pub struct RunStats {
    pub executed: AtomicU64,
    pub found: AtomicU64,
    pub not_found: AtomicU64,
    pub challenges: AtomicU64,
    pub failures: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task where the target URL was located.
    pub fn record_found(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.found.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task where the target URL was absent after the retry.
    pub fn record_not_found(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task aborted by a challenge page.
    pub fn record_challenge(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.challenges.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task that failed for any other reason.
    pub fn record_failure(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot for serialization
    pub fn snapshot(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            executed: self.executed.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            challenges: self.challenges.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of run stats
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatsSnapshot {
    pub executed: u64,
    pub found: u64,
    pub not_found: u64,
    pub challenges: u64,
    pub failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_per_outcome() {
        let stats = RunStats::new();
        stats.record_found();
        stats.record_found();
        stats.record_not_found();
        stats.record_challenge();
        stats.record_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.executed, 5);
        assert_eq!(snap.found, 2);
        assert_eq!(snap.not_found, 1);
        assert_eq!(snap.challenges, 1);
        assert_eq!(snap.failures, 1);
    }
}

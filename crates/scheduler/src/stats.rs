use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use jobpool_core::JobResult;

/// Counters describing what a manager has done so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    /// Jobs accepted by `submit`.
    pub submitted: u64,
    /// Workers started.
    pub launched: u64,
    /// Results delivered as `Success`.
    pub succeeded: u64,
    /// Results delivered as `Error`, including synthesized ones.
    pub failed: u64,
    /// Workers that exited abnormally without posting a result.
    pub crashed: u64,
    /// Jobs whose worker could not be started.
    pub launch_failures: u64,
    /// Results dropped because the job already had one.
    pub late_duplicates: u64,
    /// Queued jobs thrown away by `terminate`.
    pub discarded: u64,
    /// Mean wall time from launch until the worker was observed finished.
    pub avg_run_time: Duration,
    /// When the most recent result was queued for the caller.
    pub last_completed: Option<DateTime<Utc>>,
    #[serde(skip)]
    runs: u64,
}

impl ManagerStats {
    /// Record one finished worker's run time.
    pub fn record_run(&mut self, duration: Duration) {
        self.runs += 1;

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        self.avg_run_time = if self.runs == 1 {
            duration
        } else {
            let prev_nanos = self.avg_run_time.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / self.runs as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    /// Record one result handed to the completed queue.
    pub fn record_completion<T>(&mut self, result: &JobResult<T>) {
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.last_completed = Some(Utc::now());
    }

    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[cfg(test)]
mod tests {
    use jobpool_core::JobError;

    use super::*;

    #[test]
    fn single_run_sets_average() {
        let mut stats = ManagerStats::default();
        stats.record_run(Duration::from_millis(100));
        assert_eq!(stats.avg_run_time, Duration::from_millis(100));
    }

    #[test]
    fn runs_are_averaged() {
        let mut stats = ManagerStats::default();
        stats.record_run(Duration::from_millis(100));
        stats.record_run(Duration::from_millis(200));
        let avg = stats.avg_run_time.as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn completions_split_by_outcome() {
        let mut stats = ManagerStats::default();
        assert!(stats.last_completed.is_none());

        stats.record_completion(&JobResult::success(1));
        stats.record_completion(&JobResult::<i32>::error(JobError::runtime("x")));
        stats.record_completion(&JobResult::success(2));

        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed(), 3);
        assert!(stats.last_completed.is_some());
    }

    #[test]
    fn serializes_without_internal_counter() {
        let json = serde_json::to_value(ManagerStats::default()).unwrap();
        assert_eq!(json["submitted"], 0);
        assert!(json.get("runs").is_none());
    }
}

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use jobpool_scheduler::{
    Capacity, Creator, JobError, JobId, JobResult, Manager, SchedulerConfig, Stacktrace, Strategy,
};

fn creator<T>(capacity: Capacity) -> Creator<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Send + 'static,
{
    let config = SchedulerConfig {
        capacity,
        waittime_ms: 2,
        strategy: Strategy::Process,
        propagate_error_message: false,
    };
    Creator::from_config(&config).unwrap()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Summary {
    label: String,
    squares: Vec<u64>,
}

#[test]
fn values_and_errors_cross_the_boundary() {
    let creator = creator(Capacity::limited(2));
    let mut manager: Manager<Summary> = creator.create().unwrap();

    let ok = manager.submit(|| {
        Ok(Summary {
            label: "child".into(),
            squares: (1..=4).map(|n| n * n).collect(),
        })
    });
    let failed = manager.submit(|| {
        Err(JobError::new("ValueError", "boom").with_stacktrace(Stacktrace::from_lines(vec![
            "0: compute".into(),
            "1: job".into(),
        ])))
    });

    let results: HashMap<JobId, JobResult<Summary>> = manager.results().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[&ok].value(),
        Some(&Summary {
            label: "child".into(),
            squares: vec![1, 4, 9, 16],
        })
    );

    let error = results[&failed].err().unwrap();
    assert_eq!(error, &JobError::new("ValueError", "boom"));
    assert_eq!(error.stacktrace().unwrap().lines(), ["0: compute", "1: job"]);

    creator.destroy(manager);
}

#[test]
fn panic_in_child_is_reported() {
    let creator = creator(Capacity::limited(1));
    let mut manager: Manager<u8> = creator.create().unwrap();
    let id = manager.submit(|| panic!("child panicked"));

    let (got, result) = manager.results().next().unwrap();
    assert_eq!(got, id);
    let error = result.err().unwrap();
    assert!(error.is_kind(JobError::PANIC));
    assert_eq!(error.message(), "child panicked");

    creator.destroy(manager);
}

#[test]
fn exit_without_result_is_synthesized() {
    let creator = creator(Capacity::limited(2));
    let mut manager: Manager<u8> = creator.create().unwrap();
    let crashed = manager.submit(|| std::process::exit(9));
    let fine = manager.submit(|| Ok(3));

    let results: Vec<(JobId, JobResult<u8>)> = manager.results().collect();
    assert_eq!(results.len(), 2);
    for (id, result) in results {
        if id == crashed {
            assert_eq!(result.err(), Some(&JobError::exit_code(9)));
        } else {
            assert_eq!(id, fine);
            assert_eq!(result.value(), Some(&3));
        }
    }
    assert_eq!(manager.stats().crashed, 1);

    creator.destroy(manager);
}

#[test]
fn terminate_kills_running_children() {
    let creator = creator(Capacity::limited(2));
    let mut manager: Manager<u8> = creator.create().unwrap();
    for _ in 0..3 {
        manager.submit(|| {
            thread::sleep(Duration::from_secs(60));
            Ok(0)
        });
    }
    manager.poll();
    assert_eq!(manager.process_count(), 2);

    let started = Instant::now();
    manager.terminate();
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(manager.process_count(), 0);
    assert_eq!(manager.job_count(), 0);

    let results: Vec<_> = manager.results().collect();
    assert_eq!(results.len(), 2);
    let sigterm = nix::sys::signal::Signal::SIGTERM as i32;
    for (_, result) in results {
        assert_eq!(result.err(), Some(&JobError::exit_code(-sigterm)));
    }

    creator.destroy(manager);
}

#[test]
fn many_short_jobs() {
    let creator = creator(Capacity::limited(4));
    let mut manager: Manager<u64> = creator.create().unwrap();
    let ids: Vec<JobId> = (0..20u64).map(|n| manager.submit(move || Ok(n * n))).collect();

    let results: HashMap<JobId, u64> = manager
        .results()
        .map(|(id, result)| (id, result.into_result().unwrap()))
        .collect();
    assert_eq!(results.len(), 20);
    for (n, id) in ids.iter().enumerate() {
        assert_eq!(results[id], (n * n) as u64);
    }

    creator.destroy(manager);
}

#[test]
fn large_results_arrive_up_to_the_frame_limit() {
    let creator = creator(Capacity::limited(2));
    let mut manager: Manager<Vec<u8>> = creator.create().unwrap();

    let fits = manager.submit(|| Ok(vec![7u8; 1 << 20]));
    let too_big = manager.submit(|| Ok(vec![0u8; jobpool_channel::process::MAX_FRAME + 1]));

    let results: HashMap<JobId, JobResult<Vec<u8>>> = manager.results().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[&fits].value().map(Vec::len), Some(1 << 20));

    let error = results[&too_big].err().unwrap();
    assert!(error.is_kind(JobError::RUNTIME));
    assert!(error.message().starts_with("result delivery failed"));
    creator.destroy(manager);
}

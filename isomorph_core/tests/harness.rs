//! Deadline behaviour of the cancellation harness.

use isomorph_core::{
    introspect, validate_objects_are_equal, CancellationHarness, ErrorKind, MismatchKind,
    ValidationError, ValidationOptions, Value,
};
use isomorph_env::TokioContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Reading {
    station: String,
    samples: Vec<i32>,
}
introspect!(Reading { station, samples });

fn reading(station: &str, samples: &[i32]) -> Reading {
    Reading {
        station: station.to_string(),
        samples: samples.to_vec(),
    }
}

#[derive(Clone)]
struct Chain {
    value: i64,
    next: Option<Box<Chain>>,
}
introspect!(Chain { value, next });

impl Drop for Chain {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut link) = next {
            next = link.next.take();
        }
    }
}

/// Builds `len` inline links, the last one carrying `tail`.
fn chain(len: usize, tail: i64) -> Chain {
    let mut head = Chain { value: tail, next: None };
    for i in 1..len {
        head = Chain {
            value: (len - 1 - i) as i64,
            next: Some(Box::new(head)),
        };
    }
    head
}

#[tokio::test]
async fn test_slow_comparison_times_out() {
    // Each member takes 100ms; five members is 500ms of work
    let options = ValidationOptions::default()
        .with_timeout_ms(50)
        .on_member_start(|_| std::thread::sleep(Duration::from_millis(100)));
    let expected = reading("north", &[1, 2, 3, 4]);
    let actual = reading("north", &[1, 2, 3, 4]);

    let started = Instant::now();
    let err = validate_objects_are_equal(&expected, &actual, options)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_millis(450));
    match err {
        ValidationError::Timeout { timeout_ms, label, .. } => {
            assert_eq!(timeout_ms, 50);
            assert!(label.is_none());
        }
        other => panic!("expected timeout, got {}", other),
    }
}

#[tokio::test]
async fn test_timeout_carries_lazy_label() {
    let harness = CancellationHarness::new(TokioContext::shared());
    let options = ValidationOptions::default()
        .with_timeout_ms(20)
        .on_member_start(|_| std::thread::sleep(Duration::from_millis(200)));

    let err = harness
        .validate(
            Value::object(reading("a", &[])),
            Value::object(reading("a", &[])),
            options,
            || "station a, run 12".to_string(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().ends_with("(station a, run 12)"), "{}", err);
}

#[tokio::test]
async fn test_loser_keeps_running_after_timeout() {
    let finished = Arc::new(AtomicBool::new(false));
    let options = ValidationOptions::default()
        .with_timeout_ms(10)
        .on_member_start(|_| std::thread::sleep(Duration::from_millis(60)))
        .on_member_done({
            let finished = Arc::clone(&finished);
            move |visit| {
                if visit.member.name() == "samples" {
                    finished.store(true, Ordering::SeqCst);
                }
            }
        });

    let err = validate_objects_are_equal(&reading("x", &[]), &reading("x", &[]), options)
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(!finished.load(Ordering::SeqCst));

    // The abandoned traversal still runs to completion on its thread
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(finished.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_mismatch_wins_race_before_deadline() {
    let err = validate_objects_are_equal(
        &reading("north", &[1, 2, 3]),
        &reading("north", &[1, 2, 3, 4]),
        ValidationOptions::default(),
    )
    .await
    .unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.kind, MismatchKind::LengthMismatch);
    assert_eq!(report.path, "Reading.samples");
}

#[tokio::test]
async fn test_concurrent_calls_are_independent() {
    let harness = CancellationHarness::new(TokioContext::shared());
    let mut tasks = Vec::new();
    for i in 0..8 {
        let harness = harness.clone();
        tasks.push(tokio::spawn(async move {
            let samples: Vec<i32> = (0..i).collect();
            let mut drifted = samples.clone();
            if i % 2 == 1 {
                drifted[0] = -1;
            }
            harness
                .validate(
                    Value::object(reading("s", &samples)),
                    Value::object(reading("s", &drifted)),
                    ValidationOptions::default(),
                    move || format!("task {}", i),
                )
                .await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let result = task.await.unwrap();
        if i % 2 == 1 {
            assert_eq!(result.unwrap_err().kind(), ErrorKind::ValueMismatch);
        } else {
            assert!(result.is_ok());
        }
    }
}

#[tokio::test]
async fn test_deep_inline_chain_finishes_within_default_deadline() {
    const LEN: usize = 20_000;
    let harness = CancellationHarness::new(TokioContext::shared());

    let started = Instant::now();
    let stats = harness
        .validate(
            Value::object(chain(LEN, 7)),
            Value::object(chain(LEN, 7)),
            ValidationOptions::default(),
            || "deep chain".to_string(),
        )
        .await
        .unwrap();
    assert!(stats.max_depth >= LEN, "max_depth = {}", stats.max_depth);
    assert!(started.elapsed() < Duration::from_secs(5));

    let err = harness
        .validate(
            Value::object(chain(LEN, 7)),
            Value::object(chain(LEN, 8)),
            ValidationOptions::default(),
            || "deep chain drift".to_string(),
        )
        .await
        .unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.kind, MismatchKind::ValueMismatch);
    assert_eq!(report.path.matches(".next").count(), LEN - 1);
    assert!(report.path.ends_with(".next.value"));
}

// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! End-to-end scenarios exercising the public surface of a pipeline: a job
//! with no inputs, jobs wired into a cascade, multi-worker fan-in, a
//! worker-side error collapsing its stage, a splitter fanning one upstream
//! out to several independent children, and the synchronous configuration
//! checks `.spawn()` performs before any worker runs.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use r3bl_pipeline::{IntoPipelineSource, Job, PipelineError, Splitter};

#[derive(Debug)]
struct BoomError;

impl std::fmt::Display for BoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "boom") }
}

impl std::error::Error for BoomError {}

async fn drain<T>(job: &Job<T>) -> Vec<T>
where T: serde::Serialize + serde::de::DeserializeOwned + Send + 'static {
    let mut out = Vec::new();
    while let Some(v) = job.next().await {
        out.push(v.expect("stage did not error"));
    }
    out
}

#[tokio::test]
async fn identity_job_with_no_inputs() {
    let job = Job::<String>::builder(|_inputs| std::iter::once(Ok("a".to_string())))
        .spawn()
        .await
        .unwrap();

    assert_eq!(drain(&job).await, vec!["a".to_string()]);
}

#[tokio::test]
async fn each_job_runs_its_closure_on_its_own_thread() {
    let caller_thread = format!("{:?}", std::thread::current().id());

    let job_a = Job::<String>::builder(|_inputs| {
        std::iter::once(Ok(format!("{:?}", std::thread::current().id())))
    })
    .spawn()
    .await
    .unwrap();
    let job_b = Job::<String>::builder(|_inputs| {
        std::iter::once(Ok(format!("{:?}", std::thread::current().id())))
    })
    .spawn()
    .await
    .unwrap();

    let thread_a = job_a.next().await.unwrap().unwrap();
    let thread_b = job_b.next().await.unwrap().unwrap();

    assert_ne!(thread_a, caller_thread);
    assert_ne!(thread_b, caller_thread);
    assert_ne!(thread_a, thread_b);
}

#[tokio::test]
async fn squares_values_pulled_through_one_input() {
    let job = Job::<i32>::builder(|inputs| {
        let i = inputs.get("i").unwrap();
        i.map(|r| r.map(|v| v * v))
    })
    .input("i", vec![1, 2, 3])
    .spawn()
    .await
    .unwrap();

    assert_eq!(drain(&job).await, vec![1, 4, 9]);
}

/// Builds a job that sums two named inputs element-wise, stopping as soon
/// as either side runs out.
async fn sum_job(
    a: impl IntoPipelineSource<i32> + 'static,
    b: impl IntoPipelineSource<i32> + 'static,
) -> Job<i32> {
    Job::<i32>::builder(|inputs| {
        let mut a = inputs.get("a").unwrap();
        let mut b = inputs.get("b").unwrap();
        std::iter::from_fn(move || match (a.next(), b.next()) {
            (Some(Ok(x)), Some(Ok(y))) => Some(Ok(x + y)),
            (Some(Err(e)), _) | (_, Some(Err(e))) => Some(Err(e)),
            _ => None,
        })
    })
    .input("a", a)
    .input("b", b)
    .spawn()
    .await
    .unwrap()
}

#[tokio::test]
async fn three_level_cascade_of_two_input_summers() {
    let leaf_1 = sum_job(vec![1, 2, 3], vec![3, 2, 1]).await; // (4, 4, 4)
    let leaf_2 = sum_job(vec![-1, -2, -3], vec![7, 8, 9]).await; // (6, 6, 6)
    let leaf_3 = sum_job(vec![-7, -2, -1], vec![-3, -8, -9]).await; // (-10, -10, -10)

    let mid = sum_job(leaf_1, leaf_2).await; // (10, 10, 10)
    let top = sum_job(mid, leaf_3).await; // (0, 0, 0)

    assert_eq!(drain(&top).await, vec![0, 0, 0]);
}

#[tokio::test]
async fn multi_worker_fan_in_preserves_the_sum() {
    let job = Job::<i32>::builder(|inputs| inputs.get("i").unwrap())
        .workers(3)
        .input("i", (0..100).collect::<Vec<i32>>())
        .spawn()
        .await
        .unwrap();

    let sum: i32 = drain(&job).await.into_iter().sum();
    assert_eq!(sum, (0..100).sum::<i32>());
}

#[tokio::test]
async fn one_worker_erroring_collapses_the_whole_stage() {
    let job = Job::<i32>::builder(|inputs| {
        let mut raises = inputs.get("raises").unwrap();
        let mut should_raise: Option<bool> = None;
        std::iter::from_fn(move || {
            let flag = *should_raise.get_or_insert_with(|| matches!(raises.next(), Some(Ok(true))));
            if flag { Some(Err(PipelineError::User(Arc::new(BoomError)))) } else { Some(Ok(7)) }
        })
    })
    .workers(2)
    .input("raises", vec![true, false])
    .spawn()
    .await
    .unwrap();

    let first = job.next().await.expect("stage produced one item");
    assert!(first.is_err());

    for _ in 0..3 {
        assert!(job.next().await.is_none());
    }
}

#[tokio::test]
async fn splitter_delivers_each_keys_column_in_isolation() {
    let source: Vec<Vec<i32>> = vec![vec![3, 1, 0], vec![0, 1, 4], vec![0, 5, 0]];
    let upstream =
        Job::<Vec<i32>>::builder(move |_inputs| source.clone().into_iter().map(Ok))
            .spawn()
            .await
            .unwrap();

    let splitter = Splitter::new(upstream, vec![0usize, 1, 2]);
    let child = splitter.child(0);

    let mut out = Vec::new();
    while let Some(v) = child.next().await {
        out.push(v.unwrap());
    }
    assert_eq!(out, vec![3, 0, 0]);
}

#[tokio::test]
async fn splitter_children_progress_concurrently_without_deadlock() {
    let source: Vec<Vec<i32>> = vec![vec![1, 10], vec![2, 20], vec![3, 30]];
    let upstream =
        Job::<Vec<i32>>::builder(move |_inputs| source.clone().into_iter().map(Ok))
            .spawn()
            .await
            .unwrap();

    let splitter = Splitter::new(upstream, vec![0usize, 1]);
    let child_a = splitter.child(0);
    let child_b = splitter.child(1);

    let (out_a, out_b) = tokio::join!(
        async {
            let mut v = Vec::new();
            while let Some(x) = child_a.next().await {
                v.push(x.unwrap());
            }
            v
        },
        async {
            let mut v = Vec::new();
            while let Some(x) = child_b.next().await {
                v.push(x.unwrap());
            }
            v
        },
    );

    assert_eq!(out_a, vec![1, 2, 3]);
    assert_eq!(out_b, vec![10, 20, 30]);
}

#[tokio::test]
async fn missing_declared_input_fails_synchronously_before_any_worker_spawns() {
    let result = Job::<i32>::builder_with_inputs(&["i"], |inputs| {
        let i = inputs.get("i").unwrap();
        i.map(|r| r.map(|v| v * v))
    })
    .spawn()
    .await;

    match result {
        Err(PipelineError::MissingInput { name }) => assert_eq!(name, "i"),
        Err(other) => panic!("expected MissingInput, got {other:?}"),
        Ok(_) => panic!("expected spawn to fail before starting any worker"),
    }
}

#[tokio::test]
async fn declaring_and_supplying_the_same_input_still_spawns_and_runs() {
    let job = Job::<i32>::builder_with_inputs(&["i"], |inputs| {
        let i = inputs.get("i").unwrap();
        i.map(|r| r.map(|v| v * v))
    })
    .input("i", vec![1, 2, 3])
    .spawn()
    .await
    .unwrap();

    assert_eq!(drain(&job).await, vec![1, 4, 9]);
}

#[tokio::test]
async fn splitter_surfaces_bad_key_for_a_ragged_composite_without_desyncing_siblings() {
    // Key 2 is only present on the first and third composites; the middle
    // one is ragged (only two components). The `2`-keyed child should see
    // an error for the composite that lacks it while keys `0` and `1` stay
    // unaffected and in step with the upstream.
    let source: Vec<Vec<i32>> = vec![vec![3, 1, 9], vec![0, 1], vec![0, 5, 7]];
    let upstream =
        Job::<Vec<i32>>::builder(move |_inputs| source.clone().into_iter().map(Ok))
            .spawn()
            .await
            .unwrap();

    let splitter = Splitter::new(upstream, vec![0usize, 1, 2]);
    let child_0 = splitter.child(0);
    let child_2 = splitter.child(2);

    let mut out_0 = Vec::new();
    while let Some(v) = child_0.next().await {
        out_0.push(v.unwrap());
    }
    assert_eq!(out_0, vec![3, 0, 0]);

    let mut saw_bad_key = false;
    let mut values = Vec::new();
    while let Some(v) = child_2.next().await {
        match v {
            Ok(value) => values.push(value),
            Err(PipelineError::BadKey { .. }) => saw_bad_key = true,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(saw_bad_key, "expected the ragged composite to surface a BadKey error");
    assert_eq!(values, vec![9, 7]);
}

mod helpers;

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

use helpers::{extraction, food_item, FakeExtractor, GatedExtractor, HarnessBuilder};
use menu_pipeline::models::job::JobStatus;
use menu_pipeline::models::menu::FoodCategory;
use menu_pipeline::services::dispatcher::{DispatchError, QUEUE_FULL_MESSAGE};
use menu_pipeline::services::menu_jobs::ServiceError;

fn gated() -> Arc<GatedExtractor> {
    Arc::new(GatedExtractor::new(extraction(
        vec![food_item("Pad Thai", 12.0, FoodCategory::Entree)],
        vec![],
    )))
}

/// Wait until the extractor has been entered `n` times.
async fn wait_for_calls(extractor: &GatedExtractor, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while extractor.calls() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("extractor was not reached in time");
}

#[tokio::test]
async fn test_dispatch_returns_before_job_finishes() {
    let extractor = gated();
    let harness = HarnessBuilder::new(extractor.clone()).build();
    let job = harness.job(1).await;

    let handle = assert_ok!(harness.dispatcher.dispatch(&job).await);
    wait_for_calls(&extractor, 1).await;

    let running = harness.reload(&job).await;
    assert_eq!(running.status, JobStatus::ParsingMenu);
    assert!(!handle.is_finished());

    extractor.release(1);
    handle.await.unwrap();
    assert_eq!(harness.reload(&job).await.status, JobStatus::Done);
}

#[tokio::test]
async fn test_rejects_beyond_admission_capacity() {
    let extractor = gated();
    let harness = HarnessBuilder::new(extractor.clone()).limits(1, 1).build();

    let first = harness.job(1).await;
    let second = harness.job(1).await;
    let third = harness.job(1).await;

    let first_handle = assert_ok!(harness.dispatcher.dispatch(&first).await);
    let second_handle = assert_ok!(harness.dispatcher.dispatch(&second).await);
    assert_eq!(harness.dispatcher.available_slots(), 0);

    let rejected = harness.dispatcher.dispatch(&third).await;
    assert!(matches!(rejected, Err(DispatchError::Saturated)));

    let third = harness.reload(&third).await;
    assert_eq!(third.status, JobStatus::Failed);
    assert_eq!(third.error_message.as_deref(), Some(QUEUE_FULL_MESSAGE));
    assert!(third.completed_at.is_some());

    extractor.release(2);
    for result in join_all([first_handle, second_handle]).await {
        result.unwrap();
    }

    assert_eq!(harness.reload(&first).await.status, JobStatus::Done);
    assert_eq!(harness.reload(&second).await.status, JobStatus::Done);
    assert_eq!(harness.dispatcher.available_slots(), 2);
    assert_eq!(extractor.calls(), 2);
}

#[tokio::test]
async fn test_running_jobs_bounded() {
    let extractor = gated();
    let harness = HarnessBuilder::new(extractor.clone()).limits(2, 4).build();

    let mut jobs = Vec::new();
    for _ in 0..5 {
        jobs.push(harness.job(1).await);
    }

    let mut handles = Vec::new();
    for job in &jobs {
        handles.push(assert_ok!(harness.dispatcher.dispatch(job).await));
    }

    wait_for_calls(&extractor, 2).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(extractor.calls(), 2);

    let mut queued = 0;
    for job in &jobs {
        if harness.reload(job).await.status == JobStatus::Created {
            queued += 1;
        }
    }
    assert_eq!(queued, 3);

    extractor.release(5);
    for result in join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(extractor.peak(), 2);
    for job in &jobs {
        assert_eq!(harness.reload(job).await.status, JobStatus::Done);
    }
}

#[tokio::test]
async fn test_failing_job_does_not_reach_caller() {
    let extractor = Arc::new(FakeExtractor::failing("vision model unavailable"));
    let harness = HarnessBuilder::new(extractor).build();
    let broken = harness.job(1).await;
    let empty = harness.job(0).await;

    let handles = vec![
        assert_ok!(harness.dispatcher.dispatch(&broken).await),
        assert_ok!(harness.dispatcher.dispatch(&empty).await),
    ];
    for result in join_all(handles).await {
        assert!(result.is_ok(), "job task must not panic");
    }

    let broken = harness.reload(&broken).await;
    assert_eq!(broken.status, JobStatus::Failed);
    assert_eq!(
        broken.error_message.as_deref(),
        Some("Menu extraction failed: vision model unavailable")
    );

    let empty = harness.reload(&empty).await;
    assert_eq!(empty.error_message.as_deref(), Some("No photos uploaded"));
}

#[tokio::test]
async fn test_submit_reports_saturation() {
    let extractor = gated();
    let harness = HarnessBuilder::new(extractor.clone()).limits(1, 0).build();

    let session = harness.session(1).await;
    let accepted = assert_ok!(harness.service.submit(session.uuid, None, None).await);
    assert_eq!(accepted.status, JobStatus::Created);

    let rejected = harness.service.submit(session.uuid, None, None).await;
    assert!(matches!(
        rejected,
        Err(ServiceError::Dispatch(DispatchError::Saturated))
    ));

    extractor.release(1);
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = harness.service.status_of(accepted.uuid).await.unwrap();
            if view.status.is_terminal() {
                break view;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not finish");
}

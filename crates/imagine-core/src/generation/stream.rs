//! Lazy, batch-at-a-time event stream shared by the providers.
//!
//! The stream is driven entirely by the consumer: a batch's sub-requests are
//! only issued when the consumer polls for the event that follows the batch
//! announcement. Whatever the consumer does between two polls (saving images,
//! waiting out a rate limit) therefore always happens before the next batch
//! starts.

use futures::future::join_all;
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;

use super::event::{BatchFailure, FailureKind, GenerationEvent, ImageEncoding, Severity};
use crate::batch::BatchPlan;

/// A finite, single-pass stream of generation events.
pub type GenerationStream = BoxStream<'static, GenerationEvent>;

enum Phase {
    Announce,
    Run,
}

struct Driver<F> {
    runner: F,
    sizes: Vec<u32>,
    index: usize,
    phase: Phase,
    encoding: ImageEncoding,
}

/// Builds the event stream for `plan`.
///
/// For every batch a log event is emitted, then `runner(size)` is awaited and
/// its outcome is turned into an images or error event. A fatal failure ends
/// the stream; no later batch is started.
pub fn batched_stream<F, Fut>(plan: BatchPlan, encoding: ImageEncoding, runner: F) -> GenerationStream
where
    F: FnMut(u32) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<String>, BatchFailure>> + Send + 'static,
{
    let driver = Driver {
        runner,
        sizes: plan.sizes().to_vec(),
        index: 0,
        phase: Phase::Announce,
        encoding,
    };

    stream::unfold(driver, |mut driver| async move {
        let size = *driver.sizes.get(driver.index)?;
        let number = driver.index + 1;

        match driver.phase {
            Phase::Announce => {
                driver.phase = Phase::Run;
                let event = GenerationEvent::log(format!(
                    "Generating batch #{number} with {size} image(s)..."
                ));
                Some((event, driver))
            }
            Phase::Run => {
                let outcome = (driver.runner)(size).await;
                driver.phase = Phase::Announce;
                driver.index += 1;

                let event = match outcome {
                    Ok(images) if !images.is_empty() => GenerationEvent::Images {
                        message: format!("Successfully generated batch #{number}!"),
                        encoding: driver.encoding,
                        images,
                    },
                    Ok(_) => BatchFailure::new(
                        FailureKind::Unknown,
                        "Unknown error.",
                        format!("batch #{number} returned no images"),
                    )
                    .into(),
                    Err(failure) => {
                        if failure.severity() == Severity::Fatal {
                            tracing::warn!(batch = number, kind = ?failure.kind, "fatal batch failure, stopping run");
                            driver.index = driver.sizes.len();
                        } else {
                            tracing::warn!(batch = number, kind = ?failure.kind, "recoverable batch failure");
                        }
                        failure.into()
                    }
                };
                Some((event, driver))
            }
        }
    })
    .boxed()
}

/// Runs `count` sub-requests concurrently and waits for all of them.
///
/// The batch succeeds only if every sub-request succeeds. Otherwise the first
/// failure in request order is returned; sub-requests are never abandoned
/// while still in flight.
pub async fn fan_out<F, Fut, T, E>(count: u32, make_request: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let results = join_all((0..count).map(make_request)).await;
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn images(n: u32) -> Vec<String> {
        (0..n).map(|i| format!("img-{i}")).collect()
    }

    async fn collect(stream: GenerationStream) -> Vec<GenerationEvent> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_successful_run_alternates_log_and_images() {
        let plan = BatchPlan::new(5, 2).unwrap();
        let events = collect(batched_stream(plan, ImageEncoding::Base64, |size| async move {
            Ok(images(size))
        }))
        .await;

        assert_eq!(events.len(), 6);
        assert!(matches!(events[0], GenerationEvent::Log { .. }));
        match &events[5] {
            GenerationEvent::Images { images, encoding, .. } => {
                assert_eq!(images.len(), 1);
                assert_eq!(*encoding, ImageEncoding::Base64);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_stops_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let plan = BatchPlan::new(4, 1).unwrap();

        let events = collect(batched_stream(plan, ImageEncoding::Base64, move |size| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call == 2 {
                    Err(BatchFailure::new(FailureKind::Authentication, "bad key", "401"))
                } else {
                    Ok(images(size))
                }
            }
        }))
        .await;

        // log, images, log, fatal error; nothing for batches 3-4
        assert_eq!(events.len(), 4);
        assert!(events[3].is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_recoverable_error_continues() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let plan = BatchPlan::new(2, 1).unwrap();

        let events = collect(batched_stream(plan, ImageEncoding::Url, move |size| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call == 1 {
                    Err(BatchFailure::new(FailureKind::RateLimited, "slow down", "429"))
                } else {
                    Ok(images(size))
                }
            }
        }))
        .await;

        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[1],
            GenerationEvent::Error {
                severity: Severity::Recoverable,
                ..
            }
        ));
        assert!(matches!(events[3], GenerationEvent::Images { .. }));
    }

    #[tokio::test]
    async fn test_batch_is_not_started_before_poll() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let plan = BatchPlan::new(2, 1).unwrap();
        let mut stream = batched_stream(plan, ImageEncoding::Base64, move |size| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(images(size)) }
        });

        assert!(matches!(stream.next().await, Some(GenerationEvent::Log { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(stream.next().await, Some(GenerationEvent::Images { .. })));
        assert!(matches!(stream.next().await, Some(GenerationEvent::Log { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fan_out_waits_for_all_and_reports_first_failure() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = started.clone();
        let result: Result<Vec<u32>, String> = fan_out(4, move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if i == 1 || i == 3 {
                    Err(format!("failed {i}"))
                } else {
                    Ok(i)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap_err(), "failed 1");
        assert_eq!(started.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fan_out_success_keeps_order() {
        let result: Result<Vec<u32>, String> = fan_out(3, |i| async move { Ok(i * 10) }).await;
        assert_eq!(result.unwrap(), vec![0, 10, 20]);
    }
}

//! Fixed-size concurrent batches with a pause in between.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;

/// Run `f` over `items`, `batch_size` calls at a time, sleeping `delay`
/// between batches. Results come back in input order.
///
/// Callers that need "one failure never aborts the batch" return a
/// `Result` from `f` and inspect each slot.
pub async fn run_batched<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    delay: Duration,
    f: F,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    let batch_size = batch_size.max(1);
    let mut results = Vec::with_capacity(items.len());
    let mut items = items.into_iter().peekable();
    let mut first = true;

    while items.peek().is_some() {
        if !first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        first = false;
        let batch: Vec<Fut> = items.by_ref().take(batch_size).map(&f).collect();
        results.extend(join_all(batch).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn keeps_input_order() {
        let out = run_batched(vec![3u64, 1, 2, 0], 2, Duration::ZERO, |n| async move {
            tokio::time::sleep(Duration::from_millis(n * 5)).await;
            n * 10
        })
        .await;
        assert_eq!(out, vec![30, 10, 20, 0]);
    }

    #[tokio::test]
    async fn never_exceeds_batch_size() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let out = run_batched((0..7).collect(), 3, Duration::from_millis(1), |i: usize| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        })
        .await;
        assert_eq!(out.len(), 7);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn failures_stay_in_their_slot() {
        let out: Vec<Result<u32, String>> =
            run_batched(vec![1, 2, 3], 2, Duration::ZERO, |n| async move {
                if n == 2 {
                    Err(format!("boom {n}"))
                } else {
                    Ok(n)
                }
            })
            .await;
        assert_eq!(out, vec![Ok(1), Err("boom 2".into()), Ok(3)]);
    }

    #[tokio::test]
    async fn empty_input_is_empty_output() {
        let out: Vec<u8> =
            run_batched(Vec::<u8>::new(), 4, Duration::from_secs(5), |n| async move { n }).await;
        assert!(out.is_empty());
    }
}

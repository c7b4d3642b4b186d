use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::{BlobError, BlobResult};

/// Bounded worker pool that lives for exactly one bulk call.
///
/// Every item runs as its own task, at most `width` at a time. Results are
/// written back into the slot of the item's input index, so the output order
/// never depends on completion order. The task set is owned by `run`; if the
/// caller drops the future mid-flight the remaining tasks are aborted.
#[derive(Debug, Clone, Copy)]
pub struct SigningPool {
    width: usize,
}

impl SigningPool {
    pub fn new(width: usize) -> Self {
        Self { width: width.max(1) }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `work` over every item and return one result per item, in input order
    pub async fn run<T, O, F, Fut>(self, items: Vec<T>, work: F) -> Vec<BlobResult<O>>
    where
        T: Send + 'static,
        O: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BlobResult<O>> + Send + 'static,
    {
        let total = items.len();
        let mut slots: Vec<Option<BlobResult<O>>> = (0..total).map(|_| None).collect();
        let permits = Arc::new(Semaphore::new(self.width));
        let mut tasks: JoinSet<(usize, BlobResult<O>)> = JoinSet::new();
        let work = Arc::new(work);

        debug!(items = total, width = self.width, "bulk signing started");

        for (index, item) in items.into_iter().enumerate() {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    slots[index] = Some(Err(BlobError::worker("signing pool closed")));
                    continue;
                }
            };
            let work = Arc::clone(&work);

            tasks.spawn(async move {
                let _permit = permit;
                (index, work(item).await)
            });

            // Reap finished tasks as we go so the set stays small
            while let Some(joined) = tasks.try_join_next() {
                Self::collect(&mut slots, joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            Self::collect(&mut slots, joined);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| Err(BlobError::worker(format!("worker for item {} did not complete", index))))
            })
            .collect()
    }

    fn collect<O>(
        slots: &mut [Option<BlobResult<O>>],
        joined: Result<(usize, BlobResult<O>), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((index, result)) => slots[index] = Some(result),
            Err(err) => warn!(error = %err, "signing worker panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let pool = SigningPool::new(4);
        // Later items finish first
        let results = pool
            .run((0..10u64).collect::<Vec<_>>(), |n| async move {
                tokio::time::sleep(Duration::from_millis(50 - n * 5)).await;
                Ok::<_, BlobError>(n * 10)
            })
            .await;

        let values: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, (0..10u64).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_width_bounds_concurrency() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (in_flight_c, peak_c) = (in_flight.clone(), peak.clone());
        let results = SigningPool::new(3)
            .run((0..12).collect::<Vec<u32>>(), move |_| {
                let in_flight = in_flight_c.clone();
                let peak = peak_c.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, BlobError>(())
                }
            })
            .await;

        assert_eq!(results.len(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_failures_stay_in_their_slot() {
        let results = SigningPool::new(2)
            .run(vec![1, 2, 3], |n| async move {
                if n == 2 {
                    Err(BlobError::not_found("two"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(results[0].as_ref().unwrap(), &1);
        assert!(results[1].as_ref().unwrap_err().is_not_found());
        assert_eq!(results[2].as_ref().unwrap(), &3);
    }

    #[tokio::test]
    async fn test_panicking_worker_fails_only_its_slot() {
        let results = SigningPool::new(2)
            .run(vec![1, 2, 3], |n| async move {
                if n == 3 {
                    panic!("boom");
                }
                Ok::<_, BlobError>(n)
            })
            .await;

        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(BlobError::Worker { .. })));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<BlobResult<()>> = SigningPool::new(8).run(Vec::<u8>::new(), |_| async { Ok::<_, BlobError>(()) }).await;
        assert!(results.is_empty());
    }
}

use std::future::Future;

use tokio::sync::Mutex;

/// Serialises read-modify-write cycles so concurrent logical requests cannot
/// race on the collection document.
///
/// Tasks execute strictly in the order they are admitted; at most one task is
/// ever in flight; a task that fails does not block the tasks behind it.
/// There is no timeout or cancellation: a hung task stalls the queue, and a
/// task whose caller gave up still runs when its turn arrives.
///
/// The queue only coordinates within one process. Multiple replicas writing
/// the same document can still lose updates to each other.
pub struct WriteQueue {
    lock: Mutex<()>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    /// Runs `task` after every previously admitted task has finished and
    /// returns the task's own outcome.
    pub async fn run<T, F, Fut>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // tokio's mutex hands the lock to waiters in FIFO order, which is
        // exactly the submission-order guarantee the store relies on.
        let _held = self.lock.lock().await;
        task().await
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn tasks_run_in_submission_order() {
        let queue = WriteQueue::new();
        let seen = Mutex::new(Vec::new());

        let tasks = (0..8).map(|i| {
            let queue = &queue;
            let seen = &seen;
            async move {
                queue
                    .run(|| async {
                        seen.lock().await.push(i);
                    })
                    .await;
            }
        });
        join_all(tasks).await;

        assert_eq!(*seen.lock().await, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn tasks_never_overlap() {
        let queue = Arc::new(WriteQueue::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlapped = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let queue = Arc::clone(&queue);
                let in_flight = Arc::clone(&in_flight);
                let overlapped = Arc::clone(&overlapped);
                tokio::spawn(async move {
                    queue
                        .run(|| async {
                            if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                                overlapped.fetch_add(1, Ordering::SeqCst);
                            }
                            tokio::time::sleep(Duration::from_millis(1)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(overlapped.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_task_does_not_poison_the_queue() {
        let queue = WriteQueue::new();

        let first: Result<(), &str> = queue.run(|| async { Err("boom") }).await;
        assert!(first.is_err());

        let second = queue.run(|| async { Ok::<_, &str>(42) }).await;
        assert_eq!(second, Ok(42));
    }
}

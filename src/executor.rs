use std::future::Future;

use futures::future::BoxFuture;
use log::*;
use tokio::sync::{mpsc, mpsc::UnboundedReceiver, mpsc::UnboundedSender};

type Job = BoxFuture<'static, ()>;

/// A single consumer FIFO queue that user callbacks are delivered on.
///
/// Callbacks submitted to the same executor run one after the other, in
/// submission order; separate executors run concurrently. Cloning yields
/// another handle onto the same queue.
///
/// `Executor::new` spawns the drain task and therefore must be called from
/// within a tokio runtime.
#[derive(Clone)]
pub struct Executor {
    jobs: UnboundedSender<Job>,
}

impl Executor {
    pub fn new() -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        tokio::spawn(Self::drain(queue));
        Executor { jobs }
    }

    async fn drain(mut queue: UnboundedReceiver<Job>) {
        while let Some(job) = queue.recv().await {
            job.await;
        }
    }

    pub(crate) fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.jobs.send(Box::pin(job)).is_err() {
            warn!("Executor is gone, dropping a callback");
        }
    }

    pub(crate) fn submit_fn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(async move { job() });
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let exec = Executor::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done, finished) = oneshot::channel();

        for i in 0..100u32 {
            let seen = seen.clone();
            exec.submit_fn(move || seen.lock().unwrap().push(i));
        }
        exec.submit_fn(move || {
            let _ = done.send(());
        });

        finished.await.unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn separate_executors_make_progress_independently() {
        let slow = Executor::new();
        let fast = Executor::new();
        let (blocked_tx, blocked_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel();

        slow.submit(async move {
            let _ = blocked_tx.send(());
            let _ = release_rx.await;
        });
        blocked_rx.await.unwrap();

        // The slow executor is parked; the fast one still drains
        fast.submit_fn(move || {
            let _ = done_tx.send(());
        });
        done_rx.await.unwrap();
        let _ = release_tx.send(());
    }
}

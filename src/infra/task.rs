use std::{future::Future, sync::Arc};

use tokio::{sync::watch, task::JoinHandle};

/// Stop/join handle for a long-running background task.
///
/// The task receives a `watch::Receiver<bool>` that flips to `true` on `stop()`.
pub struct TaskHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    join: Option<JoinHandle<()>>,
}

impl Clone for TaskHandle {
    fn clone(&self) -> Self {
        Self {
            stop_tx: Arc::clone(&self.stop_tx),
            join: None, // only the original handle can be joined
        }
    }
}

impl TaskHandle {
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(task(stop_rx));
        Self {
            stop_tx: Arc::new(stop_tx),
            join: Some(join),
        }
    }

    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub async fn stopped(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

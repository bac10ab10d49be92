use std::{sync::Arc, time::Duration};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DirectoryLookup, account_exists};

const QUEUE_DEPTH: usize = 16;

struct LookupRequest {
    id: Uuid,
    username: String,
    deadline: Duration,
    reply: oneshot::Sender<bool>,
}

/// Client side of the lookup worker. Cheap to clone; the worker exits once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct LookupHandle {
    tx: mpsc::Sender<LookupRequest>,
}

/// Moves `directory` into its own task and serves existence queries from it.
///
/// Each query runs on its own task, bounded by the caller's deadline, so a
/// stuck directory call never holds up later queries. Queries whose caller
/// already gave up are dropped unanswered.
pub fn spawn_lookup_worker<D>(directory: D) -> LookupHandle
where
    D: DirectoryLookup + 'static,
{
    let (tx, mut rx) = mpsc::channel::<LookupRequest>(QUEUE_DEPTH);
    let directory = Arc::new(directory);

    tokio::spawn(async move {
        info!("Directory lookup worker started");
        while let Some(request) = rx.recv().await {
            if request.reply.is_closed() {
                debug!(request_id = %request.id, "lookup caller gave up while queued");
                continue;
            }
            let directory = Arc::clone(&directory);
            tokio::spawn(async move {
                let LookupRequest {
                    id,
                    username,
                    deadline,
                    reply,
                } = request;
                let lookup = account_exists(directory.as_ref(), &username);
                let Ok(exists) = tokio::time::timeout(deadline, lookup).await else {
                    debug!(request_id = %id, %username, "directory lookup abandoned at deadline");
                    return;
                };
                debug!(request_id = %id, %username, exists, "directory lookup answered");
                if reply.send(exists).is_err() {
                    debug!(request_id = %id, "lookup caller gave up before the answer");
                }
            });
        }
        info!("Directory lookup worker stopped");
    });

    LookupHandle { tx }
}

impl LookupHandle {
    /// Asks the worker whether `username` exists, waiting at most `deadline`.
    ///
    /// Returns `false` on timeout or when the worker is gone.
    pub async fn exists(&self, username: &str, deadline: Duration) -> bool {
        let id = Uuid::new_v4();
        let (reply, answer) = oneshot::channel();
        let request = LookupRequest {
            id,
            username: username.to_string(),
            deadline,
            reply,
        };

        let exchange = async {
            self.tx.send(request).await.ok()?;
            answer.await.ok()
        };

        match tokio::time::timeout(deadline, exchange).await {
            Ok(Some(exists)) => exists,
            Ok(None) => {
                warn!(request_id = %id, username, "directory lookup worker unavailable");
                false
            }
            Err(_) => {
                warn!(
                    request_id = %id,
                    username,
                    timeout_ms = deadline.as_millis() as u64,
                    "directory lookup timed out"
                );
                false
            }
        }
    }
}

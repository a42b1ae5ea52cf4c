//! Background decode task
//!
//! One task per table instance. Requests and responses travel over unbounded
//! channels so neither side ever waits on the other; parsing itself runs on
//! the blocking pool.

use std::sync::Arc;

use rt_core::RequestId;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::decode::{decode_payload, Decoded};
use crate::{DataError, DecodeError};

/// Called from the worker after each response is queued, e.g. to request a repaint
pub type Notifier = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub id: RequestId,
    pub payload: String,
}

#[derive(Debug, Clone)]
pub enum DecodeResponse {
    Decoded { id: RequestId, decoded: Decoded },
    Failed { id: RequestId, error: DecodeError },
}

impl DecodeResponse {
    pub fn id(&self) -> RequestId {
        match self {
            DecodeResponse::Decoded { id, .. } | DecodeResponse::Failed { id, .. } => *id,
        }
    }
}

/// Handle to the decode task. Dropping it aborts the task.
pub struct DecodeWorker {
    requests: mpsc::UnboundedSender<DecodeRequest>,
    task: JoinHandle<()>,
}

impl DecodeWorker {
    /// Spawn the task on `handle`; responses are sent to `responses`
    pub fn spawn(
        handle: &Handle,
        responses: mpsc::UnboundedSender<DecodeResponse>,
        notifier: Option<Notifier>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = handle.spawn(run(rx, responses, notifier));
        Self { requests: tx, task }
    }

    /// Queue a request without waiting
    pub fn submit(&self, request: DecodeRequest) -> Result<(), DataError> {
        self.requests.send(request).map_err(|_| DataError::WorkerClosed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Abort the task. In-flight work never produces a response afterwards.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut requests: mpsc::UnboundedReceiver<DecodeRequest>,
    responses: mpsc::UnboundedSender<DecodeResponse>,
    notifier: Option<Notifier>,
) {
    while let Some(mut request) = requests.recv().await {
        // Only the newest queued payload can still be applied
        while let Ok(newer) = requests.try_recv() {
            tracing::debug!("Skipping superseded request {}", request.id);
            request = newer;
        }

        let id = request.id;
        tracing::debug!("Decoding request {} ({} bytes)", id, request.payload.len());

        let outcome = tokio::task::spawn_blocking(move || decode_payload(&request.payload)).await;
        let response = match outcome {
            Ok(Ok(decoded)) => {
                tracing::info!("Decoded request {}: {} rows", id, decoded.rows.len());
                DecodeResponse::Decoded { id, decoded }
            }
            Ok(Err(error)) => {
                tracing::warn!("Request {} failed: {}", id, error);
                DecodeResponse::Failed { id, error }
            }
            Err(e) => {
                tracing::error!("Decode task for request {} failed: {}", id, e);
                DecodeResponse::Failed { id, error: DecodeError::Task(e.to_string()) }
            }
        };

        if responses.send(response).is_err() {
            // The table instance is gone
            break;
        }
        if let Some(notify) = &notifier {
            notify();
        }
    }
    tracing::debug!("Decode worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_round_trip_and_notify() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let worker = DecodeWorker::spawn(
            &Handle::current(),
            tx,
            Some(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );

        worker
            .submit(DecodeRequest { id: RequestId(1), payload: "{not valid json".to_string() })
            .unwrap();
        let response = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();

        assert_eq!(response.id(), RequestId(1));
        assert!(matches!(
            response,
            DecodeResponse::Failed { error: DecodeError::MalformedPayload(_), .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(&Handle::current(), tx, None);
        worker.shutdown();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !worker.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(matches!(
            worker.submit(DecodeRequest { id: RequestId(1), payload: "[]".to_string() }),
            Err(DataError::WorkerClosed)
        ));
    }
}

use reqwest::Client;
use std::time::Duration;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::debug;
use url::Url;

use crate::{
    error::{AppError, AppResult},
    models::JobEvent,
};

/// Destination for job lifecycle events
///
/// Emitting never fails and never blocks the caller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Per-job queue size when none is configured
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Webhook poster
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    queue_capacity: usize,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to build webhook client: {}", e)))?;
        Ok(Self {
            http,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        })
    }

    /// Bound each job's pending events; zero is treated as one.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Single POST of one event, no retry.
    pub async fn notify(&self, endpoint: &Url, event: &JobEvent) -> AppResult<()> {
        let response = self
            .http
            .post(endpoint.clone())
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::transport(format!("webhook POST failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::transport(format!(
                "webhook returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Start an ordered delivery queue for one job's events.
    ///
    /// While the queue is full, newly emitted events are dropped.
    pub fn dispatcher(&self, endpoint: Url) -> EventDispatcher {
        let (tx, mut rx) = mpsc::channel::<JobEvent>(self.queue_capacity);
        let notifier = self.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(e) = notifier.notify(&endpoint, &event).await {
                    debug!(event = event.name(), error = %e, "webhook delivery dropped");
                }
            }
        });

        EventDispatcher {
            sender: EventSender { tx },
            handle,
        }
    }
}

/// Cloneable handle for queueing events onto one job's dispatcher
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<JobEvent>,
}

impl EventSink for EventSender {
    fn emit(&self, event: JobEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(event = event.name(), "event queue full, dropping");
            }
            Err(TrySendError::Closed(event)) => {
                debug!(event = event.name(), "event queue already closed");
            }
        }
    }
}

/// Per-job FIFO in front of the webhook
///
/// Events are delivered one at a time in emission order by a background task.
/// Dropping the dispatcher and every sender still lets the queue drain.
pub struct EventDispatcher {
    sender: EventSender,
    handle: JoinHandle<()>,
}

impl EventSink for EventDispatcher {
    fn emit(&self, event: JobEvent) {
        self.sender.emit(event);
    }
}

impl EventDispatcher {
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Wait until every queued event has been attempted.
    ///
    /// Returns once all senders handed out by [`Self::sender`] are gone too.
    pub async fn close(self) {
        let EventDispatcher { sender, handle } = self;
        drop(sender);
        if let Err(e) = handle.await {
            debug!(error = %e, "webhook dispatcher task ended abnormally");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, routing::post};
    use serde_json::Value as JsonValue;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    async fn spawn_receiver() -> (Url, Arc<Mutex<Vec<JsonValue>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(store): State<Arc<Mutex<Vec<JsonValue>>>>, Json(body): Json<JsonValue>| async move {
                        store.lock().unwrap().push(body);
                    },
                ),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let url = Url::parse(&format!("http://{}/hook", addr)).unwrap();
        (url, received)
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_in_order() {
        let (url, received) = spawn_receiver().await;
        let notifier = WebhookNotifier::new(Duration::from_secs(5)).unwrap();
        let dispatcher = notifier.dispatcher(url);
        let job_id = Uuid::new_v4();

        for id in 0..5 {
            dispatcher.emit(JobEvent::ItemError {
                job_id,
                id,
                error: format!("failure {}", id),
            });
        }
        dispatcher.close().await;

        let received = received.lock().unwrap();
        let ids: Vec<i64> = received.iter().map(|v| v["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(received.iter().all(|v| v["event"] == "item_error"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_events() {
        let (url, received) = spawn_receiver().await;
        let notifier = WebhookNotifier::new(Duration::from_secs(5))
            .unwrap()
            .with_queue_capacity(2);
        let dispatcher = notifier.dispatcher(url);
        let job_id = Uuid::new_v4();

        // the delivery task cannot run before this test yields
        for id in 0..10 {
            dispatcher.emit(JobEvent::ItemError {
                job_id,
                id,
                error: "timeout".to_string(),
            });
        }
        dispatcher.close().await;

        let received = received.lock().unwrap();
        let ids: Vec<i64> = received.iter().map(|v| v["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_swallowed() {
        let notifier = WebhookNotifier::new(Duration::from_secs(1)).unwrap();
        let url = Url::parse("http://127.0.0.1:9/hook").unwrap();
        let event = JobEvent::AuditStarted {
            job_id: Uuid::new_v4(),
            count: 1,
        };

        assert!(notifier.notify(&url, &event).await.is_err());

        let dispatcher = notifier.dispatcher(url);
        dispatcher.emit(event);
        // must return even though delivery failed
        dispatcher.close().await;
    }
}

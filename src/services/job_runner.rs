use std::{future::Future, time::Instant};
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    models::{JobEvent, JobStats},
    services::{job_registry::JobRegistry, notifier::EventDispatcher, notifier::EventSink},
};

/// Owns a job's counters and emits its terminal event when dropped.
///
/// The finished event goes out on every exit path, unwinding included.
pub struct FinishGuard<'a, S: Copy> {
    job_id: Uuid,
    sink: &'a dyn EventSink,
    started: Instant,
    finish: fn(Uuid, S, u64) -> JobEvent,
    pub stats: S,
}

impl<'a, S: Copy> FinishGuard<'a, S> {
    pub fn new(
        job_id: Uuid,
        sink: &'a dyn EventSink,
        stats: S,
        finish: fn(Uuid, S, u64) -> JobEvent,
    ) -> Self {
        Self {
            job_id,
            sink,
            started: Instant::now(),
            finish,
            stats,
        }
    }

    /// Emit the terminal event now and hand back the final counters.
    pub fn finish(self) -> S {
        self.stats
    }
}

impl<S: Copy> Drop for FinishGuard<'_, S> {
    fn drop(&mut self) {
        let duration_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let event = (self.finish)(self.job_id, self.stats, duration_ms);
        info!(job_id = %self.job_id, event = event.name(), duration_ms, "job finished");
        self.sink.emit(event);
    }
}

/// Run a job body on its own task, then drain its events and record the result.
///
/// The registry entry is only written after the webhook queue is flushed, so a
/// job reported as done has had every event attempted.
pub fn spawn_job<F>(
    jobs: JobRegistry,
    job_id: Uuid,
    dispatcher: EventDispatcher,
    body: F,
) -> JoinHandle<()>
where
    F: Future<Output = JobStats> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = tokio::spawn(body).await;
        dispatcher.close().await;
        match outcome {
            Ok(stats) => {
                jobs.complete(job_id, stats).await;
                info!(%job_id, "job recorded as done");
            }
            Err(e) => {
                error!(%job_id, error = %e, "job aborted");
                jobs.abandon(job_id).await;
            }
        }
    })
}

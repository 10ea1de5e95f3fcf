use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Job, JobKind, JobStats};

/// Process-wide job table
///
/// Entries are inserted at submission and overwritten once at completion.
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a job id and record it as not done.
    pub async fn create(&self, kind: JobKind) -> Uuid {
        let job_id = Uuid::new_v4();
        self.jobs
            .write()
            .await
            .insert(job_id, Job::pending(job_id, kind));
        debug!(%job_id, ?kind, "job registered");
        job_id
    }

    pub async fn complete(&self, job_id: Uuid, stats: JobStats) {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job_id) {
            Some(job) => {
                job.done = true;
                job.stats = Some(stats);
            }
            None => {
                warn!(%job_id, "completing a job that was never registered");
                let kind = match stats {
                    JobStats::Scan(_) => JobKind::RangeScan,
                    JobStats::Audit(_) => JobKind::AuditBatch,
                    JobStats::Status(_) => JobKind::StatusRefresh,
                };
                jobs.insert(
                    job_id,
                    Job {
                        job_id,
                        kind,
                        done: true,
                        stats: Some(stats),
                    },
                );
            }
        }
    }

    /// Mark a job done without stats; used when its body never returned.
    pub async fn abandon(&self, job_id: Uuid) {
        if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
            job.done = true;
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Option<Job> {
        self.jobs.read().await.get(&job_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuditStats, ScanStats};

    #[tokio::test]
    async fn test_create_then_complete() {
        let registry = JobRegistry::new();
        let job_id = registry.create(JobKind::RangeScan).await;

        let pending = registry.get(job_id).await.unwrap();
        assert!(!pending.done);
        assert!(pending.stats.is_none());

        let stats = ScanStats {
            processed: 2,
            found: 1,
            skipped: 1,
            errors: 0,
        };
        registry.complete(job_id, JobStats::Scan(stats)).await;

        let done = registry.get(job_id).await.unwrap();
        assert!(done.done);
        assert_eq!(done.stats, Some(JobStats::Scan(stats)));
        assert_eq!(done.kind, JobKind::RangeScan);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = JobRegistry::new();
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let registry = JobRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let job_id = registry.create(JobKind::AuditBatch).await;
                registry
                    .complete(job_id, JobStats::Audit(AuditStats::default()))
                    .await;
                job_id
            }));
        }
        for handle in handles {
            let job_id = handle.await.unwrap();
            assert!(registry.get(job_id).await.unwrap().done);
        }
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{AuditStats, ScanStats, StatusStats};

/// Kind of background work a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    RangeScan,
    AuditBatch,
    StatusRefresh,
}

/// Final counters, shaped by job kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum JobStats {
    Scan(ScanStats),
    Audit(AuditStats),
    Status(StatusStats),
}

/// Registry entry. Written at submission and once more at completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    pub job_id: Uuid,
    pub kind: JobKind,
    pub done: bool,
    pub stats: Option<JobStats>,
}

impl Job {
    pub fn pending(job_id: Uuid, kind: JobKind) -> Self {
        Self {
            job_id,
            kind,
            done: false,
            stats: None,
        }
    }
}

/// Submission acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobAccepted {
    pub job_id: Uuid,
    pub status: String,
}

impl JobAccepted {
    pub fn started(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: "started".to_string(),
        }
    }
}

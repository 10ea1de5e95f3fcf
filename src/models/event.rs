use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::models::{
    AuditEntry, AuditStats, FullFetchResult, Operator, ScanStats, ScanStrategy, StatusStats,
};

/// Requested range as echoed in `scan_started`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRange {
    pub start: i64,
    pub end: i64,
    pub strategy: ScanStrategy,
}

/// Webhook payloads, serialized as `{"event": "<name>", ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    ScanStarted {
        job_id: Uuid,
        range: ScanRange,
    },
    Item {
        job_id: Uuid,
        id: i64,
        valid: bool,
        #[serde(flatten)]
        fetched: Option<FullFetchResult>,
    },
    ItemError {
        job_id: Uuid,
        id: i64,
        error: String,
    },
    ScanFinished {
        job_id: Uuid,
        stats: ScanStats,
    },
    AuditStarted {
        job_id: Uuid,
        count: usize,
    },
    AuditItem {
        job_id: Uuid,
        id: i64,
        valid: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        referer_used: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audit: Option<Vec<AuditEntry>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    AuditFinished {
        job_id: Uuid,
        stats: AuditStats,
        duration_ms: u64,
    },
    StatusRefreshStarted {
        job_id: Uuid,
        count: usize,
    },
    StatusChange {
        job_id: Uuid,
        id: i64,
        operator: Operator,
        old_status_text: Option<String>,
        old_status_code: Option<JsonValue>,
        new_status_text: Option<String>,
        new_status_code: Option<String>,
        referer_used: String,
        audit: Vec<AuditEntry>,
    },
    StatusItemError {
        job_id: Uuid,
        id: i64,
        operator: Operator,
        error: String,
    },
    StatusRefreshFinished {
        job_id: Uuid,
        stats: StatusStats,
        duration_ms: u64,
    },
}

impl JobEvent {
    /// Wire name carried in the `event` field
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::ScanStarted { .. } => "scan_started",
            JobEvent::Item { .. } => "item",
            JobEvent::ItemError { .. } => "item_error",
            JobEvent::ScanFinished { .. } => "scan_finished",
            JobEvent::AuditStarted { .. } => "audit_started",
            JobEvent::AuditItem { .. } => "audit_item",
            JobEvent::AuditFinished { .. } => "audit_finished",
            JobEvent::StatusRefreshStarted { .. } => "status_refresh_started",
            JobEvent::StatusChange { .. } => "status_change",
            JobEvent::StatusItemError { .. } => "status_item_error",
            JobEvent::StatusRefreshFinished { .. } => "status_refresh_finished",
        }
    }
}

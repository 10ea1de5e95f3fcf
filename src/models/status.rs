use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{
        Operator,
        audit::deserialize_cutoff,
        scan::{
            MIN_TIMEOUT_SECS, check_id_bounds, default_delay_ms, default_max_retries,
            default_timeout_secs,
        },
    },
};

/// Record field holding the numeric status code
pub const STATUS_CODE_FIELD: &str = "ID_ESTADO";
/// Record field holding the status label
pub const STATUS_TEXT_FIELD: &str = "ESTADO";

/// Baseline for one tracked solicitud, as last seen by the caller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusItem {
    pub id: i64,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub status_code: Option<JsonValue>,
}

/// Status refresh submission
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusRefreshRequest {
    pub items: Vec<StatusItem>,
    #[schema(value_type = String, example = "https://hooks.example.com/status")]
    pub webhook_url: Url,
    /// Audit entries older than this are dropped from `status_change` events
    #[serde(default, deserialize_with = "deserialize_cutoff")]
    #[schema(value_type = Option<String>)]
    pub since: Option<NaiveDateTime>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl StatusRefreshRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.items.is_empty() {
            return Err(AppError::validation("items must not be empty"));
        }
        for item in &self.items {
            check_id_bounds(item.id, "item ids")?;
        }
        if self.timeout_secs < MIN_TIMEOUT_SECS {
            return Err(AppError::validation(format!(
                "timeout_secs must be >= {}",
                MIN_TIMEOUT_SECS
            )));
        }
        Ok(())
    }
}

/// Live status read from the record loader
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub status_code: Option<String>,
    pub status_text: Option<String>,
}

impl StatusSnapshot {
    /// Pull the status fields out of the unwrapped `CargarDatosSolicitud` payload.
    ///
    /// The loader usually answers with a collection; the first record wins.
    /// A bare object is read directly.
    pub fn from_record(payload: &JsonValue) -> Self {
        let record = match payload {
            JsonValue::Array(items) => items.first(),
            JsonValue::Object(_) => Some(payload),
            _ => None,
        };
        let field = |name: &str| record.and_then(|r| r.get(name)).and_then(scalar_text);
        Self {
            status_code: field(STATUS_CODE_FIELD),
            status_text: field(STATUS_TEXT_FIELD),
        }
    }
}

/// Compare a live snapshot to the caller's baseline.
///
/// Text wins when both sides have it, then codes; if neither pair is
/// comparable the item is reported as changed.
pub fn status_changed(prior: &StatusItem, live: &StatusSnapshot) -> bool {
    let prior_text = prior.status_text.as_deref().map(str::trim);
    let live_text = live.status_text.as_deref().map(str::trim);
    if let (Some(old), Some(new)) = (prior_text, live_text) {
        return old != new;
    }

    let prior_code = prior.status_code.as_ref().and_then(scalar_text);
    if let (Some(old), Some(new)) = (prior_code.as_deref(), live.status_code.as_deref()) {
        return old != new;
    }

    true
}

/// Render a JSON scalar as trimmed text; null and blanks count as absent.
fn scalar_text(value: &JsonValue) -> Option<String> {
    let text = match value {
        JsonValue::String(s) => s.trim().to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Counters for one status refresh job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusStats {
    pub processed: u64,
    pub changed: u64,
    pub unchanged: u64,
    pub invalid: u64,
    pub errors: u64,
}

impl StatusStats {
    pub fn record_changed(&mut self) {
        self.processed += 1;
        self.changed += 1;
    }

    pub fn record_unchanged(&mut self) {
        self.processed += 1;
        self.unchanged += 1;
    }

    pub fn record_invalid(&mut self) {
        self.processed += 1;
        self.invalid += 1;
    }

    pub fn record_error(&mut self) {
        self.processed += 1;
        self.errors += 1;
    }
}

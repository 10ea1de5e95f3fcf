use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;
use utoipa::ToSchema;

use crate::{error::AppError, models::Operator};

/// Smallest accepted per-call timeout
pub const MIN_TIMEOUT_SECS: u64 = 5;

/// Largest accepted solicitud id; leaves headroom for checkpoint jumps past the end
pub const MAX_SOLICITUD_ID: i64 = i64::MAX - 200;

/// Reject ids outside `0..=MAX_SOLICITUD_ID`.
pub(crate) fn check_id_bounds(id: i64, field: &str) -> Result<(), AppError> {
    if !(0..=MAX_SOLICITUD_ID).contains(&id) {
        return Err(AppError::validation(format!(
            "{} must be between 0 and {}",
            field, MAX_SOLICITUD_ID
        )));
    }
    Ok(())
}

/// How a range is traversed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Probe checkpoints (`..10/30/50/70/90`) and expand forward on hits
    #[default]
    Checkpoint,
    /// Probe every id in the requested direction
    Linear,
}

impl ScanStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStrategy::Checkpoint => "checkpoint",
            ScanStrategy::Linear => "linear",
        }
    }
}

/// Range scan submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanRequest {
    /// Inclusive start id, e.g. 40000
    pub start_id: i64,
    /// Inclusive end id, e.g. 41000
    pub end_id: i64,
    /// Where incremental results are POSTed
    #[schema(value_type = String, example = "https://hooks.example.com/scan")]
    pub webhook_url: Url,
    #[serde(default)]
    pub strategy: ScanStrategy,
    /// Only valid ids are fully loaded; invalid ones are just validated
    #[serde(default = "default_true")]
    pub fetch_data_for_valid: bool,
    /// Pause after every probed id
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Extra attempts per HTTP call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per HTTP call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub operator: Operator,
}

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_delay_ms() -> u64 {
    200
}

pub(crate) fn default_max_retries() -> u32 {
    2
}

pub(crate) fn default_timeout_secs() -> u64 {
    30
}

impl ScanRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        check_id_bounds(self.start_id, "start_id")?;
        check_id_bounds(self.end_id, "end_id")?;
        if self.timeout_secs < MIN_TIMEOUT_SECS {
            return Err(AppError::validation(format!(
                "timeout_secs must be >= {}",
                MIN_TIMEOUT_SECS
            )));
        }
        // next_checkpoint only moves forward, so checkpoint traversal is ascending only
        if self.strategy == ScanStrategy::Checkpoint && self.start_id > self.end_id {
            return Err(AppError::validation(
                "checkpoint strategy requires start_id <= end_id; use linear for descending ranges",
            ));
        }
        Ok(())
    }

    pub fn direction(&self) -> Direction {
        Direction::between(self.start_id, self.end_id)
    }
}

/// Traversal direction of an inclusive range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn between(start: i64, end: i64) -> Self {
        if start <= end {
            Direction::Ascending
        } else {
            Direction::Descending
        }
    }

    pub fn step(&self) -> i64 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }

    /// True once `i` has crossed `end`
    pub fn is_past(&self, i: i64, end: i64) -> bool {
        match self {
            Direction::Ascending => i > end,
            Direction::Descending => i < end,
        }
    }
}

/// Outcome of one `ValidaSolicitud` call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub id: i64,
    pub valid: bool,
    /// Unwrapped response, kept for diagnostics
    pub raw: JsonValue,
}

/// Result of the encrypt → prime → load sequence for a valid id
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FullFetchResult {
    Loaded {
        enc_query: String,
        referer_used: String,
        data: JsonValue,
    },
    /// `Encryptar` answered with something other than a `?enc=` query
    Warning {
        warning: String,
        encryptar_raw: JsonValue,
    },
}

/// Counters for one scan job
///
/// Every probed id lands in exactly one of `found`, `skipped`, `errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ScanStats {
    pub processed: u64,
    pub found: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl ScanStats {
    pub fn record_found(&mut self) {
        self.processed += 1;
        self.found += 1;
    }

    pub fn record_skipped(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub fn record_error(&mut self) {
        self.processed += 1;
        self.errors += 1;
    }

    pub fn is_balanced(&self) -> bool {
        self.processed == self.found + self.skipped + self.errors
    }
}

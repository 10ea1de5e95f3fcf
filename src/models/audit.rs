use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use url::Url;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{
        Operator,
        scan::{
            MIN_TIMEOUT_SECS, check_id_bounds, default_delay_ms, default_max_retries,
            default_timeout_secs,
        },
    },
};

/// Fields that may carry the timestamp of an audit row, in lookup order
pub const AUDIT_TIMESTAMP_FIELDS: [&str; 3] = ["FECHA", "FECHA_AUDITORIA", "FECHA_REGISTRO"];

/// One row of the audit trail; the portal decides its shape.
pub type AuditEntry = JsonValue;

/// Batch audit submission
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AuditBatchRequest {
    pub ids: Vec<i64>,
    #[serde(default)]
    pub operator: Operator,
    #[schema(value_type = String, example = "https://hooks.example.com/audit")]
    pub webhook_url: Url,
    /// Keep only entries at or after this moment
    #[serde(default, deserialize_with = "deserialize_cutoff")]
    #[schema(value_type = Option<String>, example = "2025-01-31T00:00:00")]
    pub since: Option<NaiveDateTime>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AuditBatchRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.ids.is_empty() {
            return Err(AppError::validation("ids must not be empty"));
        }
        for &id in &self.ids {
            check_id_bounds(id, "ids")?;
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

/// Counters for one audit batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuditStats {
    pub processed: u64,
    pub valid: u64,
    pub invalid: u64,
    pub errors: u64,
}

impl AuditStats {
    pub fn record_valid(&mut self) {
        self.processed += 1;
        self.valid += 1;
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

/// Audit trail of one valid id together with the session context it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditFetchResult {
    pub id: i64,
    pub referer_used: String,
    pub audit: Vec<AuditEntry>,
}

/// Normalize the unwrapped `CargarDatosAuditoria` payload into a list.
pub fn normalize_audit_payload(payload: JsonValue) -> Vec<AuditEntry> {
    match payload {
        JsonValue::Array(items) => items,
        JsonValue::String(text) => match serde_json::from_str::<JsonValue>(&text) {
            Ok(JsonValue::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Timestamp of an audit row, if one of the known fields holds a parseable date.
pub fn audit_timestamp(entry: &AuditEntry) -> Option<NaiveDateTime> {
    let obj = entry.as_object()?;
    AUDIT_TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(|value| value.as_str().and_then(parse_portal_timestamp))
}

/// Keep entries at or after `cutoff`. Rows without a usable timestamp are kept.
pub fn filter_since(entries: Vec<AuditEntry>, cutoff: Option<NaiveDateTime>) -> Vec<AuditEntry> {
    let Some(cutoff) = cutoff else {
        return entries;
    };
    entries
        .into_iter()
        .filter(|entry| audit_timestamp(entry).is_none_or(|ts| ts >= cutoff))
        .collect()
}

/// Parse the date encodings the portal emits.
///
/// Accepts ASP.NET `/Date(ms)/`, RFC 3339, ISO-like `YYYY-MM-DD HH:MM:SS`
/// (space or `T`, optional fraction) and `DD/MM/YYYY [HH:MM[:SS]]`.
pub fn parse_portal_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(inner) = text
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
    {
        // "/Date(1700000000000-0500)/" carries an offset we ignore
        let digits_end = inner
            .char_indices()
            .skip(1)
            .find(|(_, c)| *c == '+' || *c == '-')
            .map(|(idx, _)| idx)
            .unwrap_or(inner.len());
        let millis: i64 = inner[..digits_end].parse().ok()?;
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    const DATETIME_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%d/%m/%Y %I:%M:%S %p",
        "%d/%m/%Y %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }

    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

pub(crate) fn deserialize_cutoff<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(text) if text.trim().is_empty() => Ok(None),
        Some(text) => parse_portal_timestamp(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp: {}", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_portal_timestamp(raw).unwrap()
    }

    #[test]
    fn test_batch_ids_bounded() {
        let mut req: AuditBatchRequest = serde_json::from_value(json!({
            "ids": [40010, i64::MAX],
            "webhook_url": "https://hooks.example.com/audit",
        }))
        .unwrap();
        assert!(matches!(req.validate(), Err(AppError::Validation(_))));

        req.ids = vec![40010, -1];
        assert!(req.validate().is_err());

        req.ids = vec![40010];
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_parse_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(ts("2025-03-04T10:30:00"), expected);
        assert_eq!(ts("2025-03-04 10:30:00"), expected);
        assert_eq!(ts("04/03/2025 10:30:00"), expected);
        assert_eq!(ts("04/03/2025 10:30:00 AM"), expected);
        assert_eq!(ts("2025-03-04T10:30:00Z"), expected);
        assert_eq!(ts("2025-03-04T05:30:00-05:00"), expected);
        assert_eq!(ts("/Date(1741084200000)/"), expected);
        assert_eq!(ts("/Date(1741084200000-0500)/"), expected);
        assert_eq!(
            ts("04/03/2025"),
            NaiveDate::from_ymd_opt(2025, 3, 4)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(parse_portal_timestamp("ayer").is_none());
        assert!(parse_portal_timestamp("").is_none());
    }

    #[test]
    fn test_normalize_audit_payload() {
        assert!(normalize_audit_payload(JsonValue::Null).is_empty());
        assert_eq!(normalize_audit_payload(json!([{"a": 1}])).len(), 1);
        assert_eq!(normalize_audit_payload(json!("[{\"a\":1},{\"a\":2}]")).len(), 2);
        assert!(normalize_audit_payload(json!("not json")).is_empty());
        assert!(normalize_audit_payload(json!({"a": 1})).is_empty());
    }

    #[test]
    fn test_filter_since_keeps_recent_and_undated() {
        let entries = vec![
            json!({"FECHA": "2025-01-01 08:00:00", "ACCION": "Radicada"}),
            json!({"FECHA": "2025-02-01 08:00:00", "ACCION": "En revision"}),
            json!({"FECHA_AUDITORIA": "01/03/2025 09:00:00", "ACCION": "Aprobada"}),
            json!({"ACCION": "sin fecha"}),
        ];
        let cutoff = ts("2025-02-01 08:00:00");
        let kept = filter_since(entries.clone(), Some(cutoff));
        let actions: Vec<_> = kept.iter().map(|e| e["ACCION"].as_str().unwrap()).collect();
        assert_eq!(actions, vec!["En revision", "Aprobada", "sin fecha"]);

        assert_eq!(filter_since(entries, None).len(), 4);
    }

    #[test]
    fn test_audit_request_validation() {
        let req: AuditBatchRequest = serde_json::from_value(json!({
            "ids": [40010, 40011],
            "webhook_url": "https://hooks.example.com/audit",
            "since": "2025-01-31",
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.since, Some(ts("2025-01-31T00:00:00")));

        let empty: AuditBatchRequest = serde_json::from_value(json!({
            "ids": [],
            "webhook_url": "https://hooks.example.com/audit",
        }))
        .unwrap();
        assert!(empty.validate().is_err());

        let bad_cutoff = serde_json::from_value::<AuditBatchRequest>(json!({
            "ids": [1],
            "webhook_url": "https://hooks.example.com/audit",
            "since": "last tuesday",
        }));
        assert!(bad_cutoff.is_err());
    }
}

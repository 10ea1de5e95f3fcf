use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::{AuditBatchRequest, AuditStats, JobEvent, filter_since},
    services::{job_runner::FinishGuard, notifier::EventSink, portal_client::RemotePortal},
};

/// Fetch the audit trail of every requested id, in order, over one portal session.
pub async fn run_audit_batch(
    job_id: Uuid,
    request: &AuditBatchRequest,
    portal: &dyn RemotePortal,
    sink: &dyn EventSink,
) -> AuditStats {
    info!(
        %job_id,
        operator = %portal.operator(),
        count = request.ids.len(),
        "audit batch started"
    );
    sink.emit(JobEvent::AuditStarted {
        job_id,
        count: request.ids.len(),
    });

    let mut guard = FinishGuard::new(job_id, sink, AuditStats::default(), |job_id, stats, duration_ms| {
        JobEvent::AuditFinished {
            job_id,
            stats,
            duration_ms,
        }
    });
    let delay = Duration::from_millis(request.delay_ms);

    for &id in &request.ids {
        match portal.audit_fetch(id).await {
            Ok(Some(result)) => {
                let audit = filter_since(result.audit, request.since);
                debug!(%job_id, id, entries = audit.len(), "audit loaded");
                guard.stats.record_valid();
                sink.emit(JobEvent::AuditItem {
                    job_id,
                    id,
                    valid: true,
                    referer_used: Some(result.referer_used),
                    audit: Some(audit),
                    reason: None,
                });
            }
            Ok(None) => {
                debug!(%job_id, id, "invalid id");
                guard.stats.record_invalid();
                sink.emit(JobEvent::AuditItem {
                    job_id,
                    id,
                    valid: false,
                    referer_used: None,
                    audit: None,
                    reason: Some("invalid_id".to_string()),
                });
            }
            Err(e) => {
                warn!(%job_id, id, error = %e, "audit fetch failed");
                guard.stats.record_error();
                sink.emit(JobEvent::ItemError {
                    job_id,
                    id,
                    error: e.to_string(),
                });
            }
        }

        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    guard.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Operator, parse_portal_timestamp},
        services::{
            notifier::testing::RecordingSink,
            portal_client::testing::{FakePortal, Probe},
        },
    };
    use serde_json::json;
    use url::Url;

    fn request(ids: Vec<i64>) -> AuditBatchRequest {
        AuditBatchRequest {
            ids,
            operator: Operator::Aire,
            webhook_url: Url::parse("https://hooks.example.com/audit").unwrap(),
            since: None,
            delay_ms: 0,
            max_retries: 0,
            timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn test_mixed_batch() {
        let mut portal = FakePortal::with_valid([40010]);
        portal.probes.insert(40012, Probe::Down);
        portal
            .audits
            .insert(40010, json!([{"FECHA": "2025-01-01 08:00:00", "ACCION": "Radicada"}]));
        let sink = RecordingSink::default();

        let stats = run_audit_batch(
            Uuid::new_v4(),
            &request(vec![40010, 40011, 40012]),
            &portal,
            &sink,
        )
        .await;

        assert_eq!(
            stats,
            AuditStats {
                processed: 3,
                valid: 1,
                invalid: 1,
                errors: 1
            }
        );
        assert_eq!(
            sink.names(),
            vec![
                "audit_started",
                "audit_item",
                "audit_item",
                "item_error",
                "audit_finished"
            ]
        );

        let events = sink.snapshot();
        match &events[2] {
            JobEvent::AuditItem {
                valid: false,
                reason,
                audit: None,
                ..
            } => assert_eq!(reason.as_deref(), Some("invalid_id")),
            other => panic!("unexpected {:?}", other),
        }
        let payload = serde_json::to_value(&events[1]).unwrap();
        assert_eq!(payload["valid"], true);
        assert_eq!(payload["audit"][0]["ACCION"], "Radicada");
        assert!(payload["referer_used"].as_str().unwrap().ends_with("?enc=40010"));
        assert!(payload.get("reason").is_none());
    }

    #[tokio::test]
    async fn test_cutoff_filters_old_entries() {
        let mut portal = FakePortal::with_valid([7]);
        portal.audits.insert(
            7,
            json!([
                {"FECHA": "2024-12-31 23:59:59", "ACCION": "old"},
                {"FECHA": "2025-01-01 00:00:00", "ACCION": "boundary"},
                {"ACCION": "undated"}
            ]),
        );
        let sink = RecordingSink::default();
        let mut req = request(vec![7]);
        req.since = parse_portal_timestamp("2025-01-01");

        run_audit_batch(Uuid::new_v4(), &req, &portal, &sink).await;

        let events = sink.snapshot();
        match &events[1] {
            JobEvent::AuditItem {
                audit: Some(audit), ..
            } => {
                let actions: Vec<&str> =
                    audit.iter().map(|e| e["ACCION"].as_str().unwrap()).collect();
                assert_eq!(actions, vec!["boundary", "undated"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_finished_carries_duration() {
        let portal = FakePortal::with_valid([]);
        let sink = RecordingSink::default();

        run_audit_batch(Uuid::new_v4(), &request(vec![1]), &portal, &sink).await;

        let last = serde_json::to_value(sink.snapshot().last().unwrap()).unwrap();
        assert_eq!(last["event"], "audit_finished");
        assert!(last["duration_ms"].is_u64());
        assert_eq!(last["stats"]["invalid"], 1);
    }
}

use std::{
    collections::{HashMap, hash_map::Entry},
    time::Duration,
};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        AuditEntry, JobEvent, Operator, StatusItem, StatusRefreshRequest, StatusSnapshot,
        StatusStats, filter_since, status_changed,
    },
    services::{
        job_runner::FinishGuard,
        notifier::EventSink,
        portal_client::{CallSettings, PortalFactory, RemotePortal},
    },
};

/// Result of refreshing one tracked id
#[derive(Debug)]
enum Refresh {
    Invalid,
    Unchanged,
    Changed {
        live: StatusSnapshot,
        referer_used: String,
        audit: Vec<AuditEntry>,
    },
}

/// Compare every tracked id against its live status and report the changes.
///
/// One portal session is opened per operator on first use and reused for the
/// rest of the batch; all of them are released when the batch ends.
pub async fn run_status_refresh(
    job_id: Uuid,
    request: &StatusRefreshRequest,
    portals: &dyn PortalFactory,
    sink: &dyn EventSink,
) -> StatusStats {
    info!(%job_id, count = request.items.len(), "status refresh started");
    sink.emit(JobEvent::StatusRefreshStarted {
        job_id,
        count: request.items.len(),
    });

    let mut guard = FinishGuard::new(
        job_id,
        sink,
        StatusStats::default(),
        |job_id, stats, duration_ms| JobEvent::StatusRefreshFinished {
            job_id,
            stats,
            duration_ms,
        },
    );
    let settings = CallSettings::new(request.timeout_secs, request.max_retries);
    let delay = Duration::from_millis(request.delay_ms);
    let mut sessions: HashMap<Operator, Box<dyn RemotePortal>> = HashMap::new();

    for item in &request.items {
        let portal = match sessions.entry(item.operator) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => match portals.open(item.operator, settings) {
                Ok(portal) => {
                    debug!(%job_id, operator = %item.operator, "portal session opened");
                    entry.insert(portal)
                }
                Err(e) => {
                    item_error(sink, job_id, item, e.to_string());
                    guard.stats.record_error();
                    continue;
                }
            },
        };

        match refresh_one(portal.as_ref(), item, request).await {
            Ok(Refresh::Invalid) => {
                debug!(%job_id, id = item.id, "tracked id no longer valid");
                guard.stats.record_invalid();
            }
            Ok(Refresh::Unchanged) => guard.stats.record_unchanged(),
            Ok(Refresh::Changed {
                live,
                referer_used,
                audit,
            }) => {
                info!(
                    %job_id,
                    id = item.id,
                    old = ?item.status_text,
                    new = ?live.status_text,
                    "status changed"
                );
                guard.stats.record_changed();
                sink.emit(JobEvent::StatusChange {
                    job_id,
                    id: item.id,
                    operator: item.operator,
                    old_status_text: item.status_text.clone(),
                    old_status_code: item.status_code.clone(),
                    new_status_text: live.status_text,
                    new_status_code: live.status_code,
                    referer_used,
                    audit,
                });
            }
            Err(e) => {
                item_error(sink, job_id, item, e.to_string());
                guard.stats.record_error();
            }
        }

        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    debug!(%job_id, sessions = sessions.len(), "releasing portal sessions");
    drop(sessions);
    guard.finish()
}

async fn refresh_one(
    portal: &dyn RemotePortal,
    item: &StatusItem,
    request: &StatusRefreshRequest,
) -> AppResult<Refresh> {
    let Some((live, session)) = portal.status_fetch(item.id).await? else {
        return Ok(Refresh::Invalid);
    };
    if !status_changed(item, &live) {
        return Ok(Refresh::Unchanged);
    }

    let audit = portal.audit_for_session(&session).await?;
    Ok(Refresh::Changed {
        live,
        referer_used: session.url().to_string(),
        audit: filter_since(audit, request.since),
    })
}

fn item_error(sink: &dyn EventSink, job_id: Uuid, item: &StatusItem, error: String) {
    warn!(%job_id, id = item.id, operator = %item.operator, error = %error, "status refresh item failed");
    sink.emit(JobEvent::StatusItemError {
        job_id,
        id: item.id,
        operator: item.operator,
        error,
    });
}

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        FullFetchResult, JobEvent, MAX_SOLICITUD_ID, ScanRange, ScanRequest, ScanStats, ScanStrategy,
    },
    services::{
        job_runner::FinishGuard, navigator::next_checkpoint, notifier::EventSink,
        portal_client::RemotePortal,
    },
};

/// Position of the checkpoint traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckpointState {
    /// Probe `i`; jump ahead unless it is valid
    AtCursor(i64),
    /// `j` is known valid; deliver it and probe `j + 1`
    Expanding(i64),
    Done,
}

/// Outcome of validating one id, already counted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Valid,
    Invalid,
    Failed,
}

/// Cursor for the checkpoint after `i`; `Done` once the id space runs out.
fn resume_after(i: i64) -> CheckpointState {
    match i.checked_add(1) {
        Some(next) if next <= MAX_SOLICITUD_ID => CheckpointState::AtCursor(next_checkpoint(next)),
        _ => CheckpointState::Done,
    }
}

/// Drives one range scan job over a single portal session
pub struct RangeScan<'a> {
    job_id: Uuid,
    request: &'a ScanRequest,
    portal: &'a dyn RemotePortal,
    sink: &'a dyn EventSink,
    delay: Duration,
}

impl<'a> RangeScan<'a> {
    pub fn new(
        job_id: Uuid,
        request: &'a ScanRequest,
        portal: &'a dyn RemotePortal,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            job_id,
            request,
            portal,
            sink,
            delay: Duration::from_millis(request.delay_ms),
        }
    }

    /// Scan the requested range; `scan_finished` is emitted on every exit path.
    pub async fn run(self) -> ScanStats {
        info!(
            job_id = %self.job_id,
            operator = %self.portal.operator(),
            start = self.request.start_id,
            end = self.request.end_id,
            strategy = self.request.strategy.as_str(),
            "range scan started"
        );
        self.sink.emit(JobEvent::ScanStarted {
            job_id: self.job_id,
            range: ScanRange {
                start: self.request.start_id,
                end: self.request.end_id,
                strategy: self.request.strategy,
            },
        });

        let mut guard = FinishGuard::new(
            self.job_id,
            self.sink,
            ScanStats::default(),
            |job_id, stats, _| JobEvent::ScanFinished { job_id, stats },
        );

        match self.request.strategy {
            ScanStrategy::Checkpoint => self.checkpoint(&mut guard.stats).await,
            ScanStrategy::Linear => self.linear(&mut guard.stats).await,
        }

        if !guard.stats.is_balanced() {
            warn!(job_id = %self.job_id, stats = ?guard.stats, "scan counters out of balance");
        }
        guard.finish()
    }

    /// Checkpoint traversal; ascending ranges only.
    async fn checkpoint(&self, stats: &mut ScanStats) {
        let end = self.request.end_id;
        let mut state = CheckpointState::AtCursor(self.request.start_id);

        loop {
            state = match state {
                CheckpointState::AtCursor(i) if i > end => CheckpointState::Done,
                CheckpointState::AtCursor(i) => match self.probe(i, stats).await {
                    Probe::Valid => CheckpointState::Expanding(i),
                    Probe::Invalid | Probe::Failed => resume_after(i),
                },
                CheckpointState::Expanding(j) => {
                    self.deliver(j, stats).await;
                    match j.checked_add(1) {
                        Some(next) if next <= end => match self.probe(next, stats).await {
                            Probe::Valid => CheckpointState::Expanding(next),
                            // resume after the id that stopped the run
                            Probe::Invalid | Probe::Failed => resume_after(next),
                        },
                        _ => CheckpointState::Done,
                    }
                }
                CheckpointState::Done => break,
            };
        }
    }

    /// Probe every id from start to end in either direction.
    async fn linear(&self, stats: &mut ScanStats) {
        let direction = self.request.direction();
        let mut cursor = Some(self.request.start_id);

        while let Some(i) = cursor {
            if direction.is_past(i, self.request.end_id) {
                break;
            }
            if self.probe(i, stats).await == Probe::Valid {
                self.deliver(i, stats).await;
            }
            cursor = i.checked_add(direction.step());
        }
    }

    /// Validate one id, count invalid/failed outcomes and pause.
    ///
    /// A valid id is left uncounted until it has been delivered.
    async fn probe(&self, id: i64, stats: &mut ScanStats) -> Probe {
        let probe = match self.portal.validate(id).await {
            Ok(result) if result.valid => Probe::Valid,
            Ok(_) => {
                debug!(job_id = %self.job_id, id, "invalid id");
                stats.record_skipped();
                Probe::Invalid
            }
            Err(e) => {
                stats.record_error();
                self.item_error(id, e.to_string());
                Probe::Failed
            }
        };
        self.pause().await;
        probe
    }

    /// Emit the `item` event for a valid id, loading its record when asked to.
    async fn deliver(&self, id: i64, stats: &mut ScanStats) {
        let fetched: Option<FullFetchResult> = if self.request.fetch_data_for_valid {
            match self.portal.full_fetch(id).await {
                Ok(result) => Some(result),
                Err(e) => {
                    stats.record_error();
                    self.item_error(id, e.to_string());
                    self.pause().await;
                    return;
                }
            }
        } else {
            None
        };

        if let Some(FullFetchResult::Warning { .. }) = &fetched {
            warn!(job_id = %self.job_id, id, "valid id returned an unexpected Encryptar payload");
        }
        debug!(job_id = %self.job_id, id, "valid id");
        stats.record_found();
        self.sink.emit(JobEvent::Item {
            job_id: self.job_id,
            id,
            valid: true,
            fetched,
        });
        if self.request.fetch_data_for_valid {
            self.pause().await;
        }
    }

    fn item_error(&self, id: i64, error: String) {
        warn!(job_id = %self.job_id, id, error = %error, "item failed");
        self.sink.emit(JobEvent::ItemError {
            job_id: self.job_id,
            id,
            error,
        });
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

/// Run a range scan to completion and return its final counters.
pub async fn run_scan(
    job_id: Uuid,
    request: &ScanRequest,
    portal: &dyn RemotePortal,
    sink: &dyn EventSink,
) -> ScanStats {
    RangeScan::new(job_id, request, portal, sink).run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::Operator,
        services::{
            notifier::testing::RecordingSink,
            portal_client::testing::{FakePortal, Probe as Answer},
        },
    };
    use serde_json::json;
    use url::Url;

    fn request(start: i64, end: i64, strategy: ScanStrategy, fetch: bool) -> ScanRequest {
        ScanRequest {
            start_id: start,
            end_id: end,
            webhook_url: Url::parse("https://hooks.example.com/scan").unwrap(),
            strategy,
            fetch_data_for_valid: fetch,
            delay_ms: 0,
            max_retries: 2,
            timeout_secs: 30,
            operator: Operator::Afinia,
        }
    }

    fn item_ids(sink: &RecordingSink) -> Vec<i64> {
        sink.snapshot()
            .into_iter()
            .filter_map(|e| match e {
                JobEvent::Item { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_range_visits_only_checkpoints() {
        let portal = FakePortal::with_valid([]);
        let sink = RecordingSink::default();
        let req = request(40010, 40100, ScanStrategy::Checkpoint, true);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(portal.validated_ids(), vec![40010, 40030, 40050, 40070, 40090]);
        assert_eq!(stats.skipped, 5);
        assert_eq!(stats.found, 0);
        assert_eq!(stats.processed, 5);
        assert_eq!(sink.names(), vec!["scan_started", "scan_finished"]);
    }

    #[tokio::test]
    async fn test_expansion_stops_at_first_invalid() {
        let portal = FakePortal::with_valid([40010]);
        let sink = RecordingSink::default();
        let req = request(40010, 40040, ScanStrategy::Checkpoint, false);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        // 40011 ends the run, next cursor is next_checkpoint(40012)
        assert_eq!(portal.validated_ids(), vec![40010, 40011, 40030]);
        assert_eq!(
            stats,
            ScanStats {
                processed: 3,
                found: 1,
                skipped: 2,
                errors: 0
            }
        );
        assert_eq!(item_ids(&sink), vec![40010]);
    }

    #[tokio::test]
    async fn test_expansion_walks_a_valid_block() {
        let mut portal = FakePortal::with_valid(40050..=40053);
        for id in 40050..=40053 {
            portal.records.insert(id, json!([{"ID_SOLICITUD": id}]));
        }
        let sink = RecordingSink::default();
        let req = request(40030, 40100, ScanStrategy::Checkpoint, true);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(
            portal.validated_ids(),
            vec![40030, 40050, 40051, 40052, 40053, 40054, 40070, 40090]
        );
        assert_eq!(item_ids(&sink), vec![40050, 40051, 40052, 40053]);
        assert_eq!(stats.found, 4);
        assert_eq!(stats.skipped, 4);
        assert!(stats.is_balanced());

        // expansion ids are strictly increasing
        let ids = item_ids(&sink);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_expansion_stops_at_range_end() {
        let portal = FakePortal::with_valid(40090..=40095);
        let sink = RecordingSink::default();
        let req = request(40090, 40092, ScanStrategy::Checkpoint, false);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(portal.validated_ids(), vec![40090, 40091, 40092]);
        assert_eq!(stats.found, 3);
        assert_eq!(stats.processed, 3);
    }

    #[tokio::test]
    async fn test_repeated_transport_failure_counts_once() {
        let mut portal = FakePortal::with_valid([]);
        portal.probes.insert(40030, Answer::Down);
        portal.retries = 2;
        let sink = RecordingSink::default();
        let req = request(40010, 40050, ScanStrategy::Checkpoint, true);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        // three attempts on 40030, one error
        let attempts = portal
            .validate_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == 40030)
            .count();
        assert_eq!(attempts, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(
            sink.names(),
            vec!["scan_started", "item_error", "scan_finished"]
        );
        assert_eq!(portal.validated_ids(), vec![40010, 40030, 40050]);
        assert!(stats.is_balanced());
    }

    #[tokio::test]
    async fn test_failure_inside_expansion_ends_the_run() {
        let mut portal = FakePortal::with_valid([40010, 40011, 40013]);
        portal.probes.insert(40012, Answer::Down);
        let sink = RecordingSink::default();
        let req = request(40010, 40030, ScanStrategy::Checkpoint, false);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(
            portal.validated_ids(),
            vec![40010, 40011, 40012, 40030]
        );
        assert_eq!(
            stats,
            ScanStats {
                processed: 4,
                found: 2,
                skipped: 1,
                errors: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failed_full_fetch_is_an_error_not_a_find() {
        let mut portal = FakePortal::with_valid([40010, 40011]);
        portal.broken_loaders.insert(40010);
        let sink = RecordingSink::default();
        let req = request(40010, 40012, ScanStrategy::Checkpoint, true);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.skipped, 1);
        assert!(stats.is_balanced());
        assert_eq!(
            sink.names(),
            vec!["scan_started", "item_error", "item", "scan_finished"]
        );
    }

    #[tokio::test]
    async fn test_warning_payload_is_still_delivered() {
        let mut portal = FakePortal::with_valid([40010]);
        portal.bad_tokens.insert(40010);
        let sink = RecordingSink::default();
        let req = request(40010, 40010, ScanStrategy::Checkpoint, true);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(stats.found, 1);
        let events = sink.snapshot();
        assert!(matches!(
            &events[1],
            JobEvent::Item {
                fetched: Some(FullFetchResult::Warning { .. }),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_linear_descending_probes_every_id() {
        let portal = FakePortal::with_valid([103]);
        let sink = RecordingSink::default();
        let req = request(105, 100, ScanStrategy::Linear, false);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(portal.validated_ids(), vec![105, 104, 103, 102, 101, 100]);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.skipped, 5);
        assert_eq!(item_ids(&sink), vec![103]);
    }

    #[tokio::test]
    async fn test_linear_keeps_going_after_errors() {
        let mut portal = FakePortal::with_valid([1, 3]);
        portal.probes.insert(2, Answer::Down);
        let sink = RecordingSink::default();
        let req = request(1, 4, ScanStrategy::Linear, true);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(
            stats,
            ScanStats {
                processed: 4,
                found: 2,
                skipped: 1,
                errors: 1
            }
        );
        assert_eq!(
            sink.names(),
            vec!["scan_started", "item", "item_error", "item", "scan_finished"]
        );
    }

    #[tokio::test]
    async fn test_single_id_range() {
        let portal = FakePortal::with_valid([]);
        let sink = RecordingSink::default();
        let req = request(40000, 40000, ScanStrategy::Checkpoint, true);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(portal.validated_ids(), vec![40000]);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_top_of_id_space_terminates() {
        let portal = FakePortal::with_valid([i64::MAX]);
        let sink = RecordingSink::default();

        for strategy in [ScanStrategy::Linear, ScanStrategy::Checkpoint] {
            let req = request(i64::MAX, i64::MAX, strategy, false);
            let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;
            assert_eq!(
                stats,
                ScanStats {
                    processed: 1,
                    found: 1,
                    skipped: 0,
                    errors: 0
                }
            );
        }
        assert_eq!(portal.validate_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_checkpoint_stops_when_no_checkpoint_remains() {
        let portal = FakePortal::with_valid([]);
        let sink = RecordingSink::default();
        let req = request(i64::MAX - 5, i64::MAX, ScanStrategy::Checkpoint, false);

        let stats = run_scan(Uuid::new_v4(), &req, &portal, &sink).await;

        assert_eq!(portal.validated_ids(), vec![i64::MAX - 5]);
        assert_eq!(stats.skipped, 1);
        assert_eq!(sink.names(), vec!["scan_started", "scan_finished"]);
    }
}

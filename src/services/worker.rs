//! Background discharge worker.
//!
//! Periodically looks for recent water-level samples (actual and predicted)
//! that have no stored discharge yet and processes them with the curve active
//! on each sample's date. Sensors are processed concurrently.
//!
//! Pending samples are read in pages keyed by `(timestamp, sensor_code)`, so
//! samples that stay pending (rejected discharges) never hold back newer
//! ones. Sensors without any effective curve are not picked up at all.
//!
//! State is in-memory (`Arc<RwLock<WorkerState>>`) and exposed on the status
//! endpoint; on restart the next run simply picks up whatever is still
//! pending inside the lookback window.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::db::models::{PendingSample, SeriesKind};
use crate::db::queries;
use crate::helpers::dec_to_f64;
use crate::services::discharge::{process_samples, Sample};

/// Pending samples fetched per page.
const WORKER_BATCH_LIMIT: i64 = 5000;

/// Pages processed per series kind and run.
const WORKER_MAX_PAGES: usize = 20;

/// Sleep after a failed pending-sample query (seconds).
const WORKER_ERROR_SLEEP_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Worker state (in-memory, shared via Arc<RwLock<>>)
// ---------------------------------------------------------------------------

/// Outcome of the last run for one sensor and series.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorRunStatus {
    pub sensor_code: String,
    pub kind: SeriesKind,
    pub pending: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// "ok", "partial" or "error"
    pub last_result: String,
}

/// Global worker state, exposed via the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkerState {
    pub active: bool,
    pub interval_secs: u64,
    pub lookback_hours: i64,
    pub next_wakeup_at: Option<DateTime<Utc>>,
    pub last_run_completed_at: Option<DateTime<Utc>>,
    pub last_run_duration_ms: Option<u64>,
    pub total_runs: u64,
    pub sensors: Vec<SensorRunStatus>,
}

impl WorkerState {
    pub fn new(active: bool, interval_secs: u64, lookback_hours: i64) -> Self {
        Self {
            active,
            interval_secs,
            lookback_hours,
            next_wakeup_at: None,
            last_run_completed_at: None,
            last_run_duration_ms: None,
            total_runs: 0,
            sensors: Vec::new(),
        }
    }
}

/// Shared worker state handle.
pub type SharedWorkerState = Arc<RwLock<WorkerState>>;

/// Key of the next page, or `None` when `page` was the last one.
pub fn next_cursor(page: &[PendingSample], limit: i64) -> Option<(DateTime<Utc>, String)> {
    if (page.len() as i64) < limit {
        return None;
    }
    page.last().map(|p| (p.timestamp, p.sensor_code.clone()))
}

/// Fold one page's outcome for a sensor into the run totals.
pub fn merge_status(totals: &mut BTreeMap<String, SensorRunStatus>, status: SensorRunStatus) {
    match totals.get_mut(&status.sensor_code) {
        None => {
            totals.insert(status.sensor_code.clone(), status);
        }
        Some(total) => {
            total.pending += status.pending;
            total.processed += status.processed;
            total.skipped += status.skipped;
            total.errors += status.errors;
            if total.last_result == "error" || status.last_result == "error" {
                total.last_result = "error".to_string();
            } else if total.errors > 0 {
                total.last_result = "partial".to_string();
            }
        }
    }
}

/// Group pending samples by sensor, oldest first within each sensor.
pub fn group_by_sensor(pending: Vec<PendingSample>) -> BTreeMap<String, Vec<Sample>> {
    let mut groups: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    for p in pending {
        groups.entry(p.sensor_code).or_default().push(Sample {
            timestamp: p.timestamp,
            water_level: dec_to_f64(p.water_level),
        });
    }
    for samples in groups.values_mut() {
        samples.sort_by_key(|s| s.timestamp);
    }
    groups
}

// ---------------------------------------------------------------------------
// Main worker loop
// ---------------------------------------------------------------------------

/// Run the discharge worker. This function never returns (runs until process exit).
///
/// Should be spawned via `tokio::spawn(run_worker(...))`.
pub async fn run_worker(pool: PgPool, state: SharedWorkerState) {
    let (interval_secs, lookback_hours) = {
        let s = state.read().await;
        (s.interval_secs, s.lookback_hours)
    };
    tracing::info!(
        "Discharge worker started (interval {}s, lookback {}h)",
        interval_secs,
        lookback_hours
    );

    loop {
        let run_start = Utc::now();
        let since = run_start - Duration::hours(lookback_hours);

        let mut statuses = Vec::new();
        let mut failed = false;
        for kind in [SeriesKind::Actual, SeriesKind::Predicted] {
            match run_kind(&pool, kind, since).await {
                Ok(mut s) => statuses.append(&mut s),
                Err(e) => {
                    tracing::error!("Worker: failed to query pending {} samples: {}", kind, e);
                    failed = true;
                }
            }
        }

        let sleep_duration = if failed {
            WORKER_ERROR_SLEEP_SECS.min(interval_secs)
        } else {
            interval_secs
        };
        finalize_run(&state, statuses, run_start, sleep_duration).await;
        sleep_secs(sleep_duration).await;
    }
}

/// Process every pending sample of one series kind, page by page.
async fn run_kind(
    pool: &PgPool,
    kind: SeriesKind,
    since: DateTime<Utc>,
) -> Result<Vec<SensorRunStatus>, sqlx::Error> {
    let mut totals: BTreeMap<String, SensorRunStatus> = BTreeMap::new();
    let mut cursor: Option<(DateTime<Utc>, String)> = None;

    for page_no in 0..WORKER_MAX_PAGES {
        let after = cursor.as_ref().map(|(ts, sensor)| (*ts, sensor.as_str()));
        let page =
            queries::get_pending_samples(pool, kind, since, after, WORKER_BATCH_LIMIT).await?;
        if page.is_empty() {
            break;
        }
        cursor = next_cursor(&page, WORKER_BATCH_LIMIT);

        for status in process_page(pool, kind, page).await {
            merge_status(&mut totals, status);
        }
        if cursor.is_none() {
            break;
        }
        if page_no + 1 == WORKER_MAX_PAGES {
            tracing::warn!(
                "Worker: {} pending {} pages processed, remainder deferred to the next run",
                WORKER_MAX_PAGES,
                kind
            );
        }
    }

    if totals.is_empty() {
        tracing::debug!("Worker: no pending {} samples since {}", kind, since);
    }
    Ok(totals.into_values().collect())
}

/// Process one page of pending samples, one task per sensor.
async fn process_page(
    pool: &PgPool,
    kind: SeriesKind,
    page: Vec<PendingSample>,
) -> Vec<SensorRunStatus> {
    let groups = group_by_sensor(page);
    let futures = groups.iter().map(|(sensor_code, samples)| async move {
        let result = process_samples(pool, kind, sensor_code, samples).await;
        match result {
            Ok(report) => SensorRunStatus {
                sensor_code: sensor_code.clone(),
                kind,
                pending: samples.len(),
                processed: report.processed,
                skipped: report.skipped,
                errors: report.errors.len(),
                last_result: if report.errors.is_empty() {
                    "ok".to_string()
                } else {
                    "partial".to_string()
                },
            },
            Err(e) => {
                tracing::error!("Worker: {} batch for {} failed: {}", kind, sensor_code, e);
                SensorRunStatus {
                    sensor_code: sensor_code.clone(),
                    kind,
                    pending: samples.len(),
                    processed: 0,
                    skipped: 0,
                    errors: samples.len(),
                    last_result: "error".to_string(),
                }
            }
        }
    });

    join_all(futures).await
}

/// Publish the run outcome and the next wake-up time.
async fn finalize_run(
    state: &SharedWorkerState,
    statuses: Vec<SensorRunStatus>,
    run_start: DateTime<Utc>,
    sleep_duration: u64,
) {
    let now = Utc::now();
    let duration_ms = (now - run_start).num_milliseconds().max(0) as u64;
    let processed: usize = statuses.iter().map(|s| s.processed).sum();

    {
        let mut s = state.write().await;
        s.sensors = statuses;
        s.last_run_completed_at = Some(now);
        s.last_run_duration_ms = Some(duration_ms);
        s.next_wakeup_at = Some(now + Duration::seconds(sleep_duration as i64));
        s.total_runs += 1;
    }

    tracing::info!(
        "Worker run complete in {}ms: {} discharges stored, sleeping {}s",
        duration_ms,
        processed,
        sleep_duration
    );
}

async fn sleep_secs(secs: u64) {
    tokio::time::sleep(tokio::time::Duration::from_secs(secs)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn pending(sensor: &str, at: &str, level: i64) -> PendingSample {
        PendingSample {
            sensor_code: sensor.to_string(),
            timestamp: at.parse::<DateTime<Utc>>().unwrap(),
            water_level: Decimal::from(level),
        }
    }

    #[test]
    fn test_group_by_sensor_sorts_each_group() {
        let groups = group_by_sensor(vec![
            pending("S2", "2024-01-01T02:00:00Z", 2),
            pending("S1", "2024-01-01T03:00:00Z", 3),
            pending("S1", "2024-01-01T01:00:00Z", 1),
        ]);

        let sensors: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(sensors, vec!["S1", "S2"]);
        let s1 = &groups["S1"];
        assert_eq!(s1.len(), 2);
        assert_eq!(s1[0].water_level, 1.0);
        assert_eq!(s1[1].water_level, 3.0);
    }

    #[test]
    fn test_group_by_sensor_empty() {
        assert!(group_by_sensor(Vec::new()).is_empty());
    }

    fn status(sensor: &str, processed: usize, errors: usize, result: &str) -> SensorRunStatus {
        SensorRunStatus {
            sensor_code: sensor.to_string(),
            kind: SeriesKind::Actual,
            pending: processed + errors,
            processed,
            skipped: 0,
            errors,
            last_result: result.to_string(),
        }
    }

    /// In-memory stand-in for the keyset filter of the pending query.
    fn page_after(
        rows: &[PendingSample],
        after: Option<&(DateTime<Utc>, String)>,
        limit: i64,
    ) -> Vec<PendingSample> {
        rows.iter()
            .filter(|r| after.map_or(true, |(ts, s)| (r.timestamp, &r.sensor_code) > (*ts, s)))
            .take(limit as usize)
            .cloned()
            .collect()
    }

    #[test]
    fn test_next_cursor_only_on_full_page() {
        let page = vec![
            pending("S1", "2024-01-01T01:00:00Z", 1),
            pending("S2", "2024-01-01T01:00:00Z", 2),
        ];
        assert_eq!(
            next_cursor(&page, 2),
            Some(("2024-01-01T01:00:00Z".parse().unwrap(), "S2".to_string()))
        );
        assert_eq!(next_cursor(&page, 3), None);
        assert_eq!(next_cursor(&[], 2), None);
    }

    #[test]
    fn test_paging_reaches_samples_behind_rejected_ones() {
        // The first four rows stay pending forever (rejected discharges);
        // the last one is processable and must still be reached.
        let rows = vec![
            pending("S1", "2024-01-01T00:00:00Z", -1),
            pending("S2", "2024-01-01T00:00:00Z", -1),
            pending("S1", "2024-01-01T00:01:00Z", -1),
            pending("S2", "2024-01-01T00:01:00Z", -1),
            pending("S1", "2024-01-01T00:02:00Z", 3),
        ];

        let mut seen = Vec::new();
        let mut cursor = None;
        for _ in 0..WORKER_MAX_PAGES {
            let page = page_after(&rows, cursor.as_ref(), 2);
            if page.is_empty() {
                break;
            }
            cursor = next_cursor(&page, 2);
            seen.extend(page.into_iter().map(|p| (p.sensor_code, p.timestamp)));
            if cursor.is_none() {
                break;
            }
        }

        assert_eq!(seen.len(), rows.len());
        assert_eq!(
            seen.last().unwrap(),
            &("S1".to_string(), "2024-01-01T00:02:00Z".parse().unwrap())
        );
    }

    #[test]
    fn test_merge_status_sums_pages() {
        let mut totals = BTreeMap::new();
        merge_status(&mut totals, status("S1", 3, 0, "ok"));
        merge_status(&mut totals, status("S1", 2, 1, "partial"));
        merge_status(&mut totals, status("S2", 1, 0, "ok"));

        let s1 = &totals["S1"];
        assert_eq!((s1.pending, s1.processed, s1.errors), (6, 5, 1));
        assert_eq!(s1.last_result, "partial");
        assert_eq!(totals["S2"].last_result, "ok");

        merge_status(&mut totals, status("S2", 0, 4, "error"));
        assert_eq!(totals["S2"].last_result, "error");
    }

    #[test]
    fn test_new_state_has_no_runs() {
        let state = WorkerState::new(true, 300, 48);
        assert!(state.active);
        assert_eq!(state.total_runs, 0);
        assert!(state.next_wakeup_at.is_none());
        assert!(state.sensors.is_empty());
    }
}

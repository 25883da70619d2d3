//! Fetch/refresh orchestration and dashboard state
//!
//! The controller owns the store the TUI renders from and runs the state
//! machine around the two backend calls. Fetch-level failures are absorbed
//! here; nothing propagates to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::chart::{self, PlotPoint};
use crate::client::MarketApi;
use crate::kpi::{self, KpiSet};
use crate::series::{self, Series};

/// Synchronization state of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Constructed, no fetch issued yet
    Idle,
    /// A fetch or refresh is in flight
    Loading,
    /// The last applied fetch carried a well-formed (possibly empty) series
    Ready,
    /// Transport failure on either endpoint
    Failed,
}

/// Everything the dashboard renders from.
///
/// Replaced in place under the store mutex by whichever fetch completion
/// applies last; the series and its derived views always change together.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub sync: SyncState,
    pub series: Series,
    pub kpis: KpiSet,
    pub chart: Vec<PlotPoint>,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Sequence number of the fetch that produced the current series
    applied_seq: u64,
}

impl DashboardState {
    fn new() -> Self {
        Self {
            sync: SyncState::Idle,
            series: Vec::new(),
            kpis: KpiSet::unavailable(),
            chart: Vec::new(),
            last_sync: None,
            last_error: None,
            applied_seq: 0,
        }
    }

    fn apply_series(&mut self, series: Series) {
        self.kpis = kpi::derive(&series);
        self.chart = chart::project(&series);
        self.series = series;
        self.sync = SyncState::Ready;
        self.last_sync = Some(Utc::now());
        self.last_error = None;
    }

    /// Reset to empty rather than leaving a stale series behind a failure
    /// indicator: consumers must never show KPIs from an older series next
    /// to a disconnected banner.
    fn apply_failure(&mut self, error: String) {
        self.series = Vec::new();
        self.kpis = KpiSet::unavailable();
        self.chart = Vec::new();
        self.sync = SyncState::Failed;
        self.last_error = Some(error);
    }
}

/// Orchestrates fetch-on-load, manual refresh, and the single delayed
/// re-fetch after an accepted refresh.
///
/// Overlapping fetches are neither cancelled nor de-duplicated; each is
/// tagged with a sequence number at issue time, and a completion older than
/// the last applied one is discarded.
pub struct SyncController<A> {
    api: A,
    store: Arc<Mutex<DashboardState>>,
    refresh_delay: Duration,
    issued: AtomicU64,
}

impl<A: MarketApi> SyncController<A> {
    pub fn new(api: A, refresh_delay: Duration) -> Self {
        Self {
            api,
            store: Arc::new(Mutex::new(DashboardState::new())),
            refresh_delay,
            issued: AtomicU64::new(0),
        }
    }

    /// Handle to the store this controller mutates. Render loops clone a
    /// snapshot per frame.
    pub fn store(&self) -> Arc<Mutex<DashboardState>> {
        Arc::clone(&self.store)
    }

    /// The automatic fetch issued on startup.
    pub async fn initial_load(&self) {
        self.fetch_and_apply().await;
    }

    /// Fetch the series and apply the outcome, unless a newer fetch has
    /// already applied.
    pub async fn fetch_and_apply(&self) {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.lock().await.sync = SyncState::Loading;

        let outcome = self.api.fetch_series().await;

        let mut store = self.store.lock().await;
        if seq < store.applied_seq {
            debug!("discarding stale fetch result (seq {seq} < {})", store.applied_seq);
            return;
        }
        store.applied_seq = seq;

        match outcome {
            Ok(body) => {
                let series = series::validate_payload(&body);
                debug!("applied series with {} samples", series.len());
                store.apply_series(series);
            }
            Err(e) => {
                error!("series fetch failed: {e}");
                store.apply_failure(e.to_string());
            }
        }
    }

    /// Run the refresh protocol: trigger backend recomputation, and on
    /// acknowledgement schedule the single delayed re-fetch.
    ///
    /// A failed trigger moves straight to `Failed` with no follow-up fetch.
    /// The delay is advisory; a re-fetch that lands before the backend has
    /// finished simply returns the previous data.
    pub async fn refresh(&self) {
        self.store.lock().await.sync = SyncState::Loading;

        match self.api.trigger_refresh().await {
            Ok(()) => {
                debug!("refresh accepted, re-fetching in {:?}", self.refresh_delay);
                tokio::time::sleep(self.refresh_delay).await;
                self.fetch_and_apply().await;
            }
            Err(e) => {
                error!("refresh trigger failed: {e}");
                self.store.lock().await.apply_failure(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use crate::kpi::{RegimeLabel, SignalLabel};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Scripted backend: the n-th fetch call receives the n-th scripted
    /// result (issue order, not completion order), and calls are counted.
    struct MockApi {
        fetch_results: std::sync::Mutex<Vec<Option<Result<Value, ApiError>>>>,
        refresh_result: std::sync::Mutex<Option<ApiError>>,
        fetch_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        /// When set, the first fetch call parks here until released.
        gate_first_fetch: Option<Arc<Notify>>,
    }

    impl MockApi {
        fn new(fetch_results: Vec<Result<Value, ApiError>>) -> Self {
            Self {
                fetch_results: std::sync::Mutex::new(
                    fetch_results.into_iter().map(Some).collect(),
                ),
                refresh_result: std::sync::Mutex::new(None),
                fetch_calls: AtomicUsize::new(0),
                refresh_calls: AtomicUsize::new(0),
                gate_first_fetch: None,
            }
        }

        fn failing_refresh(mut self, error: ApiError) -> Self {
            *self.refresh_result.get_mut().unwrap() = Some(error);
            self
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate_first_fetch = Some(gate);
            self
        }

        fn fetches(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketApi for MockApi {
        async fn fetch_series(&self) -> Result<Value, ApiError> {
            let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                if let Some(gate) = &self.gate_first_fetch {
                    gate.notified().await;
                }
            }
            self.fetch_results
                .lock()
                .unwrap()
                .get_mut(call)
                .and_then(Option::take)
                .unwrap_or_else(|| Ok(json!([])))
        }

        async fn trigger_refresh(&self) -> Result<(), ApiError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match self.refresh_result.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    fn payload() -> Value {
        json!([
            {"timestamp": "2025-11-20 09:15:00", "close": 19500.0, "ema_9": 19490.0,
             "ema_21": 19480.0, "rsi": 55.0, "regime": 0, "signal": 1},
            {"timestamp": "2025-11-20 09:20:00", "close": 19510.5, "ema_9": 19495.0,
             "ema_21": 19482.0, "rsi": 58.1, "regime": 0, "signal": 1},
        ])
    }

    #[tokio::test]
    async fn test_initial_load_reaches_ready() {
        let controller = SyncController::new(MockApi::new(vec![Ok(payload())]), Duration::ZERO);
        assert_eq!(controller.store().lock().await.sync, SyncState::Idle);

        controller.initial_load().await;

        let store = controller.store();
        let state = store.lock().await;
        assert_eq!(state.sync, SyncState::Ready);
        assert_eq!(state.series.len(), 2);
        assert_eq!(state.kpis.price, "19510.50");
        assert_eq!(state.kpis.signal, SignalLabel::Buy);
        assert_eq!(state.chart.len(), 2);
        assert!(state.last_sync.is_some());
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn test_non_array_payload_is_absorbed_not_failed() {
        let api = MockApi::new(vec![Ok(json!({"error": "pipeline still running"}))]);
        let controller = SyncController::new(api, Duration::ZERO);

        controller.fetch_and_apply().await;

        let store = controller.store();
        let state = store.lock().await;
        assert_eq!(state.sync, SyncState::Ready);
        assert!(state.series.is_empty());
        assert_eq!(state.kpis.regime, RegimeLabel::Unknown);
    }

    #[tokio::test]
    async fn test_transport_failure_resets_series() {
        let api = MockApi::new(vec![
            Ok(payload()),
            Err(ApiError::Decode("expected value at line 1".to_string())),
        ]);
        let controller = SyncController::new(api, Duration::ZERO);

        controller.fetch_and_apply().await;
        controller.fetch_and_apply().await;

        let store = controller.store();
        let state = store.lock().await;
        assert_eq!(state.sync, SyncState::Failed);
        assert!(state.series.is_empty());
        assert!(state.chart.is_empty());
        assert_eq!(state.kpis.price, crate::kpi::UNAVAILABLE);
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let api = MockApi::new(vec![Ok(payload()), Ok(payload())]);
        let controller = SyncController::new(api, Duration::ZERO);

        controller.fetch_and_apply().await;
        let first = controller.store().lock().await.clone();

        controller.fetch_and_apply().await;
        let second = controller.store().lock().await.clone();

        assert_eq!(first.series, second.series);
        assert_eq!(first.kpis, second.kpis);
        assert_eq!(first.chart, second.chart);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_schedules_exactly_one_refetch() {
        let api = MockApi::new(vec![Ok(payload())]);
        let controller = SyncController::new(api, Duration::from_secs(4));

        controller.refresh().await;

        assert_eq!(controller.api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(controller.api.fetches(), 1);
        let store = controller.store();
        let state = store.lock().await;
        assert_eq!(state.sync, SyncState::Ready);
        assert_eq!(state.series.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_skips_refetch() {
        let api = MockApi::new(vec![Ok(payload())])
            .failing_refresh(ApiError::Status(reqwest::StatusCode::BAD_GATEWAY));
        let controller = SyncController::new(api, Duration::ZERO);

        controller.refresh().await;

        assert_eq!(controller.api.fetches(), 0);
        let store = controller.store();
        let state = store.lock().await;
        assert_eq!(state.sync, SyncState::Failed);
        assert!(state.series.is_empty());
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let stale = json!([
            {"timestamp": "2025-11-20 09:00:00", "close": 111.0, "ema_21": 111.0},
        ]);
        let gate = Arc::new(Notify::new());
        let api = MockApi::new(vec![Ok(stale), Ok(payload())]).gated(Arc::clone(&gate));
        let controller = Arc::new(SyncController::new(api, Duration::ZERO));

        // First fetch issues, then parks inside the mock.
        let parked = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.fetch_and_apply().await })
        };
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(controller.api.fetches(), 1);

        // Second fetch runs to completion and applies the newer series.
        controller.fetch_and_apply().await;
        assert_eq!(controller.store().lock().await.kpis.price, "19510.50");

        // Release the parked fetch; its older result must not win.
        gate.notify_one();
        parked.await.unwrap();

        let store = controller.store();
        let state = store.lock().await;
        assert_eq!(state.kpis.price, "19510.50");
        assert_eq!(state.sync, SyncState::Ready);
        assert_eq!(state.series.len(), 2);
    }
}

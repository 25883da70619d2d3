/// Regime TUI - Shared Library
///
/// Data synchronization pipeline behind the `regime-dash` terminal
/// dashboard:
/// - Field-name resolution over the backend's untyped records
/// - Payload validation into a canonical series
/// - Latest-point KPI derivation (price, RSI, regime, signal)
/// - Chart projection with placeholder-row filtering
/// - Fetch/refresh orchestration against the quant backend
pub mod chart;
pub mod client;
pub mod fields;
pub mod kpi;
pub mod series;
pub mod sync;

// Re-export commonly used types for convenience
pub use chart::{axis_label, project, x_bounds, y_bounds, PlotPoint};
pub use client::{ApiError, BackendConfig, HttpMarketApi, MarketApi};
pub use fields::{Field, RawSample};
pub use kpi::{KpiSet, RegimeLabel, RsiBand, SignalLabel, UNAVAILABLE};
pub use series::{validate_payload, CanonicalSample, Series};
pub use sync::{DashboardState, SyncController, SyncState};

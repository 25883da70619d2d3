//! Chart projection: the filtered, ordered sequence fed to the plot surface
//!
//! A derived, disposable view over the canonical series. It never feeds back
//! into KPI derivation, which always works from the unfiltered series.

use chrono::{DateTime, Utc};

use crate::series::CanonicalSample;

/// Minimum magnitude for `close` and `ema_slow`. The backend zero-fills the
/// indicator warm-up rows; letting those through collapses the y-axis scale
/// around zero.
pub const MIN_PLOT_MAGNITUDE: f64 = 1.0;

/// One plottable point. `close` and `ema_slow` are guaranteed above the
/// magnitude floor; `ema_fast` may still be missing (the fast EMA warms up
/// on its own schedule) and renders as a gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub ema_fast: Option<f64>,
    pub ema_slow: f64,
}

/// Project the canonical series into the sequence fed to the line plot.
///
/// Retains a sample only when both `close` and `ema_slow` exceed the
/// magnitude floor (a missing value counts as zero, so it is filtered), and
/// when it carries a plottable timestamp. Order is preserved.
pub fn project(series: &[CanonicalSample]) -> Vec<PlotPoint> {
    series
        .iter()
        .filter_map(|sample| {
            let close = sample.close.unwrap_or(0.0);
            let ema_slow = sample.ema_slow.unwrap_or(0.0);
            if close <= MIN_PLOT_MAGNITUDE || ema_slow <= MIN_PLOT_MAGNITUDE {
                return None;
            }
            Some(PlotPoint {
                timestamp: sample.timestamp?,
                close,
                ema_fast: sample.ema_fast,
                ema_slow,
            })
        })
        .collect()
}

/// Format an x-axis tick label: same-calendar-day points render as time of
/// day, older points as month/day.
pub fn axis_label(timestamp: DateTime<Utc>, today: DateTime<Utc>) -> String {
    if timestamp.date_naive() == today.date_naive() {
        timestamp.format("%H:%M").to_string()
    } else {
        timestamp.format("%b %d").to_string()
    }
}

/// Inclusive x-axis bounds as unix-second epochs, or `None` for an empty
/// projection.
pub fn x_bounds(points: &[PlotPoint]) -> Option<(f64, f64)> {
    let first = points.first()?.timestamp.timestamp() as f64;
    let last = points.last()?.timestamp.timestamp() as f64;
    Some((first.min(last), first.max(last)))
}

/// Inclusive y-axis bounds across every plotted value, or `None` for an
/// empty projection.
pub fn y_bounds(points: &[PlotPoint]) -> Option<(f64, f64)> {
    let mut bounds: Option<(f64, f64)> = None;
    for point in points {
        for value in [Some(point.close), point.ema_fast, Some(point.ema_slow)]
            .into_iter()
            .flatten()
        {
            bounds = Some(match bounds {
                Some((low, high)) => (low.min(value), high.max(value)),
                None => (value, value),
            });
        }
    }
    bounds
}

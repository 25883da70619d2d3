//! Latest-point KPI derivation
//!
//! The four dashboard KPIs (price, RSI, regime, signal) are a pure function
//! of the last element of the series. Gaps degrade to sentinels, never to
//! errors.

use std::fmt;

use crate::series::{CanonicalSample, Series};

/// Placeholder rendered when a KPI's source field is missing.
pub const UNAVAILABLE: &str = "---";

/// RSI classification bands. The boundaries 70 and 30 themselves are neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiBand {
    Overbought,
    Oversold,
    Neutral,
}

impl RsiBand {
    pub fn classify(rsi: f64) -> Self {
        if rsi > 70.0 {
            RsiBand::Overbought
        } else if rsi < 30.0 {
            RsiBand::Oversold
        } else {
            RsiBand::Neutral
        }
    }
}

/// Market regime labels, mapped from the backend's discrete HMM state codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegimeLabel {
    /// Code 0: trending market, low volatility
    TrendingLowVol,
    /// Code 1: high volatility
    HighVolatility,
    /// Any other code (2 and above)
    ChoppySideways,
    /// Regime field absent from the latest sample
    Unknown,
}

impl RegimeLabel {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => RegimeLabel::TrendingLowVol,
            Some(1) => RegimeLabel::HighVolatility,
            Some(_) => RegimeLabel::ChoppySideways,
            None => RegimeLabel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeLabel::TrendingLowVol => "Bull/Bear Trend",
            RegimeLabel::HighVolatility => "High Volatility",
            RegimeLabel::ChoppySideways => "Choppy/Sideways",
            RegimeLabel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Actionable-trade indicator. Code 1 is a buy; anything else is a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalLabel {
    Buy,
    Wait,
}

impl SignalLabel {
    pub fn from_code(code: Option<i64>) -> Self {
        if code == Some(1) {
            SignalLabel::Buy
        } else {
            SignalLabel::Wait
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalLabel::Buy => "BUY",
            SignalLabel::Wait => "WAIT",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, SignalLabel::Buy)
    }
}

impl fmt::Display for SignalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four displayed KPIs, derived from the latest sample.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiSet {
    /// Latest close, 2 decimal places, or the unavailable sentinel
    pub price: String,
    /// Latest RSI, 1 decimal place, or the unavailable sentinel
    pub rsi: String,
    /// RSI band, present only when the RSI value itself is
    pub rsi_band: Option<RsiBand>,
    pub regime: RegimeLabel,
    pub signal: SignalLabel,
}

impl KpiSet {
    /// The all-sentinel set shown before data arrives or after a failure.
    pub fn unavailable() -> Self {
        Self {
            price: UNAVAILABLE.to_string(),
            rsi: UNAVAILABLE.to_string(),
            rsi_band: None,
            regime: RegimeLabel::Unknown,
            signal: SignalLabel::Wait,
        }
    }

    fn from_latest(latest: &CanonicalSample) -> Self {
        Self {
            price: latest
                .close
                .map(|close| format!("{close:.2}"))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            rsi: latest
                .rsi
                .map(|rsi| format!("{rsi:.1}"))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
            rsi_band: latest.rsi.map(RsiBand::classify),
            regime: RegimeLabel::from_code(latest.regime),
            signal: SignalLabel::from_code(latest.signal),
        }
    }
}

/// Derive the displayed KPIs from the latest element of the series.
///
/// KPI derivation always uses the true latest element, even when its
/// magnitude would be filtered from the chart projection.
pub fn derive(series: &Series) -> KpiSet {
    match series.last() {
        Some(latest) => KpiSet::from_latest(latest),
        None => KpiSet::unavailable(),
    }
}

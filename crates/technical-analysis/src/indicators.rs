use analysis_core::calendar::{is_business_day, market_date};
use analysis_core::{AnalysisError, Bar};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Tenkan-sen (conversion line) window, in business-day bars
pub const TENKAN_PERIOD: usize = 10;
/// Kijun-sen (base line) window, in business-day bars
pub const KIJUN_PERIOD: usize = 17;

/// Total traded volume across the bars
pub fn session_volume(bars: &[Bar]) -> f64 {
    bars.iter().map(|b| b.volume).sum()
}

/// Volume spike: today's total volume strictly exceeds `threshold_ratio` times the
/// comparison session's total volume.
pub fn volume_spike(today: &[Bar], comparison: &[Bar], threshold_ratio: f64) -> bool {
    session_volume(today) > threshold_ratio * session_volume(comparison)
}

/// Bar annotated with its close change relative to the first bar of the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentageChangeBar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub percentage_change: f64,
}

/// Percentage change of every close versus the first close:
/// `(close - first_close) / first_close * 100`.
///
/// The first bar is always 0. An empty series has no reference close and yields
/// `NoData`; a zero reference close yields `InvalidData`.
pub fn percentage_change(bars: &[Bar]) -> Result<Vec<PercentageChangeBar>, AnalysisError> {
    let first_close = bars
        .first()
        .map(|b| b.close)
        .ok_or_else(|| AnalysisError::NoData("percentage change of an empty series".to_string()))?;

    if first_close == 0.0 {
        return Err(AnalysisError::InvalidData(
            "first close is zero, percentage change undefined".to_string(),
        ));
    }

    Ok(bars
        .iter()
        .map(|b| PercentageChangeBar {
            timestamp: b.timestamp,
            close: b.close,
            percentage_change: (b.close - first_close) / first_close * 100.0,
        })
        .collect())
}

/// Tenkan-sen / Kijun-sen bands aligned to the input timestamps.
///
/// A slot is `None` until the first business-day bar has been seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IchimokuBands {
    pub timestamps: Vec<DateTime<Utc>>,
    pub tenkan_sen: Vec<Option<f64>>,
    pub kijun_sen: Vec<Option<f64>>,
}

impl IchimokuBands {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// (tenkan, kijun) at `index` when both are available
    pub fn at(&self, index: usize) -> Option<(f64, f64)> {
        match (self.tenkan_sen.get(index)?, self.kijun_sen.get(index)?) {
            (Some(tenkan), Some(kijun)) => Some((*tenkan, *kijun)),
            _ => None,
        }
    }
}

/// Ichimoku Tenkan-sen and Kijun-sen.
///
/// Each value is `(max high + min low) / 2` over the last `period` business-day
/// bars seen so far, with partial windows at the start. Weekend bars (by the
/// calendar date in `offset`) are left out of every window but still receive the
/// value computed from the business-day bars before them. Bars without a high or
/// low contribute their close.
pub fn ichimoku(
    bars: &[Bar],
    tenkan_period: usize,
    kijun_period: usize,
    offset: &FixedOffset,
) -> IchimokuBands {
    let mut business_bars: Vec<&Bar> = Vec::with_capacity(bars.len());
    let mut timestamps = Vec::with_capacity(bars.len());
    let mut tenkan_sen = Vec::with_capacity(bars.len());
    let mut kijun_sen = Vec::with_capacity(bars.len());

    for bar in bars {
        if is_business_day(market_date(bar.timestamp, offset)) {
            business_bars.push(bar);
        }
        timestamps.push(bar.timestamp);
        tenkan_sen.push(midpoint(&business_bars, tenkan_period));
        kijun_sen.push(midpoint(&business_bars, kijun_period));
    }

    IchimokuBands {
        timestamps,
        tenkan_sen,
        kijun_sen,
    }
}

/// Midpoint of the high/low extremes over the trailing `period` bars
fn midpoint(bars: &[&Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.is_empty() {
        return None;
    }

    let window = &bars[bars.len().saturating_sub(period)..];
    let highest = window
        .iter()
        .map(|b| b.high_or_close())
        .fold(f64::NEG_INFINITY, f64::max);
    let lowest = window
        .iter()
        .map(|b| b.low_or_close())
        .fold(f64::INFINITY, f64::min);

    Some((highest + lowest) / 2.0)
}

/// Relationship of Tenkan-sen to Kijun-sen between the last two bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crossover {
    /// Tenkan moved from at-or-below Kijun to above it
    BullishCross,
    /// Tenkan moved from at-or-above Kijun to below it
    BearishCross,
    /// No cross, Tenkan strictly above Kijun
    Above,
    /// No cross, Tenkan at or below Kijun
    NotAbove,
}

impl Crossover {
    /// A cross in either direction, or Tenkan currently above Kijun
    pub fn is_signal(&self) -> bool {
        !matches!(self, Crossover::NotAbove)
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            Crossover::BullishCross => "Tenkan crossed above Kijun",
            Crossover::BearishCross => "Tenkan crossed below Kijun",
            Crossover::Above => "Tenkan above Kijun",
            Crossover::NotAbove => "Tenkan at or below Kijun",
        }
    }
}

/// Classify the move from the previous (tenkan, kijun) pair to the current one.
pub fn classify_crossover(prev_tenkan: f64, prev_kijun: f64, tenkan: f64, kijun: f64) -> Crossover {
    if prev_tenkan <= prev_kijun && tenkan > kijun {
        Crossover::BullishCross
    } else if prev_tenkan >= prev_kijun && tenkan < kijun {
        Crossover::BearishCross
    } else if tenkan > kijun {
        Crossover::Above
    } else {
        Crossover::NotAbove
    }
}

/// Crossover state at the last bar. `None` unless the last two bars both carry
/// Tenkan and Kijun values.
pub fn band_crossover(bands: &IchimokuBands) -> Option<Crossover> {
    let n = bands.len();
    if n < 2 {
        return None;
    }

    let (prev_tenkan, prev_kijun) = bands.at(n - 2)?;
    let (tenkan, kijun) = bands.at(n - 1)?;
    Some(classify_crossover(prev_tenkan, prev_kijun, tenkan, kijun))
}

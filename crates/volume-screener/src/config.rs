use analysis_core::AnalysisError;
use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use std::str::FromStr;
use technical_analysis::{KIJUN_PERIOD, TENKAN_PERIOD};

/// Days stepped back from today before snapping to a business day (0 = most recent business day)
pub const DAYCHECK: u32 = 1;
/// Analysis-day volume must exceed this multiple of the comparison-day volume
pub const PERCENTAGE_HIGH_VOLUME: f64 = 1.5;
/// Last close must be more than this many percent above the first close
pub const MIN_PERCENTAGE_CHANGE: f64 = 1.0;
/// Calendar days of history used for the Tenkan/Kijun crossover
pub const CROSSOVER_LOOKBACK_DAYS: i64 = 30;
/// Largest accepted `day_check`
pub const MAX_DAY_CHECK: u32 = 366;
/// Largest accepted crossover lookback, in days
pub const MAX_CROSSOVER_LOOKBACK_DAYS: i64 = 3660;
/// Market offset for session windows, hours east of UTC
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

/// Run configuration for the screener
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    /// Offset in days from today to the analysis day
    pub day_check: u32,
    /// Volume-spike multiplier
    pub volume_threshold: f64,
    /// Minimum percentage change since the first bar
    pub min_percentage_change: f64,
    /// Run the Tenkan/Kijun crossover stage
    pub include_crossover: bool,
    pub crossover_lookback_days: i64,
    pub tenkan_period: usize,
    pub kijun_period: usize,
    /// Session window bounds, market-local time
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
    pub market_offset: FixedOffset,
    /// Tickers evaluated at once within a group (1 = sequential)
    pub concurrency: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            day_check: DAYCHECK,
            volume_threshold: PERCENTAGE_HIGH_VOLUME,
            min_percentage_change: MIN_PERCENTAGE_CHANGE,
            include_crossover: false,
            crossover_lookback_days: CROSSOVER_LOOKBACK_DAYS,
            tenkan_period: TENKAN_PERIOD,
            kijun_period: KIJUN_PERIOD,
            session_open: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            session_close: NaiveTime::from_hms_opt(15, 0, 0).unwrap_or_default(),
            market_offset: offset_from_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or_else(|| Utc.fix()),
            concurrency: 1,
        }
    }
}

impl ScreenConfig {
    /// Defaults overridden by `DAYCHECK`, `PERCENTAGE_HIGH_VOLUME`,
    /// `SCREENER_CROSSOVER`, `SCREENER_CONCURRENCY` and `SCREENER_UTC_OFFSET`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ScreenConfig::from_env`] with an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let offset_hours = parse_or(&lookup, "SCREENER_UTC_OFFSET", DEFAULT_UTC_OFFSET_HOURS);
        let market_offset = offset_from_hours(offset_hours).unwrap_or_else(|| {
            tracing::warn!("SCREENER_UTC_OFFSET={} out of range, using default", offset_hours);
            defaults.market_offset
        });

        Self {
            day_check: parse_or(&lookup, "DAYCHECK", defaults.day_check),
            volume_threshold: parse_or(&lookup, "PERCENTAGE_HIGH_VOLUME", defaults.volume_threshold),
            include_crossover: lookup("SCREENER_CROSSOVER")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.include_crossover),
            concurrency: parse_or(&lookup, "SCREENER_CONCURRENCY", defaults.concurrency),
            market_offset,
            ..defaults
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.volume_threshold.is_finite() && self.volume_threshold > 0.0) {
            return Err(AnalysisError::InvalidData(format!(
                "volume threshold must be positive, got {}",
                self.volume_threshold
            )));
        }
        if !self.min_percentage_change.is_finite() {
            return Err(AnalysisError::InvalidData(
                "minimum percentage change must be finite".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(AnalysisError::InvalidData("concurrency must be at least 1".to_string()));
        }
        if self.tenkan_period == 0 || self.kijun_period == 0 {
            return Err(AnalysisError::InvalidData("Ichimoku periods must be at least 1".to_string()));
        }
        if self.day_check > MAX_DAY_CHECK {
            return Err(AnalysisError::InvalidData(format!(
                "day check must be at most {}, got {}",
                MAX_DAY_CHECK, self.day_check
            )));
        }
        if !(1..=MAX_CROSSOVER_LOOKBACK_DAYS).contains(&self.crossover_lookback_days) {
            return Err(AnalysisError::InvalidData(format!(
                "crossover lookback must be 1..={} days, got {}",
                MAX_CROSSOVER_LOOKBACK_DAYS, self.crossover_lookback_days
            )));
        }
        if self.session_close <= self.session_open {
            return Err(AnalysisError::InvalidData(format!(
                "session close {} is not after open {}",
                self.session_close, self.session_open
            )));
        }
        Ok(())
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

/// Truthy values: 1, true, yes, on (case-insensitive)
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn offset_from_hours(hours: i32) -> Option<FixedOffset> {
    hours.checked_mul(3600).and_then(FixedOffset::east_opt)
}

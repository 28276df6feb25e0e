use analysis_core::calendar::{resolve_analysis_days, SessionWindow};
use analysis_core::AnalysisError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScreenConfig;

/// Reference dates and fetch ranges for one run.
///
/// Resolved once from the wall clock and passed explicitly to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub analysis_day: NaiveDate,
    pub comparison_day: NaiveDate,
    pub analysis_session: SessionWindow,
    pub comparison_session: SessionWindow,
    /// Start of the trailing crossover range, which ends at the analysis session end
    pub crossover_start: DateTime<Utc>,
}

impl AnalysisWindow {
    /// Resolve the window for the market-local calendar date `today`.
    pub fn resolve(today: NaiveDate, config: &ScreenConfig) -> Result<Self, AnalysisError> {
        let (analysis_day, comparison_day) = resolve_analysis_days(today, config.day_check)?;
        let session = |date| {
            SessionWindow::new(
                date,
                config.session_open,
                config.session_close,
                &config.market_offset,
            )
        };
        let analysis_session = session(analysis_day);
        let crossover_start = Duration::try_days(config.crossover_lookback_days)
            .and_then(|lookback| analysis_session.end.checked_sub_signed(lookback))
            .ok_or_else(|| {
                AnalysisError::InvalidData(format!(
                    "crossover lookback of {} days is out of range",
                    config.crossover_lookback_days
                ))
            })?;

        Ok(Self {
            analysis_day,
            comparison_day,
            analysis_session,
            comparison_session: session(comparison_day),
            crossover_start,
        })
    }

    /// Resolve the window from the current wall-clock time in the market's offset.
    pub fn current(config: &ScreenConfig) -> Result<Self, AnalysisError> {
        let today = Utc::now().with_timezone(&config.market_offset).date_naive();
        Self::resolve(today, config)
    }

    /// Range of the main series: comparison session start through analysis session end
    pub fn main_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.comparison_session.start, self.analysis_session.end)
    }

    /// Trailing range used for the Tenkan/Kijun bands
    pub fn crossover_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.crossover_start, self.analysis_session.end)
    }
}

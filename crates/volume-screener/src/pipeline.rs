use analysis_core::{AnalysisError, MarketDataSource, PriceSeries};
use chrono::{DateTime, Utc};
use technical_analysis::{band_crossover, ichimoku, percentage_change, session_volume, volume_spike, Crossover};

use crate::config::ScreenConfig;
use crate::models::{FailReason, PassDetails, ScreenOutcome, Stage, TickerResult};
use crate::window::AnalysisWindow;

/// Per-ticker screen: fetch, volume spike, percentage change and, when enabled,
/// Tenkan/Kijun crossover. The first failing stage ends the evaluation.
pub struct ScreeningPipeline<S> {
    source: S,
    config: ScreenConfig,
    window: AnalysisWindow,
}

impl<S: MarketDataSource> ScreeningPipeline<S> {
    pub fn new(source: S, config: ScreenConfig, window: AnalysisWindow) -> Self {
        Self {
            source,
            config,
            window,
        }
    }

    pub fn config(&self) -> &ScreenConfig {
        &self.config
    }

    pub fn window(&self) -> &AnalysisWindow {
        &self.window
    }

    pub async fn evaluate(&self, symbol: &str) -> TickerResult {
        let outcome = match self.run_stages(symbol).await {
            Ok(details) => ScreenOutcome::Pass(details),
            Err(reason) => ScreenOutcome::Fail(reason),
        };
        TickerResult {
            symbol: symbol.to_string(),
            outcome,
        }
    }

    async fn run_stages(&self, symbol: &str) -> Result<PassDetails, FailReason> {
        let (from, to) = self.window.main_range();
        let series = self.fetch(symbol, from, to, Stage::Fetch).await?;
        if series.is_empty() {
            return Err(FailReason::NoData { stage: Stage::Fetch });
        }

        let (today_volume, comparison_volume) = self.volume_stage(symbol).await?;
        let percentage_change = self.percentage_stage(&series)?;

        let crossover = if self.config.include_crossover {
            Some(self.crossover_stage(symbol).await?)
        } else {
            None
        };

        Ok(PassDetails {
            today_volume,
            comparison_volume,
            percentage_change,
            crossover,
        })
    }

    /// Session volumes of the analysis and comparison days, each fetched on its own.
    async fn volume_stage(&self, symbol: &str) -> Result<(f64, f64), FailReason> {
        let (from, to) = self.window.analysis_session.range();
        let today = self.fetch(symbol, from, to, Stage::VolumeSpike).await?;
        let (from, to) = self.window.comparison_session.range();
        let comparison = self.fetch(symbol, from, to, Stage::VolumeSpike).await?;

        let today_volume = session_volume(today.bars());
        let comparison_volume = session_volume(comparison.bars());
        tracing::debug!(
            "{} volume {} vs {} (threshold {})",
            symbol,
            today_volume,
            comparison_volume,
            self.config.volume_threshold
        );

        if volume_spike(today.bars(), comparison.bars(), self.config.volume_threshold) {
            Ok((today_volume, comparison_volume))
        } else {
            Err(FailReason::VolumeBelowThreshold {
                today_volume,
                comparison_volume,
                threshold: self.config.volume_threshold,
            })
        }
    }

    fn percentage_stage(&self, series: &PriceSeries) -> Result<f64, FailReason> {
        let annotated = percentage_change(series.bars())
            .map_err(|e| stage_error(e, Stage::PercentageChange))?;
        let last = annotated
            .last()
            .map(|b| b.percentage_change)
            .ok_or(FailReason::NoData {
                stage: Stage::PercentageChange,
            })?;

        if last > self.config.min_percentage_change {
            Ok(last)
        } else {
            Err(FailReason::PercentageChangeTooSmall {
                percentage_change: last,
                minimum: self.config.min_percentage_change,
            })
        }
    }

    async fn crossover_stage(&self, symbol: &str) -> Result<Crossover, FailReason> {
        let (from, to) = self.window.crossover_range();
        let series = self.fetch(symbol, from, to, Stage::Crossover).await?;
        if series.len() < 2 {
            return Err(FailReason::InsufficientData {
                stage: Stage::Crossover,
                bars: series.len(),
            });
        }

        let bands = ichimoku(
            series.bars(),
            self.config.tenkan_period,
            self.config.kijun_period,
            &self.config.market_offset,
        );
        let crossover = band_crossover(&bands).ok_or(FailReason::InsufficientData {
            stage: Stage::Crossover,
            bars: series.len(),
        })?;
        tracing::debug!("{} crossover state: {}", symbol, crossover.to_label());

        if crossover.is_signal() {
            Ok(crossover)
        } else {
            Err(FailReason::NoCrossover)
        }
    }

    async fn fetch(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        stage: Stage,
    ) -> Result<PriceSeries, FailReason> {
        self.source
            .fetch_history(symbol, from, to)
            .await
            .map_err(|e| {
                tracing::debug!("{} {} fetch unusable: {}", symbol, stage.name(), e);
                stage_error(e, stage)
            })
    }
}

/// Fetch and decode failures all read as "no data"; only computation errors on
/// data that did arrive are reported as invalid.
fn stage_error(error: AnalysisError, stage: Stage) -> FailReason {
    match error {
        AnalysisError::InsufficientData(_) => FailReason::InsufficientData { stage, bars: 0 },
        AnalysisError::InvalidData(detail) if stage == Stage::PercentageChange => {
            FailReason::InvalidData { stage, detail }
        }
        _ => FailReason::NoData { stage },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Bar;
    use async_trait::async_trait;
    use chrono::{Datelike, Duration, NaiveDate, TimeZone};
    use std::sync::Mutex;

    type Range = (DateTime<Utc>, DateTime<Utc>);

    /// Serves fixed series by (symbol, range) and records every request
    #[derive(Default)]
    struct StubSource {
        responses: Vec<(String, Range, Result<Vec<Bar>, String>)>,
        calls: Mutex<Vec<(String, Range)>>,
    }

    impl StubSource {
        fn respond(mut self, symbol: &str, range: Range, bars: Vec<Bar>) -> Self {
            self.responses.push((symbol.to_string(), range, Ok(bars)));
            self
        }

        fn fail(mut self, symbol: &str, range: Range) -> Self {
            self.responses
                .push((symbol.to_string(), range, Err("connection refused".to_string())));
            self
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MarketDataSource for StubSource {
        async fn fetch_history(
            &self,
            symbol: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<PriceSeries, AnalysisError> {
            self.calls.lock().unwrap().push((symbol.to_string(), (from, to)));
            match self
                .responses
                .iter()
                .find(|(s, range, _)| s == symbol && *range == (from, to))
            {
                Some((_, _, Ok(bars))) => PriceSeries::new(bars.clone()),
                Some((_, _, Err(e))) => Err(AnalysisError::ApiError(e.clone())),
                None => Err(AnalysisError::NoData(format!("no stub for {}", symbol))),
            }
        }
    }

    fn window(config: &ScreenConfig) -> AnalysisWindow {
        // Wednesday: analysis Tuesday 2024-03-12, comparison Monday 2024-03-11
        AnalysisWindow::resolve(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap(), config).unwrap()
    }

    fn bar(day: u32, close: f64, volume: f64) -> Bar {
        Bar::new(Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(), close, volume)
    }

    fn main_series(first: f64, last: f64) -> Vec<Bar> {
        vec![bar(11, first, 100.0), bar(12, last, 300.0)]
    }

    /// Stub with main series and both sessions for one ticker
    fn passing_stub(symbol: &str, w: &AnalysisWindow) -> StubSource {
        StubSource::default()
            .respond(symbol, w.main_range(), main_series(100.0, 102.0))
            .respond(symbol, w.analysis_session.range(), vec![bar(12, 102.0, 151.0)])
            .respond(symbol, w.comparison_session.range(), vec![bar(11, 100.0, 100.0)])
    }

    // Daily bars 2024-02-22 (Thu) through 2024-03-12 (Tue). The old high on 02-22 holds
    // Kijun up; the deep low on 02-27 drops out of the Tenkan window on the last bar.
    fn crossover_bars() -> Vec<Bar> {
        let end = Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap();
        (0..20)
            .rev()
            .map(|i| {
                let ts = end - Duration::days(i);
                let (high, low) = match ts.day() {
                    22 => (150.0, 99.0),
                    27 => (101.0, 50.0),
                    12 => (103.0, 101.0),
                    _ => (101.0, 99.0),
                };
                Bar::new(ts, (high + low) / 2.0, 1_000.0).with_range(high, low)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ticker_passes_all_stages() {
        let config = ScreenConfig::default();
        let w = window(&config);
        let pipeline = ScreeningPipeline::new(passing_stub("VNM", &w), config, w);

        let result = pipeline.evaluate("VNM").await;
        assert_eq!(result.symbol, "VNM");
        match result.outcome {
            ScreenOutcome::Pass(details) => {
                assert!((details.percentage_change - 2.0).abs() < 1e-9);
                assert!((details.today_volume - 151.0).abs() < 1e-9);
                assert!((details.comparison_volume - 100.0).abs() < 1e-9);
                assert_eq!(details.crossover, None);
            }
            other => panic!("expected pass, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_main_fetch_failure_is_no_data() {
        let config = ScreenConfig::default();
        let w = window(&config);
        let source = StubSource::default().fail("VNM", w.main_range());
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        assert_eq!(
            result.outcome,
            ScreenOutcome::Fail(FailReason::NoData { stage: Stage::Fetch })
        );
        assert_eq!(pipeline.source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_main_series_is_no_data() {
        let config = ScreenConfig::default();
        let w = window(&config);
        let source = StubSource::default().respond("VNM", w.main_range(), Vec::new());
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        assert_eq!(
            result.outcome,
            ScreenOutcome::Fail(FailReason::NoData { stage: Stage::Fetch })
        );
    }

    #[tokio::test]
    async fn test_volume_equal_to_threshold_fails_and_short_circuits() {
        let config = ScreenConfig::default();
        let w = window(&config);
        let source = StubSource::default()
            .respond("VNM", w.main_range(), main_series(100.0, 110.0))
            .respond("VNM", w.analysis_session.range(), vec![bar(12, 110.0, 150.0)])
            .respond("VNM", w.comparison_session.range(), vec![bar(11, 100.0, 100.0)]);
        let config = ScreenConfig {
            include_crossover: true,
            ..config
        };
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        assert!(matches!(
            result.outcome,
            ScreenOutcome::Fail(FailReason::VolumeBelowThreshold { .. })
        ));
        // main + two sessions, no crossover fetch
        assert_eq!(pipeline.source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_comparison_session_failure_is_no_data() {
        let config = ScreenConfig::default();
        let w = window(&config);
        let source = StubSource::default()
            .respond("VNM", w.main_range(), main_series(100.0, 110.0))
            .respond("VNM", w.analysis_session.range(), vec![bar(12, 110.0, 500.0)])
            .fail("VNM", w.comparison_session.range());
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        assert_eq!(
            result.outcome,
            ScreenOutcome::Fail(FailReason::NoData {
                stage: Stage::VolumeSpike
            })
        );
    }

    #[tokio::test]
    async fn test_small_percentage_change_fails() {
        let config = ScreenConfig::default();
        let w = window(&config);
        let source = StubSource::default()
            .respond("VNM", w.main_range(), main_series(100.0, 100.5))
            .respond("VNM", w.analysis_session.range(), vec![bar(12, 101.0, 400.0)])
            .respond("VNM", w.comparison_session.range(), vec![bar(11, 100.0, 100.0)]);
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        match result.outcome {
            ScreenOutcome::Fail(FailReason::PercentageChangeTooSmall {
                percentage_change,
                minimum,
            }) => {
                assert!((percentage_change - 0.5).abs() < 1e-9);
                assert!((minimum - 1.0).abs() < 1e-9);
            }
            other => panic!("expected percentage failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_crossover_stage_passes_on_cross() {
        let config = ScreenConfig {
            include_crossover: true,
            ..ScreenConfig::default()
        };
        let w = window(&config);
        let source = passing_stub("VNM", &w).respond("VNM", w.crossover_range(), crossover_bars());
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        match result.outcome {
            ScreenOutcome::Pass(details) => {
                assert_eq!(details.crossover, Some(Crossover::BullishCross))
            }
            other => panic!("expected pass, got {:?}", other),
        }
        assert_eq!(pipeline.source.call_count(), 4);
    }

    #[tokio::test]
    async fn test_crossover_stage_fails_when_tenkan_stays_below() {
        let config = ScreenConfig {
            include_crossover: true,
            ..ScreenConfig::default()
        };
        let w = window(&config);
        let end = Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap();
        // Steady decline: recent highs stay under the older highs, so Tenkan < Kijun throughout
        let falling: Vec<Bar> = (0..25)
            .rev()
            .map(|i| {
                let price = 100.0 + i as f64;
                Bar::new(end - Duration::days(i), price, 1_000.0).with_range(price + 1.0, price - 1.0)
            })
            .collect();
        let source = passing_stub("VNM", &w).respond("VNM", w.crossover_range(), falling);
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        assert_eq!(result.outcome, ScreenOutcome::Fail(FailReason::NoCrossover));
    }

    #[tokio::test]
    async fn test_empty_analysis_session_fails_volume_check() {
        let config = ScreenConfig::default();
        let w = window(&config);
        let source = StubSource::default()
            .respond("VNM", w.main_range(), main_series(100.0, 110.0))
            .respond("VNM", w.analysis_session.range(), Vec::new())
            .respond("VNM", w.comparison_session.range(), vec![bar(11, 100.0, 100.0)]);
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        match result.outcome {
            ScreenOutcome::Fail(FailReason::VolumeBelowThreshold {
                today_volume,
                comparison_volume,
                ..
            }) => {
                assert!(today_volume.abs() < 1e-9);
                assert!((comparison_volume - 100.0).abs() < 1e-9);
            }
            other => panic!("expected volume failure, got {:?}", other),
        }
        assert_eq!(pipeline.source.call_count(), 3);
    }

    #[tokio::test]
    async fn test_crossover_stage_passes_while_tenkan_stays_above() {
        let config = ScreenConfig {
            include_crossover: true,
            ..ScreenConfig::default()
        };
        let w = window(&config);
        let end = Utc.with_ymd_and_hms(2024, 3, 12, 0, 0, 0).unwrap();
        // Steady rise: the Kijun window reaches back to older, lower lows, so Tenkan > Kijun
        // on both of the last two bars without a fresh cross
        let rising: Vec<Bar> = (0..25)
            .rev()
            .map(|i| {
                let price = 125.0 - i as f64;
                Bar::new(end - Duration::days(i), price, 1_000.0).with_range(price + 1.0, price - 1.0)
            })
            .collect();
        let source = passing_stub("VNM", &w).respond("VNM", w.crossover_range(), rising);
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        match result.outcome {
            ScreenOutcome::Pass(details) => assert_eq!(details.crossover, Some(Crossover::Above)),
            other => panic!("expected pass, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_crossover_needs_two_bars() {
        let config = ScreenConfig {
            include_crossover: true,
            ..ScreenConfig::default()
        };
        let w = window(&config);
        let source = passing_stub("VNM", &w).respond("VNM", w.crossover_range(), vec![bar(12, 102.0, 1.0)]);
        let pipeline = ScreeningPipeline::new(source, config, w);

        let result = pipeline.evaluate("VNM").await;
        assert_eq!(
            result.outcome,
            ScreenOutcome::Fail(FailReason::InsufficientData {
                stage: Stage::Crossover,
                bars: 1
            })
        );
    }
}

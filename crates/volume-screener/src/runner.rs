use analysis_core::{AnalysisError, MarketDataSource};
use futures::stream::{self, StreamExt};

use crate::models::{GroupResult, ScreenOutcome, ScreenReport, TickerGroup, TickerResult};
use crate::pipeline::ScreeningPipeline;

/// Supplies ticker lists grouped by exchange
pub trait TickerListProvider {
    fn groups(&self) -> Result<Vec<TickerGroup>, AnalysisError>;
}

impl TickerListProvider for Vec<TickerGroup> {
    fn groups(&self) -> Result<Vec<TickerGroup>, AnalysisError> {
        Ok(self.clone())
    }
}

/// Receives progress while a batch runs
pub trait ResultSink: Send + Sync {
    fn group_started(&self, _group: &TickerGroup) {}

    fn ticker_evaluated(&self, group: &str, result: &TickerResult);

    fn group_finished(&self, _result: &GroupResult) {}
}

/// Logs progress through `tracing`
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn group_started(&self, group: &TickerGroup) {
        tracing::info!(
            "####################### ANALYZING {} ({} tickers) #######################",
            group.name,
            group.tickers.len()
        );
    }

    fn ticker_evaluated(&self, group: &str, result: &TickerResult) {
        match &result.outcome {
            ScreenOutcome::Pass(_) => {
                tracing::info!("[{}] {} {}", group, result.symbol, result.outcome.reason())
            }
            ScreenOutcome::Fail(reason) => tracing::info!(
                "[{}] {} does not pass at {} stage: {}",
                group,
                result.symbol,
                reason.stage().name(),
                reason
            ),
        }
    }

    fn group_finished(&self, result: &GroupResult) {
        tracing::info!("{} Result: {:?}", result.group, result.passing);
    }
}

/// Runs the screening pipeline over every ticker group.
///
/// Per-ticker failures are recorded as non-passes and never abort the batch.
/// Within a group at most `concurrency` tickers are in flight, and results are
/// always reported in ticker-list order.
pub struct BatchRunner<S> {
    pipeline: ScreeningPipeline<S>,
    sink: Box<dyn ResultSink>,
    concurrency: usize,
}

impl<S: MarketDataSource> BatchRunner<S> {
    pub fn new(pipeline: ScreeningPipeline<S>) -> Self {
        let concurrency = pipeline.config().concurrency.max(1);
        Self {
            pipeline,
            sink: Box::new(TracingSink),
            concurrency,
        }
    }

    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Screen one group, returning its passing tickers in input order
    pub async fn run_group(&self, group: &TickerGroup) -> GroupResult {
        self.sink.group_started(group);

        let mut evaluations = std::pin::pin!(stream::iter(group.tickers.iter())
            .map(|symbol| self.pipeline.evaluate(symbol))
            .buffered(self.concurrency));

        let mut passing = Vec::new();
        while let Some(result) = evaluations.next().await {
            self.sink.ticker_evaluated(&group.name, &result);
            if result.outcome.is_pass() {
                passing.push(result.symbol);
            }
        }

        let result = GroupResult {
            group: group.name.clone(),
            passing,
        };
        self.sink.group_finished(&result);
        result
    }

    /// Screen every group from `provider`. Groups with no passing tickers are left
    /// out of the report.
    pub async fn run(&self, provider: &dyn TickerListProvider) -> Result<ScreenReport, AnalysisError> {
        let window = self.pipeline.window();
        let mut groups = Vec::new();

        for group in provider.groups()? {
            let result = self.run_group(&group).await;
            if !result.passing.is_empty() {
                groups.push(result);
            }
        }

        let report = ScreenReport {
            analysis_day: window.analysis_day,
            comparison_day: window.comparison_day,
            groups,
        };
        tracing::info!(
            "Screen complete: {} passing tickers across {} groups",
            report.total_passing(),
            report.groups.len()
        );
        Ok(report)
    }
}

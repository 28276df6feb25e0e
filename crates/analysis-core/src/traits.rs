use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AnalysisError, PriceSeries};

/// Source of daily OHLCV history for a symbol
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch bars whose timestamps fall in the inclusive range `[from, to]`.
    async fn fetch_history(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PriceSeries, AnalysisError>;
}

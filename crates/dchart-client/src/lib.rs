use analysis_core::{AnalysisError, MarketDataSource, PriceSeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration;

mod parser;

pub use parser::parse_history;

const DEFAULT_BASE_URL: &str = "https://dchart-api.vndirect.com.vn";
const HISTORY_PATH: &str = "/dchart/history";
/// Daily resolution
const RESOLUTION: &str = "D";

/// HTTP client for the dchart history endpoint.
///
/// Every request is a single attempt. Failures are returned to the caller, which
/// decides whether the ticker simply has no data.
#[derive(Clone)]
pub struct DchartClient {
    base_url: String,
    client: Client,
}

impl Default for DchartClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DchartClient {
    /// Client for the public endpoint, overridable with `DCHART_BASE_URL`.
    pub fn new() -> Self {
        let base_url = std::env::var("DCHART_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the raw history payload for `symbol` over the inclusive range `[from, to]`.
    pub async fn fetch_raw(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<String, AnalysisError> {
        let url = format!("{}{}", self.base_url, HISTORY_PATH);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("resolution", RESOLUTION.to_string()),
                ("from", from.timestamp().to_string()),
                ("to", to.timestamp().to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Failed to download {}: {}", symbol, e);
                AnalysisError::ApiError(format!("{}: {}", symbol, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::warn!("Failed to download {}: HTTP {}", symbol, status);
            return Err(AnalysisError::ApiError(format!(
                "{}: HTTP {}: {}",
                symbol,
                status,
                response.text().await.unwrap_or_default()
            )));
        }

        response.text().await.map_err(|e| {
            tracing::warn!("Failed to read response body for {}: {}", symbol, e);
            AnalysisError::ApiError(format!("{}: {}", symbol, e))
        })
    }
}

#[async_trait]
impl MarketDataSource for DchartClient {
    async fn fetch_history(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PriceSeries, AnalysisError> {
        let body = self.fetch_raw(symbol, from, to).await?;
        let series = parse_history(&body).map_err(|e| {
            tracing::debug!("Unusable history payload for {}: {}", symbol, e);
            e
        })?;
        tracing::debug!(
            "Fetched {} bars for {} ({} .. {})",
            series.len(),
            symbol,
            from,
            to
        );
        Ok(series)
    }
}

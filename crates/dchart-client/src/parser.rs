use analysis_core::{AnalysisError, Bar, PriceSeries};
use chrono::DateTime;
use serde::Deserialize;

/// Raw history payload: parallel arrays keyed by single-letter field names.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    t: Option<Vec<i64>>,
    #[serde(default)]
    o: Option<Vec<f64>>,
    #[serde(default)]
    h: Option<Vec<f64>>,
    #[serde(default)]
    l: Option<Vec<f64>>,
    #[serde(default)]
    c: Option<Vec<f64>>,
    #[serde(default)]
    v: Option<Vec<f64>>,
}

/// Decode a history payload into a [`PriceSeries`].
///
/// An empty body, undecodable JSON, `null` or a payload without `t` is
/// [`AnalysisError::NoData`]. Ragged arrays and out-of-order timestamps are
/// [`AnalysisError::InvalidData`]; the parser never re-sorts.
pub fn parse_history(body: &str) -> Result<PriceSeries, AnalysisError> {
    if body.trim().is_empty() {
        return Err(AnalysisError::NoData("empty response body".to_string()));
    }

    let response: Option<HistoryResponse> = serde_json::from_str(body)
        .map_err(|e| AnalysisError::NoData(format!("invalid JSON response: {}", e)))?;

    let response = response.ok_or_else(|| AnalysisError::NoData("null payload".to_string()))?;
    let timestamps = response
        .t
        .ok_or_else(|| AnalysisError::NoData("payload has no timestamp field".to_string()))?;

    let closes = required(response.c, "c", timestamps.len())?;
    let volumes = required(response.v, "v", timestamps.len())?;
    let opens = optional(response.o, "o", timestamps.len())?;
    let highs = optional(response.h, "h", timestamps.len())?;
    let lows = optional(response.l, "l", timestamps.len())?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &t) in timestamps.iter().enumerate() {
        let timestamp = DateTime::from_timestamp(t, 0)
            .ok_or_else(|| AnalysisError::InvalidData(format!("timestamp out of range: {}", t)))?;
        bars.push(Bar {
            timestamp,
            open: opens.as_ref().map(|o| o[i]),
            high: highs.as_ref().map(|h| h[i]),
            low: lows.as_ref().map(|l| l[i]),
            close: closes[i],
            volume: volumes[i],
        });
    }

    PriceSeries::new(bars)
}

fn required(values: Option<Vec<f64>>, field: &str, expected: usize) -> Result<Vec<f64>, AnalysisError> {
    let values = values.unwrap_or_default();
    if values.len() != expected {
        return Err(AnalysisError::InvalidData(format!(
            "field '{}' has {} values, expected {}",
            field,
            values.len(),
            expected
        )));
    }
    Ok(values)
}

fn optional(
    values: Option<Vec<f64>>,
    field: &str,
    expected: usize,
) -> Result<Option<Vec<f64>>, AnalysisError> {
    match values {
        Some(v) if v.len() != expected => Err(AnalysisError::InvalidData(format!(
            "field '{}' has {} values, expected {}",
            field,
            v.len(),
            expected
        ))),
        other => Ok(other),
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use technical_analysis::Crossover;

/// Pipeline stage, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Fetch,
    VolumeSpike,
    PercentageChange,
    Crossover,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::VolumeSpike => "volume spike",
            Stage::PercentageChange => "percentage change",
            Stage::Crossover => "crossover",
        }
    }
}

/// Why a ticker did not pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FailReason {
    /// Fetch failed, payload was unusable, or the series was empty
    NoData { stage: Stage },
    /// Payload decoded but the values cannot be evaluated
    InvalidData { stage: Stage, detail: String },
    /// Fewer bars than the stage needs
    InsufficientData { stage: Stage, bars: usize },
    VolumeBelowThreshold {
        today_volume: f64,
        comparison_volume: f64,
        threshold: f64,
    },
    PercentageChangeTooSmall { percentage_change: f64, minimum: f64 },
    NoCrossover,
}

impl FailReason {
    pub fn stage(&self) -> Stage {
        match self {
            FailReason::NoData { stage }
            | FailReason::InvalidData { stage, .. }
            | FailReason::InsufficientData { stage, .. } => *stage,
            FailReason::VolumeBelowThreshold { .. } => Stage::VolumeSpike,
            FailReason::PercentageChangeTooSmall { .. } => Stage::PercentageChange,
            FailReason::NoCrossover => Stage::Crossover,
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::NoData { stage } => write!(f, "no data ({})", stage.name()),
            FailReason::InvalidData { stage, detail } => {
                write!(f, "invalid data ({}): {}", stage.name(), detail)
            }
            FailReason::InsufficientData { stage, bars } => {
                write!(f, "insufficient data ({}): {} bars", stage.name(), bars)
            }
            FailReason::VolumeBelowThreshold {
                today_volume,
                comparison_volume,
                threshold,
            } => write!(
                f,
                "does not meet volume change criteria ({:.0} vs {:.0} x {})",
                today_volume, comparison_volume, threshold
            ),
            FailReason::PercentageChangeTooSmall {
                percentage_change,
                minimum,
            } => write!(
                f,
                "does not meet criteria (percentage change {:.2}% <= {}%)",
                percentage_change, minimum
            ),
            FailReason::NoCrossover => write!(f, "no Tenkan/Kijun crossover"),
        }
    }
}

/// Measurements of a ticker that cleared every enabled stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDetails {
    pub today_volume: f64,
    pub comparison_volume: f64,
    pub percentage_change: f64,
    #[serde(default)]
    pub crossover: Option<Crossover>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScreenOutcome {
    Pass(PassDetails),
    Fail(FailReason),
}

impl ScreenOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ScreenOutcome::Pass(_))
    }

    /// Human-readable reason for the outcome
    pub fn reason(&self) -> String {
        match self {
            ScreenOutcome::Pass(details) => match details.crossover {
                Some(cross) => format!("meets criteria ({})", cross.to_label()),
                None => "meets criteria".to_string(),
            },
            ScreenOutcome::Fail(reason) => reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerResult {
    pub symbol: String,
    pub outcome: ScreenOutcome,
}

/// Tickers from one exchange list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerGroup {
    pub name: String,
    pub tickers: Vec<String>,
}

impl TickerGroup {
    pub fn new(name: impl Into<String>, tickers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tickers,
        }
    }
}

/// Passing tickers of one group, in ticker-list order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupResult {
    pub group: String,
    pub passing: Vec<String>,
}

/// Result of a full run. Groups without passing tickers are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenReport {
    pub analysis_day: NaiveDate,
    pub comparison_day: NaiveDate,
    pub groups: Vec<GroupResult>,
}

impl ScreenReport {
    pub fn total_passing(&self) -> usize {
        self.groups.iter().map(|g| g.passing.len()).sum()
    }

    /// Passing symbols for `group`, if it produced any
    pub fn passing(&self, group: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|g| g.group == group)
            .map(|g| g.passing.as_slice())
    }
}

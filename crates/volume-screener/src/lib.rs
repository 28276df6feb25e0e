//! End-of-day volume-spike screener.
//!
//! Each ticker goes through fetch, volume-spike, percentage-change and (optionally)
//! Tenkan/Kijun crossover stages; the batch runner groups passing tickers by the
//! exchange list they came from.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod tickers;
pub mod window;

pub use config::*;
pub use models::*;
pub use pipeline::ScreeningPipeline;
pub use runner::{BatchRunner, ResultSink, TickerListProvider, TracingSink};
pub use tickers::DirectoryTickerSource;
pub use window::AnalysisWindow;

//! volume-screener: end-of-day volume-spike screen over exchange ticker lists.
//!
//! Reads one `.txt` ticker list per exchange from a directory, screens every ticker
//! against the dchart history endpoint and prints the passing tickers per exchange.
//!
//! Usage:
//!   cargo run -p screener-cli -- --dir exchanges/
//!   cargo run -p screener-cli -- --dir exchanges/ --crossover --json
//!   cargo run -p screener-cli -- --day-check 0 --threshold 2.0 --concurrency 4

use dchart_client::DchartClient;
use volume_screener::{
    AnalysisWindow, BatchRunner, DirectoryTickerSource, ScreenConfig, ScreenReport,
    ScreeningPipeline,
};

const DEFAULT_DIR: &str = "exchanges/";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "volume_screener=info,dchart_client=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = apply_args(ScreenConfig::from_env(), &args);
    config.validate()?;

    let dir = flag_value(&args, "--dir").unwrap_or(DEFAULT_DIR);
    let json = args.iter().any(|a| a == "--json");

    let window = AnalysisWindow::current(&config)?;
    tracing::info!(
        "volume-screener: analysis day {} vs {}, threshold {}, crossover={}, concurrency={}, dir={}",
        window.analysis_day,
        window.comparison_day,
        config.volume_threshold,
        config.include_crossover,
        config.concurrency,
        dir
    );

    let client = DchartClient::new();
    tracing::debug!("Using history endpoint {}", client.base_url());

    let tickers = DirectoryTickerSource::new(dir);
    tracing::debug!("Reading ticker lists from {}", tickers.dir().display());

    let runner = BatchRunner::new(ScreeningPipeline::new(client, config, window));
    let report = runner.run(&tickers).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

/// Command-line flags override environment configuration
fn apply_args(mut config: ScreenConfig, args: &[String]) -> ScreenConfig {
    if let Some(v) = parsed_flag(args, "--day-check") {
        config.day_check = v;
    }
    if let Some(v) = parsed_flag(args, "--threshold") {
        config.volume_threshold = v;
    }
    if let Some(v) = parsed_flag(args, "--concurrency") {
        config.concurrency = v;
    }
    if args.iter().any(|a| a == "--crossover") {
        config.include_crossover = true;
    }
    config
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parsed_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let raw = flag_value(args, flag)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", flag, raw);
            None
        }
    }
}

fn render_report(report: &ScreenReport) -> String {
    let mut out = format!(
        "####################### RESULT ({} vs {}) #######################\n",
        report.analysis_day, report.comparison_day
    );
    if report.groups.is_empty() {
        out.push_str("No tickers meet criteria.\n");
    }
    for group in &report.groups {
        out.push_str(&format!("{}: {}\n", group.group, group.passing.join(", ")));
    }
    out
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  volume-screener [--dir PATH] [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --dir PATH         Directory of <exchange>.txt ticker lists (default: {})", DEFAULT_DIR);
    eprintln!("  --day-check N      Days back from today to the analysis day (env DAYCHECK)");
    eprintln!("  --threshold X      Volume-spike multiplier (env PERCENTAGE_HIGH_VOLUME)");
    eprintln!("  --crossover        Also require a Tenkan/Kijun crossover (env SCREENER_CROSSOVER)");
    eprintln!("  --concurrency N    Tickers screened at once per exchange (env SCREENER_CONCURRENCY)");
    eprintln!("  --json             Print the final report as JSON");
    eprintln!();
    eprintln!("Environment: SCREENER_UTC_OFFSET (market offset hours), DCHART_BASE_URL, RUST_LOG");
}

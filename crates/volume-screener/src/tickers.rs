use analysis_core::AnalysisError;
use std::path::{Path, PathBuf};

use crate::models::TickerGroup;
use crate::runner::TickerListProvider;

/// Ticker lists read from a directory of `.txt` files, one symbol per line.
///
/// Each file is one group named after its upper-cased file stem (`hose.txt` ->
/// `HOSE`). Files are visited in file-name order.
#[derive(Debug, Clone)]
pub struct DirectoryTickerSource {
    dir: PathBuf,
}

impl DirectoryTickerSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn list_files(&self) -> Result<Vec<PathBuf>, AnalysisError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_ticker_file(&path) {
                files.push(path);
            } else {
                tracing::debug!("Skipping {}", path.display());
            }
        }
        files.sort();
        Ok(files)
    }
}

impl TickerListProvider for DirectoryTickerSource {
    fn groups(&self) -> Result<Vec<TickerGroup>, AnalysisError> {
        self.list_files()?
            .iter()
            .map(|path| Ok(TickerGroup::new(group_name(path), read_tickers(path)?)))
            .collect()
    }
}

fn is_ticker_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

/// Upper-cased file stem
pub fn group_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}

/// Read one ticker list file
pub fn read_tickers(path: &Path) -> Result<Vec<String>, AnalysisError> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_tickers(&contents))
}

/// One symbol per line; surrounding whitespace is trimmed and blank lines skipped.
pub fn parse_tickers(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

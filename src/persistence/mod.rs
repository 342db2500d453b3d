use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::models::{Candidate, CandidateFile, PriceSeries};

/// Load the candidate file written by the last screening pass.
///
/// A missing file is an empty registry, not a startup error - the bot may
/// simply never have screened yet.
pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no candidate file, starting empty");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let file: CandidateFile = serde_json::from_str(&raw)
        .with_context(|| format!("malformed candidate file {}", path.display()))?;
    Ok(file.stocks)
}

/// Write the candidate list wholesale, replacing any previous contents
pub fn save_candidates(path: &Path, candidates: &[Candidate]) -> Result<()> {
    let file = CandidateFile {
        stocks: candidates.to_vec(),
    };
    let raw = serde_json::to_string_pretty(&file)?;
    fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), count = candidates.len(), "saved candidates");
    Ok(())
}

/// Load the instrument universe: a JSON array of instrument codes
pub fn load_universe(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read universe file {}", path.display()))?;
    let codes: Vec<String> = serde_json::from_str(&raw)
        .with_context(|| format!("malformed universe file {}", path.display()))?;
    Ok(codes)
}

/// Per-instrument daily bar storage: one JSON file per code under a
/// directory, each an array of bars. The store sorts on load, so files
/// may arrive newest-first from the chart fetcher.
pub struct SeriesStore {
    dir: PathBuf,
}

impl SeriesStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, stock_code: &str) -> PathBuf {
        self.dir.join(format!("{stock_code}.json"))
    }

    /// Load one instrument's history. `None` when no data has been
    /// fetched for it; the screening pass skips such instruments.
    pub fn load(&self, stock_code: &str) -> Result<Option<PriceSeries>> {
        let path = self.path_for(stock_code);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let bars = serde_json::from_str(&raw)
            .with_context(|| format!("malformed series file {}", path.display()))?;
        Ok(Some(PriceSeries::new(stock_code, bars)))
    }

    pub fn save(&self, series: &PriceSeries) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.path_for(&series.stock_code);
        let raw = serde_json::to_string_pretty(series.bars())?;
        fs::write(&path, raw).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}

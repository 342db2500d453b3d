use crate::indicators::{calculate_sma, sma_series};
use crate::models::{Candidate, PriceSeries};

/// Screening thresholds. Defaults mirror the production filter: 5/20-day
/// price averages, 5-day volume average, a 15-day cross lookback and the
/// tiered KRW liquidity floors.
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    pub short_window: usize,
    pub long_window: usize,
    pub volume_window: usize,
    /// How many recent sessions to scan for the golden cross
    pub cross_lookback: usize,
    /// How far back the long average is anchored for the uptrend check
    pub trend_lookback: usize,
    pub price_floor: i64,
    pub mid_price_ceiling: i64,
    pub mid_volume_floor: f64,
    pub high_volume_floor: f64,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 20,
            volume_window: 5,
            cross_lookback: 15,
            trend_lookback: 15,
            price_floor: 2_000,
            mid_price_ceiling: 10_000,
            mid_volume_floor: 500_000.0,
            high_volume_floor: 100_000.0,
        }
    }
}

/// Golden-cross screening engine.
///
/// Scans one instrument's daily history for a recent short-over-long
/// moving-average cross that has held through to the latest bar, with the
/// long average itself rising, then applies the liquidity filter. A series
/// that fails any condition yields `None`; nothing here is an error.
pub struct Screener {
    config: ScreenConfig,
}

impl Screener {
    pub fn new(config: ScreenConfig) -> Self {
        Self { config }
    }

    /// Screen one instrument's history.
    ///
    /// Returns a `Candidate` carrying the latest long moving average as
    /// its reference price when every filter passes.
    pub fn screen(&self, series: &PriceSeries) -> Option<Candidate> {
        let cfg = &self.config;

        if series.len() < cfg.long_window {
            return None;
        }

        let closes = series.closes();
        let volumes = series.volumes();

        let short = sma_series(&closes, cfg.short_window);
        let long = sma_series(&closes, cfg.long_window);

        // Align the short average to the long average's tail; rows where
        // the long average is undefined are dropped entirely.
        let usable = long.len();
        if usable < cfg.long_window {
            return None;
        }
        let short = &short[short.len() - usable..];

        let cross = self.find_recent_cross(short, &long)?;

        if !holds_above_after(short, &long, cross) {
            return None;
        }

        if !self.long_average_rising(&long) {
            return None;
        }

        let last_close = series.last_close()?;
        let avg_volume = calculate_sma(&volumes, cfg.volume_window)?;
        if !self.passes_liquidity(last_close, avg_volume) {
            return None;
        }

        Some(Candidate {
            stock_code: series.stock_code.clone(),
            price: long.last().copied()?,
        })
    }

    /// Screen a whole universe in one pass. Instruments without a series
    /// are expected to have been skipped by the caller; the output
    /// replaces any previous candidate set wholesale.
    pub fn screen_universe<'a, I>(&self, all: I) -> Vec<Candidate>
    where
        I: IntoIterator<Item = &'a PriceSeries>,
    {
        let mut candidates = Vec::new();
        let mut scanned = 0usize;

        for series in all {
            scanned += 1;
            if let Some(candidate) = self.screen(series) {
                tracing::debug!(
                    stock_code = %candidate.stock_code,
                    reference_price = candidate.price,
                    "passed screening"
                );
                candidates.push(candidate);
            }
        }

        tracing::info!(scanned, passed = candidates.len(), "screening pass complete");
        candidates
    }

    /// Most recent session offset `i` (1 = today) where the short average
    /// moved from strictly below to strictly above the long average.
    /// Ties count as "not crossed" on both sides.
    fn find_recent_cross(&self, short: &[f64], long: &[f64]) -> Option<usize> {
        let n = long.len();
        for i in 1..=self.config.cross_lookback.min(n - 1) {
            let crossed_up = short[n - i - 1] < long[n - i - 1] && short[n - i] > long[n - i];
            if crossed_up {
                return Some(i);
            }
        }
        None
    }

    /// Strict day-over-day rise across the last three long-average values,
    /// each above the value `trend_lookback` sessions back.
    fn long_average_rising(&self, long: &[f64]) -> bool {
        let n = long.len();
        if n < self.config.trend_lookback || n < 3 {
            return false;
        }
        let anchor = long[n - self.config.trend_lookback];
        long[n - 1] > long[n - 2] && long[n - 2] > long[n - 3] && long[n - 3] > anchor
    }

    /// Tiered liquidity floor keyed on the latest close
    fn passes_liquidity(&self, last_close: i64, avg_volume: f64) -> bool {
        let cfg = &self.config;
        if last_close < cfg.price_floor {
            return false;
        }
        if last_close < cfg.mid_price_ceiling {
            avg_volume >= cfg.mid_volume_floor
        } else {
            avg_volume >= cfg.high_volume_floor
        }
    }
}

impl Default for Screener {
    fn default() -> Self {
        Self::new(ScreenConfig::default())
    }
}

/// True when the short average never dips back below the long average
/// between the cross session and today
fn holds_above_after(short: &[f64], long: &[f64], cross: usize) -> bool {
    let n = long.len();
    for j in 1..cross {
        if short[n - j] < long[n - j] {
            return false;
        }
    }
    true
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar. Prices are integer ticks as reported by the
/// brokerage terminal; open/high/low are optional because some chart
/// sources deliver close and volume only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Trading date, string-sortable ascending (e.g. "20240301")
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<i64>,
    pub close: i64,
    pub volume: i64,
}

/// Daily bar history for one instrument, sorted ascending by date with
/// duplicate dates dropped (first occurrence wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub stock_code: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(stock_code: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.sort_by(|a, b| a.date.cmp(&b.date));
        bars.dedup_by(|a, b| a.date == b.date);
        Self {
            stock_code: stock_code.into(),
            bars,
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<i64> {
        self.bars.last().map(|b| b.close)
    }

    /// Closing prices in date order, widened for moving-average math
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close as f64).collect()
    }

    /// Traded volumes in date order, widened for moving-average math
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume as f64).collect()
    }
}

/// An instrument that passed every screening filter and is eligible for
/// automated purchase. `price` is the long (20-day) moving average at
/// detection time - the reference price the scheduler compares live
/// quotes against. Field names match the candidate file format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub stock_code: String,
    pub price: f64,
}

/// On-disk candidate list: `{"stocks": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateFile {
    pub stocks: Vec<Candidate>,
}

/// A submitted, broker-acknowledged, not-yet-filled buy order. At most
/// one per instrument; its presence blocks re-selection by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub stock_code: String,
    pub order_ref: String,
    pub submitted_at: DateTime<Utc>,
}

/// Account holding reported by the brokerage. Read-only to the bot;
/// used only to exclude instruments from the candidate registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldPosition {
    pub stock_code: String,
    pub quantity: i64,
    pub average_buy_price: i64,
}

/// Terminal state of an order as reported by the fill event feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Filled,
    Partial,
    Rejected,
}

/// Execution event delivered by the brokerage terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub stock_code: String,
    pub status: FillStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, close: i64, volume: i64) -> Bar {
        Bar {
            date: date.to_string(),
            open: None,
            high: None,
            low: None,
            close,
            volume,
        }
    }

    #[test]
    fn test_series_sorts_ascending_by_date() {
        let series = PriceSeries::new(
            "005930",
            vec![
                bar("20240305", 300, 10),
                bar("20240301", 100, 10),
                bar("20240304", 200, 10),
            ],
        );

        let dates: Vec<&str> = series.bars().iter().map(|b| b.date.as_str()).collect();
        assert_eq!(dates, vec!["20240301", "20240304", "20240305"]);
        assert_eq!(series.last_close(), Some(300));
    }

    #[test]
    fn test_series_drops_duplicate_dates() {
        let series = PriceSeries::new(
            "005930",
            vec![
                bar("20240301", 100, 10),
                bar("20240301", 999, 10),
                bar("20240302", 200, 10),
            ],
        );

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars()[0].close, 100);
    }

    #[test]
    fn test_fill_status_wire_format() {
        let event: FillEvent =
            serde_json::from_str(r#"{"stock_code":"A001","status":"filled"}"#).unwrap();
        assert_eq!(event.status, FillStatus::Filled);

        let event: FillEvent =
            serde_json::from_str(r#"{"stock_code":"A001","status":"partial"}"#).unwrap();
        assert_eq!(event.status, FillStatus::Partial);
    }

    #[test]
    fn test_bar_accepts_close_and_volume_only() {
        let bar: Bar = serde_json::from_str(r#"{"date":"20240301","close":8500,"volume":120000}"#)
            .unwrap();
        assert_eq!(bar.close, 8500);
        assert_eq!(bar.open, None);
    }
}

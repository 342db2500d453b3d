use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};

use crate::api::GatewayError;
use crate::models::{Bar, PriceSeries};

const DEFAULT_MIN_BARS: usize = 60;
const DEFAULT_MAX_PAGES: usize = 10;
// The terminal throttles chart lookups; one request a second keeps it happy
const DEFAULT_PAGES_PER_SECOND: u32 = 1;

// Type alias for the rate limiter to simplify signatures
type PageRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// One page of a daily chart response, newest bars first
#[derive(Debug, Clone)]
pub struct BarPage {
    pub bars: Vec<Bar>,
    /// Whether the terminal holds further pages for this request
    pub more: bool,
}

/// Paginated daily-chart collaborator.
///
/// `continuation` is false on the first page of a request and true on
/// every follow-up, mirroring the terminal's "previous/next" flag.
#[async_trait]
pub trait DailyChartSource: Send + Sync {
    async fn fetch_chart_page(
        &self,
        stock_code: &str,
        continuation: bool,
    ) -> Result<BarPage, GatewayError>;
}

/// Assembles a full daily history from a paginated chart source.
///
/// Awaits a rate limiter before each page rather than spinning on a
/// "data received" flag, and stops as soon as enough bars have arrived
/// or the source reports no more pages.
pub struct HistoryFetcher<S> {
    source: S,
    rate_limiter: Arc<PageRateLimiter>,
    min_bars: usize,
    max_pages: usize,
}

impl<S: DailyChartSource> HistoryFetcher<S> {
    pub fn new(source: S) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(DEFAULT_PAGES_PER_SECOND).unwrap());
        Self {
            source,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            min_bars: DEFAULT_MIN_BARS,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_min_bars(mut self, min_bars: usize) -> Self {
        self.min_bars = min_bars;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_quota(mut self, quota: Quota) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::direct(quota));
        self
    }

    /// Fetch pages until `min_bars` bars have arrived or the source is
    /// exhausted, keeping the newest `min_bars` bars, and assemble them
    /// into a date-sorted series.
    pub async fn fetch_daily_series(&self, stock_code: &str) -> crate::Result<PriceSeries> {
        let mut bars: Vec<Bar> = Vec::new();
        let mut continuation = false;

        for page_no in 0..self.max_pages {
            self.rate_limiter.until_ready().await;

            let page = self.source.fetch_chart_page(stock_code, continuation).await?;
            tracing::debug!(
                stock_code,
                page_no,
                received = page.bars.len(),
                more = page.more,
                "chart page received"
            );
            bars.extend(page.bars);

            if bars.len() >= self.min_bars || !page.more {
                break;
            }
            continuation = true;
        }

        // Pages arrive newest-first, so truncation keeps the most recent bars
        bars.truncate(self.min_bars);

        tracing::info!(stock_code, bars = bars.len(), "daily history assembled");
        Ok(PriceSeries::new(stock_code, bars))
    }
}

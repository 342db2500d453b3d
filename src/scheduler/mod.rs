use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::BrokerGateway;
use crate::models::{Candidate, PendingOrder};
use crate::registry::CandidateRegistry;

/// Everything the trading loops share: the candidate registry, orders
/// awaiting fills, the cached cash balance and the held-instrument set.
/// One lock guards it all; nothing holds the lock across an await.
#[derive(Default)]
pub struct BotState {
    pub registry: CandidateRegistry,
    pub pending: HashMap<String, PendingOrder>,
    pub balance: Option<i64>,
    pub held: HashSet<String>,
}

impl BotState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cash committed per order, in the account currency
    pub buy_amount: i64,
    /// Maximum relative gap between live price and reference price
    pub deviation_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            buy_amount: 100_000,
            deviation_threshold: 0.008,
        }
    }
}

/// What one scheduling tick did. Ticks never fail; every condition that
/// stops an order is an outcome, not an error.
#[derive(Debug, PartialEq)]
pub enum TickOutcome {
    /// An order went out for the best-priced candidate
    Submitted {
        stock_code: String,
        quantity: i64,
        order_ref: String,
    },
    /// The cash balance is still unknown; a refresh was requested
    AwaitingBalance,
    /// Known balance is below the per-order amount
    InsufficientFunds,
    /// No candidate had a usable quote inside the deviation threshold
    NoEligibleCandidate,
    /// The live price exceeds the per-order amount, so even one share
    /// does not fit
    QuantityInfeasible { stock_code: String },
    /// The broker refused the order; the candidate stays in the registry
    SubmitRejected { stock_code: String },
}

/// Periodic order placement.
///
/// Each tick picks at most one candidate - the one whose live price sits
/// closest to its screening reference price - and submits a single market
/// buy for it. Instruments with an order in flight or already held are
/// never considered.
pub struct OrderScheduler {
    state: Arc<Mutex<BotState>>,
    gateway: Arc<dyn BrokerGateway>,
    config: SchedulerConfig,
}

impl OrderScheduler {
    pub fn new(
        state: Arc<Mutex<BotState>>,
        gateway: Arc<dyn BrokerGateway>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            state,
            gateway,
            config,
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        // Balance gate first; quotes are pointless without cash on hand
        let balance = {
            let st = self.state.lock().await;
            st.balance
        };

        let balance = match balance {
            Some(b) => b,
            None => {
                match self.gateway.balance().await {
                    Ok(b) => {
                        info!(balance = b, "cash balance received");
                        self.state.lock().await.balance = Some(b);
                    }
                    Err(e) => debug!(error = %e, "balance not ready yet"),
                }
                return TickOutcome::AwaitingBalance;
            }
        };

        if balance < self.config.buy_amount {
            // Re-observe the broker balance so a deposit lifts the idle
            // state; no fill will arrive to refresh it otherwise
            match self.gateway.balance().await {
                Ok(b) => self.state.lock().await.balance = Some(b),
                Err(e) => debug!(error = %e, "balance re-check failed"),
            }
            debug!(
                balance,
                buy_amount = self.config.buy_amount,
                "balance below per-order amount"
            );
            return TickOutcome::InsufficientFunds;
        }

        // Snapshot eligible candidates, then quote them lock-free
        let eligible: Vec<Candidate> = {
            let st = self.state.lock().await;
            st.registry
                .candidates()
                .iter()
                .filter(|c| !st.pending.contains_key(&c.stock_code))
                .filter(|c| !st.held.contains(&c.stock_code))
                .cloned()
                .collect()
        };

        let mut best: Option<(Candidate, i64, f64)> = None;
        for candidate in eligible {
            let live = match self.gateway.last_price(&candidate.stock_code).await {
                Ok(p) => p,
                Err(e) => {
                    debug!(stock_code = %candidate.stock_code, error = %e, "no quote, skipping");
                    continue;
                }
            };
            if live <= 0 || candidate.price <= 0.0 {
                continue;
            }

            let deviation = ((live as f64) - candidate.price).abs() / candidate.price;
            if deviation > self.config.deviation_threshold {
                debug!(
                    stock_code = %candidate.stock_code,
                    live,
                    reference = candidate.price,
                    deviation,
                    "price drifted from reference"
                );
                continue;
            }

            // Strict < keeps the earlier candidate on ties
            let better = match &best {
                Some((_, _, best_dev)) => deviation < *best_dev,
                None => true,
            };
            if better {
                best = Some((candidate, live, deviation));
            }
        }

        let (candidate, live, deviation) = match best {
            Some(b) => b,
            None => return TickOutcome::NoEligibleCandidate,
        };

        let quantity = self.config.buy_amount / live;
        if quantity < 1 {
            warn!(
                stock_code = %candidate.stock_code,
                live,
                buy_amount = self.config.buy_amount,
                "one share exceeds the per-order amount"
            );
            return TickOutcome::QuantityInfeasible {
                stock_code: candidate.stock_code,
            };
        }

        match self
            .gateway
            .submit_market_buy(&candidate.stock_code, quantity)
            .await
        {
            Ok(order_ref) => {
                info!(
                    stock_code = %candidate.stock_code,
                    quantity,
                    live,
                    deviation,
                    order_ref = %order_ref,
                    "market buy submitted"
                );
                let mut st = self.state.lock().await;
                st.pending.insert(
                    candidate.stock_code.clone(),
                    PendingOrder {
                        stock_code: candidate.stock_code.clone(),
                        order_ref: order_ref.clone(),
                        submitted_at: Utc::now(),
                    },
                );
                TickOutcome::Submitted {
                    stock_code: candidate.stock_code,
                    quantity,
                    order_ref,
                }
            }
            Err(e) => {
                warn!(stock_code = %candidate.stock_code, error = %e, "order submission failed");
                TickOutcome::SubmitRejected {
                    stock_code: candidate.stock_code,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use crate::api::GatewayError;
    use crate::models::HeldPosition;

    #[derive(Default)]
    struct StubGateway {
        prices: StdMutex<HashMap<String, i64>>,
        balance: StdMutex<Option<i64>>,
        balance_calls: AtomicUsize,
        submitted: StdMutex<Vec<(String, i64)>>,
        reject_orders: bool,
    }

    impl StubGateway {
        fn with_balance(balance: i64) -> Self {
            let gw = Self::default();
            *gw.balance.lock().unwrap() = Some(balance);
            gw
        }

        fn set_price(&self, code: &str, price: i64) {
            self.prices.lock().unwrap().insert(code.to_string(), price);
        }
    }

    #[async_trait]
    impl BrokerGateway for StubGateway {
        async fn last_price(&self, stock_code: &str) -> Result<i64, GatewayError> {
            self.prices
                .lock()
                .unwrap()
                .get(stock_code)
                .copied()
                .ok_or(GatewayError::Unavailable)
        }

        async fn balance(&self) -> Result<i64, GatewayError> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            self.balance
                .lock()
                .unwrap()
                .ok_or(GatewayError::Unavailable)
        }

        async fn holdings(&self) -> Result<Vec<HeldPosition>, GatewayError> {
            Ok(Vec::new())
        }

        async fn submit_market_buy(
            &self,
            stock_code: &str,
            quantity: i64,
        ) -> Result<String, GatewayError> {
            if self.reject_orders {
                return Err(GatewayError::Rejected("margin".to_string()));
            }
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push((stock_code.to_string(), quantity));
            Ok(format!("ORD-{}", submitted.len()))
        }
    }

    fn candidate(code: &str, price: f64) -> Candidate {
        Candidate {
            stock_code: code.to_string(),
            price,
        }
    }

    fn state_with(candidates: Vec<Candidate>) -> Arc<Mutex<BotState>> {
        let mut state = BotState::new();
        state.balance = Some(1_000_000);
        state.registry.replace_all(candidates, &HashSet::new());
        Arc::new(Mutex::new(state))
    }

    #[tokio::test]
    async fn test_picks_smallest_deviation() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        // A001 drifted 0.6%, C003 only 0.3%
        gateway.set_price("A001", 10_060);
        gateway.set_price("C003", 20_060);

        let state = state_with(vec![
            candidate("A001", 10_000.0),
            candidate("C003", 20_000.0),
        ]);
        let scheduler = OrderScheduler::new(state, gateway, SchedulerConfig::default());

        let outcome = scheduler.tick().await;
        match outcome {
            TickOutcome::Submitted {
                stock_code,
                quantity,
                ..
            } => {
                assert_eq!(stock_code, "C003");
                assert_eq!(quantity, 100_000 / 20_060);
            }
            other => panic!("expected submission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_one_order_per_tick() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        gateway.set_price("A001", 10_000);
        gateway.set_price("B002", 5_000);
        gateway.set_price("C003", 20_000);

        let state = state_with(vec![
            candidate("A001", 10_000.0),
            candidate("B002", 5_000.0),
            candidate("C003", 20_000.0),
        ]);
        let scheduler =
            OrderScheduler::new(state, gateway.clone(), SchedulerConfig::default());

        scheduler.tick().await;
        assert_eq!(gateway.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_a_no_op() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        gateway.set_price("A001", 10_000);

        let state = state_with(vec![candidate("A001", 10_000.0)]);
        {
            state.lock().await.balance = Some(50_000);
        }
        let scheduler =
            OrderScheduler::new(state, gateway.clone(), SchedulerConfig::default());

        assert_eq!(scheduler.tick().await, TickOutcome::InsufficientFunds);
        assert!(gateway.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deposit_lifts_insufficient_funds_idle_state() {
        let gateway = Arc::new(StubGateway::with_balance(50_000));
        gateway.set_price("A001", 10_000);

        let state = state_with(vec![candidate("A001", 10_000.0)]);
        {
            state.lock().await.balance = Some(50_000);
        }
        let scheduler =
            OrderScheduler::new(state, gateway.clone(), SchedulerConfig::default());

        // Idle on the cached balance, but each tick re-checks the broker
        assert_eq!(scheduler.tick().await, TickOutcome::InsufficientFunds);
        assert_eq!(gateway.balance_calls.load(Ordering::SeqCst), 1);

        // A deposit arrives; the next tick observes it and trades
        *gateway.balance.lock().unwrap() = Some(1_000_000);
        assert_eq!(scheduler.tick().await, TickOutcome::InsufficientFunds);
        match scheduler.tick().await {
            TickOutcome::Submitted { stock_code, .. } => assert_eq!(stock_code, "A001"),
            other => panic!("expected submission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_equal_deviations_fall_back_to_emission_order() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        // Both quotes sit exactly 0.5% above their references
        gateway.set_price("A001", 10_050);
        gateway.set_price("C003", 20_100);

        let state = state_with(vec![
            candidate("A001", 10_000.0),
            candidate("C003", 20_000.0),
        ]);
        let scheduler = OrderScheduler::new(state, gateway, SchedulerConfig::default());

        match scheduler.tick().await {
            TickOutcome::Submitted { stock_code, .. } => assert_eq!(stock_code, "A001"),
            other => panic!("expected submission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_infeasible_quantity_submits_nothing() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        gateway.set_price("A001", 50_000);

        let state = state_with(vec![candidate("A001", 50_000.0)]);
        let config = SchedulerConfig {
            buy_amount: 1_000,
            ..SchedulerConfig::default()
        };
        let scheduler = OrderScheduler::new(state, gateway.clone(), config);

        assert_eq!(
            scheduler.tick().await,
            TickOutcome::QuantityInfeasible {
                stock_code: "A001".to_string()
            }
        );
        assert!(gateway.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pending_order_blocks_resubmission() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        gateway.set_price("A001", 10_000);

        let state = state_with(vec![candidate("A001", 10_000.0)]);
        let scheduler =
            OrderScheduler::new(state.clone(), gateway.clone(), SchedulerConfig::default());

        match scheduler.tick().await {
            TickOutcome::Submitted { .. } => {}
            other => panic!("expected submission, got {other:?}"),
        }
        // The order is in flight; the same candidate must not fire again
        assert_eq!(scheduler.tick().await, TickOutcome::NoEligibleCandidate);
        assert_eq!(gateway.submitted.lock().unwrap().len(), 1);
        assert!(state.lock().await.pending.contains_key("A001"));
    }

    #[tokio::test]
    async fn test_unknown_balance_defers_then_proceeds() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        gateway.set_price("A001", 10_000);

        let state = state_with(vec![candidate("A001", 10_000.0)]);
        {
            state.lock().await.balance = None;
        }
        let scheduler =
            OrderScheduler::new(state, gateway.clone(), SchedulerConfig::default());

        // First tick only requests the balance
        assert_eq!(scheduler.tick().await, TickOutcome::AwaitingBalance);
        assert!(gateway.submitted.lock().unwrap().is_empty());

        // Second tick trades with the freshly cached balance
        match scheduler.tick().await {
            TickOutcome::Submitted { stock_code, .. } => assert_eq!(stock_code, "A001"),
            other => panic!("expected submission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_order_keeps_candidate() {
        let gateway = Arc::new(StubGateway {
            reject_orders: true,
            ..StubGateway::default()
        });
        *gateway.balance.lock().unwrap() = Some(1_000_000);
        gateway.set_price("A001", 10_000);

        let state = state_with(vec![candidate("A001", 10_000.0)]);
        let scheduler =
            OrderScheduler::new(state.clone(), gateway, SchedulerConfig::default());

        assert_eq!(
            scheduler.tick().await,
            TickOutcome::SubmitRejected {
                stock_code: "A001".to_string()
            }
        );
        let st = state.lock().await;
        assert!(st.registry.contains("A001"));
        assert!(st.pending.is_empty());
    }

    #[tokio::test]
    async fn test_drifted_price_is_skipped() {
        let gateway = Arc::new(StubGateway::with_balance(1_000_000));
        // 2% away from reference, well past the 0.8% threshold
        gateway.set_price("A001", 10_200);

        let state = state_with(vec![candidate("A001", 10_000.0)]);
        let scheduler = OrderScheduler::new(state, gateway, SchedulerConfig::default());

        assert_eq!(scheduler.tick().await, TickOutcome::NoEligibleCandidate);
    }
}

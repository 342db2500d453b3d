use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::api::BrokerGateway;
use crate::models::{FillEvent, FillStatus};
use crate::scheduler::BotState;

#[derive(Debug, PartialEq)]
pub enum ReconcileOutcome {
    /// A tracked order filled; state was updated
    Reconciled { stock_code: String },
    /// Partial fill, rejection, or an event for an untracked order
    Ignored,
}

/// Applies broker fill events to shared state.
///
/// Only complete fills of tracked orders change anything: the pending
/// entry is dropped, the instrument leaves the candidate registry, and
/// the cached balance and holdings are refreshed from the broker.
/// Redelivered events land on an already-empty pending slot and are
/// ignored, so processing is idempotent.
pub struct FillReconciler {
    state: Arc<Mutex<BotState>>,
    gateway: Arc<dyn BrokerGateway>,
}

impl FillReconciler {
    pub fn new(state: Arc<Mutex<BotState>>, gateway: Arc<dyn BrokerGateway>) -> Self {
        Self { state, gateway }
    }

    pub async fn on_fill(&self, event: &FillEvent) -> ReconcileOutcome {
        if event.status != FillStatus::Filled {
            debug!(stock_code = %event.stock_code, status = ?event.status, "non-final fill event");
            return ReconcileOutcome::Ignored;
        }

        {
            let mut st = self.state.lock().await;
            if st.pending.remove(&event.stock_code).is_none() {
                debug!(stock_code = %event.stock_code, "fill for untracked order");
                return ReconcileOutcome::Ignored;
            }
            st.registry.remove(&event.stock_code);
            st.held.insert(event.stock_code.clone());
        }

        info!(stock_code = %event.stock_code, "order filled");

        // Cash changed hands; refetch rather than guess the new balance
        match self.gateway.balance().await {
            Ok(b) => self.state.lock().await.balance = Some(b),
            Err(e) => {
                debug!(error = %e, "balance refresh failed, scheduler will re-request");
                self.state.lock().await.balance = None;
            }
        }

        match self.gateway.holdings().await {
            Ok(positions) => {
                let held = positions.into_iter().map(|p| p.stock_code).collect();
                let mut st = self.state.lock().await;
                st.registry.exclude(&held);
                st.held = held;
            }
            Err(e) => debug!(error = %e, "holdings refresh failed"),
        }

        ReconcileOutcome::Reconciled {
            stock_code: event.stock_code.clone(),
        }
    }
}

use std::collections::HashSet;

use crate::models::Candidate;

/// The candidate list consulted by the order scheduler.
///
/// Refreshed wholesale by each screening pass and trimmed surgically as
/// fills arrive. Emission order from the screener is preserved; it is the
/// tie-break order for the scheduler.
#[derive(Debug, Default)]
pub struct CandidateRegistry {
    candidates: Vec<Candidate>,
}

impl CandidateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole candidate set, dropping instruments already held
    pub fn replace_all(&mut self, candidates: Vec<Candidate>, held: &HashSet<String>) {
        self.candidates = candidates
            .into_iter()
            .filter(|c| !held.contains(&c.stock_code))
            .collect();
    }

    /// Remove one candidate by code. No-op when absent.
    pub fn remove(&mut self, stock_code: &str) {
        self.candidates.retain(|c| c.stock_code != stock_code);
    }

    /// Drop every candidate present in `held`
    pub fn exclude(&mut self, held: &HashSet<String>) {
        self.candidates.retain(|c| !held.contains(&c.stock_code));
    }

    pub fn contains(&self, stock_code: &str) -> bool {
        self.candidates.iter().any(|c| c.stock_code == stock_code)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

//! Deterministic scoring over the persisted citation stream: visibility
//! scores, share of voice, trending keywords, daily metrics and the
//! dashboard reads built from them.
//!
//! Every computation reads one [`aivis_storage::ScoringSnapshot`] taken in
//! a single transaction, so a run is internally consistent under ongoing
//! writes, and recomputation over the same inputs is bit-identical.

pub mod daily;
pub mod dashboard;
pub mod score;
pub mod trends;

use aivis_storage::Store;
use std::sync::Arc;

pub use daily::aggregate_day;
pub use dashboard::DashboardSummary;
pub use score::{compute_components, grade_for, ComponentScores, SCORING_WINDOW_DAYS};
pub use trends::{ShareOfVoiceEntry, TrendDirection, TrendingKeyword};

/// Read side of the pipeline; owns no state beyond the store handle.
pub struct ScoringService {
    store: Arc<Store>,
}

impl ScoringService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }
}

//! Currently active estimate and the user-adjusted period.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::estimate::model::ProjectEstimate;
use crate::store::persist::{load_state, save_state, MemoryPersistence, SharedPersistence};

/// Persistence key of the estimate state.
pub const ESTIMATE_STORAGE_KEY: &str = "ai-estimate-storage";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EstimateState {
    #[serde(default)]
    current: Option<ProjectEstimate>,
    #[serde(default)]
    period_weeks: Option<u32>,
}

/// Holds at most one estimate. New estimates replace the old one wholesale.
pub struct EstimateStore {
    state: EstimateState,
    persistence: SharedPersistence,
}

impl std::fmt::Debug for EstimateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimateStore")
            .field("current", &self.state.current)
            .field("period_weeks", &self.state.period_weeks)
            .finish_non_exhaustive()
    }
}

impl EstimateStore {
    /// Loads the persisted estimate, starting empty when there is none or it
    /// is unreadable.
    pub fn load(persistence: SharedPersistence) -> Self {
        let state = match load_state::<EstimateState>(persistence.as_ref(), ESTIMATE_STORAGE_KEY) {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable estimate state");
                EstimateState::default()
            }
        };
        Self { state, persistence }
    }

    /// A store backed by process memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::load(Arc::new(MemoryPersistence::new()))
    }

    /// The active estimate.
    #[must_use]
    pub fn current(&self) -> Option<&ProjectEstimate> {
        self.state.current.as_ref()
    }

    /// The period in weeks, as adjusted by the user or taken from the estimate.
    #[must_use]
    pub fn period_weeks(&self) -> Option<u32> {
        self.state.period_weeks
    }

    /// Makes `estimate` the active one and resets the period to its weeks.
    pub fn replace(&mut self, estimate: ProjectEstimate) {
        self.state.period_weeks = estimate.period_weeks();
        self.state.current = Some(estimate);
        self.persist();
    }

    /// Overrides the period.
    pub fn set_period(&mut self, weeks: u32) {
        self.state.period_weeks = Some(weeks);
        self.persist();
    }

    /// Forgets the active estimate and period.
    pub fn clear(&mut self) {
        self.state = EstimateState::default();
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = save_state(self.persistence.as_ref(), ESTIMATE_STORAGE_KEY, &self.state) {
            warn!(error = %e, "Failed to persist estimate");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::estimate::model::tests::sample_estimate;

    #[test]
    fn replace_resets_period() {
        let mut store = EstimateStore::in_memory();
        assert!(store.current().is_none());
        assert_eq!(store.period_weeks(), None);

        store.replace(sample_estimate());
        assert_eq!(store.period_weeks(), Some(12));

        store.set_period(16);
        assert_eq!(store.period_weeks(), Some(16));

        let mut next = sample_estimate();
        next.project_name = "두번째".to_string();
        next.estimated_period = "20주".to_string();
        store.replace(next);
        assert_eq!(store.current().unwrap().project_name, "두번째");
        assert_eq!(store.period_weeks(), Some(20));
    }

    #[test]
    fn unparseable_period_is_none() {
        let mut store = EstimateStore::in_memory();
        let mut estimate = sample_estimate();
        estimate.estimated_period = "협의 필요".to_string();
        store.replace(estimate);
        assert_eq!(store.period_weeks(), None);
    }

    #[test]
    fn state_survives_reload_and_clear() {
        let persistence: SharedPersistence = Arc::new(MemoryPersistence::new());
        let mut store = EstimateStore::load(persistence.clone());
        store.replace(sample_estimate());
        store.set_period(14);

        let reloaded = EstimateStore::load(persistence.clone());
        assert_eq!(reloaded.current(), Some(&sample_estimate()));
        assert_eq!(reloaded.period_weeks(), Some(14));

        store.clear();
        let reloaded = EstimateStore::load(persistence);
        assert!(reloaded.current().is_none());
        assert_eq!(reloaded.period_weeks(), None);
    }
}

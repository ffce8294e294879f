//! Typed access to the persisted step baseline state.

use serde_json::json;

use crate::error::Result;
use crate::steps::baseline::{StepBaselineState, DEFAULT_BASELINE_VALUE, DEFAULT_STEP_COUNT};
use crate::store::KeyValueStore;

const KEY_BASELINE: &str = "baseline";
const KEY_BASELINE_DATE: &str = "baseline_date";
const KEY_LATEST_STEP_COUNT: &str = "latest_step_count";

/// Baseline store on top of a [`KeyValueStore`]
#[derive(Debug, Clone)]
pub struct StepDataStorage {
    store: KeyValueStore,
}

impl StepDataStorage {
    /// Wrap a store holding the baseline keys
    pub fn new(store: KeyValueStore) -> Self {
        Self { store }
    }

    /// Stored baseline, or `DEFAULT_BASELINE_VALUE` before the first reading
    pub fn baseline(&self) -> Result<f64> {
        Ok(self.store.get(KEY_BASELINE)?.unwrap_or(DEFAULT_BASELINE_VALUE))
    }

    /// Persist the baseline
    pub fn save_baseline(&self, baseline: f64) -> Result<()> {
        self.store.set(KEY_BASELINE, baseline)
    }

    /// Calendar day (`YYYY-MM-DD`) the stored baseline belongs to
    pub fn saved_date(&self) -> Result<Option<String>> {
        self.store.get(KEY_BASELINE_DATE)
    }

    /// Persist the baseline's calendar day
    pub fn save_date(&self, date: &str) -> Result<()> {
        self.store.set(KEY_BASELINE_DATE, date)
    }

    /// Last computed count, regardless of the day it was computed on
    pub fn latest_step_count(&self) -> Result<u32> {
        Ok(self
            .store
            .get(KEY_LATEST_STEP_COUNT)?
            .unwrap_or(DEFAULT_STEP_COUNT))
    }

    /// Last computed count if it belongs to `today`, otherwise 0
    ///
    /// A count left over from an earlier day is stale until the first reading
    /// of `today` resets the baseline.
    pub fn today_step_count(&self, today: &str) -> Result<u32> {
        if self.saved_date()?.as_deref() != Some(today) {
            return Ok(DEFAULT_STEP_COUNT);
        }
        self.latest_step_count()
    }

    /// Persist the last computed count
    pub fn save_latest_step_count(&self, steps: u32) -> Result<()> {
        self.store.set(KEY_LATEST_STEP_COUNT, steps)
    }

    /// Load all three keys, falling back to defaults for missing ones
    pub fn load_state(&self) -> Result<StepBaselineState> {
        Ok(StepBaselineState {
            baseline: self.baseline()?,
            baseline_date: self.saved_date()?,
            latest_step_count: self.latest_step_count()?,
        })
    }

    /// Persist all three keys in one write
    pub fn save_state(&self, state: &StepBaselineState) -> Result<()> {
        self.store.edit(|map| {
            map.insert(KEY_BASELINE.to_string(), json!(state.baseline));
            map.insert(KEY_BASELINE_DATE.to_string(), json!(state.baseline_date));
            map.insert(
                KEY_LATEST_STEP_COUNT.to_string(),
                json!(state.latest_step_count),
            );
        })
    }
}

//! # Daily Step Baseline
//!
//! Turns a cumulative step counter (total steps since boot) into a
//! "steps today" count.
//!
//! The first reading of a calendar day becomes that day's baseline, and every
//! later reading is reported relative to it. A reading below the baseline
//! means the hardware counter restarted from zero (device reboot), so the
//! reading becomes the new baseline.
//!
//! ```
//! use d_tracker::steps::baseline::StepBaselineState;
//!
//! let state = StepBaselineState::default()
//!     .apply_reading(1500.0, "2024-05-01")
//!     .apply_reading(1620.0, "2024-05-01");
//! assert_eq!(state.latest_step_count, 120);
//!
//! // Next day: the first reading becomes the new zero-point
//! let state = state.apply_reading(1700.0, "2024-05-02");
//! assert_eq!(state.latest_step_count, 0);
//! ```

/// Baseline value stored before the first reading is ever seen
pub const DEFAULT_BASELINE_VALUE: f64 = -1.0;

/// Step count reported before the first reading is ever seen
pub const DEFAULT_STEP_COUNT: u32 = 0;

/// Calendar day format of the persisted baseline date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Persisted baseline tracker state
#[derive(Debug, Clone, PartialEq)]
pub struct StepBaselineState {
    /// Counter value used as the zero-point for today
    pub baseline: f64,
    /// Calendar day the baseline belongs to (`YYYY-MM-DD`)
    pub baseline_date: Option<String>,
    /// Last computed count for today
    pub latest_step_count: u32,
}

impl Default for StepBaselineState {
    fn default() -> Self {
        Self {
            baseline: DEFAULT_BASELINE_VALUE,
            baseline_date: None,
            latest_step_count: DEFAULT_STEP_COUNT,
        }
    }
}

impl StepBaselineState {
    /// Apply one cumulative counter reading taken on `today`.
    ///
    /// Resets the baseline on a new day, on a counter that went backwards, or
    /// when no valid baseline was stored yet. The resulting count is clamped
    /// at zero.
    #[must_use]
    pub fn apply_reading(&self, reading: f64, today: &str) -> Self {
        let same_day = self.baseline_date.as_deref() == Some(today);

        let baseline = if !same_day || self.baseline < 0.0 || reading < self.baseline {
            reading
        } else {
            self.baseline
        };

        Self {
            baseline,
            baseline_date: Some(today.to_string()),
            latest_step_count: steps_since(baseline, reading),
        }
    }

    /// True if applying a reading changed the baseline
    pub fn baseline_changed(&self, previous: &StepBaselineState) -> bool {
        self.baseline != previous.baseline || self.baseline_date != previous.baseline_date
    }
}

/// `max(0, reading - baseline)` truncated to whole steps
pub fn steps_since(baseline: f64, reading: f64) -> u32 {
    let delta = reading - baseline;
    if !delta.is_finite() || delta <= 0.0 {
        return 0;
    }
    delta.min(u32::MAX as f64) as u32
}

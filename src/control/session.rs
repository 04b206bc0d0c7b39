//! State a front end carries from one cycle to the next.

use crate::control::{ErrorState, RunOutcome, RunRequest, Trigger};
use crate::domain::{AutoEstimation, MonitorConfig, ParamRow, Snapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub horizon_hours: f64,
    pub auto_estimation: AutoEstimation,
    /// The parameter table; edits made here are replayed by the next cycle.
    pub params: Vec<ParamRow>,
    pub error: ErrorState,
    /// Timer ticks so far.
    pub iteration: u64,
    pub snapshot: Snapshot,
}

impl Session {
    pub fn new(config: &MonitorConfig, auto_estimation: AutoEstimation) -> Self {
        Self {
            horizon_hours: config.horizon_hours,
            auto_estimation,
            params: Vec::new(),
            error: ErrorState::Clean,
            iteration: 0,
            snapshot: Snapshot::empty(),
        }
    }

    /// The request for `trigger`; timer triggers advance the iteration count.
    pub fn request(&mut self, trigger: Trigger) -> RunRequest {
        if trigger == Trigger::Timer {
            self.iteration += 1;
        }
        RunRequest {
            trigger,
            horizon_hours: self.horizon_hours,
            auto_estimation: self.auto_estimation,
            params: self.params.clone(),
            error: self.error.clone(),
            iteration: self.iteration,
        }
    }

    /// Take over the state a finished cycle produced.
    pub fn absorb(&mut self, outcome: &RunOutcome) {
        self.error = outcome.error.clone();
        self.params = outcome.snapshot.param_rows();
        self.snapshot = outcome.snapshot.clone();
    }
}

//! Triggers, error state and the pure trigger -> plan transition.

use serde::Serialize;

use crate::domain::AutoEstimation;

/// Why a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trigger {
    /// First load of a session.
    Initial,
    /// Periodic poll.
    Timer,
    /// The simulation horizon changed.
    Horizon,
    /// Manual estimation request.
    Estimate,
    /// Manual retry after a failure.
    Retry,
}

/// What a cycle does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Plan {
    /// Fetch measurement and metadata, fresh model with defaults, estimate.
    FullRefresh,
    /// Fetch measurement only, replay the parameter table, estimate if asked.
    Incremental { estimate: bool },
}

impl Plan {
    pub fn estimates(self) -> bool {
        matches!(self, Plan::FullRefresh | Plan::Incremental { estimate: true })
    }
}

/// Whether the previous cycle failed; the message is what the user sees.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ErrorState {
    #[default]
    Clean,
    Errored(String),
}

impl ErrorState {
    pub fn is_errored(&self) -> bool {
        matches!(self, ErrorState::Errored(_))
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ErrorState::Clean => None,
            ErrorState::Errored(msg) => Some(msg),
        }
    }
}

/// Decide what a trigger does given the current error state.
///
/// While errored every trigger goes through a full refresh; that is the only
/// way back to `Clean`.
pub fn plan(trigger: Trigger, error: &ErrorState, auto: AutoEstimation) -> Plan {
    if error.is_errored() {
        return Plan::FullRefresh;
    }
    match trigger {
        Trigger::Initial | Trigger::Retry => Plan::FullRefresh,
        Trigger::Timer => Plan::Incremental {
            estimate: auto.is_enabled(),
        },
        Trigger::Estimate => Plan::Incremental { estimate: true },
        Trigger::Horizon => Plan::Incremental { estimate: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Trigger; 5] = [
        Trigger::Initial,
        Trigger::Timer,
        Trigger::Horizon,
        Trigger::Estimate,
        Trigger::Retry,
    ];

    #[test]
    fn errored_state_forces_full_refresh() {
        let errored = ErrorState::Errored("boom".to_string());
        for trigger in ALL {
            for auto in [AutoEstimation::Enabled, AutoEstimation::Disabled] {
                assert_eq!(plan(trigger, &errored, auto), Plan::FullRefresh);
            }
        }
    }

    #[test]
    fn clean_state_transitions() {
        let clean = ErrorState::Clean;
        let on = AutoEstimation::Enabled;
        let off = AutoEstimation::Disabled;

        assert_eq!(plan(Trigger::Initial, &clean, off), Plan::FullRefresh);
        assert_eq!(plan(Trigger::Retry, &clean, off), Plan::FullRefresh);
        assert_eq!(plan(Trigger::Timer, &clean, on), Plan::Incremental { estimate: true });
        assert_eq!(plan(Trigger::Timer, &clean, off), Plan::Incremental { estimate: false });
        assert_eq!(plan(Trigger::Estimate, &clean, off), Plan::Incremental { estimate: true });
        assert_eq!(plan(Trigger::Horizon, &clean, on), Plan::Incremental { estimate: false });
    }

    #[test]
    fn plan_reports_estimation() {
        assert!(Plan::FullRefresh.estimates());
        assert!(!Plan::Incremental { estimate: false }.estimates());
    }
}

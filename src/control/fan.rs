use super::{Demand, OccupancyState};
use serde::{Deserialize, Serialize};

/// Fan failure detection states. `Timing` carries the timestamp of the first
/// scan that observed the command/status mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanWatchState {
    Watching,
    Timing { since_ms: u64 },
    Failed,
}

/// Fan run command: continuous ventilation when Occupied, cycling with any
/// active call when Unoccupied.
pub fn command_requested(occupancy: OccupancyState, demand: Demand) -> bool {
    occupancy == OccupancyState::Occupied || demand.is_active()
}

/// Watches the commanded fan against the status input and latches a failure
/// when they disagree for the full timeout window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanSupervisor {
    state: FanWatchState,
}

impl Default for FanSupervisor {
    fn default() -> Self {
        Self {
            state: FanWatchState::Watching,
        }
    }
}

impl FanSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the failure state machine for one scan.
    ///
    /// `requested` is the command the pipeline (including operator
    /// overrides) asks for; the mismatch timer runs against the effective
    /// command — requested, not emergency-stopped, not already failed — so
    /// it clears whenever the externally observable command is off.
    ///
    /// Failed re-arms only when the requested command and the status are
    /// observed off together; a standing occupied call keeps the latch in
    /// place until the request drops or [`FanSupervisor::reset`] is called.
    pub fn monitor(
        &mut self,
        requested: bool,
        emergency_stop: bool,
        fan_status: bool,
        now_ms: u64,
        timeout_ms: u64,
    ) -> FanWatchState {
        let effective = requested && !emergency_stop && !self.is_failed();

        self.state = match self.state {
            FanWatchState::Watching => {
                if effective && !fan_status {
                    FanWatchState::Timing { since_ms: now_ms }
                } else {
                    FanWatchState::Watching
                }
            }
            FanWatchState::Timing { since_ms } => {
                if !effective || fan_status {
                    FanWatchState::Watching
                } else if now_ms.saturating_sub(since_ms) >= timeout_ms {
                    FanWatchState::Failed
                } else {
                    FanWatchState::Timing { since_ms }
                }
            }
            FanWatchState::Failed => {
                if !requested && !fan_status {
                    FanWatchState::Watching
                } else {
                    FanWatchState::Failed
                }
            }
        };

        self.state
    }

    pub fn state(&self) -> FanWatchState {
        self.state
    }

    pub fn is_failed(&self) -> bool {
        self.state == FanWatchState::Failed
    }

    /// External acknowledgment: return to Watching regardless of inputs.
    pub fn reset(&mut self) {
        self.state = FanWatchState::Watching;
    }
}

use super::{OccupancyState, ScheduleInput, Setpoints};
use crate::config::ControllerConfig;

/// Combine the weekly schedule lookup and the holiday override into a binary
/// occupancy state. A holiday forces Unoccupied regardless of the schedule.
pub fn resolve(schedule: ScheduleInput) -> OccupancyState {
    if schedule.holiday_override_active {
        OccupancyState::Unoccupied
    } else if schedule.scheduled_occupied {
        OccupancyState::Occupied
    } else {
        OccupancyState::Unoccupied
    }
}

/// Select the active setpoint profile for this scan. Deadband, economizer
/// differential, and DCV parameters are occupancy-independent.
pub fn active_setpoints(config: &ControllerConfig, occupancy: OccupancyState) -> Setpoints {
    let profile = match occupancy {
        OccupancyState::Occupied => config.occupied,
        OccupancyState::Unoccupied => config.unoccupied,
    };
    Setpoints {
        cooling_setpoint_f: profile.cooling_setpoint_f,
        heating_setpoint_f: profile.heating_setpoint_f,
        deadband_f: config.deadband_f,
        economizer_differential_f: config.economizer_differential_f,
        dcv_min_position_pct: config.dcv_min_position_pct,
        dcv_target_ppm: config.dcv_target_ppm,
        dcv_span_ppm: config.dcv_span_ppm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holiday_forces_unoccupied() {
        let input = ScheduleInput {
            scheduled_occupied: true,
            holiday_override_active: true,
        };
        assert_eq!(resolve(input), OccupancyState::Unoccupied);
    }

    #[test]
    fn test_schedule_drives_occupancy_outside_holidays() {
        let occupied = ScheduleInput {
            scheduled_occupied: true,
            holiday_override_active: false,
        };
        let unoccupied = ScheduleInput {
            scheduled_occupied: false,
            holiday_override_active: false,
        };
        assert_eq!(resolve(occupied), OccupancyState::Occupied);
        assert_eq!(resolve(unoccupied), OccupancyState::Unoccupied);
    }

    #[test]
    fn test_profile_selection() {
        let config = ControllerConfig::default();
        let occ = active_setpoints(&config, OccupancyState::Occupied);
        let unocc = active_setpoints(&config, OccupancyState::Unoccupied);
        assert!(occ.cooling_setpoint_f < unocc.cooling_setpoint_f);
        assert!(occ.heating_setpoint_f > unocc.heating_setpoint_f);
        assert_eq!(occ.deadband_f, unocc.deadband_f);
        assert_eq!(occ.dcv_target_ppm, unocc.dcv_target_ppm);
    }
}

use super::Setpoints;
use serde::{Deserialize, Serialize};

/// Thermal demand signal. Cool is evaluated first; with a positive deadband
/// and non-overlapping bands the two calls are never simultaneously true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Demand {
    Cool,
    Heat,
    None,
}

impl Demand {
    pub fn is_active(self) -> bool {
        !matches!(self, Demand::None)
    }
}

/// Compare zone temperature to the active setpoints plus deadband. The dead
/// zone between the two thresholds yields `None`; downstream components
/// decide independently what to do with a released call.
pub fn evaluate(zone_temp_f: f32, setpoints: &Setpoints) -> Demand {
    if zone_temp_f > setpoints.cooling_setpoint_f + setpoints.deadband_f {
        Demand::Cool
    } else if zone_temp_f < setpoints.heating_setpoint_f - setpoints.deadband_f {
        Demand::Heat
    } else {
        Demand::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setpoints() -> Setpoints {
        Setpoints {
            cooling_setpoint_f: 74.0,
            heating_setpoint_f: 68.0,
            deadband_f: 2.0,
            economizer_differential_f: 5.0,
            dcv_min_position_pct: 20,
            dcv_target_ppm: 800,
            dcv_span_ppm: 600,
        }
    }

    #[test]
    fn test_cool_call_above_band() {
        assert_eq!(evaluate(76.1, &setpoints()), Demand::Cool);
    }

    #[test]
    fn test_heat_call_below_band() {
        assert_eq!(evaluate(65.9, &setpoints()), Demand::Heat);
    }

    #[test]
    fn test_dead_zone_boundaries_inclusive() {
        // Exactly at threshold is still the dead zone on both sides.
        assert_eq!(evaluate(76.0, &setpoints()), Demand::None);
        assert_eq!(evaluate(66.0, &setpoints()), Demand::None);
        assert_eq!(evaluate(71.0, &setpoints()), Demand::None);
    }
}

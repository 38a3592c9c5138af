use super::{Demand, Setpoints};

/// Outcome of cooling source selection for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoolingDecision {
    /// Y1 enable. Forced off whenever the economizer is active.
    pub compressor: bool,
    pub economizer_active: bool,
    /// Damper position this stage requires, `None` when cooling places no
    /// constraint and the ventilation stage decides alone.
    pub damper_contribution: Option<u8>,
}

impl CoolingDecision {
    const IDLE: Self = Self {
        compressor: false,
        economizer_active: false,
        damper_contribution: None,
    };
}

/// Choose between free cooling and mechanical cooling on a Cool call.
///
/// Economizer entry is strictly below the changeover point: outdoor air at
/// exactly `cooling_setpoint - differential` still runs the compressor.
/// Economizer mode locks the compressor out and demands a fully open damper;
/// mechanical mode never forces the damper closed, ventilation still owns
/// the floor.
pub fn select(demand: Demand, outdoor_temp_f: f32, setpoints: &Setpoints) -> CoolingDecision {
    if demand != Demand::Cool {
        return CoolingDecision::IDLE;
    }

    let changeover_f = setpoints.cooling_setpoint_f - setpoints.economizer_differential_f;
    if outdoor_temp_f < changeover_f {
        CoolingDecision {
            compressor: false,
            economizer_active: true,
            damper_contribution: Some(100),
        }
    } else {
        CoolingDecision {
            compressor: true,
            economizer_active: false,
            damper_contribution: None,
        }
    }
}

pub mod cooling;
pub mod demand;
pub mod fan;
pub mod heating;
pub mod occupancy;
pub mod ventilation;

pub use demand::Demand;
pub use fan::{FanSupervisor, FanWatchState};

use crate::config::ControllerConfig;
use crate::safety::{self, AlarmManager, AlarmTransition};
use serde::{Deserialize, Serialize};

pub const MAX_ALARM_TRANSITIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccupancyState {
    Occupied,
    Unoccupied,
}

/// Resolved schedule pair handed in by the schedule collaborator each scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub scheduled_occupied: bool,
    pub holiday_override_active: bool,
}

/// One atomic sensor sample. All fields are read once at scan start; no
/// component observes a value that changes mid-scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub zone_temp_f: f32,
    pub outdoor_temp_f: f32,
    pub discharge_air_temp_f: f32,
    /// A missing CO2 sensor is a valid configuration, not a fault.
    pub co2_ppm: Option<u16>,
    pub fan_status: bool,
}

/// Active setpoints and ventilation parameters selected for this scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    pub cooling_setpoint_f: f32,
    pub heating_setpoint_f: f32,
    pub deadband_f: f32,
    pub economizer_differential_f: f32,
    pub dcv_min_position_pct: u8,
    pub dcv_target_ppm: u16,
    pub dcv_span_ppm: u16,
}

/// The only externally observable effect of one scan. Fully recomputed every
/// pass; nothing here latches implicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlOutputs {
    pub fan: bool,
    /// Y1 first-stage cooling.
    pub compressor: bool,
    /// W1 first-stage heating.
    pub heat: bool,
    /// Outside-air damper, 0-100%.
    pub damper_position: u8,
}

impl ControlOutputs {
    pub const ALL_OFF: Self = Self {
        fan: false,
        compressor: false,
        heat: false,
        damper_position: 0,
    };
}

/// Operator-forced output values. Applied after the control pipeline and
/// before the safety veto, so an override can hold a relay but never defeat
/// the emergency stop or a fan-failure shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOverrides {
    pub fan: Option<bool>,
    pub compressor: Option<bool>,
    pub heat: Option<bool>,
    pub damper_position: Option<u8>,
}

impl OutputOverrides {
    pub fn apply(&self, outputs: &mut ControlOutputs) {
        if let Some(fan) = self.fan {
            outputs.fan = fan;
        }
        if let Some(compressor) = self.compressor {
            outputs.compressor = compressor;
        }
        if let Some(heat) = self.heat {
            outputs.heat = heat;
        }
        if let Some(damper) = self.damper_position {
            outputs.damper_position = damper.min(100);
        }
    }

    pub fn any_active(&self) -> bool {
        self.fan.is_some()
            || self.compressor.is_some()
            || self.heat.is_some()
            || self.damper_position.is_some()
    }
}

/// Everything one scan consumes, sampled together at scan start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanInputs {
    pub schedule: ScheduleInput,
    pub sensors: SensorSnapshot,
    pub emergency_stop: bool,
}

/// Operator-facing unit mode label, derived from the scan result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitState {
    Off,
    FanOnly,
    Cooling,
    EconomizerCooling,
    Heating,
    FanFailure,
    EmergencyStop,
}

impl core::fmt::Display for UnitState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UnitState::Off => write!(f, "OFF"),
            UnitState::FanOnly => write!(f, "FAN ONLY"),
            UnitState::Cooling => write!(f, "COOLING"),
            UnitState::EconomizerCooling => write!(f, "ECONOMIZER"),
            UnitState::Heating => write!(f, "HEATING"),
            UnitState::FanFailure => write!(f, "FAN FAILURE"),
            UnitState::EmergencyStop => write!(f, "EMERGENCY STOP"),
        }
    }
}

/// Result of one full control pass.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub occupancy: OccupancyState,
    pub setpoints: Setpoints,
    pub demand: Demand,
    pub economizer_active: bool,
    pub outputs: ControlOutputs,
    pub unit_state: UnitState,
    pub alarm_transitions: heapless::Vec<AlarmTransition, MAX_ALARM_TRANSITIONS>,
}

/// The control core: the fixed-order pipeline plus the only two pieces of
/// cross-scan state the design allows, the fan supervisor state machine and
/// the alarm latches.
#[derive(Debug, Default)]
pub struct ControlCore {
    fan: FanSupervisor,
    alarms: AlarmManager,
}

impl ControlCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// One scan: occupancy → setpoints → demand → cooling/heating → DCV →
    /// fan supervision → safety veto. Total over every input combination;
    /// there is no error path out of a scan.
    pub fn scan(
        &mut self,
        config: &ControllerConfig,
        inputs: &ScanInputs,
        overrides: &OutputOverrides,
        now_ms: u64,
    ) -> ScanResult {
        let occupancy = occupancy::resolve(inputs.schedule);
        let setpoints = occupancy::active_setpoints(config, occupancy);
        let demand = demand::evaluate(inputs.sensors.zone_temp_f, &setpoints);
        let cooling = cooling::select(demand, inputs.sensors.outdoor_temp_f, &setpoints);
        let heat_on = heating::evaluate(demand);
        let damper = ventilation::damper_position(
            occupancy,
            &setpoints,
            inputs.sensors.co2_ppm,
            cooling.damper_contribution,
        );

        let mut outputs = ControlOutputs {
            fan: fan::command_requested(occupancy, demand),
            compressor: cooling.compressor,
            heat: heat_on,
            damper_position: damper,
        };
        overrides.apply(&mut outputs);

        // The fan supervisor watches the command the unit would actually
        // drive: requested, not emergency-stopped, not already shut down.
        // Re-arm out of Failed uses the requested command, so a standing
        // occupied call keeps the latch in place.
        self.fan.monitor(
            outputs.fan,
            inputs.emergency_stop,
            inputs.sensors.fan_status,
            now_ms,
            config.fan_fail_timeout_ms,
        );
        let fan_failed = self.fan.is_failed();

        let alarm_transitions = self.alarms.update(&inputs.sensors, fan_failed, config, now_ms);

        let freeze_shutdown = config.freeze_shutdown_enabled
            && self.alarms.is_active(safety::AlarmKind::LowDischargeTemp);
        safety::apply_veto(&mut outputs, inputs.emergency_stop, fan_failed, freeze_shutdown);

        let unit_state = derive_unit_state(
            inputs.emergency_stop,
            fan_failed,
            &outputs,
            cooling.economizer_active,
        );

        ScanResult {
            occupancy,
            setpoints,
            demand,
            economizer_active: cooling.economizer_active,
            outputs,
            unit_state,
            alarm_transitions,
        }
    }

    pub fn alarms(&self) -> &AlarmManager {
        &self.alarms
    }

    pub fn alarms_mut(&mut self) -> &mut AlarmManager {
        &mut self.alarms
    }

    pub fn fan(&self) -> &FanSupervisor {
        &self.fan
    }

    /// Operator acknowledgment path out of the Failed state.
    pub fn reset_fan_failure(&mut self) {
        self.fan.reset();
    }
}

fn derive_unit_state(
    emergency_stop: bool,
    fan_failed: bool,
    outputs: &ControlOutputs,
    economizer_active: bool,
) -> UnitState {
    if emergency_stop {
        UnitState::EmergencyStop
    } else if fan_failed {
        UnitState::FanFailure
    } else if outputs.heat {
        UnitState::Heating
    } else if outputs.compressor {
        UnitState::Cooling
    } else if economizer_active {
        UnitState::EconomizerCooling
    } else if outputs.fan {
        UnitState::FanOnly
    } else {
        UnitState::Off
    }
}

use crate::config::ControllerConfig;
use crate::control::{ControlOutputs, SensorSnapshot, MAX_ALARM_TRANSITIONS};
use heapless::Vec;
use serde::{Deserialize, Serialize};

const MAX_ALARM_RECORDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmKind {
    /// Latched by the fan supervisor until its re-arm condition.
    FanFailure,
    /// Freeze protection, level-triggered from the discharge-air sensor.
    LowDischargeTemp,
    /// Zone overheat, raise/clear with hysteresis.
    HighZoneTemp,
}

impl core::fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AlarmKind::FanFailure => write!(f, "FAN FAILURE"),
            AlarmKind::LowDischargeTemp => write!(f, "LOW DISCHARGE TEMP"),
            AlarmKind::HighZoneTemp => write!(f, "HIGH ZONE TEMP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub kind: AlarmKind,
    pub raised_at_ms: u64,
    pub cleared_at_ms: Option<u64>,
    pub acknowledged: bool,
}

impl AlarmRecord {
    pub fn is_active(&self) -> bool {
        self.cleared_at_ms.is_none()
    }
}

/// Raise/clear edge reported back to the orchestrator for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmTransition {
    pub kind: AlarmKind,
    pub raised: bool,
    pub timestamp_ms: u64,
}

/// Re-evaluates every alarm condition from the current scan and keeps a
/// bounded record history. FanFailure mirrors the supervisor latch; the
/// temperature alarms are level-triggered each scan.
#[derive(Debug)]
pub struct AlarmManager {
    records: Vec<AlarmRecord, MAX_ALARM_RECORDS>,
    enabled: bool,
    high_zone_temp_active: bool,
}

impl Default for AlarmManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmManager {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            enabled: true,
            high_zone_temp_active: false,
        }
    }

    /// Evaluate alarm conditions for one scan and return the edges.
    pub fn update(
        &mut self,
        sensors: &SensorSnapshot,
        fan_failed: bool,
        config: &ControllerConfig,
        now_ms: u64,
    ) -> Vec<AlarmTransition, MAX_ALARM_TRANSITIONS> {
        let mut transitions = Vec::new();

        if !self.enabled {
            for kind in [AlarmKind::FanFailure, AlarmKind::LowDischargeTemp, AlarmKind::HighZoneTemp] {
                self.set_condition(kind, false, now_ms, &mut transitions);
            }
            self.high_zone_temp_active = false;
            return transitions;
        }

        self.set_condition(AlarmKind::FanFailure, fan_failed, now_ms, &mut transitions);

        let freezing = sensors.discharge_air_temp_f < config.freeze_limit_f;
        self.set_condition(AlarmKind::LowDischargeTemp, freezing, now_ms, &mut transitions);

        if sensors.zone_temp_f > config.high_zone_temp_raise_f {
            self.high_zone_temp_active = true;
        } else if sensors.zone_temp_f < config.high_zone_temp_clear_f {
            self.high_zone_temp_active = false;
        }
        let high = self.high_zone_temp_active;
        self.set_condition(AlarmKind::HighZoneTemp, high, now_ms, &mut transitions);

        transitions
    }

    fn set_condition(
        &mut self,
        kind: AlarmKind,
        active: bool,
        now_ms: u64,
        transitions: &mut Vec<AlarmTransition, MAX_ALARM_TRANSITIONS>,
    ) {
        let current = self.records.iter().position(|r| r.kind == kind && r.is_active());
        match (current, active) {
            (None, true) => {
                if self.records.is_full() {
                    // Drop the oldest cleared record; active records are
                    // never evicted.
                    if let Some(idx) = self.records.iter().position(|r| !r.is_active()) {
                        self.records.remove(idx);
                    }
                }
                let record = AlarmRecord {
                    kind,
                    raised_at_ms: now_ms,
                    cleared_at_ms: None,
                    acknowledged: false,
                };
                if self.records.push(record).is_ok() {
                    let _ = transitions.push(AlarmTransition {
                        kind,
                        raised: true,
                        timestamp_ms: now_ms,
                    });
                }
            }
            (Some(idx), false) => {
                self.records[idx].cleared_at_ms = Some(now_ms);
                let _ = transitions.push(AlarmTransition {
                    kind,
                    raised: false,
                    timestamp_ms: now_ms,
                });
            }
            _ => {}
        }
    }

    pub fn is_active(&self, kind: AlarmKind) -> bool {
        self.records.iter().any(|r| r.kind == kind && r.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_active()).count()
    }

    pub fn records(&self) -> &[AlarmRecord] {
        &self.records
    }

    /// Mark the active record of `kind` acknowledged. Returns false when no
    /// such alarm is active.
    pub fn acknowledge(&mut self, kind: AlarmKind) -> bool {
        if let Some(record) = self.records.iter_mut().find(|r| r.kind == kind && r.is_active()) {
            record.acknowledged = true;
            true
        } else {
            false
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn clear_resolved(&mut self) {
        self.records.retain(AlarmRecord::is_active);
    }
}

/// Final veto stage, applied last and unconditionally every scan.
///
/// A fan failure (or the optional freeze-shutdown policy) shuts the unit
/// down; the emergency stop overrides everything to the all-off state and is
/// re-evaluated every scan, so deassertion resumes normal control on the
/// next pass with no manual re-arm.
pub fn apply_veto(
    outputs: &mut ControlOutputs,
    emergency_stop: bool,
    fan_failed: bool,
    freeze_shutdown: bool,
) {
    if fan_failed || freeze_shutdown {
        outputs.fan = false;
        outputs.compressor = false;
        outputs.heat = false;
    }
    if emergency_stop {
        *outputs = ControlOutputs::ALL_OFF;
    }
}

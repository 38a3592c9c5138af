use crate::control::{ControlOutputs, OutputOverrides, ScanInputs, ScanResult};
use crate::protocol::{EventRecord, StatusPacket};
use crate::safety::AlarmRecord;
use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Trend ring depth; roughly one minute of history at a 1-second scan.
pub const TREND_CAPACITY: usize = 60;
const EVENT_TAIL_LEN: usize = 20;

/// One trend point, kept in memory only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    pub timestamp: u64,
    pub zone_temp_f: f32,
    /// The setpoint currently governing (cooling on a cool call, heating
    /// otherwise).
    pub setpoint_f: f32,
    /// 100 when any stage is running, 0 otherwise.
    pub output_pct: u8,
}

/// Assembles status packets at the configured publish rate and maintains the
/// short trend ring.
#[derive(Debug)]
pub struct StatusCollector {
    publish_period_ms: u64,
    last_publish_ms: Option<u64>,
    trend: Vec<TrendSample, TREND_CAPACITY>,
}

impl StatusCollector {
    pub fn new(publish_period_ms: u64) -> Self {
        Self {
            publish_period_ms,
            last_publish_ms: None,
            trend: Vec::new(),
        }
    }

    /// Record one trend point per scan.
    pub fn record_trend(&mut self, now_ms: u64, zone_temp_f: f32, scan: &ScanResult) {
        let setpoint_f = match scan.demand {
            crate::control::Demand::Cool => scan.setpoints.cooling_setpoint_f,
            _ => scan.setpoints.heating_setpoint_f,
        };
        let outputs: &ControlOutputs = &scan.outputs;
        let sample = TrendSample {
            timestamp: now_ms,
            zone_temp_f,
            setpoint_f,
            output_pct: if outputs.compressor || outputs.heat { 100 } else { 0 },
        };

        if self.trend.is_full() {
            self.trend.remove(0);
        }
        let _ = self.trend.push(sample);
    }

    /// Build a status packet when the publish period has elapsed. The caller
    /// assigns the sequence number at publish time.
    pub fn collect(
        &mut self,
        now_ms: u64,
        inputs: &ScanInputs,
        scan: &ScanResult,
        overrides: OutputOverrides,
        alarms: &[AlarmRecord],
        events: &[EventRecord],
    ) -> Option<StatusPacket> {
        if let Some(last) = self.last_publish_ms {
            if now_ms.saturating_sub(last) < self.publish_period_ms {
                return None;
            }
        }
        self.last_publish_ms = Some(now_ms);

        let event_tail = events.len().saturating_sub(EVENT_TAIL_LEN);
        Some(StatusPacket {
            timestamp: now_ms,
            sequence_number: 0,
            occupancy: scan.occupancy,
            unit_state: scan.unit_state,
            demand: scan.demand,
            economizer_active: scan.economizer_active,
            emergency_stop: inputs.emergency_stop,
            sensors: inputs.sensors,
            outputs: scan.outputs,
            setpoints: scan.setpoints,
            overrides,
            alarms: alarms.to_vec(),
            events: events[event_tail..].to_vec(),
            trend: self.trend.iter().copied().collect(),
        })
    }

    pub fn trend(&self) -> &[TrendSample] {
        &self.trend
    }
}

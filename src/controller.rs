use crate::config::ControllerConfig;
use crate::control::{
    ControlCore, ControlOutputs, OutputOverrides, ScanInputs, ScanResult, SensorSnapshot,
};
use crate::protocol::{
    Command, CommandResponse, CommandType, EventKind, EventRecord, OutputId, ProtocolError,
    ProtocolHandler, ResponseStatus, SetpointTarget, COMMAND_TRACK_TIMEOUT_MS,
};
use crate::schedule::ScheduleManager;
use crate::telemetry::StatusCollector;
use heapless::{spsc::Queue, Vec};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

const MAX_COMMAND_QUEUE_SIZE: usize = 32;
const MAX_EVENT_RECORDS: usize = 100;

// Command rate limits for the operator interface
const MAX_COMMAND_RATE_PER_SEC: u32 = 5;
const RATE_LIMIT_WINDOW_MS: u64 = 1000;

type CommandQueue = Queue<Command, MAX_COMMAND_QUEUE_SIZE>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerState {
    pub running: bool,
    pub uptime_seconds: u64,
    pub scan_count: u64,
    pub command_count: u32,
    pub status_count: u32,
    pub last_error: Option<String>,
}

/// Main orchestrator: samples inputs once per scan, runs the control
/// pipeline, applies operator overrides and the safety veto, and publishes
/// outputs, alarms, and status.
pub struct RtuController {
    config: ControllerConfig,
    schedule: ScheduleManager,
    core: ControlCore,
    overrides: OutputOverrides,
    emergency_stop: bool,

    protocol: ProtocolHandler,
    status: StatusCollector,

    state: ControllerState,
    start_time: Instant,
    last_scan: Option<ScanResult>,

    command_queue: CommandQueue,
    command_timestamps: Vec<Instant, 16>,
    response_buffer: Vec<CommandResponse, 16>,
    events: Vec<EventRecord, MAX_EVENT_RECORDS>,
}

impl RtuController {
    pub fn new(config: ControllerConfig) -> Self {
        let status = StatusCollector::new(config.status_publish_period_ms);
        Self {
            config,
            schedule: ScheduleManager::default(),
            core: ControlCore::new(),
            overrides: OutputOverrides::default(),
            emergency_stop: false,
            protocol: ProtocolHandler::new(),
            status,
            state: ControllerState {
                running: false,
                uptime_seconds: 0,
                scan_count: 0,
                command_count: 0,
                status_count: 0,
                last_error: None,
            },
            start_time: Instant::now(),
            last_scan: None,
            command_queue: Queue::new(),
            command_timestamps: Vec::new(),
            response_buffer: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.state.running = true;
        self.start_time = Instant::now();

        info!("RTU controller starting");
        info!(scan_period_ms = self.config.scan_period_ms, "control pipeline armed");
    }

    pub fn stop(&mut self) {
        self.state.running = false;
        info!("RTU controller stopping");
    }

    /// One scan: process queued commands, resolve occupancy, run the control
    /// pipeline, and return a serialized status packet when one is due.
    pub fn update(&mut self, sensors: SensorSnapshot) -> Result<Option<String>, ControllerError> {
        if !self.state.running {
            return Ok(None);
        }

        let now_ms = self.now_ms();
        self.state.uptime_seconds = self.start_time.elapsed().as_secs();

        self.protocol.cleanup_expired_commands(now_ms);
        self.process_commands()?;

        let inputs = ScanInputs {
            schedule: self.schedule.resolve_now(),
            sensors,
            emergency_stop: self.emergency_stop,
        };
        let scan = self.core.scan(&self.config, &inputs, &self.overrides, now_ms);
        self.state.scan_count += 1;

        for transition in &scan.alarm_transitions {
            let message = if transition.raised {
                format!("{} alarm raised", transition.kind)
            } else {
                format!("{} returned to normal", transition.kind)
            };
            warn!(alarm = %transition.kind, raised = transition.raised, "alarm transition");
            let kind = if transition.raised { EventKind::Alarm } else { EventKind::Normal };
            self.push_event(kind, message);
        }

        self.status.record_trend(now_ms, sensors.zone_temp_f, &scan);

        let packet = self.status.collect(
            now_ms,
            &inputs,
            &scan,
            self.overrides,
            self.core.alarms().records(),
            &self.events,
        );

        self.last_scan = Some(scan);

        if let Some(mut packet) = packet {
            packet.sequence_number = self.protocol.next_sequence_number();
            let json = self.protocol.serialize_status(&packet)?.to_string();
            self.state.status_count = self.state.status_count.saturating_add(1);
            return Ok(Some(json));
        }
        Ok(None)
    }

    fn execute_command(&mut self, command: Command) -> Result<CommandResponse, ControllerError> {
        let now_ms = self.now_ms();

        if self.protocol.track_command(command.id, now_ms, COMMAND_TRACK_TIMEOUT_MS).is_err() {
            return Ok(self.protocol.create_nack_response(
                command.id,
                "Command already being processed or tracking failed",
                now_ms,
            ));
        }

        if let Err(e) = self.protocol.validate_command(&command) {
            let _ = self.protocol.update_command_status(
                command.id,
                ResponseStatus::NegativeAck,
                now_ms,
            );
            return Ok(self.protocol.create_nack_response(
                command.id,
                &format!("Command validation failed: {e}"),
                now_ms,
            ));
        }

        // Actuator-affecting commands are rejected while the emergency stop
        // is asserted.
        if self.emergency_stop && !allowed_during_emergency_stop(&command.command_type) {
            let _ = self.protocol.update_command_status(
                command.id,
                ResponseStatus::NegativeAck,
                now_ms,
            );
            return Ok(self.protocol.create_nack_response(
                command.id,
                "Command blocked - emergency stop asserted",
                now_ms,
            ));
        }

        let _ =
            self.protocol.update_command_status(command.id, ResponseStatus::ExecutionStarted, now_ms);

        let (status, message) = self.apply_command(&command.command_type);

        let final_status = match status {
            ResponseStatus::Error => ResponseStatus::ExecutionFailed,
            other => other,
        };
        let _ = self.protocol.update_command_status(command.id, final_status, now_ms);

        Ok(self.protocol.create_response(command.id, status, message.as_deref(), now_ms))
    }

    fn apply_command(&mut self, command_type: &CommandType) -> (ResponseStatus, Option<String>) {
        match command_type {
            CommandType::Ping | CommandType::SystemStatus => (ResponseStatus::Success, None),

            CommandType::SetSetpoint { target, value_f } => {
                let mut trial = self.config;
                let slot = match target {
                    SetpointTarget::OccupiedCooling => &mut trial.occupied.cooling_setpoint_f,
                    SetpointTarget::OccupiedHeating => &mut trial.occupied.heating_setpoint_f,
                    SetpointTarget::UnoccupiedCooling => &mut trial.unoccupied.cooling_setpoint_f,
                    SetpointTarget::UnoccupiedHeating => &mut trial.unoccupied.heating_setpoint_f,
                };
                *slot = *value_f;
                if let Err(e) = trial.validate() {
                    return (ResponseStatus::Error, Some(format!("Setpoint rejected: {e}")));
                }
                self.config = trial;
                self.push_event(
                    EventKind::Audit,
                    format!("Setpoint {target:?} set to {value_f:.1}F"),
                );
                (ResponseStatus::Success, None)
            }

            CommandType::OverrideRelay { relay, on } => {
                match relay {
                    crate::protocol::RelayId::Fan => self.overrides.fan = Some(*on),
                    crate::protocol::RelayId::Compressor => self.overrides.compressor = Some(*on),
                    crate::protocol::RelayId::Heat => self.overrides.heat = Some(*on),
                }
                self.push_event(EventKind::Audit, format!("Override {relay:?} = {on}"));
                (ResponseStatus::Success, None)
            }

            CommandType::OverrideDamper { position_pct } => {
                self.overrides.damper_position = Some(*position_pct);
                self.push_event(EventKind::Audit, format!("Override damper = {position_pct}%"));
                (ResponseStatus::Success, None)
            }

            CommandType::ClearOverride { output } => {
                match output {
                    OutputId::Fan => self.overrides.fan = None,
                    OutputId::Compressor => self.overrides.compressor = None,
                    OutputId::Heat => self.overrides.heat = None,
                    OutputId::Damper => self.overrides.damper_position = None,
                }
                self.push_event(EventKind::Audit, format!("Override {output:?} cleared"));
                (ResponseStatus::Success, None)
            }

            CommandType::SetOccupancyOverride { occupied } => {
                self.schedule.set_manual_override(*occupied);
                self.push_event(EventKind::Audit, format!("Occupancy forced to {occupied}"));
                (ResponseStatus::Success, None)
            }

            CommandType::ClearOccupancyOverride => {
                self.schedule.clear_manual_override();
                self.push_event(EventKind::Audit, "Occupancy returned to schedule".to_string());
                (ResponseStatus::Success, None)
            }

            CommandType::SetEmergencyStop { asserted } => {
                self.emergency_stop = *asserted;
                if *asserted {
                    warn!("emergency stop asserted");
                    self.push_event(EventKind::Alarm, "Emergency stop asserted".to_string());
                } else {
                    info!("emergency stop released");
                    self.push_event(EventKind::Normal, "Emergency stop released".to_string());
                }
                (ResponseStatus::Success, None)
            }

            CommandType::AckAlarm { alarm } => {
                if self.core.alarms_mut().acknowledge(*alarm) {
                    self.push_event(EventKind::Audit, format!("{alarm} acknowledged"));
                    (ResponseStatus::Success, None)
                } else {
                    (ResponseStatus::Error, Some(format!("No active {alarm} alarm")))
                }
            }

            CommandType::ResetFanFailure => {
                if self.core.fan().is_failed() {
                    self.core.reset_fan_failure();
                    self.push_event(EventKind::Audit, "Fan failure reset".to_string());
                    (ResponseStatus::Success, None)
                } else {
                    (ResponseStatus::Error, Some("Fan failure not latched".to_string()))
                }
            }

            CommandType::SetAlarmsEnabled { enabled } => {
                self.core.alarms_mut().set_enabled(*enabled);
                self.push_event(EventKind::Audit, format!("Alarms enabled = {enabled}"));
                (ResponseStatus::Success, None)
            }
        }
    }

    pub fn queue_command(&mut self, command: Command) -> Result<(), ControllerError> {
        let now = Instant::now();
        self.cleanup_old_timestamps(now);

        if self.command_timestamps.len() >= MAX_COMMAND_RATE_PER_SEC as usize {
            return Err(ControllerError::RateLimitExceeded);
        }

        if self.command_timestamps.push(now).is_err() {
            self.command_timestamps.remove(0);
            let _ = self.command_timestamps.push(now);
        }

        self.command_queue
            .enqueue(command)
            .map_err(|_| ControllerError::CommandQueueFull)
    }

    pub fn process_commands(&mut self) -> Result<(), ControllerError> {
        while let Some(command) = self.command_queue.dequeue() {
            match self.execute_command(command) {
                Ok(response) => {
                    if self.response_buffer.push(response.clone()).is_err() {
                        // Buffer full: drop the oldest response.
                        self.response_buffer.remove(0);
                        let _ = self.response_buffer.push(response);
                    }
                }
                Err(e) => {
                    self.state.last_error = Some(format!("Command error: {e}"));
                }
            }

            self.state.command_count = self.state.command_count.saturating_add(1);
        }

        Ok(())
    }

    pub fn get_responses(&mut self) -> Vec<CommandResponse, 16> {
        core::mem::take(&mut self.response_buffer)
    }

    fn cleanup_old_timestamps(&mut self, now: Instant) {
        if let Some(cutoff) = now.checked_sub(std::time::Duration::from_millis(RATE_LIMIT_WINDOW_MS))
        {
            self.command_timestamps.retain(|&ts| ts >= cutoff);
        }
    }

    fn push_event(&mut self, kind: EventKind, message: String) {
        let timestamp = self.now_ms();
        if self.events.is_full() {
            self.events.remove(0);
        }
        let _ = self.events.push(EventRecord { timestamp, kind, message });
    }

    fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn get_state(&self) -> &ControllerState {
        &self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn schedule_mut(&mut self) -> &mut ScheduleManager {
        &mut self.schedule
    }

    pub fn outputs(&self) -> ControlOutputs {
        self.last_scan.as_ref().map_or(ControlOutputs::ALL_OFF, |scan| scan.outputs)
    }

    pub fn last_scan(&self) -> Option<&ScanResult> {
        self.last_scan.as_ref()
    }

    pub fn overrides(&self) -> &OutputOverrides {
        &self.overrides
    }

    pub fn emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    pub fn alarm_records(&self) -> &[crate::safety::AlarmRecord] {
        self.core.alarms().records()
    }

    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn get_tracked_commands(&self) -> &[crate::protocol::CommandTracker] {
        self.protocol.get_tracked_commands()
    }
}

/// Commands that stay available while the emergency stop is asserted:
/// queries, the stop itself, and alarm/failure housekeeping. Everything that
/// would drive an actuator waits for release.
fn allowed_during_emergency_stop(command_type: &CommandType) -> bool {
    matches!(
        command_type,
        CommandType::Ping
            | CommandType::SystemStatus
            | CommandType::SetEmergencyStop { .. }
            | CommandType::AckAlarm { .. }
            | CommandType::ResetFanFailure
            | CommandType::SetAlarmsEnabled { .. }
            | CommandType::ClearOverride { .. }
            | CommandType::ClearOccupancyOverride
    )
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("Command queue full")]
    CommandQueueFull,
    #[error("Command rate limit exceeded")]
    RateLimitExceeded,
}

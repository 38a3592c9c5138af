use crate::control::{
    ControlOutputs, Demand, OccupancyState, OutputOverrides, SensorSnapshot, Setpoints, UnitState,
};
use crate::safety::{AlarmKind, AlarmRecord};
use crate::telemetry::TrendSample;
use arrayvec::ArrayString;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_COMMAND_SIZE: usize = 512;
pub const MAX_RESPONSE_SIZE: usize = 1024;
pub const MAX_STATUS_SIZE: usize = 16384;

pub type CommandBuffer = ArrayString<MAX_COMMAND_SIZE>;
pub type ResponseBuffer = ArrayString<MAX_RESPONSE_SIZE>;
pub type StatusBuffer = ArrayString<MAX_STATUS_SIZE>;

/// Setpoint slots an operator can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetpointTarget {
    OccupiedCooling,
    OccupiedHeating,
    UnoccupiedCooling,
    UnoccupiedHeating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayId {
    Fan,
    Compressor,
    Heat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputId {
    Fan,
    Compressor,
    Heat,
    Damper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: u32,
    pub timestamp: u64,
    pub command_type: CommandType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandType {
    Ping,
    SystemStatus,
    SetSetpoint { target: SetpointTarget, value_f: f32 },
    OverrideRelay { relay: RelayId, on: bool },
    OverrideDamper { position_pct: u8 },
    ClearOverride { output: OutputId },
    SetOccupancyOverride { occupied: bool },
    ClearOccupancyOverride,
    SetEmergencyStop { asserted: bool },
    AckAlarm { alarm: AlarmKind },
    ResetFanFailure,
    SetAlarmsEnabled { enabled: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub id: u32,
    pub timestamp: u64,
    pub status: ResponseStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Error,
    InvalidCommand,

    // ACK/NACK semantics
    Acknowledged,
    NegativeAck,
    ExecutionStarted,
    ExecutionFailed,
    Timeout,
}

/// Status packet published every scan over the broadcast stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPacket {
    pub timestamp: u64,
    pub sequence_number: u32,
    pub occupancy: OccupancyState,
    pub unit_state: UnitState,
    pub demand: Demand,
    pub economizer_active: bool,
    pub emergency_stop: bool,
    pub sensors: SensorSnapshot,
    pub outputs: ControlOutputs,
    pub setpoints: Setpoints,
    pub overrides: OutputOverrides,
    pub alarms: std::vec::Vec<AlarmRecord>,
    pub events: std::vec::Vec<EventRecord>,
    pub trend: std::vec::Vec<TrendSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Alarm,
    Normal,
    Audit,
}

/// One operator-visible log line (alarm edges, command audit trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: u64,
    pub kind: EventKind,
    pub message: String,
}

// Command tracking for ACK/NACK semantics
const MAX_TRACKED_COMMANDS: usize = 16;
pub const COMMAND_TRACK_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTracker {
    pub command_id: u32,
    pub timestamp: u64,
    pub status: ResponseStatus,
    pub execution_start_time: Option<u64>,
    pub timeout_ms: u64,
    pub last_update: u64,
}

impl CommandTracker {
    pub fn new(command_id: u32, timestamp: u64, timeout_ms: u64) -> Self {
        Self {
            command_id,
            timestamp,
            status: ResponseStatus::Acknowledged,
            execution_start_time: None,
            timeout_ms,
            last_update: timestamp,
        }
    }

    pub fn is_expired(&self, current_time: u64) -> bool {
        current_time > self.timestamp + self.timeout_ms
    }

    pub fn update_status(&mut self, status: ResponseStatus, current_time: u64) {
        self.status = status;
        self.last_update = current_time;

        if matches!(status, ResponseStatus::ExecutionStarted) {
            self.execution_start_time = Some(current_time);
        }
    }
}

#[derive(Debug)]
pub struct ProtocolHandler {
    sequence_counter: u32,

    // Preallocated buffers
    command_buffer: CommandBuffer,
    response_buffer: ResponseBuffer,
    status_buffer: StatusBuffer,

    tracked_commands: Vec<CommandTracker, MAX_TRACKED_COMMANDS>,
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self {
            sequence_counter: 0,
            command_buffer: ArrayString::new(),
            response_buffer: ArrayString::new(),
            status_buffer: ArrayString::new(),
            tracked_commands: Vec::new(),
        }
    }

    pub fn parse_command(&mut self, json_str: &str) -> Result<Command, ProtocolError> {
        self.command_buffer.clear();
        if json_str.len() > MAX_COMMAND_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.command_buffer.push_str(json_str);

        serde_json::from_str::<Command>(json_str).map_err(|_| ProtocolError::InvalidJson)
    }

    pub fn validate_command(&self, command: &Command) -> Result<(), ProtocolError> {
        if command.id == 0 {
            return Err(ProtocolError::InvalidCommand);
        }

        match &command.command_type {
            CommandType::SetSetpoint { value_f, .. } => {
                if !value_f.is_finite() || *value_f < 40.0 || *value_f > 95.0 {
                    return Err(ProtocolError::InvalidParameter);
                }
            }
            CommandType::OverrideDamper { position_pct } => {
                if *position_pct > 100 {
                    return Err(ProtocolError::InvalidParameter);
                }
            }
            _ => {}
        }

        Ok(())
    }

    pub fn serialize_response(&mut self, response: &CommandResponse) -> Result<&str, ProtocolError> {
        self.response_buffer.clear();

        let json_str =
            serde_json::to_string(response).map_err(|_| ProtocolError::SerializationError)?;

        if json_str.len() > MAX_RESPONSE_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.response_buffer.push_str(&json_str);

        Ok(&self.response_buffer)
    }

    pub fn serialize_status(&mut self, packet: &StatusPacket) -> Result<&str, ProtocolError> {
        self.status_buffer.clear();

        let json_str =
            serde_json::to_string(packet).map_err(|_| ProtocolError::SerializationError)?;

        if json_str.len() > MAX_STATUS_SIZE {
            return Err(ProtocolError::MessageTooLarge);
        }
        self.status_buffer.push_str(&json_str);

        Ok(&self.status_buffer)
    }

    pub fn create_response(
        &mut self,
        command_id: u32,
        status: ResponseStatus,
        message: Option<&str>,
        timestamp: u64,
    ) -> CommandResponse {
        CommandResponse {
            id: command_id,
            timestamp,
            status,
            message: message.map(str::to_string),
        }
    }

    pub fn create_nack_response(
        &mut self,
        command_id: u32,
        reason: &str,
        timestamp: u64,
    ) -> CommandResponse {
        self.create_response(command_id, ResponseStatus::NegativeAck, Some(reason), timestamp)
    }

    pub fn next_sequence_number(&mut self) -> u32 {
        self.sequence_counter = self.sequence_counter.wrapping_add(1);
        self.sequence_counter
    }

    /// Start tracking a command with initial ACK.
    pub fn track_command(
        &mut self,
        command_id: u32,
        current_time: u64,
        timeout_ms: u64,
    ) -> Result<(), ProtocolError> {
        self.cleanup_expired_commands(current_time);

        if self.tracked_commands.iter().any(|t| t.command_id == command_id) {
            return Err(ProtocolError::InvalidCommand);
        }

        let tracker = CommandTracker::new(command_id, current_time, timeout_ms);
        if self.tracked_commands.push(tracker).is_err() {
            // Buffer full: evict the oldest tracker.
            self.tracked_commands.remove(0);
            let _ = self
                .tracked_commands
                .push(CommandTracker::new(command_id, current_time, timeout_ms));
        }

        Ok(())
    }

    pub fn update_command_status(
        &mut self,
        command_id: u32,
        status: ResponseStatus,
        current_time: u64,
    ) -> Result<(), ProtocolError> {
        if let Some(tracker) = self.tracked_commands.iter_mut().find(|t| t.command_id == command_id)
        {
            tracker.update_status(status, current_time);
            Ok(())
        } else {
            Err(ProtocolError::InvalidCommand)
        }
    }

    pub fn get_command_status(&self, command_id: u32) -> Option<&CommandTracker> {
        self.tracked_commands.iter().find(|t| t.command_id == command_id)
    }

    pub fn cleanup_expired_commands(&mut self, current_time: u64) {
        self.tracked_commands.retain(|tracker| !tracker.is_expired(current_time));
    }

    pub fn get_tracked_commands(&self) -> &[CommandTracker] {
        &self.tracked_commands
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON format")]
    InvalidJson,
    #[error("Message exceeds buffer size")]
    MessageTooLarge,
    #[error("Serialization failed")]
    SerializationError,
    #[error("Invalid command")]
    InvalidCommand,
    #[error("Invalid parameter")]
    InvalidParameter,
}

//! # RTU Controller
//!
//! Control-logic core for a packaged rooftop unit (RTU): a periodic decision
//! engine that reads zone, outdoor, discharge-air, fan-status, and CO2 inputs
//! and computes fan, compressor (Y1), heat (W1), and outside-air-damper
//! commands while enforcing safety interlocks.
//!
//! ## Features
//!
//! - **Layered control pipeline**: occupancy → setpoints → thermal demand →
//!   cooling source selection / heating → demand control ventilation →
//!   fan supervision → safety veto, in fixed order, once per scan
//! - **Economizer / mechanical cooling mutual exclusion** with strict
//!   outdoor-air changeover
//! - **Fan failure detection**: 30-second command/status mismatch window,
//!   latched shutdown, explicit re-arm
//! - **Safety layer**: freeze protection alarm and an emergency stop that
//!   overrides every other decision within one scan
//! - **Command processing**: JSON-based commands with ACK/NACK semantics
//! - **Status publication**: per-scan status packets with alarm records and
//!   a short in-memory trend ring
//!
//! ## Quick Start
//!
//! ```rust
//! use rtuctl::RtuController;
//! use rtuctl::control::SensorSnapshot;
//!
//! let mut controller = RtuController::new(Default::default());
//! controller.start();
//!
//! let sensors = SensorSnapshot {
//!     zone_temp_f: 74.5,
//!     outdoor_temp_f: 65.0,
//!     discharge_air_temp_f: 55.0,
//!     co2_ppm: Some(450),
//!     fan_status: true,
//! };
//!
//! // One scan: run the pipeline and maybe publish a status packet.
//! if let Ok(Some(status)) = controller.update(sensors) {
//!     println!("Status: {}", status);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`controller`] - Main orchestrator and public API
//! - [`control`] - The per-scan control pipeline and its stages
//! - [`safety`] - Alarm management and the final safety veto
//! - [`protocol`] - Command/response protocol handling
//! - [`schedule`] - Weekly occupancy schedule and holiday calendar
//! - [`telemetry`] - Status packet generation and trend history
//! - [`plant`] - Zone thermal simulation for the simulator binary

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod control;
pub mod controller;
pub mod plant;
pub mod protocol;
pub mod safety;
pub mod schedule;
pub mod telemetry;

// Re-export main public types for convenience
pub use config::ControllerConfig;
pub use control::{ControlOutputs, SensorSnapshot};
pub use controller::RtuController;
pub use protocol::{Command, StatusPacket};

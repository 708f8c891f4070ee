// Message types exchanged with callers and the CAN transport

use embedded_can::{ExtendedId, Frame};
use serde::{Deserialize, Serialize};

use crate::config::CAN_MAX_DLC;
use crate::motor::codec::{CodecError, ControlMode, Result};

/// Command in physical units, one variant per control mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MotorCommand {
    Duty { duty: f64 },
    Current { current_a: f64 },
    CurrentBrake { current_a: f64 },
    Rpm { rpm: f64 },
    Position { position_deg: f64 },
    SetOrigin { origin_mode: u32 },
    PositionSpeed { position_deg: f64, speed_rpm: i16, accel: i16 },
}

impl MotorCommand {
    /// Control mode this command is sent in
    pub fn mode(&self) -> ControlMode {
        match self {
            MotorCommand::Duty { .. } => ControlMode::DutyCycle,
            MotorCommand::Current { .. } => ControlMode::CurrentLoop,
            MotorCommand::CurrentBrake { .. } => ControlMode::CurrentBrake,
            MotorCommand::Rpm { .. } => ControlMode::Velocity,
            MotorCommand::Position { .. } => ControlMode::Position,
            MotorCommand::SetOrigin { .. } => ControlMode::SetOrigin,
            MotorCommand::PositionSpeed { .. } => ControlMode::PositionVelocityLoop,
        }
    }
}

/// Encoded frame, ready for a CAN transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub arbitration_id: u32,
    pub payload: Vec<u8>,
    pub extended: bool,
}

impl CommandFrame {
    /// Convert into the transport's frame type (always an extended ID)
    ///
    /// A payload the frame type cannot carry is reported against the classic
    /// CAN data length.
    pub fn to_can_frame<F: Frame>(&self) -> Result<F> {
        let id = ExtendedId::new(self.arbitration_id).ok_or(CodecError::ValueOutOfRange {
            field: "arbitration_id",
            value: f64::from(self.arbitration_id),
        })?;

        F::new(id, &self.payload).ok_or(CodecError::MalformedFrame {
            expected: CAN_MAX_DLC,
            actual: self.payload.len(),
        })
    }
}

/// Decoded status frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub control_mode: u8,
    pub position_deg: f64,
    pub speed_rpm: f64,
    pub current_a: f64,
    pub temperature_c: u8,
    pub error_code: u8,
}

impl TelemetryRecord {
    /// Reported control mode, if it is one we know
    pub fn mode(&self) -> Result<ControlMode> {
        ControlMode::try_from(self.control_mode)
    }
}

// CubeMars servo-mode CAN codec
//
// Commands go out on a 29-bit extended ID:
//   bits [0, 8)  = node id
//   bits [8, 16) = control mode code
// Payload fields are big-endian fixed-point integers.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::{
    CURRENT_SCALE, DUTY_SCALE, MODE_MASK, MODE_SHIFT, NODE_ID_MASK,
    NODE_ID_SHIFT, POSITION_SCALE, POS_SPD_POSITION_SCALE, RPM_SCALE, STATUS_CURRENT_SCALE,
    STATUS_FRAME_LEN, STATUS_POSITION_SCALE, STATUS_SPEED_SCALE,
};
use crate::messages::{CommandFrame, MotorCommand, TelemetryRecord};

/// Control modes accepted by the controller (second-lowest byte of the arbitration ID)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    DutyCycle = 0,
    CurrentLoop = 1,
    CurrentBrake = 2,
    Velocity = 3,
    Position = 4,
    SetOrigin = 5,
    PositionVelocityLoop = 6,
}

impl ControlMode {
    pub const ALL: [ControlMode; 7] = [
        ControlMode::DutyCycle,
        ControlMode::CurrentLoop,
        ControlMode::CurrentBrake,
        ControlMode::Velocity,
        ControlMode::Position,
        ControlMode::SetOrigin,
        ControlMode::PositionVelocityLoop,
    ];

    /// Wire code of this mode
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ControlMode {
    type Error = CodecError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ControlMode::DutyCycle),
            1 => Ok(ControlMode::CurrentLoop),
            2 => Ok(ControlMode::CurrentBrake),
            3 => Ok(ControlMode::Velocity),
            4 => Ok(ControlMode::Position),
            5 => Ok(ControlMode::SetOrigin),
            6 => Ok(ControlMode::PositionVelocityLoop),
            other => Err(CodecError::UnknownControlMode(other)),
        }
    }
}

/// Errors produced while encoding commands or decoding status frames
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("{field} = {value} does not fit the wire format")]
    ValueOutOfRange { field: &'static str, value: f64 },

    #[error("Malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Unknown control mode code {0}")]
    UnknownControlMode(u8),
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Codec for a single motor, identified by its node id.
///
/// Immutable after construction, so it can be copied freely and shared
/// between threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotorCodec {
    node_id: u8,
}

impl MotorCodec {
    pub const fn new(node_id: u8) -> Self {
        Self { node_id }
    }

    pub const fn node_id(&self) -> u8 {
        self.node_id
    }

    /// Arbitration ID for a command in the given mode
    pub const fn arbitration_id(&self, mode: ControlMode) -> u32 {
        ((self.node_id as u32) << NODE_ID_SHIFT) | ((mode.code() as u32) << MODE_SHIFT)
    }

    /// Node id field of an arbitration ID
    pub const fn node_of(arbitration_id: u32) -> u8 {
        ((arbitration_id >> NODE_ID_SHIFT) & NODE_ID_MASK) as u8
    }

    /// Control mode field of an arbitration ID
    pub const fn mode_code_of(arbitration_id: u32) -> u8 {
        ((arbitration_id >> MODE_SHIFT) & MODE_MASK) as u8
    }

    /// Duty cycle, nominally in [-1.0, 1.0]
    pub fn set_duty(&self, duty: f64) -> Result<CommandFrame> {
        let raw = to_fixed_i32("duty", duty, DUTY_SCALE)?;
        Ok(self.frame(ControlMode::DutyCycle, raw.to_be_bytes().to_vec()))
    }

    /// Current loop setpoint in amps
    pub fn set_current(&self, current_a: f64) -> Result<CommandFrame> {
        let raw = to_fixed_i32("current", current_a, CURRENT_SCALE)?;
        Ok(self.frame(ControlMode::CurrentLoop, raw.to_be_bytes().to_vec()))
    }

    /// Brake current in amps
    pub fn set_current_brake(&self, current_a: f64) -> Result<CommandFrame> {
        let raw = to_fixed_i32("brake current", current_a, CURRENT_SCALE)?;
        Ok(self.frame(ControlMode::CurrentBrake, raw.to_be_bytes().to_vec()))
    }

    /// Velocity setpoint in electrical rpm
    pub fn set_rpm(&self, rpm: f64) -> Result<CommandFrame> {
        let raw = to_fixed_i32("rpm", rpm, RPM_SCALE)?;
        Ok(self.frame(ControlMode::Velocity, raw.to_be_bytes().to_vec()))
    }

    /// Position setpoint in degrees
    pub fn set_pos(&self, position_deg: f64) -> Result<CommandFrame> {
        let raw = to_fixed_i32("position", position_deg, POSITION_SCALE)?;
        Ok(self.frame(ControlMode::Position, raw.to_be_bytes().to_vec()))
    }

    /// Set the current position as origin. The selector is passed through as-is.
    pub fn set_origin(&self, origin_mode: u32) -> CommandFrame {
        self.frame(ControlMode::SetOrigin, origin_mode.to_be_bytes().to_vec())
    }

    /// Position with speed and acceleration limits
    ///
    /// Payload: position (i32, deg x 10000), speed (i16), acceleration (i16)
    pub fn set_pos_spd(&self, position_deg: f64, speed_rpm: i16, accel: i16) -> Result<CommandFrame> {
        let raw = to_fixed_i32("position", position_deg, POS_SPD_POSITION_SCALE)?;

        let mut payload = Vec::with_capacity(8);
        payload.extend_from_slice(&raw.to_be_bytes());
        payload.extend_from_slice(&speed_rpm.to_be_bytes());
        payload.extend_from_slice(&accel.to_be_bytes());

        Ok(self.frame(ControlMode::PositionVelocityLoop, payload))
    }

    /// Encode any command
    pub fn encode(&self, command: &MotorCommand) -> Result<CommandFrame> {
        match *command {
            MotorCommand::Duty { duty } => self.set_duty(duty),
            MotorCommand::Current { current_a } => self.set_current(current_a),
            MotorCommand::CurrentBrake { current_a } => self.set_current_brake(current_a),
            MotorCommand::Rpm { rpm } => self.set_rpm(rpm),
            MotorCommand::Position { position_deg } => self.set_pos(position_deg),
            MotorCommand::SetOrigin { origin_mode } => Ok(self.set_origin(origin_mode)),
            MotorCommand::PositionSpeed {
                position_deg,
                speed_rpm,
                accel,
            } => self.set_pos_spd(position_deg, speed_rpm, accel),
        }
    }

    /// Build a frame for a raw mode code with a prepared payload
    pub fn encode_with_mode(&self, mode_code: u8, payload: &[u8]) -> Result<CommandFrame> {
        let mode = ControlMode::try_from(mode_code)?;
        Ok(self.frame(mode, payload.to_vec()))
    }

    /// Decode a status frame
    ///
    /// Layout: position u32, speed u16, current u16, temperature u8, error u8 (big-endian)
    pub fn decode(arbitration_id: u32, data: &[u8]) -> Result<TelemetryRecord> {
        if data.len() < STATUS_FRAME_LEN {
            return Err(CodecError::MalformedFrame {
                expected: STATUS_FRAME_LEN,
                actual: data.len(),
            });
        }

        let position_raw = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let speed_raw = u16::from_be_bytes([data[4], data[5]]);
        let current_raw = u16::from_be_bytes([data[6], data[7]]);

        let record = TelemetryRecord {
            control_mode: Self::mode_code_of(arbitration_id),
            position_deg: f64::from(position_raw) * STATUS_POSITION_SCALE,
            speed_rpm: f64::from(speed_raw) * STATUS_SPEED_SCALE,
            current_a: f64::from(current_raw) * STATUS_CURRENT_SCALE,
            temperature_c: data[8],
            error_code: data[9],
        };
        trace!("Decoded status 0x{:08X}: {:?}", arbitration_id, record);
        Ok(record)
    }

    /// Decode a status frame already in descriptor form
    pub fn decode_frame(frame: &CommandFrame) -> Result<TelemetryRecord> {
        Self::decode(frame.arbitration_id, &frame.payload)
    }

    fn frame(&self, mode: ControlMode, payload: Vec<u8>) -> CommandFrame {
        let arbitration_id = self.arbitration_id(mode);
        trace!(
            "Encoded {:?} for node {}: id=0x{:08X} payload={:02X?}",
            mode, self.node_id, arbitration_id, payload
        );
        CommandFrame {
            arbitration_id,
            payload,
            extended: true,
        }
    }
}

/// Scale a physical value and round it to the nearest i32, rejecting overflow
fn to_fixed_i32(field: &'static str, value: f64, scale: f64) -> Result<i32> {
    let scaled = (value * scale).round();
    if !scaled.is_finite() || scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(CodecError::ValueOutOfRange { field, value });
    }
    Ok(scaled as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXTENDED_ID_MAX;

    fn i32_at(payload: &[u8], offset: usize) -> i32 {
        i32::from_be_bytes(payload[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_arbitration_id_layout() {
        for node_id in 0..=u8::MAX {
            let codec = MotorCodec::new(node_id);
            let frames = [
                (ControlMode::DutyCycle, codec.set_duty(0.1).unwrap()),
                (ControlMode::CurrentLoop, codec.set_current(1.0).unwrap()),
                (ControlMode::CurrentBrake, codec.set_current_brake(1.0).unwrap()),
                (ControlMode::Velocity, codec.set_rpm(100.0).unwrap()),
                (ControlMode::Position, codec.set_pos(10.0).unwrap()),
                (ControlMode::SetOrigin, codec.set_origin(1)),
                (ControlMode::PositionVelocityLoop, codec.set_pos_spd(1.0, 10, 10).unwrap()),
            ];

            for (mode, frame) in frames {
                assert_eq!(frame.arbitration_id & 0xFF, node_id as u32);
                assert_eq!((frame.arbitration_id >> 8) & 0xFF, mode.code() as u32);
                assert_eq!(frame.arbitration_id >> 16, 0);
                assert!(frame.arbitration_id <= EXTENDED_ID_MAX);
                assert!(frame.extended);
                assert_eq!(MotorCodec::node_of(frame.arbitration_id), node_id);
                assert_eq!(MotorCodec::mode_code_of(frame.arbitration_id), mode.code());
            }
        }
    }

    #[test]
    fn test_duty_payload() {
        let frame = MotorCodec::new(1).set_duty(0.5).unwrap();
        assert_eq!(frame.payload, 50000i32.to_be_bytes().to_vec());
        assert_eq!(frame.payload, vec![0x00, 0x00, 0xC3, 0x50]);
    }

    #[test]
    fn test_negative_current_is_twos_complement() {
        let frame = MotorCodec::new(1).set_current(-2.5).unwrap();
        assert_eq!(frame.payload, vec![0xFF, 0xFF, 0xF6, 0x3C]);
        assert_eq!(i32_at(&frame.payload, 0), -2500);
    }

    #[test]
    fn test_values_are_rounded() {
        let codec = MotorCodec::new(3);
        assert_eq!(i32_at(&codec.set_current_brake(1.0006).unwrap().payload, 0), 1001);
        assert_eq!(i32_at(&codec.set_rpm(-1500.6).unwrap().payload, 0), -1501);
        assert_eq!(i32_at(&codec.set_pos(-0.0000004).unwrap().payload, 0), 0);
    }

    #[test]
    fn test_pos_spd_payload() {
        let frame = MotorCodec::new(0x20).set_pos_spd(90.0, 1000, 500).unwrap();
        assert_eq!(frame.payload.len(), 8);
        assert_eq!(frame.payload[0..4], 900000i32.to_be_bytes());
        assert_eq!(frame.payload[4..6], 1000i16.to_be_bytes());
        assert_eq!(frame.payload[6..8], 500i16.to_be_bytes());
        assert_eq!(frame.arbitration_id, 0x0620);
    }

    #[test]
    fn test_origin_passthrough() {
        let frame = MotorCodec::new(5).set_origin(2);
        assert_eq!(frame.payload, vec![0, 0, 0, 2]);
        assert_eq!(frame.arbitration_id, 0x0505);
    }

    #[test]
    fn test_overflow_rejected() {
        let codec = MotorCodec::new(1);
        assert!(matches!(
            codec.set_duty(30000.0),
            Err(CodecError::ValueOutOfRange { field: "duty", .. })
        ));
        assert!(matches!(codec.set_pos(-3000.0), Err(CodecError::ValueOutOfRange { .. })));
        assert!(matches!(codec.set_rpm(f64::NAN), Err(CodecError::ValueOutOfRange { .. })));
        assert!(matches!(
            codec.set_current(f64::INFINITY),
            Err(CodecError::ValueOutOfRange { .. })
        ));
        assert!(matches!(
            codec.set_current_brake(3e6),
            Err(CodecError::ValueOutOfRange { field: "brake current", .. })
        ));
        assert!(matches!(
            codec.set_pos_spd(214748.3648, 0, 0),
            Err(CodecError::ValueOutOfRange { field: "position", .. })
        ));
        // Largest position that still fits
        assert!(codec.set_pos(2147.483647).is_ok());
        assert!(codec.set_pos_spd(214748.3647, 0, 0).is_ok());
    }

    #[test]
    fn test_pos_spd_negative_fields() {
        let frame = MotorCodec::new(1).set_pos_spd(-90.0, -1000, -500).unwrap();
        assert_eq!(frame.payload, vec![0xFF, 0xF2, 0x44, 0x60, 0xFC, 0x18, 0xFE, 0x0C]);
    }

    #[test]
    fn test_decode_status() {
        let data = [0, 0, 0, 100, 0, 5, 0, 10, 40, 2];
        let record = MotorCodec::decode(0x0401, &data).unwrap();

        assert_eq!(record.control_mode, 4);
        assert!((record.position_deg - 0.01).abs() < 1e-12);
        assert!((record.speed_rpm - 50.0).abs() < 1e-12);
        assert!((record.current_a - 0.1).abs() < 1e-12);
        assert_eq!(record.temperature_c, 40);
        assert_eq!(record.error_code, 2);
        assert_eq!(record.mode().unwrap(), ControlMode::Position);

        let frame = CommandFrame {
            arbitration_id: 0x0401,
            payload: data.to_vec(),
            extended: true,
        };
        assert_eq!(MotorCodec::decode_frame(&frame).unwrap(), record);
    }

    #[test]
    fn test_decode_short_frame() {
        for len in 0..STATUS_FRAME_LEN {
            let data = vec![0xAB; len];
            assert!(matches!(
                MotorCodec::decode(0x0401, &data),
                Err(CodecError::MalformedFrame { expected: STATUS_FRAME_LEN, actual }) if actual == len
            ));
        }
    }

    #[test]
    fn test_position_roundtrip() {
        let position = 12.345678;
        let frame = MotorCodec::new(1).set_pos(position).unwrap();
        let raw = i32_at(&frame.payload, 0);

        let mut status = (raw as u32).to_be_bytes().to_vec();
        status.extend_from_slice(&[0; 6]);
        let record = MotorCodec::decode(frame.arbitration_id, &status).unwrap();

        // status reports 1e-4 deg per count, command uses 1e-6 deg per count
        let recovered = record.position_deg / (POSITION_SCALE * STATUS_POSITION_SCALE);
        assert!((recovered - position).abs() <= 1e-6);
    }

    #[test]
    fn test_mode_codes() {
        for (i, mode) in ControlMode::ALL.iter().enumerate() {
            assert_eq!(mode.code() as usize, i);
            assert_eq!(ControlMode::try_from(mode.code()).unwrap(), *mode);
        }
        assert_eq!(ControlMode::try_from(7), Err(CodecError::UnknownControlMode(7)));
    }

    #[test]
    fn test_encode_with_mode() {
        let codec = MotorCodec::new(9);
        let frame = codec.encode_with_mode(3, &[0, 0, 1, 0]).unwrap();
        assert_eq!(frame.arbitration_id, 0x0309);
        assert_eq!(codec.encode_with_mode(0x42, &[]), Err(CodecError::UnknownControlMode(0x42)));
    }

    #[test]
    fn test_encode_dispatch() {
        let codec = MotorCodec::new(2);
        let cmd = MotorCommand::PositionSpeed {
            position_deg: 90.0,
            speed_rpm: 1000,
            accel: 500,
        };
        assert_eq!(codec.encode(&cmd).unwrap(), codec.set_pos_spd(90.0, 1000, 500).unwrap());
        assert_eq!(
            codec.encode(&MotorCommand::SetOrigin { origin_mode: 1 }).unwrap(),
            codec.set_origin(1)
        );
    }
}

// High-level driver for one CubeMars motor on a CAN bus
//
// Wraps any blocking `embedded_can` transport: commands are encoded by the
// codec and transmitted, status frames for this node are received and decoded.

use embedded_can::blocking::Can;
use embedded_can::{Error as _, ErrorKind, Frame, Id};
use tracing::{debug, info, warn};

use super::codec::{CodecError, MotorCodec};
use crate::messages::{MotorCommand, TelemetryRecord};

/// Error types for driver operations
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("CAN bus error: {0:?}")]
    Bus(ErrorKind),

    #[error("Transport already released")]
    Closed,
}

/// One motor on a CAN bus
///
/// The motor is stopped when the driver is dropped, unless the transport
/// was taken back with [`MotorDriver::into_inner`].
pub struct MotorDriver<C: Can> {
    bus: Option<C>,
    codec: MotorCodec,
}

impl<C: Can> MotorDriver<C> {
    pub fn new(bus: C, node_id: u8) -> Self {
        info!("Motor driver for node {} ready", node_id);
        Self {
            bus: Some(bus),
            codec: MotorCodec::new(node_id),
        }
    }

    fn bus(&mut self) -> Result<&mut C, DriverError> {
        self.bus.as_mut().ok_or(DriverError::Closed)
    }

    /// Encode and transmit a command
    pub fn send(&mut self, command: &MotorCommand) -> Result<(), DriverError> {
        let frame = self.codec.encode(command)?;
        debug!(
            "Sending {:?} to node {}: id=0x{:08X} payload={:02X?}",
            command.mode(),
            self.codec.node_id(),
            frame.arbitration_id,
            frame.payload
        );

        let can_frame: C::Frame = frame.to_can_frame()?;
        self.bus()?
            .transmit(&can_frame)
            .map_err(|e| DriverError::Bus(e.kind()))
    }

    pub fn set_duty(&mut self, duty: f64) -> Result<(), DriverError> {
        self.send(&MotorCommand::Duty { duty })
    }

    pub fn set_current(&mut self, current_a: f64) -> Result<(), DriverError> {
        self.send(&MotorCommand::Current { current_a })
    }

    pub fn set_current_brake(&mut self, current_a: f64) -> Result<(), DriverError> {
        self.send(&MotorCommand::CurrentBrake { current_a })
    }

    pub fn set_rpm(&mut self, rpm: f64) -> Result<(), DriverError> {
        self.send(&MotorCommand::Rpm { rpm })
    }

    pub fn set_pos(&mut self, position_deg: f64) -> Result<(), DriverError> {
        self.send(&MotorCommand::Position { position_deg })
    }

    pub fn set_origin(&mut self, origin_mode: u32) -> Result<(), DriverError> {
        self.send(&MotorCommand::SetOrigin { origin_mode })
    }

    pub fn set_pos_spd(&mut self, position_deg: f64, speed_rpm: i16, accel: i16) -> Result<(), DriverError> {
        self.send(&MotorCommand::PositionSpeed {
            position_deg,
            speed_rpm,
            accel,
        })
    }

    /// Receive frames until a status frame from this node arrives, then decode it
    ///
    /// Standard-ID frames and frames from other nodes are skipped.
    pub fn read_status(&mut self) -> Result<TelemetryRecord, DriverError> {
        loop {
            let frame = self.bus()?.receive().map_err(|e| DriverError::Bus(e.kind()))?;

            let arbitration_id = match frame.id() {
                Id::Extended(id) => id.as_raw(),
                Id::Standard(id) => {
                    debug!("Skipping standard frame 0x{:03X}", id.as_raw());
                    continue;
                }
            };

            let node = MotorCodec::node_of(arbitration_id);
            if node != self.codec.node_id() {
                debug!("Skipping frame 0x{:08X} for node {}", arbitration_id, node);
                continue;
            }

            return match MotorCodec::decode(arbitration_id, frame.data()) {
                Ok(record) => {
                    debug!("Status from node {}: {:?}", node, record);
                    Ok(record)
                }
                Err(e) => {
                    warn!("Bad status frame from node {}: {}", node, e);
                    Err(DriverError::Codec(e))
                }
            };
        }
    }

    /// Stop the motor (zero current)
    pub fn stop(&mut self) -> Result<(), DriverError> {
        info!("Stopping motor {}", self.codec.node_id());
        self.set_current(0.0)
    }

    pub fn node_id(&self) -> u8 {
        self.codec.node_id()
    }

    pub fn codec(&self) -> MotorCodec {
        self.codec
    }

    /// Give the transport back without stopping the motor
    ///
    /// Returns `None` only if the transport was already released.
    pub fn into_inner(mut self) -> Option<C> {
        self.bus.take()
    }
}

impl<C: Can> Drop for MotorDriver<C> {
    fn drop(&mut self) {
        if self.bus.is_none() {
            return;
        }
        if let Err(e) = self.stop() {
            warn!("Failed to stop motor {} on drop: {}", self.codec.node_id(), e);
        }
    }
}

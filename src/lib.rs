//! Command/telemetry codec for CubeMars brushless motor controllers on CAN.
//!
//! [`MotorCodec`] turns physical-unit commands into extended-ID CAN frames and
//! decodes status frames into [`TelemetryRecord`]s. [`MotorDriver`] pairs the
//! codec with any blocking `embedded_can` transport.

pub mod config;
pub mod messages;
pub mod motor;

pub use messages::{CommandFrame, MotorCommand, TelemetryRecord};
pub use motor::{CodecError, ControlMode, DriverError, MotorCodec, MotorDriver};

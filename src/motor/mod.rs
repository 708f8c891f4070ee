// Motor module for CubeMars servo-mode controllers
//
// Provides:
// - Command/telemetry codec (physical units <-> CAN frames)
// - High-level driver over a generic `embedded_can` transport

pub mod codec;
mod driver;

pub use codec::{CodecError, ControlMode, MotorCodec};
pub use driver::{DriverError, MotorDriver};

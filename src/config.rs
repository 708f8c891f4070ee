// Protocol constants: arbitration ID layout, fixed-point scales, CLI defaults

// Arbitration ID layout (29-bit extended ID)
// bits [0, 8)  = node id
// bits [8, 16) = control mode code
pub const NODE_ID_SHIFT: u32 = 0;
pub const NODE_ID_MASK: u32 = 0xFF;
pub const MODE_SHIFT: u32 = 8;
pub const MODE_MASK: u32 = 0xFF;

/// Largest value an extended (29-bit) CAN identifier can hold
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

// Command scales (physical unit -> wire integer)
pub const DUTY_SCALE: f64 = 100_000.0;
pub const CURRENT_SCALE: f64 = 1_000.0; // A -> mA
pub const RPM_SCALE: f64 = 1.0;
pub const POSITION_SCALE: f64 = 1_000_000.0; // deg -> micro-deg
pub const POS_SPD_POSITION_SCALE: f64 = 10_000.0;

// Status scales (wire integer -> physical unit)
pub const STATUS_POSITION_SCALE: f64 = 0.0001; // deg
pub const STATUS_SPEED_SCALE: f64 = 10.0; // rpm
pub const STATUS_CURRENT_SCALE: f64 = 0.01; // A

/// Data bytes in a classic CAN frame
pub const CAN_MAX_DLC: usize = 8;

/// Minimum payload length of a status frame
pub const STATUS_FRAME_LEN: usize = 10;

// CLI defaults
pub const DEFAULT_NODE_ID: u8 = 1;
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

// Bench tool: encode a command for one motor, or decode a status payload
//
// Usage:
//   cubemars-can --node 104 encode pos-spd 90 1000 500
//   cubemars-can encode json '{"mode":"duty","duty":0.5}'
//   cubemars-can decode --id 0x401 "00000064 0005 000A 28 02"

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use cubemars_can::config::{DEFAULT_LOG_DIRECTIVE, DEFAULT_NODE_ID};
use cubemars_can::{MotorCodec, MotorCommand};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "cubemars-can", about = "Encode CubeMars CAN commands and decode status frames")]
struct Cli {
    /// Node id of the target motor
    #[arg(short, long, default_value_t = DEFAULT_NODE_ID)]
    node: u8,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Encode a command and print the frame as JSON
    Encode {
        #[command(subcommand)]
        command: CommandArgs,
    },
    /// Decode a status payload (hex) and print the telemetry as JSON
    Decode {
        /// Arbitration ID (hex with 0x prefix, or decimal)
        #[arg(long, value_parser = parse_id)]
        id: u32,
        /// Payload bytes in hex, spaces allowed
        payload: String,
    },
}

#[derive(Subcommand)]
enum CommandArgs {
    Duty {
        #[arg(allow_negative_numbers = true)]
        duty: f64,
    },
    Current {
        #[arg(allow_negative_numbers = true)]
        amps: f64,
    },
    Brake {
        #[arg(allow_negative_numbers = true)]
        amps: f64,
    },
    Rpm {
        #[arg(allow_negative_numbers = true)]
        rpm: f64,
    },
    Pos {
        #[arg(allow_negative_numbers = true)]
        degrees: f64,
    },
    Origin {
        mode: u32,
    },
    PosSpd {
        #[arg(allow_negative_numbers = true)]
        degrees: f64,
        #[arg(allow_negative_numbers = true)]
        speed: i16,
        #[arg(allow_negative_numbers = true)]
        accel: i16,
    },
    /// JSON command, e.g. '{"mode":"rpm","rpm":1500}'
    Json { command: String },
}

impl CommandArgs {
    fn into_command(self) -> Result<MotorCommand, BoxError> {
        Ok(match self {
            CommandArgs::Duty { duty } => MotorCommand::Duty { duty },
            CommandArgs::Current { amps } => MotorCommand::Current { current_a: amps },
            CommandArgs::Brake { amps } => MotorCommand::CurrentBrake { current_a: amps },
            CommandArgs::Rpm { rpm } => MotorCommand::Rpm { rpm },
            CommandArgs::Pos { degrees } => MotorCommand::Position {
                position_deg: degrees,
            },
            CommandArgs::Origin { mode } => MotorCommand::SetOrigin { origin_mode: mode },
            CommandArgs::PosSpd {
                degrees,
                speed,
                accel,
            } => MotorCommand::PositionSpeed {
                position_deg: degrees,
                speed_rpm: speed,
                accel,
            },
            CommandArgs::Json { command } => serde_json::from_str(&command)?,
        })
    }
}

fn parse_id(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid arbitration id '{}': {}", s, e))
}

fn parse_hex(s: &str) -> Result<Vec<u8>, BoxError> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(format!("invalid hex payload '{}'", s).into());
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(BoxError::from))
        .collect()
}

fn run(cli: Cli) -> Result<(), BoxError> {
    let codec = MotorCodec::new(cli.node);

    match cli.action {
        Action::Encode { command } => {
            let command = command.into_command()?;
            info!("Encoding {:?} for node {}", command, codec.node_id());
            let frame = codec.encode(&command)?;
            println!("{}", serde_json::to_string_pretty(&frame)?);
        }
        Action::Decode { id, payload } => {
            let data = parse_hex(&payload)?;
            info!("Decoding {} bytes from 0x{:08X}", data.len(), id);
            let record = MotorCodec::decode(id, &data)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }
    Ok(())
}

fn main() {
    // Setup logging (set RUST_LOG=debug or trace for frame dumps)
    let filter = match DEFAULT_LOG_DIRECTIVE.parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

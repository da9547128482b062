use crate::internals::*;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// One of the three output ports of the brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorPort {
    A,
    B,
    C,
}

impl MotorPort {
    /// All output ports in index order.
    pub const ALL: [MotorPort; 3] = [MotorPort::A, MotorPort::B, MotorPort::C];

    /// Port index as sent on the wire.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MotorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One of the four input ports of the brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorPort {
    S1,
    S2,
    S3,
    S4,
}

impl SensorPort {
    /// All input ports in index order.
    pub const ALL: [SensorPort; 4] = [
        SensorPort::S1,
        SensorPort::S2,
        SensorPort::S3,
        SensorPort::S4,
    ];

    /// Port index as sent on the wire.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SensorPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Sensor type byte of the set-input-mode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorType {
    NoSensor = 0x00,
    Switch = 0x01,
    Temperature = 0x02,
    Reflection = 0x03,
    Angle = 0x04,
    LightActive = 0x05,
    LightInactive = 0x06,
    SoundDb = 0x07,
    SoundDba = 0x08,
    Custom = 0x09,
    LowSpeed = 0x0A,
    LowSpeed9V = 0x0B,
}

impl SensorType {
    /// Parses the sensor type byte reported in input-values replies.
    pub fn from_byte(byte: u8) -> Option<SensorType> {
        Some(match byte {
            0x00 => SensorType::NoSensor,
            0x01 => SensorType::Switch,
            0x02 => SensorType::Temperature,
            0x03 => SensorType::Reflection,
            0x04 => SensorType::Angle,
            0x05 => SensorType::LightActive,
            0x06 => SensorType::LightInactive,
            0x07 => SensorType::SoundDb,
            0x08 => SensorType::SoundDba,
            0x09 => SensorType::Custom,
            0x0A => SensorType::LowSpeed,
            0x0B => SensorType::LowSpeed9V,
            _ => return None,
        })
    }

    /// The sensor family this type belongs to.
    pub fn kind(self) -> SensorKind {
        match self {
            SensorType::Switch => SensorKind::Touch,
            SensorType::Reflection | SensorType::LightActive | SensorType::LightInactive => {
                SensorKind::Light
            }
            SensorType::SoundDb | SensorType::SoundDba => SensorKind::Sound,
            SensorType::LowSpeed | SensorType::LowSpeed9V => SensorKind::Ultrasonic,
            SensorType::NoSensor
            | SensorType::Temperature
            | SensorType::Angle
            | SensorType::Custom => SensorKind::None,
        }
    }
}

/// Sensor mode byte of the set-input-mode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SensorMode {
    Raw = 0x00,
    Boolean = 0x20,
    TransitionCount = 0x40,
    PeriodCounter = 0x60,
    PercentFullScale = 0x80,
    Celsius = 0xA0,
    Fahrenheit = 0xC0,
    AngleSteps = 0xE0,
}

/// The family of sensor attached to an input, as recorded by sensor setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorKind {
    #[default]
    None,
    Touch,
    Light,
    Sound,
    Ultrasonic,
}

/// Last known state of one output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorChannel {
    /// Last commanded power, within -100..=100.
    pub power: i8,
    /// Last known tachometer count.
    pub position: i32,
}

/// Last known state of one input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorChannel {
    pub kind: SensorKind,
    /// Sensor type sent by the last setup, if any.
    pub sensor_type: Option<SensorType>,
    /// Scaled value.
    pub value: i16,
    /// Unscaled A/D value.
    pub raw_value: u16,
}

/// Runtime configuration of a session.
///
/// # Example
/// ```ignore
/// let options = SessionOptions::default()
///     .with_command_timeout(Duration::from_millis(500))
///     .with_display_write_delay(Duration::from_millis(30));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Timeout of ordinary reply-expecting direct commands.
    pub command_timeout: Duration,
    /// Timeout of bulk system commands (IO map and display reads).
    pub bulk_timeout: Duration,
    /// Upper bound of low-speed status polls during distance sensing.
    pub ls_poll_attempts: u8,
    /// Fixed delay before each low-speed status poll.
    pub ls_poll_delay: Duration,
    /// Fixed delay between display write chunks.
    pub display_write_delay: Duration,
}

impl SessionOptions {
    pub fn with_command_timeout(mut self, timeout: Duration) -> SessionOptions {
        self.command_timeout = timeout;
        self
    }

    pub fn with_bulk_timeout(mut self, timeout: Duration) -> SessionOptions {
        self.bulk_timeout = timeout;
        self
    }

    pub fn with_ls_polling(mut self, attempts: u8, delay: Duration) -> SessionOptions {
        self.ls_poll_attempts = attempts;
        self.ls_poll_delay = delay;
        self
    }

    pub fn with_display_write_delay(mut self, delay: Duration) -> SessionOptions {
        self.display_write_delay = delay;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> SessionOptions {
        SessionOptions {
            command_timeout: NXT_DEFAULT_TIMEOUT,
            bulk_timeout: NXT_DEFAULT_BULK_TIMEOUT,
            ls_poll_attempts: NXT_DEFAULT_LS_POLL_ATTEMPTS,
            ls_poll_delay: NXT_DEFAULT_LS_POLL_DELAY,
            display_write_delay: NXT_DEFAULT_DISPLAY_WRITE_DELAY,
        }
    }
}

/// Named raster patterns understood by `DisplayBuffer::draw_pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Checkerboard,
    HorizontalStripes,
    VerticalStripes,
    Grid,
    Dots,
    Border,
    Smile,
}

impl Pattern {
    /// Catalog name of the pattern.
    pub fn name(self) -> &'static str {
        match self {
            Pattern::Checkerboard => "checkerboard",
            Pattern::HorizontalStripes => "stripes-h",
            Pattern::VerticalStripes => "stripes-v",
            Pattern::Grid => "grid",
            Pattern::Dots => "dots",
            Pattern::Border => "border",
            Pattern::Smile => "smile",
        }
    }
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(name: &str) -> Result<Pattern, String> {
        match name {
            "checkerboard" => Ok(Pattern::Checkerboard),
            "stripes-h" => Ok(Pattern::HorizontalStripes),
            "stripes-v" => Ok(Pattern::VerticalStripes),
            "grid" => Ok(Pattern::Grid),
            "dots" => Ok(Pattern::Dots),
            "border" => Ok(Pattern::Border),
            "smile" => Ok(Pattern::Smile),
            other => Err(format!("unknown pattern '{}'", other)),
        }
    }
}

/// Progress of a completed chunked display transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes moved between the brick and the local buffer.
    pub transferred: usize,
    /// Bytes the transfer covers.
    pub total: usize,
}

impl TransferProgress {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.transferred == self.total
    }
}

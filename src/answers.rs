use crate::base::{Error, Frame, Result};
use crate::types::SensorType;
use std::fmt;

/// Parsed reply of the get-output-state command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputState {
    pub port: u8,
    pub power: i8,
    pub mode: u8,
    pub regulation_mode: u8,
    pub turn_ratio: i8,
    pub run_state: u8,
    /// Rotation limit of the current movement, 0 for unlimited.
    pub tacho_limit: u32,
    /// Tachometer count since the last motor reset.
    pub tacho_count: i32,
    /// Position relative to the last programmed movement.
    pub block_tacho_count: i32,
    /// Position relative to the last position reset.
    pub rotation_count: i32,
}

impl OutputState {
    pub(crate) fn parse(frame: &Frame) -> Result<OutputState> {
        Ok(OutputState {
            port: frame.u8_at(0)?,
            power: frame.i8_at(1)?,
            mode: frame.u8_at(2)?,
            regulation_mode: frame.u8_at(3)?,
            turn_ratio: frame.i8_at(4)?,
            run_state: frame.u8_at(5)?,
            tacho_limit: frame.u32_at(6)?,
            tacho_count: frame.i32_at(10)?,
            block_tacho_count: frame.i32_at(14)?,
            rotation_count: frame.i32_at(18)?,
        })
    }
}

/// Parsed reply of the get-input-values command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputValues {
    pub port: u8,
    pub valid: bool,
    pub calibrated: bool,
    pub sensor_type: Option<SensorType>,
    pub sensor_mode: u8,
    pub raw_value: u16,
    pub normalized_value: u16,
    pub scaled_value: i16,
    pub calibrated_value: i16,
}

impl InputValues {
    pub(crate) fn parse(frame: &Frame) -> Result<InputValues> {
        Ok(InputValues {
            port: frame.u8_at(0)?,
            valid: frame.u8_at(1)? != 0,
            calibrated: frame.u8_at(2)? != 0,
            sensor_type: SensorType::from_byte(frame.u8_at(3)?),
            sensor_mode: frame.u8_at(4)?,
            raw_value: frame.u16_at(5)?,
            normalized_value: frame.u16_at(7)?,
            scaled_value: frame.i16_at(9)?,
            calibrated_value: frame.i16_at(11)?,
        })
    }
}

/// Protocol and firmware versions reported by the brick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub protocol_major: u8,
    pub protocol_minor: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
}

impl FirmwareVersion {
    pub(crate) fn parse(frame: &Frame) -> Result<FirmwareVersion> {
        Ok(FirmwareVersion {
            protocol_minor: frame.u8_at(0)?,
            protocol_major: frame.u8_at(1)?,
            firmware_minor: frame.u8_at(2)?,
            firmware_major: frame.u8_at(3)?,
        })
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "firmware {}.{:02}, protocol {}.{}",
            self.firmware_major, self.firmware_minor, self.protocol_major, self.protocol_minor
        )
    }
}

const NXT_BRICK_NAME_SIZE: usize = 15;

/// Identity of the brick as returned by the get-device-info system command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub bluetooth_address: [u8; 6],
    pub signal_strengths: [u8; 4],
    /// Free user flash in bytes.
    pub free_flash: u32,
}

impl DeviceInfo {
    pub(crate) fn parse(frame: &Frame) -> Result<DeviceInfo> {
        let raw_name = frame.bytes_at(0, NXT_BRICK_NAME_SIZE)?;
        let name_len = raw_name
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(NXT_BRICK_NAME_SIZE);
        let name = std::str::from_utf8(&raw_name[..name_len])
            .map_err(|e| Error::ProtocolError {
                description: format!("invalid brick name: {}", e),
            })?
            .to_owned();

        let mut bluetooth_address = [0; 6];
        bluetooth_address.copy_from_slice(frame.bytes_at(15, 6)?);
        let mut signal_strengths = [0; 4];
        signal_strengths.copy_from_slice(frame.bytes_at(22, 4)?);

        Ok(DeviceInfo {
            name,
            bluetooth_address,
            signal_strengths,
            free_flash: frame.u32_at(26)?,
        })
    }

    /// Bluetooth address formatted as `AA:BB:CC:DD:EE:FF`.
    pub fn address_string(&self) -> String {
        self.bluetooth_address
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Data returned by a read-io-map system command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoMapData {
    pub module: u32,
    pub data: Vec<u8>,
}

impl IoMapData {
    pub(crate) fn parse(frame: &Frame) -> Result<IoMapData> {
        let module = frame.u32_at(0)?;
        let size = frame.u16_at(4)? as usize;
        let data = frame.bytes_at(6, size)?.to_vec();
        Ok(IoMapData { module, data })
    }
}

/// Mailbox message returned by the message-read command, without its NUL terminator.
pub(crate) fn parse_message(frame: &Frame) -> Result<Vec<u8>> {
    let size = frame.u8_at(1)? as usize;
    let mut message = frame.bytes_at(2, size)?.to_vec();
    if message.last() == Some(&0) {
        message.pop();
    }
    Ok(message)
}

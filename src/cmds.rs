// Direct command opcodes

/// Starts a program stored on the brick. Payload: 20 byte NUL padded file name.
pub const NXT_CMD_START_PROGRAM: u8 = 0x00;

/// Stops the running program.
pub const NXT_CMD_STOP_PROGRAM: u8 = 0x01;

/// Plays a tone. Payload: frequency (u16), duration in ms (u16).
pub const NXT_CMD_PLAY_TONE: u8 = 0x03;

/// Sets the state of an output port (motor).
/// Payload: port, power (i8), mode, regulation mode, turn ratio (i8), run state, tacho limit (u32).
pub const NXT_CMD_SET_OUTPUT_STATE: u8 = 0x04;

/// Configures an input port. Payload: port, sensor type, sensor mode.
pub const NXT_CMD_SET_INPUT_MODE: u8 = 0x05;

/// Reads the state of an output port. Payload: port.
pub const NXT_CMD_GET_OUTPUT_STATE: u8 = 0x06;

/// Reads the values of an input port. Payload: port.
pub const NXT_CMD_GET_INPUT_VALUES: u8 = 0x07;

/// Resets the scaled value of an input port. Payload: port.
pub const NXT_CMD_RESET_INPUT_SCALED_VALUE: u8 = 0x08;

/// Writes a message into a mailbox. Payload: inbox, size, NUL terminated data.
pub const NXT_CMD_MESSAGE_WRITE: u8 = 0x09;

/// Resets the motor position. Payload: port, relative flag.
pub const NXT_CMD_RESET_MOTOR_POSITION: u8 = 0x0A;

/// Reads the battery level in millivolts.
pub const NXT_CMD_GET_BATTERY_LEVEL: u8 = 0x0B;

/// Stops any sound playback.
pub const NXT_CMD_STOP_SOUND_PLAYBACK: u8 = 0x0C;

/// Resets the sleep timer; replies with the sleep time limit.
pub const NXT_CMD_KEEP_ALIVE: u8 = 0x0D;

/// Queries how many bytes a low-speed (I2C) sensor has ready. Payload: port.
pub const NXT_CMD_LS_GET_STATUS: u8 = 0x0E;

/// Starts a low-speed (I2C) transaction. Payload: port, tx length, rx length, tx data.
pub const NXT_CMD_LS_WRITE: u8 = 0x0F;

/// Reads the bytes received by a low-speed (I2C) transaction. Payload: port.
pub const NXT_CMD_LS_READ: u8 = 0x10;

/// Reads a message from a mailbox. Payload: remote inbox, local inbox, remove flag.
pub const NXT_CMD_MESSAGE_READ: u8 = 0x13;

// System command opcodes

/// Reads protocol and firmware versions.
pub const NXT_SYS_GET_FIRMWARE_VERSION: u8 = 0x88;

/// Reads bytes from a module's IO map. Payload: module id (u32), offset (u16), size (u16).
pub const NXT_SYS_READ_IO_MAP: u8 = 0x94;

/// Writes bytes into a module's IO map. Payload: module id (u32), offset (u16), size (u16), data.
pub const NXT_SYS_WRITE_IO_MAP: u8 = 0x95;

/// Reads brick name, Bluetooth address, signal strengths and free flash.
pub const NXT_SYS_GET_DEVICE_INFO: u8 = 0x9B;

// Output mode bits

pub const NXT_MOTOR_MODE_IDLE: u8 = 0x00;
pub const NXT_MOTOR_MODE_ON: u8 = 0x01;
pub const NXT_MOTOR_MODE_BRAKE: u8 = 0x02;
pub const NXT_MOTOR_MODE_REGULATED: u8 = 0x04;

// Regulation modes

pub const NXT_REGULATION_MODE_IDLE: u8 = 0x00;
pub const NXT_REGULATION_MODE_MOTOR_SPEED: u8 = 0x01;

// Run states

pub const NXT_RUN_STATE_IDLE: u8 = 0x00;
pub const NXT_RUN_STATE_RUNNING: u8 = 0x20;

// Low-speed addressing of the ultrasonic sensor

/// I2C bus address of the ultrasonic sensor.
pub const NXT_ULTRASONIC_I2C_ADDRESS: u8 = 0x02;

/// Register holding the first distance measurement.
pub const NXT_ULTRASONIC_REG_DISTANCE: u8 = 0x42;

/// IO map module id of the display module.
pub const NXT_MODULE_DISPLAY: u32 = 0x000A_0001;

/// Offset of the raster memory inside the display module's IO map.
pub const NXT_DISPLAY_RASTER_OFFSET: u16 = 119;

use std::time::Duration;

/// Default timeout for ordinary direct commands.
pub const NXT_DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default timeout for slower bulk system commands (IO map, display transfer).
pub const NXT_DEFAULT_BULK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Maximum number of low-speed status polls before giving up on the ultrasonic sensor.
pub const NXT_DEFAULT_LS_POLL_ATTEMPTS: u8 = 8;

/// Delay before each low-speed status poll.
pub const NXT_DEFAULT_LS_POLL_DELAY: Duration = Duration::from_millis(30);

/// Delay between display write chunks, keeps the brick's receive buffer from overflowing.
pub const NXT_DEFAULT_DISPLAY_WRITE_DELAY: Duration = Duration::from_millis(15);

/// Bytes per display IO map read.
pub const NXT_DISPLAY_READ_CHUNK: usize = 32;

/// Bytes per display IO map write.
pub const NXT_DISPLAY_WRITE_CHUNK: usize = 32;

/// Size of the scratch buffer the reader thread reads into.
pub const NXT_READ_CHUNK_SIZE: usize = 256;

/// Value returned by distance sensing when no echo is available.
pub const NXT_ULTRASONIC_NO_TARGET: u8 = 255;

/// Tone frequency bounds accepted by the brick, in Hz.
pub const NXT_TONE_MIN_HZ: u16 = 200;
pub const NXT_TONE_MAX_HZ: u16 = 14000;

/// File names on the brick are 19 characters plus NUL.
pub const NXT_FILENAME_SIZE: usize = 20;

/// Settling time of the ultrasonic sensor after its input is configured.
pub const NXT_ULTRASONIC_SETUP_DELAY: Duration = Duration::from_millis(100);

/// Mailbox messages are at most 58 bytes plus NUL.
pub const NXT_MAX_MESSAGE_SIZE: usize = 59;

//! # NXT Link
//!
//! `nxtlink` is a host-side driver for LEGO MINDSTORMS NXT bricks. It speaks the
//! brick's binary telegram protocol over any duplex byte link (USB or Bluetooth
//! serial port) and provides motor control, sensor setup and readout, battery
//! and firmware queries, mailbox messaging, and a local mirror of the 100x64
//! LCD that can be drawn on and synchronized with the brick.
//!
//! Opening the link is left to the host: hand a read half and a write half of
//! an open transport to `NxtDevice::connect`.

extern crate byteorder;
extern crate log;

mod answers;
pub mod base;
mod cmds;
pub mod display;
mod internals;
mod lowspeed;
mod protocol;
mod session;
mod state;
pub mod status;
pub mod types;

pub use crate::answers::{DeviceInfo, FirmwareVersion, InputValues, IoMapData, OutputState};
pub use crate::base::{CommandKind, Error, Frame, Result, Telegram};
pub use crate::display::DisplayBuffer;
pub use crate::protocol::NxtTelegramProtocol;
pub use crate::state::DeviceState;
pub use crate::status::StatusCode;
pub use crate::types::{
    MotorChannel, MotorPort, Pattern, SensorChannel, SensorKind, SensorMode, SensorPort,
    SensorType, SessionOptions, TransferProgress,
};

use crate::answers::parse_message;
use crate::cmds::*;
use crate::display::DISPLAY_BUFFER_SIZE;
use crate::internals::*;
use crate::lowspeed::UltrasonicTransaction;
use crate::session::{LinkLostHandler, ReaderThread, Session};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, error, trace, warn};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// The reader thread of the open connection and the session generation it serves.
struct Link {
    generation: u64,
    reader: ReaderThread,
}

/// A connection to and control interface for one NXT brick.
///
/// All methods take `&self`; the device can be shared between threads and
/// commands may be issued concurrently. Replies are matched to callers by
/// opcode in send order.
///
/// Reply-expecting queries return `Ok(None)` when the brick does not answer
/// in time. Readings that have a cached counterpart (motor position, sensor
/// values) fall back to the cache instead of failing.
///
/// # Example
/// ```ignore
/// # use nxtlink::{NxtDevice, MotorPort, SessionOptions};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let port = serialport::new("/dev/rfcomm0", 115200)
///     .timeout(std::time::Duration::from_millis(100))
///     .open()?;
/// let device = NxtDevice::new(SessionOptions::default());
/// device.connect(port.try_clone()?, port)?;
/// device.set_motor_power(MotorPort::A, 75, true)?;
/// println!("battery: {:?} mV", device.get_battery_level()?);
/// # Ok(())
/// # }
/// ```
pub struct NxtDevice {
    session: Arc<Session>,
    link: Mutex<Option<Link>>,
}

impl fmt::Debug for NxtDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NxtDevice")
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_count())
            .field("options", &self.session.options)
            .finish()
    }
}

impl Default for NxtDevice {
    fn default() -> NxtDevice {
        NxtDevice::new(SessionOptions::default())
    }
}

impl Drop for NxtDevice {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[inline]
fn clamp_power(power: i32) -> i8 {
    power.clamp(-100, 100) as i8
}

fn interrupted(transferred: usize, total: usize, source: Error) -> Error {
    Error::TransferInterrupted {
        transferred,
        total,
        source: Box::new(source),
    }
}

impl NxtDevice {
    /// Creates a disconnected device. The display buffer and the state cache
    /// are usable locally before any connection is made.
    pub fn new(options: SessionOptions) -> NxtDevice {
        trace!("Creating new NxtDevice with {:?}", options);
        NxtDevice {
            session: Arc::new(Session::new(options)),
            link: Mutex::new(None),
        }
    }

    /// The options this device was created with.
    pub fn options(&self) -> &SessionOptions {
        &self.session.options
    }

    /// Opens a session over an already open transport.
    ///
    /// Any open session is torn down first. `reader` is moved to a background
    /// thread and must return from `read` periodically, either through a read
    /// timeout (`TimedOut`/`WouldBlock` errors are retried) or by reporting EOF
    /// when the link closes. `writer` is used for every outbound telegram.
    pub fn connect<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        self.disconnect();
        debug!("Connecting");
        let generation = self.session.begin(Box::new(writer));
        match ReaderThread::spawn(Arc::clone(&self.session), generation, reader) {
            Ok(reader) => {
                let previous = self.link.lock().replace(Link { generation, reader });
                if let Some(previous) = previous {
                    // a concurrent connect won the race; keep the newest session
                    drop(previous.reader);
                }
                Ok(())
            }
            Err(e) => {
                error!("Failed to start reader thread: {}", e);
                self.session.end(generation, "reader failed to start");
                Err(e)
            }
        }
    }

    /// Closes the session: stops the reader thread, fails every waiting
    /// request with `LinkLost`, and resets the state cache and display buffer.
    ///
    /// Does nothing if no session is open.
    pub fn disconnect(&self) {
        let link = self.link.lock().take();
        if let Some(Link { generation, mut reader }) = link {
            debug!("Disconnecting session #{}", generation);
            self.session.end(generation, "disconnected");
            reader.stop();
        }
    }

    /// Returns `true` while a transport is attached.
    pub fn is_connected(&self) -> bool {
        self.session.channel.is_attached()
    }

    /// Registers a callback invoked from the reader thread when the link fails.
    ///
    /// The session is already reset when the callback runs.
    pub fn on_link_lost<F>(&self, handler: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        let handler: LinkLostHandler = Arc::new(handler);
        self.session.set_link_lost_handler(Some(handler));
    }

    /// Number of requests waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.session.channel.pending_count()
    }

    /// Snapshot of the state cache.
    pub fn state(&self) -> DeviceState {
        self.session.state.lock().clone()
    }

    /// Cached state of one output port.
    pub fn motor(&self, port: MotorPort) -> MotorChannel {
        *self.session.state.lock().motor(port)
    }

    /// Cached state of one input port.
    pub fn sensor(&self, port: SensorPort) -> SensorChannel {
        *self.session.state.lock().sensor(port)
    }

    /// Last reported battery level, 0 until the first successful query.
    pub fn battery_millivolts(&self) -> u16 {
        self.session.state.lock().battery_millivolts
    }

    /// Locks the local display buffer for drawing.
    ///
    /// Don't hold the guard across `read_display_into_buffer` or
    /// `write_buffer_to_display`, both lock it themselves.
    pub fn display(&self) -> MutexGuard<'_, DisplayBuffer> {
        self.session.display.lock()
    }

    /// Writes a raw telegram without waiting for any reply.
    pub fn send_fire_and_forget(&self, kind: CommandKind, opcode: u8, payload: &[u8]) -> Result<()> {
        trace!(
            "Sending {:02X} ({:02X}) with payload {:02X?}",
            opcode,
            kind.as_byte(),
            payload
        );
        self.session.send(kind, opcode, payload)
    }

    /// Writes a raw reply-expecting telegram and waits up to `timeout` for the reply.
    ///
    /// Returns `Ok(None)` on timeout and `Error::Status` if the brick reports
    /// a failure.
    pub fn send_and_wait(
        &self,
        kind: CommandKind,
        opcode: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Option<Frame>> {
        trace!(
            "Invoking {:02X} ({:02X}) with payload {:02X?}, timeout {:?}",
            opcode,
            kind.as_byte(),
            payload,
            timeout
        );
        self.session.request(kind, opcode, payload, timeout)
    }

    fn direct(&self, opcode: u8, payload: &[u8]) -> Result<()> {
        self.send_fire_and_forget(CommandKind::DirectNoReply, opcode, payload)
    }

    /// Sends a reply-expecting telegram and parses the reply.
    fn query<T, F>(
        &self,
        name: &str,
        kind: CommandKind,
        opcode: u8,
        payload: &[u8],
        timeout: Duration,
        parse: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce(&Frame) -> Result<T>,
    {
        match self.send_and_wait(kind, opcode, payload, timeout) {
            Ok(Some(frame)) => {
                trace!("Received {} reply, data len: {}", name, frame.data.len());
                match parse(&frame) {
                    Ok(answer) => Ok(Some(answer)),
                    Err(e) => {
                        error!("Failed to parse {} reply: {}", name, e);
                        Err(e)
                    }
                }
            }
            Ok(None) => {
                warn!("Timeout waiting for {} reply", name);
                Ok(None)
            }
            Err(e) if e.is_transport() => {
                error!("Error invoking {}: {}", name, e);
                Err(e)
            }
            Err(e) => {
                warn!("{} failed: {}", name, e);
                Err(e)
            }
        }
    }

    // ---- motors ----

    #[allow(clippy::too_many_arguments)]
    fn set_output_state(
        &self,
        port: MotorPort,
        power: i8,
        mode: u8,
        regulation: u8,
        run_state: u8,
        tacho_limit: u32,
    ) -> Result<()> {
        let mut payload = [0u8; 10];
        payload[0] = port.index();
        payload[1] = power as u8;
        payload[2] = mode;
        payload[3] = regulation;
        payload[4] = 0; // turn ratio
        payload[5] = run_state;
        LittleEndian::write_u32(&mut payload[6..10], tacho_limit);
        self.direct(NXT_CMD_SET_OUTPUT_STATE, &payload)
    }

    /// Runs a motor at `power`, clamped to -100..=100, without a rotation limit.
    ///
    /// `regulated` enables the brick's speed regulation.
    pub fn set_motor_power(&self, port: MotorPort, power: i32, regulated: bool) -> Result<()> {
        let power = clamp_power(power);
        trace!(
            "Setting motor {} power to {} (regulated: {})",
            port,
            power,
            regulated
        );
        let (mode, regulation) = if regulated {
            (
                NXT_MOTOR_MODE_ON | NXT_MOTOR_MODE_REGULATED,
                NXT_REGULATION_MODE_MOTOR_SPEED,
            )
        } else {
            (NXT_MOTOR_MODE_ON, NXT_REGULATION_MODE_IDLE)
        };
        self.set_output_state(port, power, mode, regulation, NXT_RUN_STATE_RUNNING, 0)?;
        self.session.state.lock().motor_mut(port).power = power;
        Ok(())
    }

    /// Turns a motor by `|degrees|` at `power`; the brick brakes once the limit is reached.
    ///
    /// The direction follows the sign of `power`.
    pub fn run_motor_for_degrees(&self, port: MotorPort, power: i32, degrees: i32) -> Result<()> {
        let power = clamp_power(power);
        let limit = degrees.unsigned_abs();
        trace!("Running motor {} for {} degrees at {}", port, limit, power);
        self.set_output_state(
            port,
            power,
            NXT_MOTOR_MODE_ON | NXT_MOTOR_MODE_BRAKE | NXT_MOTOR_MODE_REGULATED,
            NXT_REGULATION_MODE_MOTOR_SPEED,
            NXT_RUN_STATE_RUNNING,
            limit,
        )?;
        self.session.state.lock().motor_mut(port).power = power;
        Ok(())
    }

    /// Stops a motor, actively braking or letting it coast.
    pub fn stop_motor(&self, port: MotorPort, brake: bool) -> Result<()> {
        trace!("Stopping motor {} (brake: {})", port, brake);
        let mode = if brake {
            NXT_MOTOR_MODE_BRAKE
        } else {
            NXT_MOTOR_MODE_IDLE
        };
        self.set_output_state(
            port,
            0,
            mode,
            NXT_REGULATION_MODE_IDLE,
            NXT_RUN_STATE_IDLE,
            0,
        )?;
        self.session.state.lock().motor_mut(port).power = 0;
        Ok(())
    }

    /// Gets the full output state of a motor. Uses the default command timeout.
    pub fn get_output_state(&self, port: MotorPort) -> Result<Option<OutputState>> {
        self.get_output_state_with_timeout(port, self.session.options.command_timeout)
    }

    /// Gets the full output state of a motor with a specified timeout.
    pub fn get_output_state_with_timeout(
        &self,
        port: MotorPort,
        timeout: Duration,
    ) -> Result<Option<OutputState>> {
        trace!("Getting output state of motor {}", port);
        self.query(
            "get output state",
            CommandKind::DirectWithReply,
            NXT_CMD_GET_OUTPUT_STATE,
            &[port.index()],
            timeout,
            OutputState::parse,
        )
    }

    /// Reads the tachometer count of a motor.
    ///
    /// Falls back to the cached position if the brick does not answer or the
    /// query fails.
    pub fn get_motor_position(&self, port: MotorPort) -> i32 {
        self.get_motor_position_with_timeout(port, self.session.options.command_timeout)
    }

    /// Reads the tachometer count of a motor with a specified timeout.
    pub fn get_motor_position_with_timeout(&self, port: MotorPort, timeout: Duration) -> i32 {
        match self.get_output_state_with_timeout(port, timeout) {
            Ok(Some(output)) => {
                let mut state = self.session.state.lock();
                state.motor_mut(port).position = output.tacho_count;
                output.tacho_count
            }
            Ok(None) | Err(_) => {
                let cached = self.session.state.lock().motor(port).position;
                warn!("Using cached position {} of motor {}", cached, port);
                cached
            }
        }
    }

    /// Resets the position counter of a motor, relative to the last movement
    /// or absolute.
    pub fn reset_motor_position(&self, port: MotorPort, relative: bool) -> Result<()> {
        trace!("Resetting motor {} position (relative: {})", port, relative);
        self.direct(
            NXT_CMD_RESET_MOTOR_POSITION,
            &[port.index(), relative as u8],
        )?;
        self.session.state.lock().motor_mut(port).position = 0;
        Ok(())
    }

    // ---- sensors ----

    /// Configures an input port and records the sensor kind in the cache.
    pub fn setup_sensor(
        &self,
        port: SensorPort,
        sensor_type: SensorType,
        sensor_mode: SensorMode,
    ) -> Result<()> {
        trace!(
            "Setting up sensor {} as {:?} in {:?} mode",
            port,
            sensor_type,
            sensor_mode
        );
        self.direct(
            NXT_CMD_SET_INPUT_MODE,
            &[port.index(), sensor_type as u8, sensor_mode as u8],
        )?;
        let mut state = self.session.state.lock();
        let sensor = state.sensor_mut(port);
        sensor.kind = sensor_type.kind();
        sensor.sensor_type = Some(sensor_type);
        Ok(())
    }

    /// Touch sensor in raw mode.
    pub fn setup_touch_sensor(&self, port: SensorPort) -> Result<()> {
        self.setup_sensor(port, SensorType::Switch, SensorMode::Raw)?;
        self.reset_input_value(port)
    }

    /// Light sensor in percent mode, with the LED on when `active`.
    pub fn setup_light_sensor(&self, port: SensorPort, active: bool) -> Result<()> {
        let sensor_type = if active {
            SensorType::LightActive
        } else {
            SensorType::LightInactive
        };
        self.setup_sensor(port, sensor_type, SensorMode::PercentFullScale)?;
        self.reset_input_value(port)
    }

    /// Sound sensor in percent mode, A-weighted when `adjusted`.
    pub fn setup_sound_sensor(&self, port: SensorPort, adjusted: bool) -> Result<()> {
        let sensor_type = if adjusted {
            SensorType::SoundDba
        } else {
            SensorType::SoundDb
        };
        self.setup_sensor(port, sensor_type, SensorMode::PercentFullScale)?;
        self.reset_input_value(port)
    }

    /// Ultrasonic sensor on the 9V low-speed bus. Blocks while the sensor settles.
    pub fn setup_ultrasonic_sensor(&self, port: SensorPort) -> Result<()> {
        self.setup_sensor(port, SensorType::LowSpeed9V, SensorMode::Raw)?;
        self.reset_input_value(port)?;
        thread::sleep(NXT_ULTRASONIC_SETUP_DELAY);
        Ok(())
    }

    /// Resets the scaled value of an input port.
    pub fn reset_input_value(&self, port: SensorPort) -> Result<()> {
        trace!("Resetting input value of sensor {}", port);
        self.direct(NXT_CMD_RESET_INPUT_SCALED_VALUE, &[port.index()])
    }

    /// Gets every value the brick reports for an input port. Uses the default command timeout.
    pub fn get_input_values(&self, port: SensorPort) -> Result<Option<InputValues>> {
        self.get_input_values_with_timeout(port, self.session.options.command_timeout)
    }

    /// Gets every value the brick reports for an input port with a specified timeout.
    pub fn get_input_values_with_timeout(
        &self,
        port: SensorPort,
        timeout: Duration,
    ) -> Result<Option<InputValues>> {
        trace!("Getting input values of sensor {}", port);
        self.query(
            "get input values",
            CommandKind::DirectWithReply,
            NXT_CMD_GET_INPUT_VALUES,
            &[port.index()],
            timeout,
            InputValues::parse,
        )
    }

    /// Refreshes the cached readings of `port`; returns `None` if the cache was used.
    fn refresh_sensor(&self, port: SensorPort, timeout: Duration) -> Option<SensorChannel> {
        let cached = *self.session.state.lock().sensor(port);
        if cached.kind == SensorKind::None {
            trace!("Sensor {} not set up, using cached value", port);
            return None;
        }
        match self.get_input_values_with_timeout(port, timeout) {
            Ok(Some(values)) => {
                let mut state = self.session.state.lock();
                let sensor = state.sensor_mut(port);
                sensor.raw_value = values.raw_value;
                sensor.value = values.scaled_value;
                Some(*sensor)
            }
            Ok(None) | Err(_) => {
                warn!("Using cached readings of sensor {}", port);
                None
            }
        }
    }

    /// Reads the scaled value of a sensor.
    ///
    /// Ports that were never set up, and queries that fail or time out,
    /// return the cached value.
    pub fn get_sensor_value(&self, port: SensorPort) -> i16 {
        self.get_sensor_value_with_timeout(port, self.session.options.command_timeout)
    }

    /// Reads the scaled value of a sensor with a specified timeout.
    pub fn get_sensor_value_with_timeout(&self, port: SensorPort, timeout: Duration) -> i16 {
        match self.refresh_sensor(port, timeout) {
            Some(sensor) => sensor.value,
            None => self.session.state.lock().sensor(port).value,
        }
    }

    /// Reads the unscaled A/D value of a sensor, with the same cache fallback
    /// as `get_sensor_value`.
    pub fn get_raw_sensor_value(&self, port: SensorPort) -> u16 {
        self.get_raw_sensor_value_with_timeout(port, self.session.options.command_timeout)
    }

    /// Reads the unscaled A/D value of a sensor with a specified timeout.
    pub fn get_raw_sensor_value_with_timeout(&self, port: SensorPort, timeout: Duration) -> u16 {
        match self.refresh_sensor(port, timeout) {
            Some(sensor) => sensor.raw_value,
            None => self.session.state.lock().sensor(port).raw_value,
        }
    }

    /// Measures the distance seen by an ultrasonic sensor, in centimeters.
    ///
    /// Returns 255 when no target is detected or the measurement fails.
    pub fn get_ultrasonic_distance(&self, port: SensorPort) -> u8 {
        trace!("Getting ultrasonic distance on {}", port);
        let options = &self.session.options;
        let transaction =
            UltrasonicTransaction::new(port, options.ls_poll_attempts, options.ls_poll_delay);
        match transaction.run(self.session.as_ref()) {
            Ok(distance) => {
                if distance != NXT_ULTRASONIC_NO_TARGET {
                    self.session.state.lock().sensor_mut(port).value = i16::from(distance);
                }
                distance
            }
            Err(e) => {
                error!("Ultrasonic measurement on {} failed: {}", port, e);
                NXT_ULTRASONIC_NO_TARGET
            }
        }
    }

    // ---- brick ----

    /// Gets the battery level in millivolts. Uses the default command timeout.
    pub fn get_battery_level(&self) -> Result<Option<u16>> {
        self.get_battery_level_with_timeout(self.session.options.command_timeout)
    }

    /// Gets the battery level in millivolts with a specified timeout.
    pub fn get_battery_level_with_timeout(&self, timeout: Duration) -> Result<Option<u16>> {
        trace!("Getting battery level");
        let level = self.query(
            "get battery level",
            CommandKind::DirectWithReply,
            NXT_CMD_GET_BATTERY_LEVEL,
            &[],
            timeout,
            |frame| frame.u16_at(0),
        )?;
        if let Some(millivolts) = level {
            self.session.state.lock().battery_millivolts = millivolts;
        }
        Ok(level)
    }

    /// Gets the protocol and firmware versions. Uses the default command timeout.
    pub fn get_firmware_version(&self) -> Result<Option<FirmwareVersion>> {
        self.get_firmware_version_with_timeout(self.session.options.command_timeout)
    }

    /// Gets the protocol and firmware versions with a specified timeout.
    pub fn get_firmware_version_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<FirmwareVersion>> {
        trace!("Getting firmware version");
        let version = self.query(
            "get firmware version",
            CommandKind::SystemWithReply,
            NXT_SYS_GET_FIRMWARE_VERSION,
            &[],
            timeout,
            FirmwareVersion::parse,
        )?;
        if version.is_some() {
            self.session.state.lock().firmware = version;
        }
        Ok(version)
    }

    /// Gets the brick name, Bluetooth address and free flash. Uses the default command timeout.
    pub fn get_device_info(&self) -> Result<Option<DeviceInfo>> {
        self.get_device_info_with_timeout(self.session.options.command_timeout)
    }

    /// Gets the brick name, Bluetooth address and free flash with a specified timeout.
    pub fn get_device_info_with_timeout(&self, timeout: Duration) -> Result<Option<DeviceInfo>> {
        trace!("Getting device info");
        self.query(
            "get device info",
            CommandKind::SystemWithReply,
            NXT_SYS_GET_DEVICE_INFO,
            &[],
            timeout,
            DeviceInfo::parse,
        )
    }

    /// Resets the brick's sleep timer and returns the sleep time limit in milliseconds.
    pub fn keep_alive(&self) -> Result<Option<u32>> {
        self.keep_alive_with_timeout(self.session.options.command_timeout)
    }

    /// Resets the brick's sleep timer with a specified timeout.
    pub fn keep_alive_with_timeout(&self, timeout: Duration) -> Result<Option<u32>> {
        trace!("Sending keep alive");
        self.query(
            "keep alive",
            CommandKind::DirectWithReply,
            NXT_CMD_KEEP_ALIVE,
            &[],
            timeout,
            |frame| frame.u32_at(0),
        )
    }

    /// Plays a tone; the frequency is clamped to 200..=14000 Hz.
    pub fn play_tone(&self, frequency_hz: u16, duration_ms: u16) -> Result<()> {
        let frequency = frequency_hz.clamp(NXT_TONE_MIN_HZ, NXT_TONE_MAX_HZ);
        trace!("Playing {} Hz for {} ms", frequency, duration_ms);
        let mut payload = [0u8; 4];
        LittleEndian::write_u16(&mut payload[0..2], frequency);
        LittleEndian::write_u16(&mut payload[2..4], duration_ms);
        self.direct(NXT_CMD_PLAY_TONE, &payload)
    }

    pub fn stop_sound(&self) -> Result<()> {
        trace!("Stopping sound playback");
        self.direct(NXT_CMD_STOP_SOUND_PLAYBACK, &[])
    }

    /// Writes a message into one of the brick's inboxes.
    ///
    /// The message is NUL terminated on the wire and may hold at most 58 bytes.
    pub fn message_write(&self, inbox: u8, message: &[u8]) -> Result<()> {
        let size = message.len() + 1;
        if size > NXT_MAX_MESSAGE_SIZE {
            return Err(Error::PayloadTooLarge { len: message.len() });
        }
        trace!("Writing {} byte message to inbox {}", message.len(), inbox);
        let mut payload = Vec::with_capacity(2 + size);
        payload.push(inbox);
        payload.push(size as u8);
        payload.extend_from_slice(message);
        payload.push(0);
        self.direct(NXT_CMD_MESSAGE_WRITE, &payload)
    }

    /// Reads a message from a mailbox of the running program.
    pub fn message_read(&self, remote: u8, local: u8, remove: bool) -> Result<Option<Vec<u8>>> {
        self.message_read_with_timeout(remote, local, remove, self.session.options.command_timeout)
    }

    /// Reads a message from a mailbox with a specified timeout.
    pub fn message_read_with_timeout(
        &self,
        remote: u8,
        local: u8,
        remove: bool,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>> {
        trace!("Reading message from mailbox {} into {}", remote, local);
        self.query(
            "message read",
            CommandKind::DirectWithReply,
            NXT_CMD_MESSAGE_READ,
            &[remote, local, remove as u8],
            timeout,
            parse_message,
        )
    }

    /// Starts a program stored on the brick.
    ///
    /// Returns `Ok(false)` if the brick did not acknowledge in time. Names
    /// longer than 19 bytes are rejected.
    pub fn start_program(&self, name: &str) -> Result<bool> {
        self.start_program_with_timeout(name, self.session.options.command_timeout)
    }

    /// Starts a program stored on the brick with a specified timeout.
    pub fn start_program_with_timeout(&self, name: &str, timeout: Duration) -> Result<bool> {
        let bytes = name.as_bytes();
        if bytes.len() >= NXT_FILENAME_SIZE {
            return Err(Error::PayloadTooLarge { len: bytes.len() });
        }
        trace!("Starting program '{}'", name);
        let mut payload = [0u8; NXT_FILENAME_SIZE];
        payload[..bytes.len()].copy_from_slice(bytes);
        let ack = self.query(
            "start program",
            CommandKind::DirectWithReply,
            NXT_CMD_START_PROGRAM,
            &payload,
            timeout,
            |_| Ok(()),
        )?;
        Ok(ack.is_some())
    }

    /// Stops the running program; `Ok(false)` if the brick did not acknowledge in time.
    pub fn stop_program(&self) -> Result<bool> {
        self.stop_program_with_timeout(self.session.options.command_timeout)
    }

    /// Stops the running program with a specified timeout.
    pub fn stop_program_with_timeout(&self, timeout: Duration) -> Result<bool> {
        trace!("Stopping program");
        let ack = self.query(
            "stop program",
            CommandKind::DirectWithReply,
            NXT_CMD_STOP_PROGRAM,
            &[],
            timeout,
            |_| Ok(()),
        )?;
        Ok(ack.is_some())
    }

    // ---- IO maps and display ----

    /// Reads `size` bytes at `offset` of a firmware module's IO map. Uses the bulk timeout.
    pub fn read_io_map(&self, module: u32, offset: u16, size: u16) -> Result<Option<IoMapData>> {
        self.read_io_map_with_timeout(module, offset, size, self.session.options.bulk_timeout)
    }

    /// Reads from a firmware module's IO map with a specified timeout.
    pub fn read_io_map_with_timeout(
        &self,
        module: u32,
        offset: u16,
        size: u16,
        timeout: Duration,
    ) -> Result<Option<IoMapData>> {
        trace!(
            "Reading {} bytes of module {:08X} IO map at {}",
            size,
            module,
            offset
        );
        let mut payload = [0u8; 8];
        LittleEndian::write_u32(&mut payload[0..4], module);
        LittleEndian::write_u16(&mut payload[4..6], offset);
        LittleEndian::write_u16(&mut payload[6..8], size);
        self.query(
            "read IO map",
            CommandKind::SystemWithReply,
            NXT_SYS_READ_IO_MAP,
            &payload,
            timeout,
            IoMapData::parse,
        )
    }

    /// Writes `data` at `offset` of a firmware module's IO map, without waiting for a reply.
    pub fn write_io_map(&self, module: u32, offset: u16, data: &[u8]) -> Result<()> {
        let size = u16::try_from(data.len())
            .map_err(|_| Error::PayloadTooLarge { len: data.len() })?;
        trace!(
            "Writing {} bytes to module {:08X} IO map at {}",
            size,
            module,
            offset
        );
        let mut payload = Vec::with_capacity(8 + data.len());
        payload.extend_from_slice(&module.to_le_bytes());
        payload.extend_from_slice(&offset.to_le_bytes());
        payload.extend_from_slice(&size.to_le_bytes());
        payload.extend_from_slice(data);
        self.send_fire_and_forget(CommandKind::SystemNoReply, NXT_SYS_WRITE_IO_MAP, &payload)
    }

    /// Pulls the brick's display raster into the local buffer, 32 bytes per request.
    ///
    /// A timeout or failure part way stops the transfer with
    /// `Error::TransferInterrupted`, reporting how many bytes were copied;
    /// the local buffer keeps the chunks received so far.
    pub fn read_display_into_buffer(&self) -> Result<TransferProgress> {
        self.read_display_into_buffer_with_timeout(self.session.options.bulk_timeout)
    }

    /// Pulls the brick's display raster with a specified per-chunk timeout.
    pub fn read_display_into_buffer_with_timeout(
        &self,
        timeout: Duration,
    ) -> Result<TransferProgress> {
        let total = DISPLAY_BUFFER_SIZE;
        let mut transferred = 0;
        trace!("Reading display raster");

        for offset in (0..total).step_by(NXT_DISPLAY_READ_CHUNK) {
            let len = NXT_DISPLAY_READ_CHUNK.min(total - offset);
            let chunk = match self.read_io_map_with_timeout(
                NXT_MODULE_DISPLAY,
                NXT_DISPLAY_RASTER_OFFSET + offset as u16,
                len as u16,
                timeout,
            ) {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return Err(interrupted(transferred, total, Error::OperationTimeout)),
                Err(e) => return Err(interrupted(transferred, total, e)),
            };
            let data = &chunk.data[..chunk.data.len().min(len)];
            transferred += self.session.display.lock().copy_from_slice(offset, data);
        }

        debug!("Read {} of {} display bytes", transferred, total);
        Ok(TransferProgress { transferred, total })
    }

    /// Pushes the local display buffer to the brick, 32 bytes per telegram with
    /// a fixed pause between telegrams.
    ///
    /// Writes are not acknowledged and not rolled back: a failure part way
    /// leaves the brick's display partially updated and is reported as
    /// `Error::TransferInterrupted`.
    pub fn write_buffer_to_display(&self) -> Result<TransferProgress> {
        let raster = self.session.display.lock().as_bytes().to_vec();
        let total = raster.len();
        let mut transferred = 0;
        trace!("Writing display raster");

        for (index, chunk) in raster.chunks(NXT_DISPLAY_WRITE_CHUNK).enumerate() {
            if index > 0 {
                thread::sleep(self.session.options.display_write_delay);
            }
            let offset = NXT_DISPLAY_RASTER_OFFSET + (index * NXT_DISPLAY_WRITE_CHUNK) as u16;
            if let Err(e) = self.write_io_map(NXT_MODULE_DISPLAY, offset, chunk) {
                return Err(interrupted(transferred, total, e));
            }
            transferred += chunk.len();
        }

        debug!("Wrote {} display bytes", transferred);
        Ok(TransferProgress { transferred, total })
    }
}

//! Low-speed (I2C) distance transaction of the ultrasonic sensor.
//!
//! The brick has no single "read distance" command. The host writes the
//! register address to the sensor, polls the low-speed status until the
//! answer byte is buffered, then reads it back.

use crate::base::{CommandKind, Error, Result};
use crate::cmds::*;
use crate::internals::NXT_ULTRASONIC_NO_TARGET;
use crate::session::Session;
use crate::types::SensorPort;
use log::{trace, warn};
use std::thread;
use std::time::Duration;

/// Primitive low-speed commands the transaction is built from.
pub(crate) trait LowSpeedBus {
    /// Sends a fire-and-forget low-speed write of `tx` expecting `rx_len` answer bytes.
    fn ls_write(&self, port: SensorPort, tx: &[u8], rx_len: u8) -> Result<()>;

    /// Number of answer bytes buffered, `None` if the status poll got no reply.
    fn ls_status(&self, port: SensorPort) -> Result<Option<u8>>;

    /// Buffered answer bytes, `None` if the read got no reply.
    fn ls_read(&self, port: SensorPort) -> Result<Option<Vec<u8>>>;

    /// Blocks the transaction between polls.
    fn pause(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    AwaitWrite,
    PollStatus { attempt: u8 },
    Read,
    Done(u8),
}

/// The write, poll, read sequence as an explicit state machine.
///
/// Polling is bounded to `attempts` status queries, each preceded by a fixed
/// `delay`. If the sensor never reports a buffered byte the transaction
/// finishes with the no-target value and no read is issued.
#[derive(Debug)]
pub(crate) struct UltrasonicTransaction {
    port: SensorPort,
    attempts: u8,
    delay: Duration,
    step: Step,
}

impl UltrasonicTransaction {
    pub fn new(port: SensorPort, attempts: u8, delay: Duration) -> UltrasonicTransaction {
        UltrasonicTransaction {
            port,
            attempts,
            delay,
            step: Step::AwaitWrite,
        }
    }

    /// Runs the transaction to completion and returns the distance in centimeters.
    ///
    /// Transport failures abort with an error; every other failure yields
    /// `NXT_ULTRASONIC_NO_TARGET`.
    pub fn run<B: LowSpeedBus + ?Sized>(mut self, bus: &B) -> Result<u8> {
        loop {
            if let Step::Done(distance) = self.step {
                return Ok(distance);
            }
            self.advance(bus)?;
        }
    }

    fn advance<B: LowSpeedBus + ?Sized>(&mut self, bus: &B) -> Result<()> {
        self.step = match self.step {
            Step::AwaitWrite => {
                trace!("Ultrasonic {}: writing distance register address", self.port);
                bus.ls_write(
                    self.port,
                    &[NXT_ULTRASONIC_I2C_ADDRESS, NXT_ULTRASONIC_REG_DISTANCE],
                    1,
                )?;
                Step::PollStatus { attempt: 0 }
            }
            Step::PollStatus { attempt } if attempt >= self.attempts => {
                warn!(
                    "Ultrasonic {}: no data after {} status polls",
                    self.port, self.attempts
                );
                Step::Done(NXT_ULTRASONIC_NO_TARGET)
            }
            Step::PollStatus { attempt } => {
                bus.pause(self.delay);
                match soft(bus.ls_status(self.port))? {
                    Some(ready) if ready > 0 => Step::Read,
                    _ => Step::PollStatus {
                        attempt: attempt + 1,
                    },
                }
            }
            Step::Read => match soft(bus.ls_read(self.port))? {
                Some(data) => match data.get(1) {
                    Some(0) | None => Step::Done(NXT_ULTRASONIC_NO_TARGET),
                    Some(distance) => Step::Done(*distance),
                },
                None => Step::Done(NXT_ULTRASONIC_NO_TARGET),
            },
            Step::Done(distance) => Step::Done(distance),
        };
        Ok(())
    }
}

impl LowSpeedBus for Session {
    fn ls_write(&self, port: SensorPort, tx: &[u8], rx_len: u8) -> Result<()> {
        let mut payload = Vec::with_capacity(3 + tx.len());
        payload.push(port.index());
        payload.push(tx.len() as u8);
        payload.push(rx_len);
        payload.extend_from_slice(tx);
        self.send(CommandKind::DirectNoReply, NXT_CMD_LS_WRITE, &payload)
    }

    fn ls_status(&self, port: SensorPort) -> Result<Option<u8>> {
        let reply = self.request(
            CommandKind::DirectWithReply,
            NXT_CMD_LS_GET_STATUS,
            &[port.index()],
            self.options.command_timeout,
        )?;
        reply.map(|frame| frame.u8_at(0)).transpose()
    }

    fn ls_read(&self, port: SensorPort) -> Result<Option<Vec<u8>>> {
        let reply = self.request(
            CommandKind::DirectWithReply,
            NXT_CMD_LS_READ,
            &[port.index()],
            self.options.command_timeout,
        )?;
        Ok(reply.map(|frame| frame.data))
    }

    fn pause(&self, delay: Duration) {
        thread::sleep(delay);
    }
}

/// Folds device-reported failures (including "communication pending") into "no reply".
fn soft<T>(outcome: Result<Option<T>>) -> Result<Option<T>> {
    match outcome {
        Err(Error::Status { opcode, status }) => {
            trace!("Low-speed opcode {:02X} reported {}", opcode, status);
            Ok(None)
        }
        Err(Error::ProtocolError { description }) => {
            warn!("Malformed low-speed reply: {}", description);
            Ok(None)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{StatusCode, NXT_STATUS_PENDING_COMMUNICATION};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Write(Vec<u8>, u8),
        Status,
        Read,
        Pause(Duration),
    }

    #[derive(Default)]
    struct ScriptedBus {
        statuses: RefCell<VecDeque<Result<Option<u8>>>>,
        read: RefCell<Option<Result<Option<Vec<u8>>>>>,
        calls: RefCell<Vec<Call>>,
    }

    impl ScriptedBus {
        fn with_statuses(statuses: Vec<Result<Option<u8>>>) -> ScriptedBus {
            ScriptedBus {
                statuses: RefCell::new(statuses.into()),
                ..ScriptedBus::default()
            }
        }

        fn reads(self, read: Result<Option<Vec<u8>>>) -> ScriptedBus {
            *self.read.borrow_mut() = Some(read);
            self
        }

        fn count(&self, call: &Call) -> usize {
            self.calls.borrow().iter().filter(|c| *c == call).count()
        }
    }

    impl LowSpeedBus for ScriptedBus {
        fn ls_write(&self, _port: SensorPort, tx: &[u8], rx_len: u8) -> Result<()> {
            self.calls.borrow_mut().push(Call::Write(tx.to_vec(), rx_len));
            Ok(())
        }

        fn ls_status(&self, _port: SensorPort) -> Result<Option<u8>> {
            self.calls.borrow_mut().push(Call::Status);
            self.statuses.borrow_mut().pop_front().unwrap_or(Ok(Some(0)))
        }

        fn ls_read(&self, _port: SensorPort) -> Result<Option<Vec<u8>>> {
            self.calls.borrow_mut().push(Call::Read);
            self.read.borrow_mut().take().unwrap_or(Ok(None))
        }

        fn pause(&self, delay: Duration) {
            self.calls.borrow_mut().push(Call::Pause(delay));
        }
    }

    fn transaction() -> UltrasonicTransaction {
        UltrasonicTransaction::new(SensorPort::S4, 8, Duration::from_millis(30))
    }

    fn pending() -> Result<Option<u8>> {
        Err(Error::Status {
            opcode: NXT_CMD_LS_GET_STATUS,
            status: StatusCode(NXT_STATUS_PENDING_COMMUNICATION),
        })
    }

    #[test]
    fn reads_distance_once_ready() {
        let bus = ScriptedBus::with_statuses(vec![Ok(Some(0)), pending(), Ok(Some(1))])
            .reads(Ok(Some(vec![1, 42])));
        assert_eq!(transaction().run(&bus).unwrap(), 42);
        assert_eq!(
            bus.calls.borrow()[0],
            Call::Write(vec![0x02, 0x42], 1)
        );
        assert_eq!(bus.count(&Call::Status), 3);
        assert_eq!(bus.count(&Call::Pause(Duration::from_millis(30))), 3);
        assert_eq!(bus.count(&Call::Read), 1);
    }

    #[test]
    fn never_ready_skips_the_read() {
        let bus = ScriptedBus::with_statuses(vec![]).reads(Ok(Some(vec![1, 42])));
        assert_eq!(transaction().run(&bus).unwrap(), 255);
        assert_eq!(bus.count(&Call::Status), 8);
        assert_eq!(bus.count(&Call::Read), 0);
    }

    #[test]
    fn zero_distance_means_no_target() {
        let bus =
            ScriptedBus::with_statuses(vec![Ok(Some(1))]).reads(Ok(Some(vec![1, 0])));
        assert_eq!(transaction().run(&bus).unwrap(), 255);
    }

    #[test]
    fn read_timeout_means_no_target() {
        let bus = ScriptedBus::with_statuses(vec![Ok(None), Ok(Some(1))]).reads(Ok(None));
        assert_eq!(transaction().run(&bus).unwrap(), 255);
        assert_eq!(bus.count(&Call::Read), 1);
    }

    #[test]
    fn transport_failure_aborts() {
        let bus = ScriptedBus::with_statuses(vec![Err(Error::LinkLost {
            description: "unplugged".to_owned(),
        })]);
        assert!(matches!(
            transaction().run(&bus),
            Err(Error::LinkLost { .. })
        ));
        assert_eq!(bus.count(&Call::Status), 1);
    }
}

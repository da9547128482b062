use crate::base::error::{Error, Result};
use crate::base::message::{Frame, Telegram};
use crate::base::pending::PendingTable;
use crate::base::traits::ProtocolEncoder;
use crossbeam_channel::RecvTimeoutError;
use log::{error, trace, warn};
use parking_lot::Mutex;
use std::io::Write;
use std::time::Duration;

/// Write half of the transport plus the encoder that frames telegrams for it.
struct Outbound<P> {
    protocol: P,
    stream: Option<Box<dyn Write + Send>>,
}

/// Channel encodes telegrams onto the transport and correlates replies with waiting callers.
///
/// Writes are serialized through one lock so telegrams never interleave.
/// Reply frames are pushed in by the reader via `dispatch`; callers blocked
/// in `invoke` only hold their own completion handle.
///
/// # Examples
/// ```ignore
/// let channel = Channel::new(NxtTelegramProtocol::new());
/// channel.attach(Box::new(serial_port));
///
/// channel.write(&Telegram::direct(NXT_CMD_PLAY_TONE, &[0xB8, 0x01, 0xF4, 0x01], false))?;
/// let battery = channel.invoke(&Telegram::direct(NXT_CMD_GET_BATTERY_LEVEL, &[], true), Duration::from_secs(1))?;
/// ```
pub struct Channel<P> {
    outbound: Mutex<Outbound<P>>,
    pending: Mutex<PendingTable>,
}

impl<P> Channel<P>
where
    P: ProtocolEncoder,
{
    /// Create a new detached `Channel`
    pub fn new(protocol: P) -> Channel<P> {
        Channel {
            outbound: Mutex::new(Outbound {
                protocol,
                stream: None,
            }),
            pending: Mutex::new(PendingTable::new()),
        }
    }

    /// Attach the write half of a transport, replacing any previous one.
    pub fn attach(&self, stream: Box<dyn Write + Send>) {
        trace!("Attaching transport writer");
        self.outbound.lock().stream = Some(stream);
    }

    /// Detach the transport and fail every waiting request with `LinkLost`.
    ///
    /// Returns the number of requests that were failed.
    pub fn detach(&self, reason: &str) -> usize {
        trace!("Detaching transport writer: {}", reason);
        self.outbound.lock().stream = None;
        self.pending.lock().fail_all(|| Error::LinkLost {
            description: reason.to_owned(),
        })
    }

    /// Returns `true` while a transport writer is attached.
    pub fn is_attached(&self) -> bool {
        self.outbound.lock().stream.is_some()
    }

    /// Write a telegram without waiting for any reply.
    pub fn write(&self, telegram: &Telegram) -> Result<usize> {
        trace!(
            "Channel write: kind={:02X}, opcode={:02X}, payload_len={}",
            telegram.kind.as_byte(),
            telegram.opcode,
            telegram.payload.len()
        );
        let mut outbound = self.outbound.lock();
        let Outbound { protocol, stream } = &mut *outbound;
        let stream = stream.as_mut().ok_or(Error::NotConnected)?;
        let written = protocol.write_to(telegram, &mut **stream)?;
        stream.flush()?;
        Ok(written)
    }

    /// Send a request and wait for the matching reply.
    ///
    /// Returns `Ok(None)` if no reply arrived within `timeout`; the request is
    /// purged from the pending table either way. A non-success status byte
    /// yields `Error::Status`.
    pub fn invoke(&self, request: &Telegram, timeout: Duration) -> Result<Option<Frame>> {
        let opcode = request.opcode;
        let (id, completion) = self.pending.lock().register(opcode);

        if let Err(e) = self.write(request) {
            error!("Invoke: failed to write request {:02X}: {}", opcode, e);
            self.pending.lock().cancel(opcode, id, None);
            return Err(e);
        }

        match completion.recv_timeout(timeout) {
            Ok(outcome) => outcome.map(Some),
            Err(RecvTimeoutError::Timeout) => {
                if self.pending.lock().cancel(opcode, id, Some(timeout)) {
                    warn!(
                        "Invoke: no reply to opcode {:02X} within {:?}",
                        opcode, timeout
                    );
                    Ok(None)
                } else {
                    // resolved between the timeout and the cancel
                    match completion.try_recv() {
                        Ok(outcome) => outcome.map(Some),
                        Err(_) => Ok(None),
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::LinkLost {
                description: "request dropped".to_owned(),
            }),
        }
    }

    /// Hand a reply frame from the reader to the request it answers.
    pub fn dispatch(&self, frame: Frame) {
        self.pending.lock().dispatch(frame);
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::CommandKind;
    use crate::protocol::NxtTelegramProtocol;
    use crate::status::StatusCode;
    use std::io;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn attached_channel() -> (Arc<Channel<NxtTelegramProtocol>>, SharedSink) {
        let sink = SharedSink::default();
        let channel = Arc::new(Channel::new(NxtTelegramProtocol::new()));
        channel.attach(Box::new(sink.clone()));
        (channel, sink)
    }

    #[test]
    fn write_without_transport_fails() {
        let channel = Channel::new(NxtTelegramProtocol::new());
        let result = channel.write(&Telegram::direct(0x0C, &[], false));
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[test]
    fn invoke_times_out_with_none_and_purges() {
        let (channel, sink) = attached_channel();
        let timeout = Duration::from_millis(50);
        let started = Instant::now();
        let outcome = channel
            .invoke(&Telegram::direct(0x0B, &[], true), timeout)
            .unwrap();
        assert!(outcome.is_none());
        assert!(started.elapsed() < timeout + Duration::from_millis(500));
        assert_eq!(channel.pending_count(), 0);
        assert_eq!(sink.0.lock().as_slice(), [0x02, 0x00, 0x00, 0x0B]);
    }

    #[test]
    fn invoke_receives_dispatched_reply() {
        let (channel, _sink) = attached_channel();
        let responder = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                while channel.pending_count() == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
                channel.dispatch(Frame {
                    opcode: 0x0B,
                    status: StatusCode(0),
                    data: vec![0x40, 0x1F],
                });
            })
        };
        let frame = channel
            .invoke(
                &Telegram::new(CommandKind::DirectWithReply, 0x0B, &[]),
                Duration::from_secs(2),
            )
            .unwrap()
            .unwrap();
        responder.join().unwrap();
        assert_eq!(frame.u16_at(0).unwrap(), 8000);
    }

    #[test]
    fn detach_fails_waiters() {
        let (channel, _sink) = attached_channel();
        let detacher = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                while channel.pending_count() == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
                channel.detach("test teardown");
            })
        };
        let result = channel.invoke(&Telegram::direct(0x06, &[0], true), Duration::from_secs(2));
        detacher.join().unwrap();
        assert!(matches!(result, Err(Error::LinkLost { .. })));
        assert!(!channel.is_attached());
    }
}

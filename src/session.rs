use crate::base::{Channel, CommandKind, Error, Frame, Result, Telegram};
use crate::display::DisplayBuffer;
use crate::internals::NXT_READ_CHUNK_SIZE;
use crate::protocol::NxtTelegramProtocol;
use crate::state::DeviceState;
use crate::types::SessionOptions;
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback invoked from the reader thread when the link breaks.
pub(crate) type LinkLostHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Everything that lives as long as one connection: the correlator, the
/// state cache and the local display buffer.
///
/// Each connection gets a new generation number. Ending a session bumps it
/// exactly once, so a stale reader can never reset a newer session.
pub(crate) struct Session {
    pub options: SessionOptions,
    pub channel: Channel<NxtTelegramProtocol>,
    pub state: Mutex<DeviceState>,
    pub display: Mutex<DisplayBuffer>,
    generation: AtomicU64,
    link_lost: Mutex<Option<LinkLostHandler>>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Session {
        Session {
            options,
            channel: Channel::new(NxtTelegramProtocol::new()),
            state: Mutex::new(DeviceState::default()),
            display: Mutex::new(DisplayBuffer::new()),
            generation: AtomicU64::new(0),
            link_lost: Mutex::new(None),
        }
    }

    pub fn set_link_lost_handler(&self, handler: Option<LinkLostHandler>) {
        *self.link_lost.lock() = handler;
    }

    /// Attaches a writer and starts a new generation.
    pub fn begin(&self, writer: Box<dyn Write + Send>) -> u64 {
        self.channel.attach(writer);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!("Session #{} started", generation);
        generation
    }

    /// Ends session `generation` if it is still the current one.
    ///
    /// Detaches the writer, fails every waiting request, clears the state
    /// cache and the display buffer. Returns `false` if another caller
    /// already ended it.
    pub fn end(&self, generation: u64, reason: &str) -> bool {
        if self
            .generation
            .compare_exchange(generation, generation + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Session #{} already ended", generation);
            return false;
        }
        let failed = self.channel.detach(reason);
        self.state.lock().reset();
        self.display.lock().clear();
        debug!(
            "Session #{} ended ({}), {} pending requests failed",
            generation, reason, failed
        );
        true
    }

    /// Ends the session after a transport failure and notifies the host.
    fn lose_link(&self, generation: u64, cause: Error) {
        error!("Link lost: {}", cause);
        if !self.end(generation, &cause.to_string()) {
            return;
        }
        let handler = self.link_lost.lock().clone();
        if let Some(handler) = handler {
            handler(&cause);
        }
    }

    /// Single ingestion point for decoded telegrams.
    fn ingest(&self, telegram: Telegram) {
        if telegram.kind != CommandKind::Reply {
            warn!(
                "Ignoring non-reply telegram kind={:02X} opcode={:02X}",
                telegram.kind.as_byte(),
                telegram.opcode
            );
            return;
        }
        match Frame::from_telegram(telegram) {
            Ok(frame) => {
                trace!(
                    "Reply to {:02X}: status={:02X}, data_len={}",
                    frame.opcode,
                    frame.status.0,
                    frame.data.len()
                );
                self.channel.dispatch(frame);
            }
            Err(e) => warn!("Dropping malformed reply: {}", e),
        }
    }

    /// Writes a telegram without waiting for a reply.
    pub fn send(&self, kind: CommandKind, opcode: u8, payload: &[u8]) -> Result<()> {
        self.channel
            .write(&Telegram::new(kind, opcode, payload))
            .map(|_| ())
    }

    /// Writes a reply-expecting telegram and waits for its reply; `Ok(None)` on timeout.
    pub fn request(
        &self,
        kind: CommandKind,
        opcode: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Option<Frame>> {
        self.channel
            .invoke(&Telegram::new(kind, opcode, payload), timeout)
    }
}

/// The background thread that feeds transport bytes into the decoder.
pub(crate) struct ReaderThread {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl ReaderThread {
    /// Spawns the reader for session `generation`.
    ///
    /// `reader` must return from `read` periodically (a read timeout or EOF),
    /// otherwise the thread cannot observe a shutdown request.
    pub fn spawn<R>(session: Arc<Session>, generation: u64, reader: R) -> Result<ReaderThread>
    where
        R: Read + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(format!("nxt-reader-{}", generation))
            .spawn(move || read_loop(&session, generation, reader, &shutdown_flag))?;
        Ok(ReaderThread {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Signals the reader to stop and waits for it.
    ///
    /// Called from the reader thread itself (e.g. from a link-lost handler)
    /// it only signals, since the thread is already unwinding its loop.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                error!("Reader thread panicked");
            }
        }
    }
}

impl Drop for ReaderThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop<R: Read>(session: &Session, generation: u64, mut reader: R, shutdown: &AtomicBool) {
    debug!("Reader for session #{} running", generation);
    let mut protocol = NxtTelegramProtocol::new();
    let mut buf = [0u8; NXT_READ_CHUNK_SIZE];

    while !shutdown.load(Ordering::Acquire) {
        match reader.read(&mut buf) {
            Ok(0) => {
                if !shutdown.load(Ordering::Acquire) {
                    session.lose_link(
                        generation,
                        Error::LinkLost {
                            description: "transport closed".to_owned(),
                        },
                    );
                }
                break;
            }
            Ok(n) => {
                trace!("Read {} bytes", n);
                for telegram in protocol.feed(&buf[..n]) {
                    session.ingest(telegram);
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                if !shutdown.load(Ordering::Acquire) {
                    session.lose_link(generation, Error::IoError(e));
                }
                break;
            }
        }
    }
    debug!("Reader for session #{} stopped", generation);
}

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::LevelFilter;
use nxtlink::base::ProtocolEncoder;
use nxtlink::{CommandKind, NxtDevice, NxtTelegramProtocol, SessionOptions, Telegram};
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(LevelFilter::max())
        .is_test(true)
        .try_init();
}

/// Options with short delays so the tests run fast.
pub fn fast_options() -> SessionOptions {
    SessionOptions::default()
        .with_command_timeout(Duration::from_millis(300))
        .with_bulk_timeout(Duration::from_millis(300))
        .with_ls_polling(8, Duration::from_millis(1))
        .with_display_write_delay(Duration::from_millis(1))
}

/// Reply payload: status byte followed by `data`.
pub fn reply(status: u8, data: &[u8]) -> Option<Vec<u8>> {
    let mut payload = Vec::with_capacity(1 + data.len());
    payload.push(status);
    payload.extend_from_slice(data);
    Some(payload)
}

pub fn ok(data: &[u8]) -> Option<Vec<u8>> {
    reply(0x00, data)
}

/// Read half handed to the device. Times out like a serial port and
/// reports EOF once the brick hangs up.
pub struct HostReader {
    incoming: Receiver<Vec<u8>>,
    buffered: Vec<u8>,
}

impl Read for HostReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.buffered.is_empty() {
            match self.incoming.recv_timeout(Duration::from_millis(10)) {
                Ok(bytes) => self.buffered = bytes,
                Err(RecvTimeoutError::Timeout) => return Err(io::ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }
        let n = buf.len().min(self.buffered.len());
        buf[..n].copy_from_slice(&self.buffered[..n]);
        self.buffered.drain(..n);
        Ok(n)
    }
}

/// Write half handed to the device.
pub struct HostWriter {
    outgoing: Sender<Vec<u8>>,
}

impl Write for HostWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outgoing
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

type Responder = Box<dyn FnMut(&Telegram) -> Option<Vec<u8>> + Send>;

/// A brick on the other end of the link.
///
/// Every telegram the host writes is recorded. Reply-expecting telegrams
/// are answered with whatever the responder returns; `None` stays silent.
pub struct SimulatedBrick {
    requests: Arc<Mutex<Vec<Telegram>>>,
    to_host: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedBrick {
    pub fn start<F>(responder: F) -> (SimulatedBrick, HostReader, HostWriter)
    where
        F: FnMut(&Telegram) -> Option<Vec<u8>> + Send + 'static,
    {
        let (to_host, incoming) = unbounded();
        let (outgoing, from_host) = unbounded();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let to_host = Arc::new(Mutex::new(Some(to_host)));

        let worker = {
            let requests = Arc::clone(&requests);
            let to_host = Arc::clone(&to_host);
            let responder: Responder = Box::new(responder);
            thread::spawn(move || serve(from_host, to_host, requests, responder))
        };

        (
            SimulatedBrick {
                requests,
                to_host,
                worker: Some(worker),
            },
            HostReader {
                incoming,
                buffered: Vec::new(),
            },
            HostWriter { outgoing },
        )
    }

    /// Starts a brick and connects a fresh device to it.
    pub fn connect<F>(options: SessionOptions, responder: F) -> (SimulatedBrick, NxtDevice)
    where
        F: FnMut(&Telegram) -> Option<Vec<u8>> + Send + 'static,
    {
        init_logger();
        let (brick, reader, writer) = SimulatedBrick::start(responder);
        let device = NxtDevice::new(options);
        device.connect(reader, writer).unwrap();
        (brick, device)
    }

    /// Pushes raw bytes to the host.
    pub fn push(&self, bytes: &[u8]) {
        if let Some(to_host) = self.to_host.lock().as_ref() {
            let _ = to_host.send(bytes.to_vec());
        }
    }

    /// Closes the brick-to-host direction; the host sees EOF.
    pub fn hang_up(&self) {
        self.to_host.lock().take();
    }

    pub fn requests(&self) -> Vec<Telegram> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, opcode: u8) -> Vec<Telegram> {
        self.requests
            .lock()
            .iter()
            .filter(|t| t.opcode == opcode)
            .cloned()
            .collect()
    }

    /// Waits until at least `count` telegrams with `opcode` were received.
    pub fn wait_for(&self, opcode: u8, count: usize) -> Vec<Telegram> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let seen = self.requests_for(opcode);
            if seen.len() >= count || Instant::now() >= deadline {
                return seen;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }
}

impl Drop for SimulatedBrick {
    fn drop(&mut self) {
        self.hang_up();
        // the worker ends once the device drops its writer
        drop(self.worker.take());
    }
}

fn serve(
    from_host: Receiver<Vec<u8>>,
    to_host: Arc<Mutex<Option<Sender<Vec<u8>>>>>,
    requests: Arc<Mutex<Vec<Telegram>>>,
    mut responder: Responder,
) {
    let mut protocol = NxtTelegramProtocol::new();
    while let Ok(bytes) = from_host.recv() {
        for request in protocol.feed(&bytes) {
            requests.lock().push(request.clone());
            let answer = responder(&request);
            if !request.kind.expects_reply() {
                continue;
            }
            if let Some(payload) = answer {
                let reply = Telegram::new(CommandKind::Reply, request.opcode, &payload);
                let encoded = match protocol.encode_to_vec(&reply) {
                    Ok(encoded) => encoded,
                    Err(_) => continue,
                };
                if let Some(to_host) = to_host.lock().as_ref() {
                    let _ = to_host.send(encoded);
                }
            }
        }
    }
}

/// Polls `condition` for up to two seconds.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

use crate::base::{CommandKind, Error, ProtocolDecoder, ProtocolEncoder, Result, Telegram};
use byteorder::{ByteOrder, LittleEndian};
use log::{error, trace, warn};
use std::cmp::min;
use std::io::Write;

/// Size of the little-endian length prefix.
const NXT_LENGTH_PREFIX_SIZE: usize = 2;

/// Kind byte plus opcode byte.
const NXT_TELEGRAM_HEADER_SIZE: usize = 2;

/// Largest body that fits into the 16-bit length prefix.
const NXT_MAX_BODY_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
enum DecodeStatus {
    WaitLength,
    ReceiveBody,
}

/// The NXT telegram framing: `[len_lo][len_hi][command_kind][opcode][payload...]`.
///
/// Encoding builds complete telegrams; decoding is incremental, so input can
/// be fed in arbitrary chunks and partial telegrams are carried over between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct NxtTelegramProtocol {
    status: DecodeStatus,
    length_prefix: Vec<u8>,
    body_size: usize,
    body: Vec<u8>,
}

impl NxtTelegramProtocol {
    /// Creates a new `NxtTelegramProtocol` instance in its initial state.
    pub fn new() -> NxtTelegramProtocol {
        trace!("Creating new NxtTelegramProtocol");
        NxtTelegramProtocol {
            status: DecodeStatus::WaitLength,
            length_prefix: Vec::with_capacity(NXT_LENGTH_PREFIX_SIZE),
            body_size: 0,
            body: Vec::new(),
        }
    }

    /// Appends newly arrived bytes and extracts every telegram they complete.
    ///
    /// Unconsumed trailing bytes stay buffered for the next call. Chunking of
    /// the input never changes the extracted telegrams.
    pub fn feed(&mut self, mut bytes: &[u8]) -> Vec<Telegram> {
        let mut telegrams = Vec::new();
        while !bytes.is_empty() {
            match self.decode(bytes) {
                Ok((consumed, telegram)) => {
                    if let Some(telegram) = telegram {
                        telegrams.push(telegram);
                    }
                    if consumed == 0 {
                        // decode always makes progress on a non-empty buffer
                        break;
                    }
                    bytes = &bytes[consumed..];
                }
                Err(e) => {
                    error!("Telegram decode error: {}", e);
                    self.reset_decoder();
                    break;
                }
            }
        }
        telegrams
    }

    /// Returns the number of bytes of an incomplete telegram currently carried over.
    pub fn buffered(&self) -> usize {
        self.length_prefix.len() + self.body.len()
    }

    fn start_wait_length(&mut self) {
        self.status = DecodeStatus::WaitLength;
        self.length_prefix.clear();
        self.body_size = 0;
        self.body.clear();
    }

    fn start_receive_body(&mut self) {
        trace!("Decoder state -> ReceiveBody (size: {})", self.body_size);
        self.status = DecodeStatus::ReceiveBody;
        self.body.clear();
        self.body.reserve(self.body_size);
    }

    fn decode_length(&mut self, buf: &[u8]) -> Result<(usize, Option<Telegram>)> {
        let bytes_to_read = NXT_LENGTH_PREFIX_SIZE - self.length_prefix.len();
        let bytes_actual_read = min(bytes_to_read, buf.len());
        self.length_prefix
            .extend_from_slice(&buf[0..bytes_actual_read]);

        if self.length_prefix.len() < NXT_LENGTH_PREFIX_SIZE {
            trace!("Length prefix incomplete, need more data");
            return Ok((bytes_actual_read, None));
        }

        self.body_size = LittleEndian::read_u16(&self.length_prefix) as usize;
        if self.body_size < NXT_TELEGRAM_HEADER_SIZE {
            // too short to hold kind and opcode; skip the declared bytes
            warn!(
                "Telegram length {} shorter than header, dropping it",
                self.body_size
            );
        }
        if self.body_size == 0 {
            self.start_wait_length();
        } else {
            self.start_receive_body();
        }
        Ok((bytes_actual_read, None))
    }

    fn decode_body(&mut self, buf: &[u8]) -> Result<(usize, Option<Telegram>)> {
        let bytes_to_read = self.body_size - self.body.len();
        let bytes_actual_read = min(bytes_to_read, buf.len());
        self.body.extend_from_slice(&buf[0..bytes_actual_read]);

        if self.body.len() < self.body_size {
            trace!(
                "Telegram body incomplete ({}/{}), need more data",
                self.body.len(),
                self.body_size
            );
            return Ok((bytes_actual_read, None));
        }

        let telegram = self.take_telegram();
        self.start_wait_length();
        Ok((bytes_actual_read, telegram))
    }

    fn take_telegram(&mut self) -> Option<Telegram> {
        if self.body.len() < NXT_TELEGRAM_HEADER_SIZE {
            return None;
        }
        match CommandKind::from_byte(self.body[0]) {
            Some(kind) => {
                let telegram = Telegram {
                    kind,
                    opcode: self.body[1],
                    payload: self.body[NXT_TELEGRAM_HEADER_SIZE..].to_vec(),
                };
                trace!(
                    "Decoded telegram: kind={:02X}, opcode={:02X}, payload_len={}",
                    kind.as_byte(),
                    telegram.opcode,
                    telegram.payload.len()
                );
                Some(telegram)
            }
            None => {
                warn!(
                    "Dropping telegram with unknown command kind {:02X}",
                    self.body[0]
                );
                None
            }
        }
    }
}

impl Default for NxtTelegramProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder for NxtTelegramProtocol {
    /// Decodes bytes until one telegram completes or the buffer runs out.
    fn decode(&mut self, buf: &[u8]) -> Result<(usize, Option<Telegram>)> {
        let mut i = 0;
        while i < buf.len() {
            let (consumed, telegram) = match self.status {
                DecodeStatus::WaitLength => self.decode_length(&buf[i..])?,
                DecodeStatus::ReceiveBody => self.decode_body(&buf[i..])?,
            };
            i += consumed;
            if telegram.is_some() {
                return Ok((i, telegram));
            }
        }
        Ok((i, None))
    }

    fn reset_decoder(&mut self) {
        trace!("Resetting decoder state");
        self.start_wait_length();
    }
}

impl ProtocolEncoder for NxtTelegramProtocol {
    /// Encodes a telegram: length prefix, kind byte, opcode, payload.
    fn encode(&mut self, telegram: &Telegram, bytes: &mut [u8]) -> Result<usize> {
        let encoded_size = self.estimate_encoded_size(telegram)?;
        if encoded_size > bytes.len() {
            error!(
                "Buffer too small: required {}, available {}",
                encoded_size,
                bytes.len()
            );
            return Err(Error::BufferTooSmall);
        }

        let body_len = telegram.body_len();
        LittleEndian::write_u16(&mut bytes[0..2], body_len as u16);
        bytes[2] = telegram.kind.as_byte();
        bytes[3] = telegram.opcode;
        bytes[4..encoded_size].copy_from_slice(&telegram.payload);
        trace!(
            "Encoded telegram: kind={:02X}, opcode={:02X}, body_len={}",
            bytes[2],
            telegram.opcode,
            body_len
        );
        Ok(encoded_size)
    }

    fn estimate_encoded_size(&mut self, telegram: &Telegram) -> Result<usize> {
        let body_len = telegram.body_len();
        if body_len > NXT_MAX_BODY_SIZE {
            return Err(Error::PayloadTooLarge {
                len: telegram.payload.len(),
            });
        }
        Ok(NXT_LENGTH_PREFIX_SIZE + body_len)
    }

    fn write_to(&mut self, telegram: &Telegram, dest: &mut dyn Write) -> Result<usize> {
        let buf = self.encode_to_vec(telegram)?;
        match dest.write_all(&buf) {
            Ok(()) => {
                trace!("Wrote {} bytes", buf.len());
                Ok(buf.len())
            }
            Err(err) => {
                error!("IO error during write_all: {}", err);
                Err(err.into())
            }
        }
    }
}

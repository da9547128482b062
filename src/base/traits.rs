use crate::base::error::Result;
use crate::base::message::Telegram;
use std::io;

/// Defines the behavior for decoding byte streams into `Telegram` objects.
pub trait ProtocolDecoder {
    /// Attempts to decode a `Telegram` from the provided buffer.
    ///
    /// Returns a `Result` containing a tuple:
    /// * The number of bytes consumed from the buffer.
    /// * An `Option<Telegram>` which is `Some` if a complete telegram was decoded, or `None` otherwise.
    ///
    /// Bytes of an incomplete telegram are consumed and kept by the decoder,
    /// so the caller never has to present them again.
    ///
    /// # Arguments
    ///
    /// * `buf` - The byte slice containing the data to decode.
    fn decode(&mut self, buf: &[u8]) -> Result<(usize, Option<Telegram>)>;

    /// Resets the internal state of the decoder, discarding any partial telegram.
    fn reset_decoder(&mut self);
}

/// Defines the behavior for encoding `Telegram` objects into byte streams.
pub trait ProtocolEncoder {
    /// Encodes a `Telegram` into the provided byte buffer.
    ///
    /// Returns the number of bytes written to the buffer upon successful encoding.
    ///
    /// # Arguments
    ///
    /// * `telegram` - The `Telegram` to encode.
    /// * `bytes` - The mutable byte slice to write the encoded telegram into.
    fn encode(&mut self, telegram: &Telegram, bytes: &mut [u8]) -> Result<usize>;

    /// Computes the exact size in bytes of the encoded `Telegram`.
    fn estimate_encoded_size(&mut self, telegram: &Telegram) -> Result<usize>;

    /// Encodes a `Telegram` into a freshly allocated buffer.
    fn encode_to_vec(&mut self, telegram: &Telegram) -> Result<Vec<u8>> {
        let size = self.estimate_encoded_size(telegram)?;
        let mut buf = vec![0; size];
        let written = self.encode(telegram, &mut buf)?;
        buf.truncate(written);
        Ok(buf)
    }

    /// Encodes a `Telegram` and writes it directly to a `Write` target (e.g., a serial port)
    /// with a single `write_all`, so concurrent writers serialized by the caller
    /// never interleave partial telegrams.
    ///
    /// Returns the number of bytes successfully written to the destination.
    fn write_to(&mut self, telegram: &Telegram, dest: &mut dyn io::Write) -> Result<usize>;
}

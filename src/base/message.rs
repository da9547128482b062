use crate::base::error::{Error, Result};
use crate::status::StatusCode;
use byteorder::{ByteOrder, LittleEndian};

/// The command kind byte that follows the length prefix of every telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Direct command, the brick answers with a reply telegram.
    DirectWithReply,
    /// Direct command, the brick stays silent.
    DirectNoReply,
    /// System command, the brick answers with a reply telegram.
    SystemWithReply,
    /// System command, the brick stays silent.
    SystemNoReply,
    /// Reply telegram. Only ever received from the brick.
    Reply,
}

impl CommandKind {
    /// Wire value of the command kind.
    pub fn as_byte(self) -> u8 {
        match self {
            CommandKind::DirectWithReply => 0x00,
            CommandKind::DirectNoReply => 0x80,
            CommandKind::SystemWithReply => 0x01,
            CommandKind::SystemNoReply => 0x81,
            CommandKind::Reply => 0x02,
        }
    }

    /// Parses a wire command kind byte.
    pub fn from_byte(byte: u8) -> Option<CommandKind> {
        match byte {
            0x00 => Some(CommandKind::DirectWithReply),
            0x80 => Some(CommandKind::DirectNoReply),
            0x01 => Some(CommandKind::SystemWithReply),
            0x81 => Some(CommandKind::SystemNoReply),
            0x02 => Some(CommandKind::Reply),
            _ => None,
        }
    }

    /// Returns `true` if the brick answers telegrams of this kind.
    pub fn expects_reply(self) -> bool {
        matches!(
            self,
            CommandKind::DirectWithReply | CommandKind::SystemWithReply
        )
    }

    /// Direct command kind with or without reply.
    pub fn direct(reply: bool) -> CommandKind {
        if reply {
            CommandKind::DirectWithReply
        } else {
            CommandKind::DirectNoReply
        }
    }

    /// System command kind with or without reply.
    pub fn system(reply: bool) -> CommandKind {
        if reply {
            CommandKind::SystemWithReply
        } else {
            CommandKind::SystemNoReply
        }
    }
}

/// A single protocol message exchanged with the brick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    /// Direct/system family and whether a reply is requested.
    pub kind: CommandKind,

    /// One byte operation identifier.
    pub opcode: u8,

    /// Payload bytes; its length is implied by the length prefix.
    pub payload: Vec<u8>,
}

impl Telegram {
    /// Creates a telegram of the given kind.
    ///
    /// # Arguments
    ///
    /// * `kind` - Command kind byte to emit.
    /// * `opcode` - The operation identifier.
    /// * `payload` - A slice containing the payload data.
    pub fn new(kind: CommandKind, opcode: u8, payload: &[u8]) -> Telegram {
        Telegram {
            kind,
            opcode,
            payload: payload.to_vec(),
        }
    }

    /// Creates a direct command telegram.
    #[inline]
    pub fn direct(opcode: u8, payload: &[u8], reply: bool) -> Telegram {
        Telegram::new(CommandKind::direct(reply), opcode, payload)
    }

    /// Creates a system command telegram.
    #[inline]
    pub fn system(opcode: u8, payload: &[u8], reply: bool) -> Telegram {
        Telegram::new(CommandKind::system(reply), opcode, payload)
    }

    /// Number of bytes covered by the length prefix (kind + opcode + payload).
    #[inline]
    pub fn body_len(&self) -> usize {
        2 + self.payload.len()
    }
}

/// A decoded reply telegram: the opcode it answers, its status and the remaining data.
///
/// Multi-byte integers in `data` are little-endian; the accessors take an
/// offset into `data` and the caller picks width and signedness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub status: StatusCode,
    pub data: Vec<u8>,
}

impl Frame {
    /// Interprets a received telegram as a reply frame.
    ///
    /// Fails if the telegram is not of kind `Reply` or carries no status byte.
    pub fn from_telegram(telegram: Telegram) -> Result<Frame> {
        if telegram.kind != CommandKind::Reply {
            return Err(Error::ProtocolError {
                description: format!(
                    "telegram kind {:02X} is not a reply",
                    telegram.kind.as_byte()
                ),
            });
        }
        let mut payload = telegram.payload;
        if payload.is_empty() {
            return Err(Error::ProtocolError {
                description: format!("reply to {:02X} has no status byte", telegram.opcode),
            });
        }
        let data = payload.split_off(1);
        Ok(Frame {
            opcode: telegram.opcode,
            status: StatusCode(payload[0]),
            data,
        })
    }

    fn field(&self, offset: usize, width: usize) -> Result<&[u8]> {
        self.data
            .get(offset..offset + width)
            .ok_or_else(|| Error::ProtocolError {
                description: format!(
                    "reply to {:02X} too short: need {} bytes at offset {}, got {}",
                    self.opcode,
                    width,
                    offset,
                    self.data.len()
                ),
            })
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.field(offset, 1)?[0])
    }

    pub fn i8_at(&self, offset: usize) -> Result<i8> {
        Ok(self.u8_at(offset)? as i8)
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.field(offset, 2)?))
    }

    pub fn i16_at(&self, offset: usize) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.field(offset, 2)?))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.field(offset, 4)?))
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.field(offset, 4)?))
    }

    /// Borrows `len` bytes of data starting at `offset`.
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.field(offset, len)
    }
}

use std::borrow::Cow;
use std::fmt;

/// Status byte reported as success in every reply telegram.
pub const NXT_STATUS_SUCCESS: u8 = 0x00;

/// Status byte reported while a low-speed (I2C) transaction is still in flight.
pub const NXT_STATUS_PENDING_COMMUNICATION: u8 = 0x20;

const NXT_STATUS_TABLE: &[(u8, &str)] = &[
    (0x00, "Success"),
    (0x20, "Pending communication transaction in progress"),
    (0x40, "Specified mailbox queue is empty"),
    (0x81, "No more handles"),
    (0x82, "No space"),
    (0x83, "No more files"),
    (0x84, "End of file expected"),
    (0x85, "End of file"),
    (0x86, "Not a linear file"),
    (0x87, "File not found"),
    (0x88, "Handle already closed"),
    (0x89, "No linear space"),
    (0x8A, "Undefined error"),
    (0x8B, "File is busy"),
    (0x8C, "No write buffers"),
    (0x8D, "Append not possible"),
    (0x8E, "File is full"),
    (0x8F, "File exists"),
    (0x90, "Module not found"),
    (0x91, "Out of bounds"),
    (0x92, "Illegal file name"),
    (0x93, "Illegal handle"),
    (0xBD, "Request failed (i.e. specified file not found)"),
    (0xBE, "Unknown command opcode"),
    (0xBF, "Insane packet"),
    (0xC0, "Data contains out-of-range values"),
    (0xDD, "Communication bus error"),
    (0xDE, "No free memory in communication buffer"),
    (0xDF, "Specified channel/connection is not valid"),
    (0xE0, "Specified channel/connection not configured or busy"),
    (0xEC, "No active program"),
    (0xED, "Illegal size specified"),
    (0xEE, "Illegal mailbox queue ID specified"),
    (0xEF, "Attempted to access invalid field of a structure"),
    (0xF0, "Bad input or output specified"),
    (0xFB, "Insufficient memory available"),
    (0xFF, "Bad arguments"),
];

/// The status byte carried as the first payload byte of every reply telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u8);

impl StatusCode {
    /// Returns `true` for the success status (`0x00`).
    #[inline]
    pub fn is_success(&self) -> bool {
        self.0 == NXT_STATUS_SUCCESS
    }

    /// Looks up the fixed description of a known status byte.
    pub fn known_description(&self) -> Option<&'static str> {
        NXT_STATUS_TABLE
            .iter()
            .find(|(code, _)| *code == self.0)
            .map(|(_, description)| *description)
    }

    /// Describes the status byte. Bytes missing from the table map to
    /// `"Unknown error: 0x<hex>"`.
    pub fn description(&self) -> Cow<'static, str> {
        match self.known_description() {
            Some(description) => Cow::Borrowed(description),
            None => Cow::Owned(format!("Unknown error: 0x{:02x}", self.0)),
        }
    }
}

impl From<u8> for StatusCode {
    fn from(code: u8) -> Self {
        StatusCode(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

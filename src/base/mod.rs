mod channel;
mod error;
mod message;
mod pending;
mod traits;

pub use self::channel::Channel;
pub use self::error::{Error, Result};
pub use self::message::{CommandKind, Frame, Telegram};
pub use self::pending::{PendingTable, RequestId};
pub use self::traits::{ProtocolDecoder, ProtocolEncoder};

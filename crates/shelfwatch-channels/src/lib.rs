//! # Shelfwatch Channels
//! Messaging transport implementations. Everything about how a message
//! looks on the wire lives here, outside the core decision logic.

pub mod format;
pub mod telegram;

pub use telegram::TelegramGateway;

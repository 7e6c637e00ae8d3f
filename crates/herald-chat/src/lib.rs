//! Chat transport boundary: message delivery, in-place edits, and the
//! structured inline-action encoding.
//!
//! The runtime only ever talks to the `ChatTransport` trait; the Telegram
//! client here is one implementation of it.

pub mod action;
pub mod telegram;
pub mod transport;

pub use action::{ActionKind, ActionParseError, TaskAction};
pub use telegram::TelegramTransport;
pub use transport::{ChatEvent, ChatTransport, InlineControl, MessageRef};

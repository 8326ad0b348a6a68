//! Persistence models: [`Message`] and the FindAll page/result types.

mod message;
mod page;

pub use message::{message_key, Message, MESSAGES_SET, MESSAGE_KEY_PREFIX};
pub use page::{FindAllPage, FindResult};

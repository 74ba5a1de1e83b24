//! Chat domain module.

mod exchange;
mod message;

pub use exchange::{ChatExchange, ReplyOwner};
pub use message::{ChatMessage, ChatRole};

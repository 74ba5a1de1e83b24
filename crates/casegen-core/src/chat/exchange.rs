//! Conversation transcript with a single streaming reply slot.

use super::message::{ChatMessage, ChatRole};
use uuid::Uuid;

/// Identifies the exchange that owns the streaming reply.
pub type ReplyOwner = Uuid;

/// Ordered chat messages between the user and the conversational agent.
///
/// At most one assistant message is partial at a time, and it is always the
/// last message. The partial slot belongs to one exchange; calls from any
/// other exchange (for example one that was cancelled and superseded) are
/// ignored.
#[derive(Debug, Clone, Default)]
pub struct ChatExchange {
    messages: Vec<ChatMessage>,
    reply_owner: Option<ReplyOwner>,
}

impl ChatExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Returns the streaming reply, if any.
    pub fn partial_reply(&self) -> Option<&ChatMessage> {
        self.messages.last().filter(|m| m.partial)
    }

    /// Completed messages, in order, as sent back to the producer.
    pub fn completed_messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().filter(|m| !m.partial).cloned().collect()
    }

    /// Appends a user message. Any orphaned partial reply is dropped first.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.drop_partial();
        self.messages.push(ChatMessage::user(text));
    }

    /// Appends a complete assistant message.
    ///
    /// When `owner` currently holds the reply slot, the partial reply is
    /// finalized first so the new message lands after it.
    pub fn push_assistant(&mut self, owner: ReplyOwner, text: impl Into<String>) -> bool {
        if self.reply_owner.is_some() && self.reply_owner != Some(owner) {
            return false;
        }
        self.finish_reply(owner);
        self.messages.push(ChatMessage::assistant(text));
        true
    }

    /// Hands the reply slot to `owner`, discarding whatever another exchange
    /// left behind.
    pub fn begin_reply(&mut self, owner: ReplyOwner) {
        self.drop_partial();
        self.reply_owner = Some(owner);
    }

    /// Appends streamed text to the partial reply owned by `owner`.
    ///
    /// Returns false when `owner` no longer holds the slot.
    pub fn append_reply(&mut self, owner: ReplyOwner, chunk: &str) -> bool {
        if self.reply_owner != Some(owner) {
            return false;
        }
        match self.messages.last_mut() {
            Some(last) if last.partial => last.text.push_str(chunk),
            _ => self.messages.push(ChatMessage {
                role: ChatRole::Assistant,
                text: chunk.to_string(),
                partial: true,
            }),
        }
        true
    }

    /// Marks the partial reply of `owner` as complete and releases the slot.
    pub fn finish_reply(&mut self, owner: ReplyOwner) {
        if self.reply_owner != Some(owner) {
            return;
        }
        if let Some(last) = self.messages.last_mut()
            && last.partial
        {
            last.partial = false;
        }
        self.reply_owner = None;
    }

    /// Removes the partial reply of `owner` and releases the slot.
    pub fn discard_reply(&mut self, owner: ReplyOwner) {
        if self.reply_owner != Some(owner) {
            return;
        }
        self.drop_partial();
    }

    fn drop_partial(&mut self) {
        if self.messages.last().is_some_and(|m| m.partial) {
            self.messages.pop();
        }
        self.reply_owner = None;
    }
}

#![forbid(unsafe_code)]

use std::collections::HashMap;

use super::validator::Username;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    AwaitIdentifier,
    AwaitConfirm { candidate: Username },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    pub order_id: String,
    pub chat_id: String,
    pub quantity: u32,
    pub phase: Phase,
}

impl Conversation {
    pub fn new(order_id: impl Into<String>, chat_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            chat_id: chat_id.into(),
            quantity,
            phase: Phase::AwaitIdentifier,
        }
    }
}

/// Open conversations keyed by buyer id. Owned by the dispatcher task; not
/// shared, so no locking.
#[derive(Debug, Default)]
pub struct ConversationTable {
    by_buyer: HashMap<u64, Conversation>,
}

impl ConversationTable {
    /// Starts a conversation for `buyer_id`, returning the one it replaced.
    pub fn open(&mut self, buyer_id: u64, conversation: Conversation) -> Option<Conversation> {
        self.by_buyer.insert(buyer_id, conversation)
    }

    pub fn get(&self, buyer_id: u64) -> Option<&Conversation> {
        self.by_buyer.get(&buyer_id)
    }

    pub fn get_mut(&mut self, buyer_id: u64) -> Option<&mut Conversation> {
        self.by_buyer.get_mut(&buyer_id)
    }

    pub fn close(&mut self, buyer_id: u64) -> Option<Conversation> {
        self.by_buyer.remove(&buyer_id)
    }

    pub fn len(&self) -> usize {
        self.by_buyer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_buyer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Conversation, ConversationTable, Phase};

    #[test]
    fn new_order_replaces_open_conversation() {
        let mut table = ConversationTable::default();
        assert!(table.open(42, Conversation::new("A1", "chat-42", 100)).is_none());

        let replaced = table
            .open(42, Conversation::new("A2", "chat-42", 30))
            .expect("first conversation is returned");
        assert_eq!(replaced.order_id, "A1");

        let current = table.get(42).unwrap();
        assert_eq!(current.order_id, "A2");
        assert_eq!(current.phase, Phase::AwaitIdentifier);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn close_removes_once() {
        let mut table = ConversationTable::default();
        table.open(7, Conversation::new("B1", "chat-7", 50));
        assert!(table.close(7).is_some());
        assert!(table.close(7).is_none());
        assert!(table.is_empty());
    }
}

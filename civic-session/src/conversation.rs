use civic_api::ConversationRecord;

use crate::message::{Message, Provenance};

/// Client-side read-through copy of the active conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationCache {
    id: Option<String>,
    messages: Vec<Message>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drops the selection and every cached message.
    pub fn reset(&mut self) {
        self.id = None;
        self.messages.clear();
    }

    /// Replaces the cache with a freshly loaded conversation.
    pub fn load(&mut self, record: ConversationRecord) {
        self.id = Some(record.id);
        self.messages = record.messages.into_iter().map(Message::confirmed).collect();
    }

    /// Merges a server copy into the cache.
    ///
    /// The server list becomes the confirmed history. Messages the cache
    /// already held as confirmed line up with the head of that list by
    /// position. Walking local messages in order, each one that matches the
    /// next unmatched server message after that head is superseded by it;
    /// local messages with no match (for example a fallback reply the backend
    /// never stored) are kept after the server messages. Insight metadata
    /// survives on the confirmed copy.
    pub fn reconcile(&mut self, record: ConversationRecord) {
        let mut confirmed: Vec<Message> =
            record.messages.into_iter().map(Message::confirmed).collect();

        let (held, locals): (Vec<Message>, Vec<Message>) = self
            .messages
            .drain(..)
            .partition(|m| m.provenance() == Provenance::Confirmed);

        for (server, cached) in confirmed.iter_mut().zip(&held) {
            if server.same_content(cached) {
                server.carry_over(cached);
            }
        }

        let mut next = held.len().min(confirmed.len());
        let mut pending = Vec::new();
        for local in locals {
            match confirmed[next..].iter().position(|c| c.same_content(&local)) {
                Some(offset) => {
                    confirmed[next + offset].carry_over(&local);
                    next += offset + 1;
                }
                None => pending.push(local),
            }
        }

        self.id = Some(record.id);
        self.messages = confirmed;
        self.messages.extend(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_api::{ReplyInsight, Sender, WireMessage};

    fn wire(sender: Sender, text: &str) -> WireMessage {
        WireMessage {
            sender,
            text: text.to_string(),
            timestamp: None,
        }
    }

    fn record(messages: Vec<WireMessage>) -> ConversationRecord {
        ConversationRecord {
            id: "c-1".to_string(),
            messages,
        }
    }

    #[test]
    fn reconcile_confirms_matching_locals() {
        let mut cache = ConversationCache::new();
        cache.push(Message::user("Hi"));
        cache.push(Message::assistant("Hello!", None));

        cache.reconcile(record(vec![
            wire(Sender::User, "Hi"),
            wire(Sender::Assistant, "Hello!"),
        ]));

        assert_eq!(cache.id(), Some("c-1"));
        assert_eq!(cache.messages().len(), 2);
        assert!(cache
            .messages()
            .iter()
            .all(|m| m.provenance() == Provenance::Confirmed));
    }

    #[test]
    fn reconcile_keeps_unstored_locals_after_server_copy() {
        let mut cache = ConversationCache::new();
        cache.load(record(vec![wire(Sender::User, "Earlier")]));
        cache.push(Message::user("Is the pool open?"));
        cache.push(Message::assistant("Sorry, try again.", None));

        cache.reconcile(record(vec![
            wire(Sender::User, "Earlier"),
            wire(Sender::User, "Is the pool open?"),
        ]));

        let texts: Vec<&str> = cache.messages().iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["Earlier", "Is the pool open?", "Sorry, try again."]);
        assert_eq!(cache.messages()[2].provenance(), Provenance::Local);
    }

    #[test]
    fn reconcile_matches_repeated_text_in_order() {
        let mut cache = ConversationCache::new();
        cache.push(Message::user("ok"));
        cache.push(Message::user("ok"));

        cache.reconcile(record(vec![wire(Sender::User, "ok")]));

        assert_eq!(cache.messages().len(), 2);
        assert_eq!(cache.messages()[0].provenance(), Provenance::Confirmed);
        assert_eq!(cache.messages()[1].provenance(), Provenance::Local);
    }

    #[test]
    fn reconcile_keeps_reply_insight() {
        let insight = ReplyInsight {
            insight: Some("Permits take 5 days".to_string()),
            categories: vec!["permits".to_string()],
            ..Default::default()
        };
        let mut cache = ConversationCache::new();
        cache.push(Message::user("Permits?"));
        cache.push(Message::assistant("Online.", Some(insight.clone())));

        let server = vec![wire(Sender::User, "Permits?"), wire(Sender::Assistant, "Online.")];
        cache.reconcile(record(server.clone()));
        assert_eq!(cache.messages()[1].provenance(), Provenance::Confirmed);
        assert_eq!(cache.messages()[1].insight(), Some(&insight));

        // A later refresh keeps it on the already confirmed copy.
        cache.reconcile(record(server));
        assert_eq!(cache.messages()[1].insight(), Some(&insight));
    }

    #[test]
    fn reconcile_does_not_match_locals_against_older_history() {
        let mut cache = ConversationCache::new();
        cache.load(record(vec![wire(Sender::User, "yes"), wire(Sender::Assistant, "A")]));
        cache.push(Message::user("yes"));
        cache.push(Message::assistant("Sorry", None));

        cache.reconcile(record(vec![wire(Sender::User, "yes"), wire(Sender::Assistant, "A")]));

        let texts: Vec<&str> = cache.messages().iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["yes", "A", "yes", "Sorry"]);
        assert_eq!(cache.messages()[2].provenance(), Provenance::Local);
    }
}

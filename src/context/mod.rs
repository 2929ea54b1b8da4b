//! Append-only message log used as the running conversation of a pilot run
//! and as the payload of ability results.

use serde::{Deserialize, Serialize};

use crate::types::{ContentItem, Message, Role};

/// Ordered, append-only sequence of messages.
///
/// There is no removal or in-place mutation API; earlier entries are
/// stable once pushed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    messages: Vec<Message>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context holding a single text item, the common ability result shape
    pub fn from_text(role: Role, text: impl Into<String>) -> Self {
        let mut ctx = Self::new();
        ctx.add_message(Message::new(role, "").with_item(ContentItem::text(text)));
        ctx
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a message built from a role, text and items
    pub fn add(&mut self, role: Role, content: impl Into<String>, items: Vec<ContentItem>) {
        self.add_message(Message::new(role, content).with_items(items));
    }

    /// Append every message of another context, preserving its order
    pub fn extend(&mut self, other: &Context) {
        self.messages.extend(other.messages.iter().cloned());
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All content items across the log, in order
    pub fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.messages.iter().flat_map(|m| m.items.iter())
    }

    pub fn estimate_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.estimate_tokens()).sum()
    }

    /// Newest messages fitting `target_tokens`, oldest first.
    ///
    /// The last `min_preserve` messages are always included even if they
    /// exceed the target on their own.
    pub fn window(&self, target_tokens: usize, min_preserve: usize) -> Vec<&Message> {
        let len = self.messages.len();
        if len <= min_preserve {
            return self.messages.iter().collect();
        }

        let mut result: Vec<&Message> = Vec::new();
        let mut tokens = 0;
        for msg in self.messages.iter().rev().take(min_preserve) {
            tokens += msg.estimate_tokens();
            result.push(msg);
        }

        for msg in self.messages.iter().rev().skip(min_preserve) {
            let msg_tokens = msg.estimate_tokens();
            if tokens + msg_tokens > target_tokens {
                break;
            }
            tokens += msg_tokens;
            result.push(msg);
        }

        result.reverse();
        result
    }

    /// Render the log as plain text for inclusion in a prompt
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.text_content()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_preserves_order() {
        let mut ctx = Context::new();
        ctx.add_message(Message::user("first"));
        ctx.add_message(Message::assistant("second"));
        ctx.add(Role::Ability, "third", vec![ContentItem::text("payload")]);

        let contents: Vec<&str> = ctx.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.last().unwrap().items.len(), 1);
    }

    #[test]
    fn from_text_holds_one_item() {
        let ctx = Context::from_text(Role::Ability, "a summary");
        assert_eq!(ctx.len(), 1);
        let items: Vec<_> = ctx.items().collect();
        assert_eq!(items, vec![&ContentItem::text("a summary")]);
    }

    #[test]
    fn extend_appends_other_log() {
        let mut a = Context::new();
        a.add_message(Message::user("a"));
        let mut b = Context::new();
        b.add_message(Message::user("b1"));
        b.add_message(Message::user("b2"));

        a.extend(&b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.messages()[2].content, "b2");
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn window_keeps_newest_within_budget() {
        let mut ctx = Context::new();
        for i in 0..10 {
            ctx.add_message(Message::user(format!("message number {i} {}", "x".repeat(40))));
        }
        let per_msg = ctx.messages()[0].estimate_tokens();
        let window = ctx.window(per_msg * 3, 1);
        assert_eq!(window.len(), 3);
        assert!(window.last().unwrap().content.starts_with("message number 9"));
        assert!(window[0].content.starts_with("message number 7"));
    }

    #[test]
    fn window_always_preserves_minimum() {
        let mut ctx = Context::new();
        ctx.add_message(Message::user("x".repeat(400)));
        ctx.add_message(Message::user("y".repeat(400)));
        ctx.add_message(Message::user("z".repeat(400)));
        let window = ctx.window(1, 2);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn render_includes_items() {
        let mut ctx = Context::new();
        ctx.add(Role::Ability, "result", vec![ContentItem::object(json!({"k": 1}))]);
        assert_eq!(ctx.render(), "Ability: result\n{\"k\":1}");
    }

    #[test]
    fn context_serializes_roundtrip() {
        let ctx = Context::from_text(Role::Ability, "hello");
        let json = serde_json::to_string(&ctx).unwrap();
        let back: Context = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }
}

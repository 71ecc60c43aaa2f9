//! Token-budgeted conversation history.
//!
//! The history holds the system prompt and every turn of one conversation,
//! oldest first. Its token count always includes the prompt. When an append
//! pushes the count over the budget, whole messages are evicted from the
//! front until it fits again; messages are never truncated or reordered.

use std::collections::VecDeque;
use std::fmt::Write as _;

use minerva_core::message::Message;
use minerva_core::token::TokenCounter;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MessageHistory {
    prompt: String,
    prompt_tokens: usize,
    messages: VecDeque<Message>,
    token_limit: usize,
    token_count: usize,
}

impl MessageHistory {
    pub fn new(prompt: impl Into<String>, token_limit: usize, counter: &dyn TokenCounter) -> Self {
        let prompt = prompt.into();
        let prompt_tokens = counter.count(&prompt);
        Self {
            prompt,
            prompt_tokens,
            messages: VecDeque::new(),
            token_limit,
            token_count: prompt_tokens,
        }
    }

    /// Append a message, then evict from the front while over budget.
    ///
    /// A message larger than the whole budget evicts everything, itself
    /// included.
    pub fn add(&mut self, message: Message) {
        self.token_count += message.token_length;
        self.messages.push_back(message);

        let mut evicted = 0usize;
        while self.token_count > self.token_limit {
            let Some(oldest) = self.messages.pop_front() else {
                break;
            };
            self.token_count -= oldest.token_length;
            evicted += 1;
        }

        if evicted > 0 {
            debug!(
                evicted,
                remaining = self.messages.len(),
                tokens = self.token_count,
                limit = self.token_limit,
                "Evicted oldest messages from history"
            );
        }
    }

    /// Render the prompt followed by one `author: content` line per message.
    pub fn format(&self) -> String {
        let mut out = self.prompt.clone();
        for message in &self.messages {
            let _ = write!(out, "\n{}: {}", message.author, message.text());
            for image in message.content.images() {
                let _ = write!(out, " [image: {}]", image.url);
            }
        }
        out
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    /// Tokens currently charged, prompt included.
    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minerva_core::message::{Content, Image};
    use minerva_core::token::HeuristicTokenCounter;

    const COUNTER: HeuristicTokenCounter = HeuristicTokenCounter;

    /// "u: " + 5 chars = 8 chars → 2 tokens each
    fn two_token_message(text: &str) -> Message {
        Message::new("u", text, &COUNTER)
    }

    fn assert_invariant(history: &MessageHistory) {
        let sum: usize = history.messages().map(|m| m.token_length).sum();
        assert_eq!(history.token_count(), sum + COUNTER.count(history.prompt()));
    }

    #[test]
    fn empty_history_counts_prompt() {
        let history = MessageHistory::new("system", 100, &COUNTER);
        assert_eq!(history.token_count(), 2);
        assert!(history.is_empty());
        assert_eq!(history.format(), "system");
    }

    #[test]
    fn add_within_budget_keeps_everything() {
        let mut history = MessageHistory::new("", 10, &COUNTER);
        history.add(two_token_message("aaaaa"));
        history.add(two_token_message("bbbbb"));
        assert_eq!(history.len(), 2);
        assert_eq!(history.token_count(), 4);
        assert_invariant(&history);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut history = MessageHistory::new("", 4, &COUNTER);
        history.add(two_token_message("first"));
        history.add(two_token_message("secnd"));
        history.add(two_token_message("third"));

        let texts: Vec<&str> = history.messages().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["secnd", "third"]);
        assert!(history.token_count() <= history.token_limit());
        assert_invariant(&history);
    }

    #[test]
    fn oversize_message_evicts_itself() {
        let mut history = MessageHistory::new("", 4, &COUNTER);
        history.add(two_token_message("small"));
        history.add(Message::new("u", "x".repeat(100), &COUNTER));
        assert!(history.is_empty());
        assert_eq!(history.token_count(), 0);
    }

    #[test]
    fn prompt_larger_than_budget_empties_history() {
        let mut history = MessageHistory::new("p".repeat(40), 5, &COUNTER);
        history.add(two_token_message("hello"));
        assert!(history.is_empty());
        // Only the prompt is left, and it is never evicted
        assert_eq!(history.token_count(), 10);
        assert_invariant(&history);
    }

    #[test]
    fn format_renders_lines_in_order() {
        let mut history = MessageHistory::new("PROMPT", 1000, &COUNTER);
        history.add(Message::new("alice", "hi", &COUNTER));
        history.add(Message::new("minerva", "Action: respond\nhello", &COUNTER));
        assert_eq!(history.format(), "PROMPT\nalice: hi\nminerva: Action: respond\nhello");
        assert_eq!(history.last().unwrap().author, "minerva");
    }

    #[test]
    fn format_renders_image_references() {
        let mut history = MessageHistory::new("P", 10_000, &COUNTER);
        let content = Content::from_parts(Some("look".into()), vec![Image::new("https://x/cat.png", 10, 10)]);
        history.add(Message::new("bob", content, &COUNTER));
        assert_eq!(history.format(), "P\nbob: look [image: https://x/cat.png]");
    }

    #[test]
    fn invariant_holds_over_many_appends() {
        let mut history = MessageHistory::new("prompt", 50, &COUNTER);
        for i in 0..200 {
            history.add(Message::new(format!("user{}", i % 3), "z".repeat(i % 37), &COUNTER));
            assert_invariant(&history);
            assert!(history.token_count() <= history.token_limit() || history.is_empty());
        }
    }
}

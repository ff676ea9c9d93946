//! Context and event payloads of the support flow.

use crate::core::Event;
use serde::{Deserialize, Serialize};

/// Name of the event carrying a user's answer.
pub const ANSWER_USER: &str = "AnswerUser";

/// Lookup parameters taken from the latest answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub peripheral: Option<String>,
    #[serde(default)]
    pub ticket: Option<String>,
}

/// Payload of a successful lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    #[serde(default)]
    pub ticket: Option<String>,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub pinged: Option<bool>,
}

/// One question asked during the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub question: String,
    /// State key that asked the question
    pub key: String,
    /// Label of the answer, once given
    #[serde(default)]
    pub answer: Option<String>,
}

/// Context of one support conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowContext {
    pub query: Query,
    pub results: LookupResult,
    /// Transcript, one entry per question asked, in order
    pub chat: Vec<ChatEntry>,
    pub chat_error_msg: String,
}

impl FlowContext {
    /// Transcript entry for the question asked by `key`.
    pub fn entry(&self, key: &str) -> Option<&ChatEntry> {
        self.chat.iter().find(|entry| entry.key == key)
    }
}

/// Data of an [`ANSWER_USER`] event.
///
/// `key` names the state that asked, `value` is what guards look at and
/// `label` is echoed into the transcript.
///
/// # Example
///
/// ```rust
/// use chartflow::flow::{Answer, ANSWER_USER};
///
/// let event = Answer::new("intro", "new_ticket")
///     .with_label("Order something")
///     .into_event();
///
/// assert_eq!(event.name, ANSWER_USER);
/// assert_eq!(event.data["value"], "new_ticket");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub label: String,
}

impl Answer {
    /// Answer whose label echoes its value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            key: key.into(),
            label: value.clone(),
            value,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn into_event(self) -> Event {
        let data = serde_json::to_value(&self).unwrap_or_default();
        Event::with_data(ANSWER_USER, data)
    }
}

impl From<Answer> for Event {
    fn from(answer: Answer) -> Self {
        answer.into_event()
    }
}

/// Shorthand for an [`ANSWER_USER`] event.
pub fn answer(key: &str, value: &str) -> Event {
    Answer::new(key, value).into_event()
}

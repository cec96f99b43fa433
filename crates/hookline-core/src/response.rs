//! Synchronous acknowledgements returned for inbound interactions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Maximum number of autocomplete choices the remote API accepts.
pub const MAX_CHOICES: usize = 25;

/// The `type` of an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Answer to a ping.
    Pong,
    /// Reply with a new message.
    ChannelMessage,
    /// Show a loading state; the message is sent later.
    DeferredChannelMessage,
    /// Acknowledge a component without changing its message yet.
    DeferredUpdateMessage,
    /// Edit the message the component is attached to.
    UpdateMessage,
    /// Autocomplete suggestions.
    AutocompleteResult,
    /// Open a modal form.
    Modal,
}

impl ResponseType {
    /// Numeric wire value.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Pong => 1,
            Self::ChannelMessage => 4,
            Self::DeferredChannelMessage => 5,
            Self::DeferredUpdateMessage => 6,
            Self::UpdateMessage => 7,
            Self::AutocompleteResult => 8,
            Self::Modal => 9,
        }
    }
}

/// Message flag bits understood by acks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageFlags(pub u64);

impl MessageFlags {
    /// Only the invoking user can see the message.
    pub const EPHEMERAL: Self = Self(1 << 6);
    /// Embeds are not expanded.
    pub const SUPPRESS_EMBEDS: Self = Self(1 << 2);

    /// No flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no bit is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for MessageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Message content for acks and follow-up messages.
///
/// Embeds and components are passed through as raw JSON; this crate does not
/// model them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<Value>,
    #[serde(default, skip_serializing_if = "MessageFlags::is_empty")]
    pub flags: MessageFlags,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tts: bool,
}

impl MessageData {
    /// Creates an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a message with only text content.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new().content(content)
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn embed(mut self, embed: Value) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn component(mut self, row: Value) -> Self {
        self.components.push(row);
        self
    }

    pub fn allowed_mentions(mut self, mentions: Value) -> Self {
        self.allowed_mentions = Some(mentions);
        self
    }

    /// Marks the message as visible only to the invoking user.
    pub fn ephemeral(mut self) -> Self {
        self.flags |= MessageFlags::EPHEMERAL;
        self
    }

    pub fn flags(mut self, flags: MessageFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn tts(mut self, tts: bool) -> Self {
        self.tts = tts;
        self
    }

    /// Serializes into a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

impl From<&str> for MessageData {
    fn from(content: &str) -> Self {
        Self::text(content)
    }
}

impl From<String> for MessageData {
    fn from(content: String) -> Self {
        Self::text(content)
    }
}

/// One autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Text shown to the user.
    pub name: String,
    /// Value submitted when chosen.
    pub value: Value,
}

impl Choice {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl From<&str> for Choice {
    fn from(name: &str) -> Self {
        Self::new(name, name)
    }
}

impl From<String> for Choice {
    fn from(name: String) -> Self {
        Self::new(name.clone(), name)
    }
}

/// A synchronous acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionResponse {
    /// Ack type.
    pub kind: ResponseType,
    /// The `data` object, when the type carries one.
    pub data: Option<Value>,
}

impl InteractionResponse {
    /// `{"type": 1}`.
    pub fn pong() -> Self {
        Self {
            kind: ResponseType::Pong,
            data: None,
        }
    }

    /// Replies with a new message.
    pub fn message(message: impl Into<MessageData>) -> Self {
        Self {
            kind: ResponseType::ChannelMessage,
            data: Some(message.into().to_json()),
        }
    }

    /// Replies with a message only the invoking user can see.
    pub fn ephemeral(message: impl Into<MessageData>) -> Self {
        Self::message(message.into().ephemeral())
    }

    /// Edits the message a component is attached to.
    pub fn update(message: impl Into<MessageData>) -> Self {
        Self {
            kind: ResponseType::UpdateMessage,
            data: Some(message.into().to_json()),
        }
    }

    /// Defers the reply.
    ///
    /// With `thinking` the user sees a loading state and the reply is sent
    /// later as the original response; otherwise a component interaction is
    /// acknowledged without visible change.
    pub fn defer(ephemeral: bool, thinking: bool) -> Self {
        let kind = if thinking {
            ResponseType::DeferredChannelMessage
        } else {
            ResponseType::DeferredUpdateMessage
        };
        let flags = if ephemeral {
            MessageFlags::EPHEMERAL
        } else {
            MessageFlags::empty()
        };
        Self {
            kind,
            data: Some(json!({ "flags": flags.0 })),
        }
    }

    /// Autocomplete suggestions, silently truncated to [`MAX_CHOICES`].
    pub fn autocomplete<I, C>(choices: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Choice>,
    {
        let choices: Vec<Choice> = choices
            .into_iter()
            .take(MAX_CHOICES)
            .map(Into::into)
            .collect();
        Self {
            kind: ResponseType::AutocompleteResult,
            data: Some(json!({ "choices": choices })),
        }
    }

    /// Opens a modal with the given title and rows of text inputs.
    pub fn modal(custom_id: impl Into<String>, title: impl Into<String>, components: Vec<Value>) -> Self {
        Self {
            kind: ResponseType::Modal,
            data: Some(json!({
                "custom_id": custom_id.into(),
                "title": title.into(),
                "components": components,
            })),
        }
    }

    /// Serializes into the wire shape `{"type": n, "data": {...}}`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("type".to_string(), json!(self.kind.as_u8()));
        if let Some(data) = &self.data {
            body.insert("data".to_string(), data.clone());
        }
        Value::Object(body)
    }
}

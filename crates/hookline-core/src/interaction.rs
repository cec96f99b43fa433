//! The inbound interaction envelope.
//!
//! An [`Interaction`] is one decoded webhook delivery. It is built once per
//! request, handed to exactly one handler, and dropped afterwards; work that
//! outlives the request keeps only the follow-up token and ids.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::snowflake::Snowflake;

/// How long the follow-up token of an interaction stays valid.
pub const INTERACTION_LIFETIME_MINUTES: i64 = 15;

/// Kind of inbound interaction, from the top-level `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "u8")]
pub enum InteractionType {
    /// Endpoint health check sent by the remote API.
    Ping,
    /// Slash, user or message command invocation.
    ApplicationCommand,
    /// Button press or select menu choice.
    MessageComponent,
    /// Partial input for an option with autocomplete enabled.
    Autocomplete,
    /// A submitted modal form.
    ModalSubmit,
    /// Anything this library does not know.
    Unknown(u8),
}

impl From<u8> for InteractionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Ping,
            2 => Self::ApplicationCommand,
            3 => Self::MessageComponent,
            4 => Self::Autocomplete,
            5 => Self::ModalSubmit,
            other => Self::Unknown(other),
        }
    }
}

impl InteractionType {
    /// Short name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::ApplicationCommand => "application_command",
            Self::MessageComponent => "message_component",
            Self::Autocomplete => "autocomplete",
            Self::ModalSubmit => "modal_submit",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Kind of application command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "u8")]
pub enum CommandType {
    /// Slash command typed in the chat box.
    #[default]
    ChatInput,
    /// Context-menu command on a user.
    User,
    /// Context-menu command on a message.
    Message,
    /// Unrecognised command type.
    Unknown(u8),
}

impl From<u8> for CommandType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::ChatInput,
            2 => Self::User,
            3 => Self::Message,
            other => Self::Unknown(other),
        }
    }
}

/// Type tag of one entry in a command's options tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "u8")]
pub enum OptionType {
    /// Nested sub-command.
    SubCommand,
    /// Group of sub-commands.
    SubCommandGroup,
    /// Free text.
    String,
    /// 53-bit signed integer.
    Integer,
    /// True or false.
    Boolean,
    /// A user, resolved from `resolved.users` / `resolved.members`.
    User,
    /// A channel, resolved from `resolved.channels`.
    Channel,
    /// A role, resolved from `resolved.roles`.
    Role,
    /// A user or a role.
    Mentionable,
    /// Double-precision float.
    Number,
    /// An uploaded file, resolved from `resolved.attachments`.
    Attachment,
    /// The tag was absent or unrecognised; the raw value is kept.
    #[default]
    Untyped,
}

impl From<u8> for OptionType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            11 => Self::Attachment,
            _ => Self::Untyped,
        }
    }
}

impl OptionType {
    /// Numeric tag used when registering commands.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::SubCommand => 1,
            Self::SubCommandGroup => 2,
            Self::String | Self::Untyped => 3,
            Self::Integer => 4,
            Self::Boolean => 5,
            Self::User => 6,
            Self::Channel => 7,
            Self::Role => 8,
            Self::Mentionable => 9,
            Self::Number => 10,
            Self::Attachment => 11,
        }
    }
}

/// One node of the options tree sent with a command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandOption {
    /// Option (or sub-command) name.
    pub name: String,
    /// Type tag.
    #[serde(rename = "type", default)]
    pub kind: OptionType,
    /// Leaf value; absent on sub-command and group markers.
    #[serde(default)]
    pub value: Option<Value>,
    /// Children of a sub-command or group.
    #[serde(default)]
    pub options: Vec<CommandOption>,
    /// Set on the option the user is typing into during autocomplete.
    #[serde(default)]
    pub focused: bool,
}

impl CommandOption {
    /// Whether this option selects a sub-command or group rather than
    /// carrying an argument: it has a name and no non-null value.
    pub fn is_group_marker(&self) -> bool {
        !self.name.is_empty() && self.value.as_ref().is_none_or(Value::is_null)
    }
}

/// Entities the remote API attached to the interaction, keyed by id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Resolved {
    /// User objects.
    #[serde(default)]
    pub users: HashMap<String, Value>,
    /// Partial member objects (without the nested `user`).
    #[serde(default)]
    pub members: HashMap<String, Value>,
    /// Partial channel objects.
    #[serde(default)]
    pub channels: HashMap<String, Value>,
    /// Role objects.
    #[serde(default)]
    pub roles: HashMap<String, Value>,
    /// Attachment objects.
    #[serde(default)]
    pub attachments: HashMap<String, Value>,
    /// Message objects.
    #[serde(default)]
    pub messages: HashMap<String, Value>,
}

impl Resolved {
    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.members.is_empty()
            && self.channels.is_empty()
            && self.roles.is_empty()
            && self.attachments.is_empty()
            && self.messages.is_empty()
    }

    /// Returns the user with `id`, merged with its member data when the
    /// interaction happened in a guild.
    ///
    /// The merged shape is the member object with the user nested under
    /// `"user"`.
    pub fn user_or_member(&self, id: &str) -> Option<Value> {
        let user = self.users.get(id)?.clone();
        match self.members.get(id) {
            Some(Value::Object(member)) => {
                let mut merged = member.clone();
                merged.insert("user".to_string(), user);
                Some(Value::Object(merged))
            }
            _ => Some(user),
        }
    }
}

/// The `data` object of an interaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionData {
    /// Id of the invoked command.
    #[serde(default)]
    pub id: Option<Snowflake>,
    /// Name of the invoked command.
    #[serde(default)]
    pub name: Option<String>,
    /// Kind of command.
    #[serde(rename = "type", default)]
    pub command_type: CommandType,
    /// Options tree.
    #[serde(default)]
    pub options: Vec<CommandOption>,
    /// Developer-defined id of the component or modal.
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Numeric component type.
    #[serde(default)]
    pub component_type: Option<u8>,
    /// Selected values of a select menu.
    #[serde(default)]
    pub values: Vec<String>,
    /// Submitted modal rows.
    #[serde(default)]
    pub components: Vec<Value>,
    /// Entities referenced by options, values or targets.
    #[serde(default)]
    pub resolved: Resolved,
    /// Target of a context-menu command.
    #[serde(default)]
    pub target_id: Option<Snowflake>,
}

/// One decoded inbound delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct Interaction {
    /// Unique id; also encodes the creation time.
    pub id: Snowflake,
    /// Application the interaction is for.
    #[serde(default)]
    pub application_id: Option<Snowflake>,
    /// Interaction kind.
    #[serde(rename = "type")]
    pub kind: InteractionType,
    /// Command, component or modal payload.
    #[serde(default)]
    pub data: InteractionData,
    /// Opaque follow-up token.
    #[serde(default)]
    pub token: String,
    /// Message the component was attached to.
    #[serde(default)]
    pub message: Option<Value>,
    /// Invoking member (guild interactions).
    #[serde(default)]
    pub member: Option<Value>,
    /// Invoking user (direct-message interactions).
    #[serde(default)]
    pub user: Option<Value>,
    /// Channel the interaction came from.
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    /// Guild the interaction came from.
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// Permissions of the application in the channel, as a decimal string.
    #[serde(default)]
    pub app_permissions: Option<String>,
    /// Selected locale of the invoking user.
    #[serde(default)]
    pub locale: Option<String>,
}

impl Interaction {
    /// Decodes an interaction from raw JSON.
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }

    /// When the interaction was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.id.created_at()
    }

    /// When the follow-up token stops working.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at() + Duration::minutes(INTERACTION_LIFETIME_MINUTES)
    }

    /// Whether the follow-up token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at()
    }

    /// The invoking user object, whether sent as `member.user` or `user`.
    pub fn author(&self) -> Option<&Value> {
        self.member
            .as_ref()
            .and_then(|m| m.get("user"))
            .or(self.user.as_ref())
    }

    /// Id of the invoking user.
    pub fn author_id(&self) -> Option<Snowflake> {
        self.author()
            .and_then(|u| u.get("id"))
            .and_then(|id| serde_json::from_value(id.clone()).ok())
    }

    /// The message this interaction refers to: the component's message or,
    /// for message commands, the first resolved message.
    pub fn target_message(&self) -> Option<&Value> {
        self.message
            .as_ref()
            .or_else(|| self.data.resolved.messages.values().next())
    }

    /// Id of [`target_message`](Self::target_message).
    pub fn message_id(&self) -> Option<Snowflake> {
        self.target_message()
            .and_then(|m| m.get("id"))
            .and_then(|id| serde_json::from_value(id.clone()).ok())
    }

    /// The `custom_id` of a component or modal interaction.
    pub fn custom_id(&self) -> Option<&str> {
        self.data.custom_id.as_deref()
    }

    /// The command name of a command or autocomplete interaction.
    pub fn command_name(&self) -> Option<&str> {
        self.data.name.as_deref()
    }

    /// Application permissions as a bit set (`0` when absent).
    pub fn app_permissions(&self) -> u64 {
        self.app_permissions
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    }

    /// Submitted modal values keyed by text input `custom_id`.
    pub fn modal_values(&self) -> HashMap<String, String> {
        self.data
            .components
            .iter()
            .filter_map(|row| row.get("components")?.as_array()?.first())
            .filter_map(|input| {
                let id = input.get("custom_id")?.as_str()?;
                let value = input.get("value")?.as_str()?;
                Some((id.to_string(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component_payload() -> Value {
        json!({
            "id": "175928847299117063",
            "application_id": "11",
            "type": 3,
            "token": "tok",
            "data": {"custom_id": "confirm", "component_type": 2},
            "message": {"id": "555", "content": "pick one"},
            "member": {"user": {"id": "77", "username": "ann"}, "roles": []},
            "guild_id": "99",
            "channel_id": "88"
        })
    }

    #[test]
    fn test_decode_component_interaction() {
        let body = serde_json::to_vec(&component_payload()).unwrap();
        let interaction = Interaction::from_json(&body).unwrap();

        assert_eq!(interaction.kind, InteractionType::MessageComponent);
        assert_eq!(interaction.custom_id(), Some("confirm"));
        assert_eq!(interaction.message_id(), Some(Snowflake(555)));
        assert_eq!(interaction.author_id(), Some(Snowflake(77)));
        assert_eq!(interaction.guild_id, Some(Snowflake(99)));
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let interaction: Interaction =
            serde_json::from_value(json!({"id": "1", "type": 42})).unwrap();
        assert_eq!(interaction.kind, InteractionType::Unknown(42));
    }

    #[test]
    fn test_expiry_is_fifteen_minutes_after_creation() {
        let body = serde_json::to_vec(&component_payload()).unwrap();
        let interaction = Interaction::from_json(&body).unwrap();
        let lifetime = interaction.expires_at() - interaction.created_at();
        assert_eq!(lifetime.num_minutes(), 15);
        assert!(interaction.is_expired());
    }

    #[test]
    fn test_group_marker_detection() {
        let marker: CommandOption =
            serde_json::from_value(json!({"name": "sub", "options": []})).unwrap();
        let leaf: CommandOption =
            serde_json::from_value(json!({"name": "x", "value": "y"})).unwrap();
        assert!(marker.is_group_marker());
        assert!(!leaf.is_group_marker());
    }

    #[test]
    fn test_resolved_user_merges_member() {
        let resolved: Resolved = serde_json::from_value(json!({
            "users": {"5": {"id": "5", "username": "bo"}},
            "members": {"5": {"nick": "Bo"}}
        }))
        .unwrap();

        let merged = resolved.user_or_member("5").unwrap();
        assert_eq!(merged["nick"], "Bo");
        assert_eq!(merged["user"]["username"], "bo");
    }

    #[test]
    fn test_modal_values() {
        let interaction: Interaction = serde_json::from_value(json!({
            "id": "1",
            "type": 5,
            "data": {
                "custom_id": "form",
                "components": [
                    {"type": 1, "components": [{"type": 4, "custom_id": "name", "value": "Ann"}]},
                    {"type": 1, "components": [{"type": 4, "custom_id": "age", "value": "31"}]}
                ]
            }
        }))
        .unwrap();

        let values = interaction.modal_values();
        assert_eq!(values.get("name").map(String::as_str), Some("Ann"));
        assert_eq!(values.get("age").map(String::as_str), Some("31"));
    }
}

//! Application commands: declaration, registration payloads and invocation.
//!
//! A [`Command`] is a tree. Leaves carry a handler; inner nodes are
//! sub-command groups whose children are selected by the first option of
//! each level.
//!
//! ```rust,ignore
//! let tag = Command::new("tag", "Manage tags")
//!     .subcommand(
//!         Command::new("show", "Show a tag")
//!             .option(OptionSpec::string("name", "Tag name").required().autocomplete(suggest_tags))
//!             .handler(show_tag),
//!     )
//!     .subcommand(Command::new("delete", "Delete a tag").handler(delete_tag))
//!     .cooldown(2, Duration::from_secs(10), BucketType::User);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hookline_core::{
    Choice, CommandOption, CommandType, InteractionError, InteractionResult, OptionType,
};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::arguments::Arguments;
use crate::context::InteractionContext;
use crate::cooldown::{BucketType, Cooldown};
use crate::error::{HandlerError, HandlerResult};
use crate::handler::{
    Ack, AutocompleteHandler, BoxedAutocompleteHandler, BoxedCheck, BoxedCommandHandler, Check,
    CommandHandler,
};

/// The administrator permission bit; it implies every other permission.
pub const ADMINISTRATOR: u64 = 1 << 3;

// ============================================================================
// OptionSpec
// ============================================================================

/// Declaration of one command option.
#[derive(Clone)]
pub struct OptionSpec {
    name: String,
    description: String,
    kind: OptionType,
    required: bool,
    choices: Vec<Choice>,
    min_value: Option<f64>,
    max_value: Option<f64>,
    autocomplete: Option<BoxedAutocompleteHandler>,
}

impl OptionSpec {
    pub fn new(kind: OptionType, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: false,
            choices: Vec::new(),
            min_value: None,
            max_value: None,
            autocomplete: None,
        }
    }

    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::String, name, description)
    }

    pub fn integer(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Integer, name, description)
    }

    pub fn number(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Number, name, description)
    }

    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Boolean, name, description)
    }

    pub fn user(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::User, name, description)
    }

    pub fn channel(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Channel, name, description)
    }

    pub fn role(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Role, name, description)
    }

    pub fn mentionable(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Mentionable, name, description)
    }

    pub fn attachment(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(OptionType::Attachment, name, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn choice(mut self, choice: impl Into<Choice>) -> Self {
        self.choices.push(choice.into());
        self
    }

    pub fn min_value(mut self, min: f64) -> Self {
        self.min_value = Some(min);
        self
    }

    pub fn max_value(mut self, max: f64) -> Self {
        self.max_value = Some(max);
        self
    }

    /// Suggests values while the user types into this option.
    pub fn autocomplete(mut self, handler: impl AutocompleteHandler) -> Self {
        self.autocomplete = Some(Arc::new(handler));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OptionType {
        self.kind
    }

    pub fn autocomplete_handler(&self) -> Option<&BoxedAutocompleteHandler> {
        self.autocomplete.as_ref()
    }

    pub fn to_json(&self) -> Value {
        let mut spec = Map::new();
        spec.insert("type".into(), json!(self.kind.as_u8()));
        spec.insert("name".into(), json!(self.name));
        spec.insert("description".into(), json!(self.description));
        spec.insert("required".into(), json!(self.required));
        if !self.choices.is_empty() {
            spec.insert("choices".into(), json!(self.choices));
        }
        if self.autocomplete.is_some() {
            spec.insert("autocomplete".into(), json!(true));
        }
        if let Some(min) = self.min_value {
            spec.insert("min_value".into(), json!(min));
        }
        if let Some(max) = self.max_value {
            spec.insert("max_value".into(), json!(max));
        }
        Value::Object(spec)
    }
}

// ============================================================================
// Command
// ============================================================================

/// A slash command, sub-command, group or context-menu command.
#[derive(Clone)]
pub struct Command {
    name: String,
    description: String,
    kind: CommandType,
    options: Vec<OptionSpec>,
    children: Vec<Command>,
    handler: Option<BoxedCommandHandler>,
    checks: Vec<(String, BoxedCheck)>,
    cooldown: Option<Arc<Cooldown>>,
    user_permissions: u64,
    bot_permissions: u64,
    default_member_permissions: Option<u64>,
    nsfw: bool,
}

impl Command {
    /// A slash command (or sub-command).
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CommandType::ChatInput,
            options: Vec::new(),
            children: Vec::new(),
            handler: None,
            checks: Vec::new(),
            cooldown: None,
            user_permissions: 0,
            bot_permissions: 0,
            default_member_permissions: None,
            nsfw: false,
        }
    }

    /// A context-menu command on users.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: CommandType::User,
            ..Self::new(name, "")
        }
    }

    /// A context-menu command on messages.
    pub fn message(name: impl Into<String>) -> Self {
        Self {
            kind: CommandType::Message,
            ..Self::new(name, "")
        }
    }

    pub fn option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Adds a sub-command, or a group when `child` has children itself.
    pub fn subcommand(mut self, child: Command) -> Self {
        self.children.push(child);
        self
    }

    pub fn handler(mut self, handler: impl CommandHandler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Adds a check; when it returns `false` the command fails with
    /// `Check {name} failed.`.
    pub fn check(mut self, name: impl Into<String>, check: impl Check) -> Self {
        self.checks.push((name.into(), Arc::new(check)));
        self
    }

    pub fn cooldown(mut self, rate: u32, per: Duration, bucket: BucketType) -> Self {
        self.cooldown = Some(Arc::new(Cooldown::new(rate, per, bucket)));
        self
    }

    /// Permission bits the invoking member must hold.
    pub fn user_permissions(mut self, bits: u64) -> Self {
        self.user_permissions = bits;
        self
    }

    /// Permission bits the application must hold in the channel.
    pub fn bot_permissions(mut self, bits: u64) -> Self {
        self.bot_permissions = bits;
        self
    }

    /// Permissions the remote API requires before showing the command.
    pub fn default_member_permissions(mut self, bits: u64) -> Self {
        self.default_member_permissions = Some(bits);
        self
    }

    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> CommandType {
        self.kind
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&Command> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn option_spec(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Descends through groups to the invoked leaf.
    ///
    /// At every group level the first option must name a child and carry no
    /// value. Returns the leaf and its own options.
    pub fn resolve<'a>(
        &'a self,
        options: &'a [CommandOption],
    ) -> InteractionResult<(&'a Command, &'a [CommandOption])> {
        let mut command = self;
        let mut options = options;
        while command.is_group() {
            let marker = options
                .first()
                .filter(|o| o.is_group_marker())
                .ok_or_else(|| InteractionError::BadRequest("invalid command".to_string()))?;
            command = command
                .child(&marker.name)
                .ok_or(InteractionError::NotFound("command"))?;
            options = &marker.options;
        }
        Ok((command, options))
    }

    /// Runs checks, permission checks and the cooldown, then the handler.
    pub async fn invoke(&self, ctx: InteractionContext, args: Arguments) -> HandlerResult<Ack> {
        let handler = self
            .handler
            .as_ref()
            .ok_or_else(|| HandlerError::other(format!("command {} has no handler", self.name)))?;

        for (name, check) in &self.checks {
            if !check.check(ctx.clone()).await {
                debug!(command = %self.name, check = %name, "Check failed");
                return Err(HandlerError::CheckFailed(format!("Check {name} failed.")));
            }
        }

        if self.user_permissions != 0 {
            let held = member_permissions(ctx.interaction().member.as_ref());
            if held & ADMINISTRATOR == 0 && held & self.user_permissions != self.user_permissions {
                return Err(HandlerError::UserMissingPermissions(
                    self.user_permissions & !held,
                ));
            }
        }

        if self.bot_permissions != 0 {
            let held = ctx.interaction().app_permissions();
            if held & ADMINISTRATOR == 0 && held & self.bot_permissions != self.bot_permissions {
                return Err(HandlerError::BotMissingPermissions(
                    self.bot_permissions & !held,
                ));
            }
        }

        if let Some(cooldown) = &self.cooldown
            && let Some(retry_after) = cooldown.hit(ctx.interaction())
        {
            return Err(HandlerError::OnCooldown { retry_after });
        }

        handler.call(ctx, args).await
    }

    /// The registration payload of this command.
    pub fn to_json(&self) -> Value {
        let mut spec = Map::new();
        spec.insert("name".into(), json!(self.name));
        spec.insert(
            "type".into(),
            json!(match self.kind {
                CommandType::ChatInput => 1,
                CommandType::User => 2,
                CommandType::Message => 3,
                CommandType::Unknown(n) => n,
            }),
        );
        if self.kind == CommandType::ChatInput {
            spec.insert("description".into(), json!(self.description));
            spec.insert("options".into(), Value::Array(self.options_json()));
        }
        spec.insert(
            "default_member_permissions".into(),
            self.default_member_permissions
                .map_or(Value::Null, |bits| json!(bits.to_string())),
        );
        spec.insert("nsfw".into(), json!(self.nsfw));
        Value::Object(spec)
    }

    fn options_json(&self) -> Vec<Value> {
        if self.is_group() {
            self.children.iter().map(Command::child_json).collect()
        } else {
            self.options.iter().map(OptionSpec::to_json).collect()
        }
    }

    fn child_json(&self) -> Value {
        let kind = if self.is_group() {
            OptionType::SubCommandGroup
        } else {
            OptionType::SubCommand
        };
        json!({
            "type": kind.as_u8(),
            "name": self.name,
            "description": self.description,
            "options": self.options_json(),
        })
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("children", &self.children)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

fn member_permissions(member: Option<&Value>) -> u64 {
    member
        .and_then(|m| m.get("permissions"))
        .and_then(Value::as_str)
        .and_then(|p| p.parse().ok())
        .unwrap_or(0)
}

/// Registration payloads for a set of commands.
pub fn commands_json<'a>(commands: impl IntoIterator<Item = &'a Command>) -> Value {
    Value::Array(commands.into_iter().map(Command::to_json).collect())
}

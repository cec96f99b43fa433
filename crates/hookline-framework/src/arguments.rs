//! Command arguments materialised from the options tree.

use std::collections::BTreeMap;

use hookline_core::{CommandOption, InteractionError, InteractionResult, OptionType, Resolved};
use serde_json::{Map, Value};

/// One materialised argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    /// A user object, or a member object with the user nested under `"user"`.
    User(Value),
    Channel(Value),
    Role(Value),
    Attachment(Value),
    /// A user, member or role, whichever the id resolved to.
    Mentionable(Value),
    /// An option of a type the framework does not interpret.
    Raw(Value),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numbers, with integers widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The resolved entity object of a user, channel, role, attachment or
    /// mentionable argument.
    pub fn as_object(&self) -> Option<&Value> {
        match self {
            Self::User(v)
            | Self::Channel(v)
            | Self::Role(v)
            | Self::Attachment(v)
            | Self::Mentionable(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Number(n) => Value::from(*n),
            Self::Boolean(b) => Value::Bool(*b),
            Self::User(v)
            | Self::Channel(v)
            | Self::Role(v)
            | Self::Attachment(v)
            | Self::Mentionable(v)
            | Self::Raw(v) => v.clone(),
        }
    }
}

/// Named arguments of one command invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialises the leaf options of a command.
    ///
    /// Sub-command and group options are walked recursively and their
    /// children merged into the same map. Entity options are looked up in
    /// `resolved`; an id that was not resolved is a malformed delivery.
    pub fn from_options(options: &[CommandOption], resolved: &Resolved) -> InteractionResult<Self> {
        let mut args = Self::new();
        args.collect(options, resolved)?;
        Ok(args)
    }

    fn collect(&mut self, options: &[CommandOption], resolved: &Resolved) -> InteractionResult<()> {
        for option in options {
            match option.kind {
                OptionType::SubCommand | OptionType::SubCommandGroup => {
                    self.collect(&option.options, resolved)?;
                }
                _ if option.is_group_marker() && !option.options.is_empty() => {
                    self.collect(&option.options, resolved)?;
                }
                _ => {
                    if let Some(value) = materialise(option, resolved)? {
                        self.values.insert(option.name.clone(), value);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgValue::as_str)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ArgValue::as_i64)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(ArgValue::as_f64)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(ArgValue::as_bool)
    }

    /// The resolved object of an entity argument.
    pub fn object(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(ArgValue::as_object)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All arguments as one JSON object.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

fn materialise(option: &CommandOption, resolved: &Resolved) -> InteractionResult<Option<ArgValue>> {
    let Some(value) = option.value.as_ref().filter(|v| !v.is_null()) else {
        return Ok(None);
    };

    let arg = match option.kind {
        OptionType::String => ArgValue::String(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
        OptionType::Integer => ArgValue::Integer(
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .ok_or_else(|| invalid(option, "an integer"))?,
        ),
        OptionType::Number => ArgValue::Number(
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .ok_or_else(|| invalid(option, "a number"))?,
        ),
        OptionType::Boolean => ArgValue::Boolean(value.as_bool().ok_or_else(|| invalid(option, "a boolean"))?),
        OptionType::User => ArgValue::User(
            resolved
                .user_or_member(entity_id(option, value)?)
                .ok_or_else(|| unresolved(option))?,
        ),
        OptionType::Channel => ArgValue::Channel(lookup(&resolved.channels, option, value)?),
        OptionType::Role => ArgValue::Role(lookup(&resolved.roles, option, value)?),
        OptionType::Attachment => ArgValue::Attachment(lookup(&resolved.attachments, option, value)?),
        OptionType::Mentionable => {
            let id = entity_id(option, value)?;
            ArgValue::Mentionable(
                resolved
                    .user_or_member(id)
                    .or_else(|| resolved.roles.get(id).cloned())
                    .ok_or_else(|| unresolved(option))?,
            )
        }
        _ => ArgValue::Raw(value.clone()),
    };
    Ok(Some(arg))
}

fn entity_id<'a>(option: &CommandOption, value: &'a Value) -> InteractionResult<&'a str> {
    value.as_str().ok_or_else(|| invalid(option, "a snowflake string"))
}

fn lookup(
    map: &std::collections::HashMap<String, Value>,
    option: &CommandOption,
    value: &Value,
) -> InteractionResult<Value> {
    map.get(entity_id(option, value)?)
        .cloned()
        .ok_or_else(|| unresolved(option))
}

fn invalid(option: &CommandOption, expected: &str) -> InteractionError {
    InteractionError::BadRequest(format!("option {} is not {expected}", option.name))
}

fn unresolved(option: &CommandOption) -> InteractionError {
    InteractionError::BadRequest(format!("option {} was not resolved", option.name))
}

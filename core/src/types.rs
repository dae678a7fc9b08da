//! Schema type definitions for declarative command-line surfaces.
//!
//! A schema is a tree of [`CommandSchema`] values. Each command declares
//! flag-style options, ordered positional arguments (both described by
//! [`OptionSchema`]) and nested subcommands. The types deserialize from the
//! attribute set used by schema files (`name`, `alias`, `type`, `default`,
//! ...) and carry derived lookup tables that
//! [`normalize`](CommandSchema::normalize) fills in.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

use crate::value::{Value, ValueKind, Vars};

/// Free-form metadata attached to commands and options.
///
/// Consumers such as help rendering or struct binding read these; the
/// parser itself ignores them.
pub type Tags = BTreeMap<String, Value>;

/// Reads a tag table, dropping entries whose value is null.
fn deserialize_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tags, D::Error> {
    let raw = BTreeMap::<String, Option<Value>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect())
}

fn tag_str<'a>(tags: &'a Tags, name: &str) -> Option<&'a str> {
    tags.get(name).and_then(Value::as_str)
}

fn tag_bool(tags: &Tags, name: &str) -> Option<bool> {
    tags.get(name).and_then(Value::as_bool)
}

/// Schema for an option or a positional argument.
///
/// The same type describes both; [`is_argument`](Self::is_argument) tells
/// them apart once the owning command has been normalized.
///
/// # Examples
///
/// ```
/// use argspec_core::{OptionSchema, Value};
///
/// let server = OptionSchema::new("server", "string")
///     .with_alias("s")
///     .with_default(Value::from("127.0.0.1:8080"));
/// assert_eq!(server.names().collect::<Vec<_>>(), vec!["server", "s"]);
/// assert!(!server.required);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionSchema {
    /// Primary name, used as the variable name.
    pub name: String,
    /// Alternative names; one-character names are reachable as `-x`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Declared type, optionally with a `/subtype` suffix.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Accumulate repeated assignments into a list.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub list: bool,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Tags::is_empty"
    )]
    pub tags: Tags,

    #[serde(skip)]
    pub(crate) kind: ValueKind,
    #[serde(skip)]
    pub(crate) sub_type: Option<String>,
    #[serde(skip)]
    pub(crate) is_argument: bool,
    #[serde(skip)]
    pub(crate) position: usize,
}

impl OptionSchema {
    /// Creates an option with a name and a declared type.
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias.push(alias.to_string());
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_tag(mut self, name: &str, value: Value) -> Self {
        self.tags.insert(name.to_string(), value);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    /// Name followed by every alias.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.alias.iter().map(String::as_str))
    }

    /// Resolved value kind (valid after normalization).
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Part of the declared type after `/`, e.g. `path` in `string/path`.
    pub fn sub_type(&self) -> Option<&str> {
        self.sub_type.as_deref()
    }

    pub fn is_argument(&self) -> bool {
        self.is_argument
    }

    /// 1-based position for arguments, 0 for options.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Arguments always take a value; options unless they are boolean.
    pub fn expects_value(&self) -> bool {
        self.is_argument || self.kind != ValueKind::Boolean
    }

    /// Scalar default as text, or an empty string for lists, maps and
    /// options without a default.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::{OptionSchema, Value};
    ///
    /// let port = OptionSchema::new("port", "int").with_default(Value::Integer(80));
    /// assert_eq!(port.default_as_text(), "80");
    /// assert_eq!(OptionSchema::new("name", "string").default_as_text(), "");
    /// ```
    pub fn default_as_text(&self) -> String {
        match &self.default {
            Some(value) if !self.list && self.kind != ValueKind::Map => value.to_string(),
            _ => String::new(),
        }
    }

    pub fn tag_str(&self, name: &str) -> Option<&str> {
        tag_str(&self.tags, name)
    }

    pub fn tag_bool(&self, name: &str) -> Option<bool> {
        tag_bool(&self.tags, name)
    }
}

/// Schema for a command or subcommand.
///
/// Lookups by name or alias only work after
/// [`normalize`](Self::normalize) has built the index tables.
///
/// # Examples
///
/// ```
/// use argspec_core::{CommandSchema, OptionSchema};
///
/// let mut schema = CommandSchema::new("app")
///     .with_option(OptionSchema::new("verbose", "bool").with_alias("v"))
///     .with_command(
///         CommandSchema::new("run")
///             .with_alias("r")
///             .with_argument(OptionSchema::new("script", "string").required()),
///     );
/// schema.normalize().unwrap();
///
/// assert_eq!(schema.find_option("v").unwrap().name, "verbose");
/// assert_eq!(schema.find_command("r").unwrap().name, "run");
/// let script = schema.find_command("run").unwrap().find_argument("script").unwrap();
/// assert_eq!(script.position(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Flag-style options (`--name`, `-n`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionSchema>,
    /// Positional arguments, assigned left to right.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<OptionSchema>,
    /// Subcommands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSchema>,
    #[serde(
        default,
        deserialize_with = "deserialize_tags",
        skip_serializing_if = "Tags::is_empty"
    )]
    pub tags: Tags,

    #[serde(skip)]
    pub(crate) option_index: HashMap<String, usize>,
    #[serde(skip)]
    pub(crate) argument_index: HashMap<String, usize>,
    #[serde(skip)]
    pub(crate) command_index: HashMap<String, usize>,
    #[serde(skip)]
    pub(crate) defaults: Vars,
}

impl CommandSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias.push(alias.to_string());
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn with_option(mut self, option: OptionSchema) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_argument(mut self, argument: OptionSchema) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn with_command(mut self, command: CommandSchema) -> Self {
        self.commands.push(command);
        self
    }

    pub fn with_tag(mut self, name: &str, value: Value) -> Self {
        self.tags.insert(name.to_string(), value);
        self
    }

    /// Finds a subcommand by name or alias.
    pub fn find_command(&self, name: &str) -> Option<&CommandSchema> {
        self.command_index.get(name).map(|&i| &self.commands[i])
    }

    /// Finds an option (not an argument) by name or alias.
    pub fn find_option(&self, name: &str) -> Option<&OptionSchema> {
        self.option_index.get(name).map(|&i| &self.options[i])
    }

    /// Finds a positional argument by name or alias.
    pub fn find_argument(&self, name: &str) -> Option<&OptionSchema> {
        self.argument_index.get(name).map(|&i| &self.arguments[i])
    }

    /// Finds an option first, then an argument.
    pub fn find_option_or_argument(&self, name: &str) -> Option<&OptionSchema> {
        self.find_option(name).or_else(|| self.find_argument(name))
    }

    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Default variables computed at normalization.
    ///
    /// Every parsed match of this command starts from its own copy.
    pub fn default_vars(&self) -> &Vars {
        &self.defaults
    }

    pub fn tag_str(&self, name: &str) -> Option<&str> {
        tag_str(&self.tags, name)
    }

    pub fn tag_bool(&self, name: &str) -> Option<bool> {
        tag_bool(&self.tags, name)
    }
}

//! Parse results: the command stack, per-command variables and errors.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::extension::{ExecContext, ExecExtension};
use crate::types::{CommandSchema, OptionSchema};
use crate::value::{CoerceError, Value, ValueKind, Vars, parse_text};

/// Terminal error of a parse.
///
/// Per-token problems are not terminal; they are recorded as [`VarError`]s
/// on the affected [`ParsedCmd`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No token at all, not even the program name.
    #[error("too few tokens")]
    TooFewTokens,
    /// A help flag was claimed for the command at stack index `at`.
    #[error("help requested")]
    HelpRequested { at: usize },
    /// An extension stopped the parse.
    #[error("{0}")]
    Aborted(String),
}

impl ParseError {
    pub fn aborted(message: impl Into<String>) -> Self {
        ParseError::Aborted(message.into())
    }
}

/// Kind of a per-variable parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VarErrorKind {
    /// The token named an option that is not defined.
    Undefined,
    /// An option or argument expected a value and got none.
    MissingValue,
    /// The value could not be converted to the declared type.
    InvalidValue,
}

impl fmt::Display for VarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VarErrorKind::Undefined => "undefined",
            VarErrorKind::MissingValue => "missing value",
            VarErrorKind::InvalidValue => "invalid value",
        })
    }
}

/// A problem with one option or argument.
#[derive(Debug, Clone, Serialize)]
pub struct VarError<'s> {
    pub kind: VarErrorKind,
    /// Name as it appeared in the input (or the definition name).
    pub name: String,
    /// Raw text of the rejected value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Resolved definition, absent for undefined options.
    #[serde(skip)]
    pub definition: Option<&'s OptionSchema>,
}

impl VarError<'_> {
    /// Same failure on the same definition, compared by identity.
    fn same_failure(&self, other: &VarError<'_>) -> bool {
        let same_definition = match (self.definition, other.definition) {
            (Some(a), Some(b)) => std::ptr::eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.kind == other.kind && self.name == other.name && same_definition
    }
}

impl fmt::Display for VarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {} ({value})", self.kind, self.name),
            None => write!(f, "{}: {}", self.kind, self.name),
        }
    }
}

fn serialize_command_name<S: Serializer>(
    command: &&CommandSchema,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&command.name)
}

/// One matched command on the parse stack.
///
/// Owns a private copy of the command's default variables; assignments
/// never leak into other matches or back into the schema.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedCmd<'s> {
    #[serde(serialize_with = "serialize_command_name")]
    pub command: &'s CommandSchema,
    /// Raw positional tokens, including unrecognized extras.
    pub args: Vec<String>,
    /// How many of `args` matched a declared argument.
    pub recognized_args: usize,
    pub vars: Vars,
    pub errors: Vec<VarError<'s>>,
}

impl<'s> ParsedCmd<'s> {
    pub fn new(command: &'s CommandSchema) -> Self {
        Self {
            command,
            args: Vec::new(),
            recognized_args: 0,
            vars: command.default_vars().clone(),
            errors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.command.name
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Records an error unless the identical failure is already recorded.
    pub fn record_error(&mut self, err: VarError<'s>) {
        if self.errors.iter().any(|e| e.same_failure(&err)) {
            return;
        }
        self.errors.push(err);
    }

    pub(crate) fn undefined(&mut self, name: &str) {
        self.record_error(VarError {
            kind: VarErrorKind::Undefined,
            name: name.to_string(),
            value: None,
            definition: None,
        });
    }

    pub(crate) fn missing_value(&mut self, name: &str, definition: &'s OptionSchema) {
        self.record_error(VarError {
            kind: VarErrorKind::MissingValue,
            name: name.to_string(),
            value: None,
            definition: Some(definition),
        });
    }

    fn invalid_value(&mut self, definition: &'s OptionSchema, text: &str) {
        self.record_error(VarError {
            kind: VarErrorKind::InvalidValue,
            name: definition.name.clone(),
            value: Some(text.to_string()),
            definition: Some(definition),
        });
    }

    /// Coerces `text` and stores it under the definition's name.
    ///
    /// Maps merge into the stored map, list options append, everything else
    /// replaces. `negate` flips a boolean after coercion. Returns the value
    /// now stored; on failure the error is recorded and nothing changes.
    pub(crate) fn assign(
        &mut self,
        definition: &'s OptionSchema,
        text: &str,
        negate: bool,
    ) -> Result<Value, CoerceError> {
        let parsed = match parse_text(definition.kind(), text) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.invalid_value(definition, text);
                return Err(err);
            }
        };

        let stored = match parsed {
            Value::Map(entries) => {
                let mut merged = match self.vars.remove(&definition.name) {
                    Some(Value::Map(existing)) => existing,
                    _ => Default::default(),
                };
                merged.extend(entries);
                Value::Map(merged)
            }
            scalar => {
                let scalar = match scalar {
                    Value::Bool(b) if negate && definition.kind() == ValueKind::Boolean => {
                        Value::Bool(!b)
                    }
                    other => other,
                };
                if definition.list {
                    let mut items = match self.vars.remove(&definition.name) {
                        Some(Value::List(items)) => items,
                        _ => Vec::new(),
                    };
                    items.push(scalar);
                    Value::List(items)
                } else {
                    scalar
                }
            }
        };

        self.vars.insert(definition.name.clone(), stored.clone());
        Ok(stored)
    }

    pub(crate) fn verify_required_options(&mut self) {
        let command = self.command;
        for opt in command.options.iter().filter(|o| o.required) {
            if !self.vars.contains_key(&opt.name) {
                self.missing_value(&opt.name, opt);
            }
        }
    }

    /// Fills argument slots that received no token.
    ///
    /// Required ones are reported and get an empty placeholder so indices
    /// stay aligned with the declarations.
    pub(crate) fn backfill_arguments(&mut self) {
        let command = self.command;
        for arg in command.arguments.iter().skip(self.args.len()) {
            if arg.required {
                self.missing_value(&arg.name, arg);
                self.args.push(String::new());
            } else {
                self.args.push(arg.default_as_text());
            }
        }
    }
}

fn serialize_error<S: Serializer>(
    error: &Option<ParseError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Outcome of parsing one token sequence.
///
/// # Examples
///
/// ```
/// use argspec_core::{CommandSchema, OptionSchema, Parser};
///
/// let schema = CommandSchema::new("app")
///     .with_option(OptionSchema::new("name", "string"))
///     .normalized()
///     .unwrap();
///
/// let result = Parser::new(&schema).parse(["app", "--name=demo"]);
/// assert!(!result.has_errors());
/// assert_eq!(result.command().unwrap().var("name").unwrap().as_str(), Some("demo"));
/// ```
#[derive(Serialize)]
pub struct ParseResult<'s> {
    /// First token, the invoking program.
    pub program: String,
    /// Root command first, then each matched subcommand.
    pub stack: Vec<ParsedCmd<'s>>,
    /// Tokens after an unknown subcommand or a `--` terminator.
    pub unparsed: Vec<String>,
    /// A token did not name any subcommand.
    pub missing_command: bool,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ParseError>,

    #[serde(skip)]
    extensions: Vec<Box<dyn ExecExtension + 's>>,
}

impl fmt::Debug for ParseResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseResult")
            .field("program", &self.program)
            .field("stack", &self.stack)
            .field("unparsed", &self.unparsed)
            .field("missing_command", &self.missing_command)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl Default for ParseResult<'_> {
    fn default() -> Self {
        Self {
            program: String::new(),
            stack: Vec::new(),
            unparsed: Vec::new(),
            missing_command: false,
            error: None,
            extensions: Vec::new(),
        }
    }
}

impl<'s> ParseResult<'s> {
    /// Innermost matched command.
    pub fn command(&self) -> Option<&ParsedCmd<'s>> {
        self.stack.last()
    }

    pub fn command_at(&self, at: usize) -> Option<&ParsedCmd<'s>> {
        self.stack.get(at)
    }

    /// Names of the matched commands, root first.
    pub fn command_path(&self) -> Vec<&str> {
        self.stack.iter().map(ParsedCmd::name).collect()
    }

    /// True when any frame has errors, a subcommand was missing, or the
    /// parse ended with a terminal error.
    pub fn has_errors(&self) -> bool {
        self.error.is_some() || self.missing_command || self.stack.iter().any(ParsedCmd::has_errors)
    }

    /// Appends an execution extension.
    pub fn add_extension(&mut self, ext: impl ExecExtension + 's) -> &mut Self {
        self.extensions.push(Box::new(ext));
        self
    }

    /// Appends a closure to the execution chain.
    pub fn on_exec<F>(&mut self, ext: F) -> &mut Self
    where
        F: FnMut(&mut ExecContext<'_, '_>) + 's,
    {
        self.add_extension(ext)
    }

    /// Runs the execution extensions in order until one marks completion.
    ///
    /// # Errors
    ///
    /// Returns the terminal error after the chain ran, which an extension
    /// may have set when completing.
    pub fn exec(&mut self) -> Result<(), ParseError> {
        let mut extensions = std::mem::take(&mut self.extensions);
        {
            let mut ctx = ExecContext::new(self);
            for (i, ext) in extensions.iter_mut().enumerate() {
                if ctx.is_completed() {
                    debug!(skipped = i, "execution completed early");
                    break;
                }
                ext.execute(&mut ctx);
            }
        }
        // keep extensions registered while the chain was running
        extensions.append(&mut self.extensions);
        self.extensions = extensions;
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

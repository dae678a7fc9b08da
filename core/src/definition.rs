//! Loading schemas from YAML and JSON.
//!
//! A document is either a bare command (`name: ...` at the top) or a
//! definition wrapping the root command under `cli:`. Every loader
//! normalizes what it read, so a successfully loaded schema is ready for
//! [`Parser`].
//!
//! # Example YAML
//!
//! ```yaml
//! cli:
//!   name: deploy
//!   options:
//!     - name: server
//!       alias: [s]
//!       default: 127.0.0.1:8080
//!   commands:
//!     - name: up
//!       options:
//!         - { name: detach, alias: [d], type: bool }
//!       arguments:
//!         - { name: service, required: true }
//! ```

use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::normalize::SchemaErrors;
use crate::parser::Parser;
use crate::result::ParseResult;
use crate::types::CommandSchema;

/// Errors that can occur while loading a schema.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but the schema is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaErrors),

    /// A definition without a `cli` root command was asked to parse.
    #[error("definition has no root command")]
    MissingRoot,
}

/// Convenience alias for results with [`DecodeError`].
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Top-level schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cli: Option<CommandSchema>,
}

impl CliDefinition {
    pub fn new(cli: CommandSchema) -> Self {
        Self { cli: Some(cli) }
    }

    /// Normalizes the root command, if present.
    ///
    /// # Errors
    ///
    /// Returns every schema violation found in the tree.
    pub fn normalize(&mut self) -> std::result::Result<(), SchemaErrors> {
        match &mut self.cli {
            Some(cli) => cli.normalize(),
            None => Ok(()),
        }
    }

    pub fn root(&self) -> Option<&CommandSchema> {
        self.cli.as_ref()
    }

    /// Creates a parser for the root command.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingRoot`] when there is no `cli` command.
    pub fn parser(&self) -> Result<Parser<'_>> {
        self.root().map(Parser::new).ok_or(DecodeError::MissingRoot)
    }

    /// Parses `tokens` (program name first) against the root command.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::MissingRoot`] when there is no `cli` command.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::decode_definition_yaml;
    ///
    /// let def = decode_definition_yaml("cli: { name: app, options: [{ name: level, type: int }] }")
    ///     .unwrap();
    /// let result = def.parse_args(["app", "--level=3"]).unwrap();
    /// assert_eq!(result.command().unwrap().var("level").unwrap().as_i64(), Some(3));
    /// ```
    pub fn parse_args<I>(&self, tokens: I) -> Result<ParseResult<'_>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Ok(self.parser()?.parse(tokens))
    }
}

/// Decodes and normalizes a bare command from YAML.
///
/// # Errors
///
/// Returns [`DecodeError::Yaml`] for malformed input and
/// [`DecodeError::Schema`] for an invalid schema.
pub fn decode_command_yaml(text: &str) -> Result<CommandSchema> {
    let mut command: CommandSchema = serde_yaml::from_str(text)?;
    command.normalize()?;
    Ok(command)
}

/// Decodes and normalizes a bare command from JSON.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] for malformed input and
/// [`DecodeError::Schema`] for an invalid schema.
pub fn decode_command_json(text: &str) -> Result<CommandSchema> {
    let mut command: CommandSchema = serde_json::from_str(text)?;
    command.normalize()?;
    Ok(command)
}

/// Decodes and normalizes a `cli:` definition from YAML.
///
/// # Errors
///
/// Returns [`DecodeError::Yaml`] for malformed input and
/// [`DecodeError::Schema`] for an invalid schema.
pub fn decode_definition_yaml(text: &str) -> Result<CliDefinition> {
    let mut definition: CliDefinition = serde_yaml::from_str(text)?;
    definition.normalize()?;
    Ok(definition)
}

/// Decodes and normalizes a `cli:` definition from JSON.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] for malformed input and
/// [`DecodeError::Schema`] for an invalid schema.
pub fn decode_definition_json(text: &str) -> Result<CliDefinition> {
    let mut definition: CliDefinition = serde_json::from_str(text)?;
    definition.normalize()?;
    Ok(definition)
}

/// Loads a `cli:` definition file; `.json` files are read as JSON, anything
/// else as YAML.
///
/// # Errors
///
/// Returns [`DecodeError::Io`] if the file cannot be read, a format error if
/// it does not parse, or [`DecodeError::Schema`] for an invalid schema.
///
/// # Examples
///
/// ```no_run
/// use argspec_core::load_definition;
///
/// let def = load_definition("cli.yml").unwrap();
/// let result = def.parse_args(std::env::args()).unwrap();
/// if result.has_errors() {
///     std::process::exit(2);
/// }
/// ```
pub fn load_definition(path: impl AsRef<Path>) -> Result<CliDefinition> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut definition: CliDefinition = if is_json {
        serde_json::from_reader(reader)?
    } else {
        serde_yaml::from_reader(reader)?
    };
    definition.normalize()?;
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    #[test]
    fn test_decode_bare_command() {
        let cmd = decode_command_yaml(
            r#"
name: app
options:
  - name: port
    alias: [p]
    type: int
    default: 8080
"#,
        )
        .unwrap();
        let port = cmd.find_option("p").unwrap();
        assert_eq!(port.kind(), ValueKind::Integer);
        assert_eq!(cmd.default_vars()["port"].as_i64(), Some(8080));
    }

    #[test]
    fn test_decode_json_definition() {
        let def = decode_definition_json(
            r#"{"cli": {"name": "app", "commands": [{"name": "run", "alias": ["r"]}]}}"#,
        )
        .unwrap();
        assert_eq!(def.root().unwrap().find_command("r").unwrap().name, "run");
    }

    #[test]
    fn test_schema_errors_are_reported() {
        let err = decode_command_yaml(
            r#"
name: app
options:
  - { name: a, alias: [all] }
  - { name: depth, type: float }
"#,
        )
        .unwrap_err();
        match err {
            DecodeError::Schema(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected schema errors, got {other:?}"),
        }
    }

    #[test]
    fn test_definition_without_root() {
        let def = decode_definition_yaml("{}").unwrap();
        assert!(def.root().is_none());
        assert!(matches!(def.parser(), Err(DecodeError::MissingRoot)));
    }
}

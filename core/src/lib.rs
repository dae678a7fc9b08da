//! Declarative command-line argument parsing.
//!
//! This crate turns a schema describing a command-line surface into a
//! token-by-token parser:
//!
//! - [`CommandSchema`] and [`OptionSchema`] describe commands, subcommands,
//!   options and positional arguments (names, aliases, types, defaults).
//! - [`CommandSchema::normalize`] resolves types, builds the lookup tables
//!   and computes default variables, reporting every problem at once as
//!   [`SchemaErrors`].
//! - [`Parser`] consumes tokens and produces a [`ParseResult`]: the stack of
//!   matched commands with their typed variables and collected errors.
//! - Observers registered for an [`Event`] see every state change and can
//!   rewrite values, claim unknown options or abort the parse.
//!   [`HelpFlag`] is one such plugin.
//! - [`load_definition`] and the `decode_*` functions read schemas from YAML
//!   or JSON.
//!
//! # Example
//!
//! ```
//! use argspec_core::*;
//!
//! let schema = decode_command_yaml(
//!     r#"
//! name: cli
//! options:
//!   - { name: server, alias: [s], default: "127.0.0.1:8080" }
//! commands:
//!   - name: up
//!     options:
//!       - { name: flaga, alias: [a], type: bool }
//!     arguments:
//!       - { name: object, required: true }
//! "#,
//! )
//! .unwrap();
//!
//! let result = Parser::new(&schema).parse(["cli", "up", "-a", "a1"]);
//! assert!(!result.has_errors());
//!
//! let root = &result.stack[0];
//! assert_eq!(root.var("server"), Some(&Value::from("127.0.0.1:8080")));
//!
//! let up = result.command().unwrap();
//! assert_eq!(up.var("flaga"), Some(&Value::Bool(true)));
//! assert_eq!(up.var("object"), Some(&Value::from("a1")));
//! ```

mod definition;
mod extension;
mod help;
mod normalize;
mod parser;
mod result;
mod types;
mod value;

pub use definition::{
    CliDefinition, DecodeError, decode_command_json, decode_command_yaml, decode_definition_json,
    decode_definition_yaml, load_definition,
};
pub use extension::{
    Event, ExecContext, ExecExtension, Flow, ParseContext, ParseExtension, Plugin,
};
pub use help::{DEFAULT_ALIASES, DEFAULT_LONG, HelpFlag};
pub use normalize::{DefinitionError, SchemaErrors};
pub use parser::Parser;
pub use result::{ParseError, ParseResult, ParsedCmd, VarError, VarErrorKind};
pub use types::*;
pub use value::{CoerceError, Value, ValueKind, Vars, coerce_default, parse_text, zero_value};

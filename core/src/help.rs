//! Reserved help flag.
//!
//! [`HelpFlag`] recognizes `--help`, `-h` and `-?` (configurable) when no
//! schema option claims those names, and stops the parse with
//! [`ParseError::HelpRequested`]. Rendering the help text is left to the
//! caller, which finds the command to describe at the reported stack index.
//!
//! # Examples
//!
//! ```
//! use argspec_core::{CommandSchema, HelpFlag, ParseError, Parser};
//!
//! let schema = CommandSchema::new("cli")
//!     .with_command(CommandSchema::new("up"))
//!     .normalized()
//!     .unwrap();
//!
//! let result = Parser::new(&schema)
//!     .with(HelpFlag::default())
//!     .parse(["cli", "up", "-h", "ignored"]);
//! assert_eq!(result.error, Some(ParseError::HelpRequested { at: 1 }));
//! assert_eq!(result.unparsed, vec!["ignored"]);
//! ```

use crate::extension::{Event, Flow, Plugin};
use crate::parser::Parser;
use crate::result::ParseError;

pub const DEFAULT_LONG: &str = "help";
pub const DEFAULT_ALIASES: [&str; 2] = ["h", "?"];

/// Plugin turning unresolved help options into [`ParseError::HelpRequested`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpFlag {
    pub long: String,
    pub aliases: Vec<String>,
}

impl Default for HelpFlag {
    fn default() -> Self {
        Self {
            long: DEFAULT_LONG.to_string(),
            aliases: DEFAULT_ALIASES.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl HelpFlag {
    /// Replaces the long name and aliases.
    pub fn option_names(mut self, long: &str, aliases: &[&str]) -> Self {
        self.long = long.to_string();
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        !name.is_empty() && (self.long == name || self.aliases.iter().any(|a| a == name))
    }
}

impl<'s> Plugin<'s> for HelpFlag {
    fn install(self, parser: Parser<'s>) -> Parser<'s> {
        parser.on(Event::OptResolve, move |_, ctx| {
            if !self.matches(&ctx.name) {
                return Flow::Continue;
            }
            ctx.claim();
            let at = ctx.stack().len().saturating_sub(1);
            Flow::Abort(ParseError::HelpRequested { at })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandSchema, OptionSchema};

    fn schema() -> CommandSchema {
        CommandSchema::new("cli")
            .with_option(OptionSchema::new("host", "string").with_alias("h"))
            .with_command(CommandSchema::new("up"))
            .normalized()
            .unwrap()
    }

    #[test]
    fn test_matches() {
        let help = HelpFlag::default();
        assert!(help.matches("help"));
        assert!(help.matches("?"));
        assert!(!help.matches(""));
        assert!(!help.matches("hel"));

        let custom = HelpFlag::default().option_names("usage", &["u"]);
        assert!(custom.matches("u"));
        assert!(!custom.matches("h"));
    }

    #[test]
    fn test_help_on_root() {
        let schema = schema();
        let result = Parser::new(&schema)
            .with(HelpFlag::default())
            .parse(["cli", "--help"]);

        assert_eq!(result.error, Some(ParseError::HelpRequested { at: 0 }));
        assert!(result.stack[0].errors.is_empty());
    }

    #[test]
    fn test_schema_option_wins_over_alias() {
        let schema = schema();
        let result = Parser::new(&schema)
            .with(HelpFlag::default())
            .parse(["cli", "-h", "example.org"]);

        assert_eq!(result.error, None);
        assert_eq!(result.stack[0].var("host").and_then(|v| v.as_str()), Some("example.org"));
    }

    #[test]
    fn test_other_unknown_options_stay_undefined() {
        let schema = schema();
        let result = Parser::new(&schema)
            .with(HelpFlag::default())
            .parse(["cli", "--nope"]);

        assert_eq!(result.error, None);
        assert_eq!(result.stack[0].errors.len(), 1);
        assert_eq!(result.stack[0].errors[0].name, "nope");
    }
}

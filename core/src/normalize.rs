//! Schema normalization.
//!
//! Normalization resolves option types, assigns argument positions, builds
//! the name/alias lookup tables and computes each command's default
//! variables. Every violation found in the tree is collected so that one
//! pass reports all of them.
//!
//! # Examples
//!
//! ```
//! use argspec_core::*;
//!
//! let mut schema = CommandSchema::new("git")
//!     .with_option(OptionSchema::new("verbose", "bool").with_alias("v"));
//! assert!(schema.normalize().is_ok());
//!
//! // Invalid: unknown type and a duplicated name
//! let mut bad = CommandSchema::new("git")
//!     .with_option(OptionSchema::new("depth", "float"))
//!     .with_option(OptionSchema::new("verbose", "bool"))
//!     .with_option(OptionSchema::new("verbose", "bool"));
//! let errors = bad.normalize().unwrap_err();
//! assert_eq!(errors.len(), 2);
//! ```

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::types::{CommandSchema, OptionSchema};
use crate::value::{CoerceError, ValueKind, Vars, coerce_default, zero_value};

/// A single schema definition problem.
///
/// `path` locates the offending item: `root/sub` for commands and
/// `root/sub[option]` for options and arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// Command, option or argument without a name.
    #[error("{path}: name should not be empty")]
    EmptyName { path: String },
    /// Name or alias already used in the same scope.
    #[error("{path}: name/alias duplicated: {name}")]
    DuplicateName { path: String, name: String },
    /// One-character option names are short flags; long names go first.
    #[error("{path}: name should be long name, short name comes in alias: {alias}")]
    ShortNameWithLongAlias { path: String, alias: String },
    /// Unknown type string.
    #[error("{path}: invalid type: {type_name}")]
    InvalidType { path: String, type_name: String },
    /// Declared default cannot be converted to the declared type.
    #[error("{path}: invalid default value: {source}")]
    InvalidDefault { path: String, source: CoerceError },
}

/// Every definition problem found while normalizing a schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("{}", render(.0))]
pub struct SchemaErrors(pub Vec<DefinitionError>);

impl SchemaErrors {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DefinitionError> {
        self.0.iter()
    }
}

fn render(errors: &[DefinitionError]) -> String {
    let mut out = format!("command definition has {} error(s)", errors.len());
    for err in errors {
        out.push_str("\n  ");
        out.push_str(&err.to_string());
    }
    out
}

impl<'a> IntoIterator for &'a SchemaErrors {
    type Item = &'a DefinitionError;
    type IntoIter = std::slice::Iter<'a, DefinitionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl CommandSchema {
    /// Normalizes this command tree in place.
    ///
    /// Invalid items are reported and skipped; valid siblings are still
    /// indexed, so a partially broken tree keeps its usable lookups.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaErrors`] listing every violation in the tree.
    pub fn normalize(&mut self) -> Result<(), SchemaErrors> {
        let mut errors = Vec::new();
        normalize_command(self, "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaErrors(errors))
        }
    }

    /// Normalizes and returns the command, for builder chains.
    ///
    /// # Errors
    ///
    /// Same as [`normalize`](Self::normalize).
    pub fn normalized(mut self) -> Result<Self, SchemaErrors> {
        self.normalize()?;
        Ok(self)
    }
}

fn normalize_command(cmd: &mut CommandSchema, parent: &str, errors: &mut Vec<DefinitionError>) {
    if cmd.name.is_empty() {
        errors.push(DefinitionError::EmptyName {
            path: parent.to_string(),
        });
        return;
    }
    let path = if parent.is_empty() {
        cmd.name.clone()
    } else {
        format!("{parent}/{}", cmd.name)
    };

    let mut option_index = HashMap::new();
    let mut argument_index = HashMap::new();
    let mut command_index = HashMap::new();
    let mut defaults = Vars::new();

    for (i, opt) in cmd.options.iter_mut().enumerate() {
        if let Err(err) = normalize_option(opt, &path) {
            errors.push(err);
            continue;
        }
        if let Err(err) = index_names(&path, opt, i, &mut option_index, &argument_index) {
            errors.push(err);
            continue;
        }
        if let Err(err) = default_var(opt, &path, &mut defaults) {
            errors.push(err);
        }
    }

    for (i, arg) in cmd.arguments.iter_mut().enumerate() {
        if let Err(err) = normalize_argument(arg, &path, i) {
            errors.push(err);
            continue;
        }
        if let Err(err) = index_names(&path, arg, i, &mut argument_index, &option_index) {
            errors.push(err);
            continue;
        }
        if let Err(err) = default_var(arg, &path, &mut defaults) {
            errors.push(err);
        }
    }

    for (i, sub) in cmd.commands.iter_mut().enumerate() {
        let before = errors.len();
        normalize_command(sub, &path, errors);
        if errors.len() > before {
            continue;
        }
        let sub_path = format!("{path}/{}", sub.name);
        for name in std::iter::once(&sub.name).chain(sub.alias.iter()) {
            if name.is_empty() {
                continue;
            }
            if command_index.contains_key(name) {
                errors.push(DefinitionError::DuplicateName {
                    path: sub_path.clone(),
                    name: name.clone(),
                });
                break;
            }
            command_index.insert(name.clone(), i);
        }
    }

    cmd.option_index = option_index;
    cmd.argument_index = argument_index;
    cmd.command_index = command_index;
    cmd.defaults = defaults;
}

fn option_path(path: &str, opt: &OptionSchema) -> String {
    format!("{path}[{}]", opt.name)
}

fn resolve_type(opt: &mut OptionSchema, path: &str) -> Result<(), DefinitionError> {
    let (base, sub_type) = match opt.type_name.find('/') {
        Some(pos) if pos > 0 => (
            &opt.type_name[..pos],
            Some(opt.type_name[pos + 1..].to_string()),
        ),
        _ => (opt.type_name.as_str(), None),
    };
    let kind = ValueKind::from_type_name(base).ok_or_else(|| DefinitionError::InvalidType {
        path: option_path(path, opt),
        type_name: base.to_string(),
    })?;
    opt.kind = kind;
    opt.sub_type = sub_type;
    if kind == ValueKind::Map {
        // maps merge repeated assignments on their own
        opt.list = false;
    }
    Ok(())
}

fn normalize_option(opt: &mut OptionSchema, path: &str) -> Result<(), DefinitionError> {
    if opt.name.is_empty() {
        return Err(DefinitionError::EmptyName {
            path: option_path(path, opt),
        });
    }
    if opt.name.chars().count() == 1 {
        if let Some(alias) = opt.alias.iter().find(|a| a.chars().count() > 1) {
            return Err(DefinitionError::ShortNameWithLongAlias {
                path: option_path(path, opt),
                alias: alias.clone(),
            });
        }
    }
    resolve_type(opt, path)?;
    opt.is_argument = false;
    opt.position = 0;
    Ok(())
}

fn normalize_argument(
    arg: &mut OptionSchema,
    path: &str,
    index: usize,
) -> Result<(), DefinitionError> {
    if arg.name.is_empty() {
        return Err(DefinitionError::EmptyName {
            path: option_path(path, arg),
        });
    }
    resolve_type(arg, path)?;
    arg.is_argument = true;
    // positional arguments never accumulate
    arg.list = false;
    arg.position = index + 1;
    Ok(())
}

/// Registers every name of `opt` in `index`, rejecting names already taken
/// in `index` or in the sibling table `other`.
fn index_names(
    path: &str,
    opt: &OptionSchema,
    at: usize,
    index: &mut HashMap<String, usize>,
    other: &HashMap<String, usize>,
) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    for name in opt.names().filter(|n| !n.is_empty()) {
        if !seen.insert(name) || index.contains_key(name) || other.contains_key(name) {
            return Err(DefinitionError::DuplicateName {
                path: option_path(path, opt),
                name: name.to_string(),
            });
        }
    }
    for name in seen {
        index.insert(name.to_string(), at);
    }
    Ok(())
}

/// Required options get no default so the missing value is detected at
/// end of input.
fn default_var(opt: &OptionSchema, path: &str, vars: &mut Vars) -> Result<(), DefinitionError> {
    if opt.required {
        return Ok(());
    }
    let value = match &opt.default {
        Some(default) => {
            coerce_default(opt.kind, opt.list, default).map_err(|source| {
                DefinitionError::InvalidDefault {
                    path: option_path(path, opt),
                    source,
                }
            })?
        }
        None => zero_value(opt.kind, opt.list),
    };
    vars.insert(opt.name.clone(), value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::value::Value;

    use super::*;

    fn decode(yaml: &str) -> Result<CommandSchema, SchemaErrors> {
        let cmd: CommandSchema = serde_yaml::from_str(yaml).unwrap();
        cmd.normalized()
    }

    #[test]
    fn test_rejects_unknown_type() {
        let errors = decode(
            r#"
name: cmd
options:
  - name: opt
    type: wrong-type
"#,
        )
        .unwrap_err();
        assert_eq!(
            errors.0,
            vec![DefinitionError::InvalidType {
                path: "cmd[opt]".to_string(),
                type_name: "wrong-type".to_string(),
            }]
        );
    }

    #[test]
    fn test_rejects_empty_option_name() {
        let errors = decode("name: cmd\noptions:\n  - type: string\n").unwrap_err();
        assert!(matches!(errors.0[0], DefinitionError::EmptyName { .. }));
    }

    #[test]
    fn test_rejects_short_name_with_long_alias() {
        let errors = decode(
            r#"
name: cmd
options:
  - name: a
    alias: [a1]
    type: string
"#,
        )
        .unwrap_err();
        assert_eq!(
            errors.0,
            vec![DefinitionError::ShortNameWithLongAlias {
                path: "cmd[a]".to_string(),
                alias: "a1".to_string(),
            }]
        );
    }

    #[test]
    fn test_rejects_duplicates_in_every_scope() {
        let cases = [
            "name: cmd\noptions:\n  - {name: a}\n  - {name: a}\n",
            "name: cmd\narguments:\n  - {name: a}\n  - {name: a}\n",
            "name: cmd\noptions:\n  - {name: a}\narguments:\n  - {name: a}\n",
            "name: cmd\noptions:\n  - {name: all, alias: [all]}\n",
            "name: cmd\ncommands:\n  - {name: sub}\n  - {name: sub}\n",
            "name: cmd\ncommands:\n  - {name: sub}\n  - {name: other, alias: [sub]}\n",
        ];
        for yaml in cases {
            let errors = decode(yaml).unwrap_err();
            assert!(
                matches!(errors.0[0], DefinitionError::DuplicateName { .. }),
                "{yaml}"
            );
        }
    }

    #[test]
    fn test_rejects_unnamed_subcommand() {
        let errors = decode("name: cmd\ncommands:\n  - description: something\n").unwrap_err();
        assert_eq!(
            errors.0,
            vec![DefinitionError::EmptyName {
                path: "cmd".to_string()
            }]
        );
    }

    #[test]
    fn test_aggregates_all_errors_across_tree() {
        let errors = decode(
            r#"
name: cmd
options:
  - name: bad
    type: nope
commands:
  - name: sub
    options:
      - name: n
        type: integer
        default: not-a-number
  - name: other
    arguments:
      - type: string
"#,
        )
        .unwrap_err();
        assert_eq!(errors.len(), 3);
        let text = errors.to_string();
        assert!(text.contains("cmd[bad]"));
        assert!(text.contains("cmd/sub[n]"));
        assert!(text.contains("cmd/other[]"));
    }

    #[test]
    fn test_schema_errors_render_one_line_per_error() {
        let errors = SchemaErrors(vec![
            DefinitionError::EmptyName {
                path: "cmd".to_string(),
            },
            DefinitionError::InvalidType {
                path: "cmd[opt]".to_string(),
                type_name: "float".to_string(),
            },
        ]);
        assert_eq!(
            errors.to_string(),
            "command definition has 2 error(s)\n  cmd: name should not be empty\n  cmd[opt]: invalid type: float"
        );
        let boxed: Box<dyn std::error::Error> = Box::new(errors);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_resolves_types_and_positions() {
        let cmd = decode(
            r#"
name: cmd
options:
  - name: path
    type: string/file
  - name: kv
    type: dict
    list: true
arguments:
  - name: first
    type: int
  - name: rest
    type: string
    list: true
"#,
        )
        .unwrap();

        let path = cmd.find_option("path").unwrap();
        assert_eq!(path.kind(), ValueKind::String);
        assert_eq!(path.sub_type(), Some("file"));
        assert_eq!(path.type_name, "string/file");

        let kv = cmd.find_option("kv").unwrap();
        assert_eq!(kv.kind(), ValueKind::Map);
        assert!(!kv.list);

        let rest = cmd.find_argument("rest").unwrap();
        assert!(rest.is_argument());
        assert!(!rest.list);
        assert_eq!(rest.position(), 2);
        assert!(cmd.find_option("rest").is_none());
    }

    #[test]
    fn test_default_vars() {
        let cmd = decode(
            r#"
name: cmd
options:
  - {name: str, type: string}
  - {name: flag, type: bool}
  - {name: int, type: integer}
  - {name: num, type: number}
  - {name: dict, type: map}
  - {name: items, type: integer, list: true}
  - {name: adds, type: number, list: true, default: 3.14}
  - {name: server, type: string, default: "127.0.0.1:8080"}
  - {name: must, type: string, required: true, default: ignored}
arguments:
  - {name: slice, type: string, list: true}
"#,
        )
        .unwrap();

        let vars = cmd.default_vars();
        assert_eq!(vars["str"], Value::from(""));
        assert_eq!(vars["flag"], Value::Bool(false));
        assert_eq!(vars["int"], Value::Integer(0));
        assert_eq!(vars["num"], Value::Number(0.0));
        assert_eq!(vars["dict"], Value::Map(Default::default()));
        assert_eq!(vars["items"], Value::List(Vec::new()));
        assert_eq!(vars["adds"], Value::List(vec![Value::Number(3.14)]));
        assert_eq!(vars["server"], Value::from("127.0.0.1:8080"));
        assert_eq!(vars["slice"], Value::from(""));
        assert!(!vars.contains_key("must"));
    }
}

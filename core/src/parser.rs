//! Token-driven parser state machine.
//!
//! The first token names the invoking program and matches the root command.
//! Each following token is classified as a terminator (`--`), a long option
//! (`--name[=value]`), a short option cluster (`-abc`, `-fVALUE`), a
//! subcommand name or a positional argument. Problems with single tokens are
//! recorded on the affected [`ParsedCmd`] and parsing carries on, so one run
//! reports every problem at once.
//!
//! # Examples
//!
//! ```
//! use argspec_core::{CommandSchema, OptionSchema, Parser, Value};
//!
//! let schema = CommandSchema::new("cli")
//!     .with_command(
//!         CommandSchema::new("up")
//!             .with_option(OptionSchema::new("detach", "bool").with_alias("d"))
//!             .with_argument(OptionSchema::new("object", "string").required()),
//!     )
//!     .normalized()
//!     .unwrap();
//!
//! let result = Parser::new(&schema).parse(["cli", "up", "-d", "db"]);
//! assert_eq!(result.command_path(), vec!["cli", "up"]);
//!
//! let up = result.command().unwrap();
//! assert_eq!(up.var("detach"), Some(&Value::Bool(true)));
//! assert_eq!(up.args, vec!["db"]);
//! ```

use tracing::{debug, trace};

use crate::extension::{
    Dispatcher, Event, EventData, ExecContext, ExecExtension, Flow, ParseContext, ParseExtension,
    Plugin,
};
use crate::result::{ParseError, ParseResult, ParsedCmd};
use crate::types::{CommandSchema, OptionSchema};
use crate::value::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing consumed; the next token is the program name.
    Pre,
    /// Ready for options, subcommands and arguments.
    Command,
    /// A short option waits for its value in the next token.
    Value,
    /// After `--`; everything is positional.
    End,
    /// After an unknown subcommand; tokens are collected as unparsed.
    Error,
    /// Draining after an abort or a `--` seen in `Error`.
    ErrorEnd,
}

/// Option waiting for a value token.
struct Pending<'s> {
    option: &'s OptionSchema,
    name: String,
    at: usize,
}

/// Parser for one token sequence against a normalized schema.
///
/// Extensions are registered with the consuming builder methods before the
/// first token. A parser is used once: [`parse`](Self::parse) or
/// [`finish`](Self::finish) hands out the [`ParseResult`].
pub struct Parser<'s> {
    root: &'s CommandSchema,
    state: State,
    result: ParseResult<'s>,
    pending: Option<Pending<'s>>,
    dispatcher: Dispatcher<'s>,
}

impl<'s> Parser<'s> {
    /// Creates a parser rooted at `root`, which must be normalized.
    pub fn new(root: &'s CommandSchema) -> Self {
        Self {
            root,
            state: State::Pre,
            result: ParseResult::default(),
            pending: None,
            dispatcher: Dispatcher::default(),
        }
    }

    /// Registers a closure observer for `event`.
    pub fn on<F>(mut self, event: Event, observer: F) -> Self
    where
        F: FnMut(Event, &mut ParseContext<'_, '_>) -> Flow + 's,
    {
        self.dispatcher.add(event, Box::new(observer));
        self
    }

    /// Registers an observer for `event`.
    pub fn extend(mut self, event: Event, ext: impl ParseExtension + 's) -> Self {
        self.dispatcher.add(event, Box::new(ext));
        self
    }

    /// Appends a closure to the execution chain of the result.
    pub fn on_exec<F>(mut self, ext: F) -> Self
    where
        F: FnMut(&mut ExecContext<'_, '_>) + 's,
    {
        self.result.add_extension(ext);
        self
    }

    /// Appends an extension to the execution chain of the result.
    pub fn extend_exec(mut self, ext: impl ExecExtension + 's) -> Self {
        self.result.add_extension(ext);
        self
    }

    /// Installs a plugin.
    pub fn with(self, plugin: impl Plugin<'s>) -> Self {
        plugin.install(self)
    }

    /// Root command of the schema being parsed.
    pub fn root(&self) -> &'s CommandSchema {
        self.root
    }

    /// Result accumulated so far.
    pub fn result(&self) -> &ParseResult<'s> {
        &self.result
    }

    /// Parses every token, the program name first, and finishes.
    pub fn parse<I>(mut self, tokens: I) -> ParseResult<'s>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for token in tokens {
            self.consume(token.as_ref());
        }
        self.finish()
    }

    /// Feeds a single token.
    pub fn consume(&mut self, token: &str) {
        trace!(token, state = ?self.state, "consume token");
        match self.state {
            State::Pre => {
                self.result.program = token.to_string();
                self.state = State::Command;
                self.push_command(self.root);
            }
            State::Command => self.consume_command_token(token),
            State::Value => {
                self.state = State::Command;
                if let Some(pending) = self.pending.take() {
                    self.assign(pending.at, pending.option, token.to_string(), false);
                }
            }
            State::End => {
                self.push_arg(token);
                self.result.unparsed.push(token.to_string());
            }
            State::Error if token == "--" => self.state = State::ErrorEnd,
            State::Error | State::ErrorEnd => self.result.unparsed.push(token.to_string()),
        }
    }

    /// Runs the end-of-input checks and returns the result.
    pub fn finish(mut self) -> ParseResult<'s> {
        match self.state {
            State::Pre => {
                debug!("no tokens to parse");
                self.result.error = Some(ParseError::TooFewTokens);
                return self.result;
            }
            State::Value => {
                if let Some(pending) = self.pending.take() {
                    if let Some(pcmd) = self.result.stack.get_mut(pending.at) {
                        pcmd.missing_value(&pending.name, pending.option);
                    }
                }
            }
            _ => {}
        }

        for pcmd in &mut self.result.stack {
            pcmd.verify_required_options();
        }
        if matches!(self.state, State::Command | State::End) {
            if let Some(pcmd) = self.result.stack.last_mut() {
                pcmd.backfill_arguments();
            }
        }

        debug!(
            commands = ?self.result.command_path(),
            unparsed = self.result.unparsed.len(),
            missing_command = self.result.missing_command,
            has_errors = self.result.has_errors(),
            "parse finished"
        );
        self.result
    }

    fn consume_command_token(&mut self, token: &str) {
        if token == "--" {
            self.state = State::End;
        } else if let Some(body) = token.strip_prefix("--") {
            self.long_option(token, body);
        } else if let Some(cluster) = token.strip_prefix('-') {
            self.short_options(cluster);
        } else {
            self.command_or_argument(token);
        }
    }

    fn long_option(&mut self, token: &str, body: &str) {
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        if name.is_empty() {
            if let Some(pcmd) = self.result.stack.last_mut() {
                pcmd.undefined(token);
            }
            return;
        }

        let resolved = match self.find_option(name) {
            Some((option, at)) => Some((option, at, name, false)),
            None => name.strip_prefix("no-").and_then(|positive| {
                self.find_option(positive)
                    .filter(|(option, _)| option.kind() == ValueKind::Boolean)
                    .map(|(option, at)| (option, at, positive, true))
            }),
        };
        let Some((option, at, name, negate)) = resolved else {
            self.resolve_unknown(name, inline);
            return;
        };

        match inline {
            Some(value) => self.assign(at, option, value.to_string(), negate),
            None if option.kind() == ValueKind::Boolean => {
                self.assign(at, option, "true".to_string(), negate)
            }
            // long options never take the next token as their value
            None => {
                if let Some(pcmd) = self.result.stack.get_mut(at) {
                    pcmd.missing_value(name, option);
                }
            }
        }
    }

    fn short_options(&mut self, cluster: &str) {
        for (i, c) in cluster.char_indices() {
            if self.result.error.is_some() {
                break;
            }
            let end = i + c.len_utf8();
            let name = &cluster[i..end];
            let rest = &cluster[end..];
            let inline = (!rest.is_empty()).then_some(rest);

            let Some((option, at)) = self.find_option(name) else {
                self.resolve_unknown(name, inline);
                continue;
            };
            if option.kind() == ValueKind::Boolean {
                self.assign(at, option, "true".to_string(), false);
                continue;
            }
            match inline {
                Some(value) => self.assign(at, option, value.to_string(), false),
                None => {
                    self.pending = Some(Pending {
                        option,
                        name: name.to_string(),
                        at,
                    });
                    self.state = State::Value;
                }
            }
            break;
        }
    }

    fn command_or_argument(&mut self, token: &str) {
        let Some(command) = self.current_command() else {
            return;
        };
        if !command.has_commands() {
            self.push_arg(token);
            return;
        }
        match command.find_command(token) {
            Some(sub) => self.push_command(sub),
            None => {
                debug!(token, parent = %command.name, "no such command");
                self.result.missing_command = true;
                self.result.unparsed = vec![token.to_string()];
                self.state = State::Error;
            }
        }
    }

    fn current_command(&self) -> Option<&'s CommandSchema> {
        self.result.stack.last().map(|pcmd| pcmd.command)
    }

    /// Looks `name` up along the stack, innermost command first.
    fn find_option(&self, name: &str) -> Option<(&'s OptionSchema, usize)> {
        self.result
            .stack
            .iter()
            .enumerate()
            .rev()
            .find_map(|(at, pcmd)| {
                let command: &'s CommandSchema = pcmd.command;
                command.find_option(name).map(|option| (option, at))
            })
    }

    fn push_command(&mut self, command: &'s CommandSchema) {
        self.result.stack.push(ParsedCmd::new(command));
        let at = self.result.stack.len() - 1;
        debug!(command = %command.name, at, "command matched");

        let start = EventData {
            option_at: Some(at),
            ..Default::default()
        };
        if self.fire(Event::CmdStart, start).is_none() {
            return;
        }
        for (name, value) in command.default_vars() {
            let data = EventData {
                option_at: Some(at),
                option: command.find_option_or_argument(name),
                name: name.clone(),
                assigned: Some(value.clone()),
                ..Default::default()
            };
            if self.fire(Event::VarAssigned, data).is_none() {
                return;
            }
        }
    }

    fn push_arg(&mut self, token: &str) {
        let Some(at) = self.result.stack.len().checked_sub(1) else {
            return;
        };
        let pcmd = &mut self.result.stack[at];
        let command: &'s CommandSchema = pcmd.command;
        pcmd.args.push(token.to_string());
        let definition = command.arguments.get(pcmd.args.len() - 1);
        if definition.is_some() {
            pcmd.recognized_args += 1;
        }
        if let Some(definition) = definition {
            self.assign(at, definition, token.to_string(), false);
        }
    }

    fn resolve_unknown(&mut self, name: &str, value: Option<&str>) {
        let data = EventData {
            name: name.to_string(),
            value: value.map(str::to_string),
            ..Default::default()
        };
        let Some(data) = self.fire(Event::OptResolve, data) else {
            return;
        };
        if data.claimed {
            trace!(name, "unknown option claimed");
        } else if let Some(pcmd) = self.result.stack.last_mut() {
            pcmd.undefined(name);
        }
    }

    fn assign(&mut self, at: usize, option: &'s OptionSchema, text: String, negate: bool) {
        let data = EventData {
            option_at: Some(at),
            option: Some(option),
            name: option.name.clone(),
            value: Some(text),
            negate,
            ..Default::default()
        };
        let Some(mut data) = self.fire(Event::OptAssign, data) else {
            return;
        };
        let Some(text) = data.value.as_deref() else {
            trace!(name = %option.name, "assignment skipped");
            return;
        };
        let Some(pcmd) = self.result.stack.get_mut(at) else {
            return;
        };
        match pcmd.assign(option, text, data.negate) {
            Ok(stored) => {
                data.assigned = Some(stored);
                self.fire(Event::VarAssigned, data);
            }
            Err(err) => debug!(name = %option.name, %err, "invalid value"),
        }
    }

    /// Dispatches `event`; `None` when an observer aborted the parse.
    fn fire(&mut self, event: Event, data: EventData<'s>) -> Option<EventData<'s>> {
        trace!(%event, name = %data.name, "fire");
        let mut ctx = ParseContext::new(&mut self.result.stack, data);
        let aborted = self.dispatcher.dispatch(event, &mut ctx);
        let data = ctx.into_data();
        match aborted {
            Some(err) => {
                self.abort(err);
                None
            }
            None => Some(data),
        }
    }

    fn abort(&mut self, err: ParseError) {
        debug!(%err, "parse aborted");
        self.result.error = Some(err);
        self.pending = None;
        self.state = State::ErrorEnd;
    }
}

//! Parse and execution extensions.
//!
//! The parser reports every meaningful state change as an [`Event`] to the
//! observers registered for it. Observers run in registration order and
//! steer the dispatch with the [`Flow`] they return:
//!
//! - [`Flow::Continue`] lets the next observer run.
//! - [`Flow::Stop`] skips the remaining observers of this event only.
//! - [`Flow::Abort`] skips the remaining observers, records the error as the
//!   terminal error and stops interpreting tokens.
//!
//! After parsing, [`ExecExtension`]s registered on the
//! [`ParseResult`](crate::ParseResult) form an execution chain that ends as
//! soon as one of them marks the execution complete.
//!
//! # Examples
//!
//! ```
//! use argspec_core::{CommandSchema, Event, Flow, Parser};
//!
//! let schema = CommandSchema::new("app").normalized().unwrap();
//!
//! // Claim every unknown option instead of reporting it
//! let result = Parser::new(&schema)
//!     .on(Event::OptResolve, |_, ctx| {
//!         ctx.claim();
//!         Flow::Continue
//!     })
//!     .parse(["app", "--anything"]);
//! assert!(!result.has_errors());
//! ```

use std::fmt;

use tracing::trace;

use crate::parser::Parser;
use crate::result::{ParseError, ParseResult, ParsedCmd};
use crate::types::OptionSchema;
use crate::value::Value;

/// Points in the parse at which observers are invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// A command was pushed and its defaults materialized. Fired before the
    /// defaults are announced one by one.
    CmdStart,
    /// A variable received a value, from a default or from the input.
    VarAssigned,
    /// A resolved option is about to be coerced and stored. Observers may
    /// rewrite [`ParseContext::value`] or set it to `None` to skip it.
    OptAssign,
    /// An option name did not resolve. Observers may
    /// [`claim`](ParseContext::claim) it to suppress the undefined error.
    OptResolve,
}

impl Event {
    pub fn as_str(self) -> &'static str {
        match self {
            Event::CmdStart => "cmd.start",
            Event::VarAssigned => "var.assigned",
            Event::OptAssign => "opt.assign",
            Event::OptResolve => "opt.resolve",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an observer wants the dispatch to do next.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Continue,
    Stop,
    Abort(ParseError),
}

/// Event payload without the stack borrow.
#[derive(Debug, Default)]
pub(crate) struct EventData<'s> {
    pub option_at: Option<usize>,
    pub option: Option<&'s OptionSchema>,
    pub name: String,
    pub value: Option<String>,
    pub negate: bool,
    pub assigned: Option<Value>,
    pub claimed: bool,
}

/// Mutable view handed to parse observers.
///
/// The public fields describe the event; which ones are set depends on the
/// event (see [`Event`]).
pub struct ParseContext<'p, 's> {
    stack: &'p mut [ParsedCmd<'s>],
    /// Stack index of the command owning the option.
    pub option_at: Option<usize>,
    /// Resolved definition, if any.
    pub option: Option<&'s OptionSchema>,
    /// Option or variable name involved.
    pub name: String,
    /// Pending raw value; `None` skips the assignment on `opt.assign`.
    pub value: Option<String>,
    /// The value came from a `--no-` prefixed boolean.
    pub negate: bool,
    /// Value actually stored, for `var.assigned`.
    pub assigned: Option<Value>,
    claimed: bool,
}

impl<'p, 's> ParseContext<'p, 's> {
    pub(crate) fn new(stack: &'p mut [ParsedCmd<'s>], data: EventData<'s>) -> Self {
        Self {
            stack,
            option_at: data.option_at,
            option: data.option,
            name: data.name,
            value: data.value,
            negate: data.negate,
            assigned: data.assigned,
            claimed: data.claimed,
        }
    }

    pub(crate) fn into_data(self) -> EventData<'s> {
        EventData {
            option_at: self.option_at,
            option: self.option,
            name: self.name,
            value: self.value,
            negate: self.negate,
            assigned: self.assigned,
            claimed: self.claimed,
        }
    }

    /// Commands matched so far, root first.
    pub fn stack(&self) -> &[ParsedCmd<'s>] {
        self.stack
    }

    /// Innermost command.
    pub fn current(&self) -> Option<&ParsedCmd<'s>> {
        self.stack.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut ParsedCmd<'s>> {
        self.stack.last_mut()
    }

    pub fn command_at(&self, at: usize) -> Option<&ParsedCmd<'s>> {
        self.stack.get(at)
    }

    pub fn command_at_mut(&mut self, at: usize) -> Option<&mut ParsedCmd<'s>> {
        self.stack.get_mut(at)
    }

    /// Writes a variable into the stack frame at `at`; out of range is a
    /// no-op.
    pub fn set_var_at(&mut self, at: usize, name: &str, value: Value) -> &mut Self {
        if let Some(pcmd) = self.stack.get_mut(at) {
            pcmd.set_var(name, value);
        }
        self
    }

    /// Writes a variable into the innermost command.
    pub fn set_var(&mut self, name: &str, value: Value) -> &mut Self {
        if let Some(pcmd) = self.stack.last_mut() {
            pcmd.set_var(name, value);
        }
        self
    }

    /// Takes responsibility for an unresolved option (`opt.resolve`).
    pub fn claim(&mut self) {
        self.claimed = true;
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed
    }
}

/// Observer of parse events.
///
/// Implemented for closures taking `(Event, &mut ParseContext)`.
pub trait ParseExtension {
    fn handle(&mut self, event: Event, ctx: &mut ParseContext<'_, '_>) -> Flow;
}

impl<F> ParseExtension for F
where
    F: FnMut(Event, &mut ParseContext<'_, '_>) -> Flow,
{
    fn handle(&mut self, event: Event, ctx: &mut ParseContext<'_, '_>) -> Flow {
        self(event, ctx)
    }
}

/// Ordered observer list with short-circuit.
#[derive(Default)]
pub(crate) struct Dispatcher<'s> {
    observers: Vec<(Event, Box<dyn ParseExtension + 's>)>,
}

impl<'s> Dispatcher<'s> {
    pub fn add(&mut self, event: Event, ext: Box<dyn ParseExtension + 's>) {
        self.observers.push((event, ext));
    }

    /// Runs the observers of `event`; returns the abort error, if any.
    pub fn dispatch(&mut self, event: Event, ctx: &mut ParseContext<'_, '_>) -> Option<ParseError> {
        for (_, observer) in self.observers.iter_mut().filter(|(e, _)| *e == event) {
            match observer.handle(event, ctx) {
                Flow::Continue => {}
                Flow::Stop => {
                    trace!(%event, name = %ctx.name, "dispatch stopped");
                    break;
                }
                Flow::Abort(err) => {
                    trace!(%event, name = %ctx.name, %err, "dispatch aborted");
                    return Some(err);
                }
            }
        }
        None
    }
}

/// Context for the execution chain.
pub struct ExecContext<'r, 's> {
    result: &'r mut ParseResult<'s>,
    completed: bool,
}

impl<'r, 's> ExecContext<'r, 's> {
    pub(crate) fn new(result: &'r mut ParseResult<'s>) -> Self {
        Self {
            result,
            completed: false,
        }
    }

    pub fn result(&self) -> &ParseResult<'s> {
        self.result
    }

    pub fn result_mut(&mut self) -> &mut ParseResult<'s> {
        self.result
    }

    /// Innermost matched command.
    pub fn command(&self) -> Option<&ParsedCmd<'s>> {
        self.result.command()
    }

    pub fn command_at(&self, at: usize) -> Option<&ParsedCmd<'s>> {
        self.result.command_at(at)
    }

    pub fn has_errors(&self) -> bool {
        self.result.has_errors()
    }

    /// Ends the chain; `Some(err)` replaces the terminal error.
    pub fn done(&mut self, err: Option<ParseError>) {
        if err.is_some() {
            self.result.error = err;
        }
        self.completed = true;
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// A step of the execution chain.
///
/// Implemented for closures taking `&mut ExecContext`.
pub trait ExecExtension {
    fn execute(&mut self, ctx: &mut ExecContext<'_, '_>);
}

impl<F> ExecExtension for F
where
    F: FnMut(&mut ExecContext<'_, '_>),
{
    fn execute(&mut self, ctx: &mut ExecContext<'_, '_>) {
        self(ctx)
    }
}

/// A bundle of extensions installed on a parser in one step.
pub trait Plugin<'s> {
    fn install(self, parser: Parser<'s>) -> Parser<'s>;
}

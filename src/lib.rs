//! Interpreter core for an 8-bit home-computer BASIC dialect.
//!
//! This crate owns everything the specification treats as "the core":
//! the value model and 64 KiB address space ([`memory`], [`value`]),
//! the program store ([`program`]), the lexer ([`lexer`], [`token`]),
//! the expression evaluator ([`expr`]), the statement parser
//! ([`statements`]), and the [`interpreter`] that ties them together
//! behind a run loop. Pixel rendering, audio, and the command-line
//! driver are out of scope here; see the `dialect-cli` workspace
//! member for the host boundary this crate exposes.

pub mod constants;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod lexer;
pub mod memory;
pub mod program;
pub mod statements;
pub mod token;
pub mod value;
pub mod variables;

pub use error::{ErrorKind, RuntimeError};
pub use interpreter::{InputSource, Interpreter, QueueInput, RunOutcome};

//! Error machinery (spec §4.H, §7).
//!
//! `ErrorKind` is the closed set of failures the interpreter core can
//! raise. A [`RuntimeError`] pairs a kind with the line number it was
//! raised on, which is what `ONERR`/`RESUME` and the uncaught-error
//! diagnostic both need.

use thiserror::Error;

/// The closed set of error kinds the core raises (spec §7).
#[derive(Error, Clone, Copy, Debug, PartialEq)]
pub enum ErrorKind {
    #[error("SYNTAX ERROR")]
    Syntax,
    #[error("TYPE MISMATCH")]
    TypeMismatch,
    #[error("UNDEF'D STATEMENT ERROR")]
    UndefinedStatement,
    #[error("UNDEF'D FUNCTION ERROR")]
    UndefinedFunction,
    #[error("RETURN WITHOUT GOSUB ERROR")]
    ReturnWithoutGosub,
    #[error("NEXT WITHOUT FOR ERROR")]
    NextWithoutFor,
    #[error("OUT OF DATA ERROR")]
    OutOfData,
    #[error("BAD SUBSCRIPT ERROR")]
    BadSubscript,
    #[error("REDIM'D ARRAY ERROR")]
    RedimensionedArray,
    #[error("DIVISION BY ZERO ERROR")]
    DivisionByZero,
    #[error("ILLEGAL QUANTITY ERROR")]
    IllegalQuantity,
    #[error("INPUT TIMEOUT")]
    InputTimeout,
    #[error("CAN'T CONTINUE ERROR")]
    CantContinue,
    #[error("CAN'T RESUME ERROR")]
    CantResume,
    #[error("STACK OVERFLOW ERROR")]
    StackOverflow,
}

impl ErrorKind {
    /// Numeric code latched into memory address 222 on an `ONERR` trap.
    ///
    /// Assigned in declaration order; the dialect does not publish a
    /// canonical table, so this core defines its own and keeps it
    /// stable for the lifetime of a process.
    pub fn code(&self) -> u8 {
        use ErrorKind::*;
        match self {
            Syntax => 0,
            TypeMismatch => 1,
            UndefinedStatement => 2,
            UndefinedFunction => 3,
            ReturnWithoutGosub => 4,
            NextWithoutFor => 5,
            OutOfData => 6,
            BadSubscript => 7,
            RedimensionedArray => 8,
            DivisionByZero => 9,
            IllegalQuantity => 10,
            InputTimeout => 11,
            CantContinue => 12,
            CantResume => 13,
            StackOverflow => 14,
        }
    }
}

/// An [`ErrorKind`] raised while executing a particular program line.
#[derive(Error, Clone, Debug, PartialEq)]
#[error("{kind} IN {line}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub line: u32,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, line: u32) -> Self {
        RuntimeError { kind, line }
    }

    /// The two-line uncaught-error diagnostic printed when no `ONERR`
    /// handler is armed (spec §4.H, §7).
    pub fn diagnostic(&self) -> String {
        format!("SYNTAX ERROR IN {}\nDetail: {}", self.line, self.kind)
    }
}

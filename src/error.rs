//! Compile-time error taxonomy (spec §7).
//!
//! Mirrors the teacher's `codegen::CodeGenError` (a hand-rolled enum
//! implementing `std::error::Error`, with a `From<std::fmt::Error>` for
//! the `write!`-into-`String` emission path) rather than reaching for
//! `thiserror`: the teacher crate hand-rolls this one error type even
//! though sibling crates in the same workspace use richer error stacks,
//! so the compiler core follows the teacher's own convention here.
//!
//! `ExtensionTransformerFailure` from spec §7 is deliberately not a
//! variant of this enum — per spec it is non-fatal, logged via `tracing`
//! at the call site, and never propagated as a `Result::Err`.

use std::fmt;

#[derive(Debug)]
pub enum CompileError {
    /// A node kind has no built-in dispatch and no registered extension
    /// (spec §7). Fatal: aborts compilation of the script.
    UnknownKind { kind: String },

    /// The compiler emitted a yield but the script header does not
    /// declare `yields` (spec §7). Fatal: indicates an IR producer bug.
    YieldMismatch { kind: String },

    /// An internal invariant was violated (e.g. a node was missing an
    /// input the kind's contract guarantees). Always indicates a bug in
    /// this crate or in the IR producer, never a user-facing condition.
    Logic(String),

    /// A formatting error while writing into the emission buffer.
    Format(fmt::Error),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UnknownKind { kind } => {
                write!(f, "no built-in or extension dispatch for kind '{}'", kind)
            }
            CompileError::YieldMismatch { kind } => write!(
                f,
                "emitted a yield while lowering '{}' but the script does not declare yields",
                kind
            ),
            CompileError::Logic(s) => write!(f, "{}", s),
            CompileError::Format(e) => write!(f, "emission error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<fmt::Error> for CompileError {
    fn from(e: fmt::Error) -> Self {
        CompileError::Format(e)
    }
}

impl From<String> for CompileError {
    fn from(s: String) -> Self {
        CompileError::Logic(s)
    }
}

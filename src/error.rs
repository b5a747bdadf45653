//! Error types for the `robdd` engine.
//!
//! Errors are grouped by taxonomy: input and precondition violations
//! are recoverable and carry enough context to
//! explain which operand or variable was at fault; `OutOfMemory` is
//! recoverable at a top-level call boundary but fatal if raised from
//! inside garbage collection itself; `Consistency` is always fatal.

use std::fmt;

/// Errors produced by the [`crate::Manager`] and [`crate::Bdd`] APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An operation referenced a variable name that was never declared.
    UnknownVariable {
        /// The name that was looked up.
        name: String,
    },
    /// Two edges (or handles) that originated from different managers were
    /// used together in a single operation.
    ManagerMismatch,
    /// A value that was expected to denote a Boolean function does not
    /// (for instance, a cube argument to `restrict` containing a
    /// non-literal node).
    NotBoolean {
        /// Which argument position was invalid.
        context: &'static str,
    },
    /// A composition/substitution value had the wrong shape (e.g. a
    /// `rename` map that is not injective where a permutation was
    /// required).
    MalformedSubstitution {
        /// Human-readable explanation of the shape mismatch.
        reason: String,
    },
    /// `find_or_add` was invoked with a level that is not strictly above
    /// both children's levels, or a handle was used after its manager
    /// was dropped.
    PrecondViolated {
        /// Human-readable explanation.
        reason: String,
    },
    /// Node or table allocation failed even after a garbage-collection
    /// attempt.
    OutOfMemory,
    /// A kernel call observed its cancellation token.
    Cancelled,
    /// `assert_consistent` detected a broken invariant. Always fatal;
    /// indicates a bug in the engine itself.
    Consistency {
        /// Which invariant was violated.
        reason: String,
    },
    /// A parse error from the `expr` grammar adapter.
    Parse {
        /// Human-readable explanation, including the offending input.
        reason: String,
    },
    /// An I/O or format error while loading/dumping a persisted diagram.
    Persist {
        /// Human-readable explanation.
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownVariable { name } => {
                write!(f, "unknown variable `{name}`; declare it first")
            }
            Error::ManagerMismatch => {
                write!(f, "edges from two different managers were mixed")
            }
            Error::NotBoolean { context } => {
                write!(f, "expected a Boolean-valued argument in {context}")
            }
            Error::MalformedSubstitution { reason } => {
                write!(f, "malformed substitution: {reason}")
            }
            Error::PrecondViolated { reason } => {
                write!(f, "precondition violated: {reason}")
            }
            Error::OutOfMemory => write!(f, "out of memory: allocation failed after gc"),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::Consistency { reason } => {
                write!(f, "internal consistency violation: {reason}")
            }
            Error::Parse { reason } => write!(f, "failed to parse expression: {reason}"),
            Error::Persist { reason } => write!(f, "failed to load/dump diagram: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

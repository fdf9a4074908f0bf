//! Error taxonomy, matching §7 of the design.
//!
//! Two of the four categories never reach a `Result`: a *consistency
//! violation* is aggregated by the verifier into a boolean plus a message
//! log (see `crate::verify`), and a *transformation precondition failure*
//! just means a pass silently declines to touch the loop/graph in question
//! and is reported as `Ok` with nothing changed. Only the remaining two
//! categories — an unsupported construct and an internal invariant break —
//! are modeled as an error type, following `cranelift-codegen`'s own
//! hand-rolled `Display`/`Error` impls (e.g. `RecompileError` in
//! `incremental_cache.rs`) rather than pulling in `thiserror`.

use std::fmt;

/// A fatal condition raised by a pass: either an unsupported construct was
/// encountered, or an internal invariant the pass depends on did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A doubleword-mode operand or result reached a node the lowering pass
    /// cannot rewrite (ASM per §4.2's per-opcode table).
    UnsupportedConstruct(String),
    /// A graph-walk or rewrite reached a state the algorithm's own
    /// invariants say cannot happen (e.g. a node left on the work deque
    /// after drain whose inputs are still unresolved).
    InternalInvariant(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::UnsupportedConstruct(msg) => {
                write!(f, "unsupported construct: {msg}")
            }
            CoreError::InternalInvariant(msg) => write!(f, "internal invariant violated: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

/// Result type used by fallible pass entry points.
pub type CoreResult<T> = Result<T, CoreError>;

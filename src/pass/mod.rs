//! Transformation passes over an IR graph (§4.2, §4.3).

pub mod lower_dw;
pub mod unroll;

pub use lower_dw::{lower_dw_ops, LowerDwParams};
pub use unroll::{unroll_loops, UnrollParams};

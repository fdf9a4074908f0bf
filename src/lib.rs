//! A typed, SSA-form directed-graph intermediate representation, plus the
//! double-word lowering and loop-unrolling passes built on top of it.
//!
//! Grounded on `cranelift-codegen`'s own crate-root shape: a handful of
//! substrate modules (`entity`, `mode`, `tarval`, `resource`) underneath an
//! `ir` module for the graph itself, with passes and the driver that
//! sequences them as separate top-level modules rather than folded into
//! `ir`.

pub mod driver;
pub mod entity;
pub mod error;
pub mod ir;
pub mod mode;
pub mod pass;
pub mod program;
pub mod resource;
pub mod tarval;
pub mod timing;
pub mod typesystem;
pub mod verify;

pub use driver::{run_pipeline, PipelineConfig, PipelineStats};
pub use error::{CoreError, CoreResult};
pub use program::Program;
pub use verify::{verify_program, VerifyReport};

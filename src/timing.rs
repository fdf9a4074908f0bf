//! Minimal pass-timing instrumentation.
//!
//! Grounded on `cranelift-codegen::timing`, which every pass in that crate
//! opens with a line like `let _tt = timing::dce();`: a pass calls
//! `timing::scope("pass-name")`, keeps the returned guard alive for the
//! duration of the pass, and a `trace!` is emitted on drop. This crate does
//! not need a full sampling profiler; passes run once per call and the only
//! consumer of timing data is a developer reading logs.

use std::time::Instant;

/// An RAII guard that logs how long the enclosing pass took when dropped.
pub struct PassTimer {
    name: &'static str,
    start: Instant,
}

/// Start timing a pass named `name`. Keep the guard alive for the pass's duration.
pub fn scope(name: &'static str) -> PassTimer {
    PassTimer {
        name,
        start: Instant::now(),
    }
}

impl Drop for PassTimer {
    fn drop(&mut self) {
        log::trace!("{} took {:?}", self.name, self.start.elapsed());
    }
}

//! Build execution.
//!
//! This module runs one package build at a time:
//! - [`BuildRun`] is the per-build state machine (resolve inputs,
//!   materialize the pipeline, execute phases)
//! - [`realize`] drives a whole build from a spec and an input table
//! - [`PhaseCtx`] is the explicit context every action receives
//!
//! Phases of one build run sequentially. Separate builds share nothing
//! mutable and may run concurrently.

mod build;
mod context;
mod types;

pub use build::{BuildRun, materialize_pipeline, realize};
pub use context::PhaseCtx;
pub use types::{BuildDirs, BuildError, BuildResult, BuildState, ExecuteConfig};

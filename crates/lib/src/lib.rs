//! phasekit-lib: Core types and logic for phasekit
//!
//! This crate provides the reusable mechanism behind declarative build recipes:
//! - `PhaseList`: an ordered, uniquely-keyed pipeline of build phases plus the
//!   edit algebra packages use to customize a build system's default pipeline
//! - `InputResolver`: maps declared dependency names to concrete paths
//! - `substitute`: strict, in-place pattern substitution over build files
//! - `wrap`: launcher generation that adjusts a program's environment
//! - `PackageSpec`: the immutable, declarative unit tying it all together
//! - `execute`: the per-build state machine that runs a materialized pipeline

pub mod action;
pub mod build_system;
pub mod consts;
pub mod execute;
pub mod inputs;
pub mod package;
pub mod phase;
pub mod placeholder;
pub mod substitute;
pub mod util;
pub mod wrap;

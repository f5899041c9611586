//! Individual action implementations.
//!
//! - [`exec`] - Command execution in an isolated environment
//! - [`install`] - Copying build results into the output root

pub mod exec;
pub mod install;

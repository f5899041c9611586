//! Build phases and the pipeline editing algebra.
//!
//! A [`PhaseList`] is the ordered, uniquely-keyed sequence of steps a build
//! executes. Build systems produce a default list; packages derive their own
//! pipeline from it with a customization script of [`PhaseEdit`]s.
//!
//! # Submodules
//!
//! - [`edit`] - Edit operations and [`customize`], the pure
//!   `(default list, script) -> list` function

mod edit;
mod types;

pub use edit::*;
pub use types::*;

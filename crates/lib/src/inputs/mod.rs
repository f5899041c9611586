//! Input declarations and resolution.
//!
//! Packages declare their dependencies by role and symbolic name. The external
//! executor supplies an [`InputTable`] of concrete paths for one build; the
//! [`InputResolver`] validates every declaration against that table and
//! produces [`ResolvedInputs`], the explicit mapping phases receive.
//!
//! # Modules
//!
//! - [`resolve`] - Resolution of declarations against an input table
//! - [`types`] - Roles, dependency references and the input table

pub mod resolve;
mod types;

pub use resolve::*;
pub use types::*;

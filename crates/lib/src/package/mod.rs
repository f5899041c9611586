//! Package specs and catalogs.
//!
//! A [`PackageSpec`] ties together an identity, a source descriptor, a
//! build system, input declarations and a customization script. Specs are
//! loaded once into a [`Catalog`] and only read afterwards.

mod catalog;
mod types;

pub use catalog::*;
pub use types::*;

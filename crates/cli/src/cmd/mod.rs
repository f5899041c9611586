mod build;
mod check;
mod phases;
mod wrap;

pub use build::{BuildArgs, cmd_build};
pub use check::cmd_check;
pub use phases::cmd_phases;
pub use wrap::cmd_wrap;

//! Crate-wide constants.

/// Output name used when a dependency reference does not select one.
pub const DEFAULT_OUTPUT: &str = "out";

/// Length of the truncated hex digest used in output directory names.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// SOURCE_DATE_EPOCH exported to commands: 1980-01-01 00:00:00 UTC (ZIP epoch).
pub const SOURCE_DATE_EPOCH: &str = "315532800";

/// Second line of every launcher written by [`crate::wrap`].
pub const WRAPPER_MARKER: &str = "# phasekit wrapper: edit the variables above the exec line";

/// Directory inside the output root handed to commands as TMPDIR.
pub const BUILD_TMP_DIR: &str = "tmp";

/// Interpreter used for launchers when no input provides `bin/sh`.
pub const DEFAULT_WRAPPER_SHELL: &str = "/bin/sh";

/// Separator used for path-list environment variables.
#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: &str = ";";

/// Separator used for path-list environment variables.
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: &str = ":";

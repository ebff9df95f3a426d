//! Typed failures that callers may want to tell apart.
//!
//! Everything else travels as [`anyhow::Error`] with context attached; these
//! variants are what ends up at the bottom of such a chain when the cause is
//! one of the documented failure modes.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirrorError {
    /// The configuration file does not exist
    #[error("File \"{}\" does not exist", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file has no sections at all
    #[error("No sections found")]
    EmptyConfig,

    /// A section name is neither `user <name>` nor `repository <owner>/<name>`
    #[error("Malformed section name \"{0}\"")]
    MalformedSection(String),

    /// An external command exited unsuccessfully
    #[error("Command `{command}` failed with {status}")]
    CommandFailed { command: String, status: String },

    /// Sanitizing a remote-supplied name left nothing behind
    #[error("Path component cannot be empty (from \"{0}\")")]
    EmptyPathComponent(String),
}

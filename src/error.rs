//! Error handling for sitegen.
//! Defines the error type and result alias used throughout the pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::guard::MarkupKind;

/// Error types for sitegen operations.
///
/// Two severities exist: [`Error::StagingResetFailed`] and
/// [`Error::ConfigRewriteFailed`] abort a run, everything else is recorded in
/// the run report and the pipeline moves on.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Represents errors in the site configuration file or command line
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// Represents errors raised by the layout template engine
    #[error("Template error: {0}.")]
    TemplateError(#[from] minijinja::Error),

    /// A tag was requested with an argument list the tag builder cannot handle
    #[error("Can't handle call: {name} with {count} argument(s)")]
    UnsupportedTagCall { name: String, count: usize },

    /// A locale is not part of the configured set or label map
    #[error("No such locale {locale}. Options are: {options}")]
    UnknownLocale { locale: String, options: String },

    /// The configured locales cannot form a counterpart pairing
    #[error("Invalid locale set: {0}")]
    InvalidLocaleSet(String),

    /// A page context was built from an empty base name or extension
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Rendered output contains server-side markup
    #[error("Found {kind}: '{snippet}'")]
    ForbiddenMarkup { kind: MarkupKind, snippet: String },

    /// A discovery or asset pattern could not be compiled
    #[error("Glob error: {0}")]
    GlobError(#[from] globset::Error),

    /// The staging directory could not be deleted or recreated
    #[error("Could not reset staging directory {}: {reason}", .path.display())]
    StagingResetFailed { path: PathBuf, reason: String },

    /// A single source file could not be turned into a page
    #[error("Could not parse {}: {reason}", .source_file.display())]
    FileGenerationFailed { source_file: PathBuf, reason: Box<Error> },

    /// An auxiliary asset could not be copied into staging
    #[error("Could not copy {}: {reason}", .path.display())]
    AssetCopyFailed { path: PathBuf, reason: String },

    /// The deploy configuration could not be produced in staging
    #[error("Could not rewrite {}: {reason}", .path.display())]
    ConfigRewriteFailed { path: PathBuf, reason: String },

    /// The transfer command could not be started or exited unsuccessfully
    #[error("Transfer failed: `{command}`: {reason}")]
    TransferFailed { command: String, reason: String },
}

impl Error {
    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StagingResetFailed { .. } | Error::ConfigRewriteFailed { .. }
        )
    }
}

/// Convenience type alias for Results with [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{}", err);
    std::process::exit(1);
}

//! sitegen wraps locale-specific source pages in a shared layout, stages the
//! result together with static assets and a deploy configuration, and hands
//! the staging tree to an external sync command.

/// Command-line interface module for the sitegen application
pub mod cli;

/// Run settings and the site configuration file
/// Supports JSON and YAML formats (sitegen.json, sitegen.yml, sitegen.yaml)
pub mod config;

/// Default names and values
pub mod constants;

/// Error types and handling for the sitegen application
pub mod error;

/// File system and transfer command capabilities
pub mod fs;

/// Check for server-side markup left in rendered pages
pub mod guard;

/// HTML tag helpers available to formatters and layouts
pub mod html;

/// Locale tags and their counterparts
pub mod locale;

/// Per-page context: target path, wrapping and writing
pub mod page;

/// Run orchestration
/// Staging reset, generation, asset copy, deploy config rewrite, transfer
pub mod pipeline;

/// Formatter trait and the MiniJinja layout formatter
pub mod renderer;

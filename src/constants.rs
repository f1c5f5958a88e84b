//! Common constants used throughout sitegen.

/// Supported site configuration file names, tried in order
pub const CONFIG_FILES: [&str; 3] = ["sitegen.json", "sitegen.yml", "sitegen.yaml"];

/// Default staging directory
pub const STAGING_DIR: &str = ".gen";

/// Default transfer command template
pub const TRANSFER_COMMAND: &str = "rsync -a";

/// Default deploy configuration file
pub const DEPLOY_CONFIG: &str = ".htaccess";

/// Default layout template
pub const LAYOUT_FILE: &str = "layout.html.j2";

pub const DEFAULT_EXTENSION: &str = "html";

pub const DEFAULT_LOCALES: [&str; 2] = ["de", "us"];

pub const DEFAULT_ASSETS: [&str; 3] = ["*.css", "images", "js"];

//! Rejects rendered pages that still contain server-side markup.
//!
//! Static output must never ship `<? ... ?>` directives. Three patterns are
//! tried in order and the first hit wins: a complete pair on one line, an
//! opener with up to ten trailing characters, then up to ten characters before
//! a closer. Only the matched snippet is reported.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static COMPLETE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\?.*\?>").unwrap());
static UNCLOSED_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<\?.{1,10}").unwrap());
static UNOPENED_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r".{1,10}\?>").unwrap());

/// Which of the three checks matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    Complete,
    UnclosedOpen,
    UnopenedClose,
}

impl fmt::Display for MarkupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkupKind::Complete => f.write_str("server markup"),
            MarkupKind::UnclosedOpen => f.write_str("open PHP tag"),
            MarkupKind::UnopenedClose => f.write_str("closing PHP tag"),
        }
    }
}

/// Scans `content` for forbidden markup.
///
/// # Errors
/// * `Error::ForbiddenMarkup` carrying the kind and the matched snippet
pub fn scan(content: &str) -> Result<()> {
    let checks: [(&Regex, MarkupKind); 3] = [
        (&*COMPLETE, MarkupKind::Complete),
        (&*UNCLOSED_OPEN, MarkupKind::UnclosedOpen),
        (&*UNOPENED_CLOSE, MarkupKind::UnopenedClose),
    ];

    for (re, kind) in checks {
        if let Some(m) = re.find(content) {
            return Err(Error::ForbiddenMarkup {
                kind,
                snippet: m.as_str().to_string(),
            });
        }
    }
    Ok(())
}

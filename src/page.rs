//! Per-page context handed to the formatter.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::guard;
use crate::locale::{Locale, LocaleSet};
use crate::renderer::Formatter;

/// Everything a formatter needs to know about the page it is wrapping.
///
/// A context is created right before a source file is rendered and dropped
/// once the output has been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    locale: Option<Locale>,
    other_locale: Option<Locale>,
    basename: String,
    ext: String,
}

impl PageContext {
    /// Creates the context for one page.
    ///
    /// The counterpart locale is looked up in `locales`.
    ///
    /// # Errors
    /// * `Error::InvalidPage` if `basename` or `ext` is empty
    /// * `Error::UnknownLocale` if `locale` is not part of `locales`
    pub fn new(
        locale: Option<&Locale>,
        locales: &LocaleSet,
        basename: impl Into<String>,
        ext: impl Into<String>,
    ) -> Result<Self> {
        let basename = basename.into();
        let ext = ext.into();
        if basename.is_empty() {
            return Err(Error::InvalidPage("empty base name".to_string()));
        }
        if ext.is_empty() {
            return Err(Error::InvalidPage(format!("'{basename}' has no extension")));
        }

        let other_locale = match locale {
            Some(l) => Some(locales.counterpart(l)?.clone()),
            None => None,
        };

        Ok(Self {
            locale: locale.cloned(),
            other_locale,
            basename,
            ext,
        })
    }

    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    pub fn other_locale(&self) -> Option<&Locale> {
        self.other_locale.as_ref()
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// `basename.ext`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.basename, self.ext)
    }

    /// Site-relative URL of this page, e.g. `de/index.html`.
    pub fn url_path(&self) -> String {
        match &self.locale {
            Some(locale) => format!("{locale}/{}", self.file_name()),
            None => self.file_name(),
        }
    }

    /// Site-relative URL of the same page in the counterpart locale.
    pub fn other_url_path(&self) -> Option<String> {
        self.other_locale
            .as_ref()
            .map(|other| format!("{other}/{}", self.file_name()))
    }

    /// Formats `content` and checks the result for server markup.
    ///
    /// The formatter's output is the final page text; nothing is added around
    /// it here.
    pub fn wrap<F: Formatter + ?Sized>(&self, content: &str, formatter: &F) -> Result<String> {
        let rendered = formatter.format(self, content)?;
        guard::scan(&rendered)?;
        Ok(rendered)
    }

    /// `root/locale/basename.ext`, or `root/basename.ext` without a locale.
    pub fn target_path<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        let mut path = root.as_ref().to_path_buf();
        if let Some(locale) = &self.locale {
            path.push(locale.as_str());
        }
        path.push(self.file_name());
        path
    }

    /// Writes `rendered` to [`Self::target_path`], replacing an existing file.
    pub fn write_to<P: AsRef<Path>>(
        &self,
        fs: &dyn FileSystem,
        root: P,
        rendered: &str,
    ) -> Result<PathBuf> {
        let target = self.target_path(root);
        if let Some(parent) = target.parent() {
            fs.ensure_dir(parent)?;
        }
        fs.write(&target, rendered)?;
        Ok(target)
    }
}

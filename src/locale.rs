//! Locale tags and counterpart pairing.

use std::fmt;

use crate::error::{Error, Result};

/// Opaque locale tag such as `de` or `us`.
///
/// Tags are used verbatim in file names (`index.de.html`) and staging paths,
/// so they must be non-empty and free of dots and path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let tag = tag.into();
        if tag.is_empty() || tag.contains(['.', '/', '\\']) {
            return Err(Error::InvalidLocaleSet(format!(
                "'{tag}' is not a valid locale tag"
            )));
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of locales a site is generated for.
///
/// Every locale's counterpart is the next one in configured order, wrapping
/// around at the end. With the usual two locales this is a symmetric pairing.
/// An empty set means pages carry no locale at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSet {
    locales: Vec<Locale>,
}

impl LocaleSet {
    /// # Errors
    /// * `Error::InvalidLocaleSet` for a single locale (it would be its own
    ///   counterpart) or for duplicate tags
    pub fn new(locales: Vec<Locale>) -> Result<Self> {
        if locales.len() == 1 {
            return Err(Error::InvalidLocaleSet(format!(
                "'{}' would be its own counterpart; configure none or at least two locales",
                locales[0]
            )));
        }
        for (i, locale) in locales.iter().enumerate() {
            if locales[..i].contains(locale) {
                return Err(Error::InvalidLocaleSet(format!(
                    "'{locale}' is listed more than once"
                )));
            }
        }
        Ok(Self { locales })
    }

    /// Parses a list of tags, as found in the site configuration.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Result<Self> {
        let locales = tags
            .iter()
            .map(|t| Locale::new(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(locales)
    }

    pub fn none() -> Self {
        Self {
            locales: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locales.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locale> {
        self.locales.iter()
    }

    /// Returns the counterpart of `locale`.
    ///
    /// # Errors
    /// * `Error::UnknownLocale` if `locale` is not part of the set
    pub fn counterpart(&self, locale: &Locale) -> Result<&Locale> {
        let pos = self
            .locales
            .iter()
            .position(|l| l == locale)
            .ok_or_else(|| Error::UnknownLocale {
                locale: locale.to_string(),
                options: self
                    .locales
                    .iter()
                    .map(Locale::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;
        Ok(&self.locales[(pos + 1) % self.locales.len()])
    }
}

impl Default for LocaleSet {
    fn default() -> Self {
        Self {
            locales: vec![Locale("de".to_string()), Locale("us".to_string())],
        }
    }
}

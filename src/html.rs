//! HTML tag emission helpers.
//!
//! Everything here is plain string formatting. [`tag_call`] builds any tag from
//! a name and a short argument list; the fixed emitters ([`js`], [`css`],
//! [`img`], ...) are thin wrappers around it with preset attributes.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::locale::Locale;

/// Ordered attribute map. Attributes are rendered in insertion order.
pub type Attributes = IndexMap<String, String>;

/// One positional argument of a [`tag_call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagArg {
    Attrs(Attributes),
    Content(String),
}

impl From<Attributes> for TagArg {
    fn from(attrs: Attributes) -> Self {
        TagArg::Attrs(attrs)
    }
}

impl From<&str> for TagArg {
    fn from(content: &str) -> Self {
        TagArg::Content(content.to_string())
    }
}

impl From<String> for TagArg {
    fn from(content: String) -> Self {
        TagArg::Content(content)
    }
}

/// Directories the fixed emitters prefix their file arguments with.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct AssetDirs {
    pub scripts: String,
    pub images: String,
    pub stylesheets: String,
}

impl Default for AssetDirs {
    fn default() -> Self {
        Self {
            scripts: "js".to_string(),
            images: "images".to_string(),
            stylesheets: ".".to_string(),
        }
    }
}

/// Builds an attribute map from `(name, value)` pairs, keeping their order.
pub fn attrs<K, V, I>(pairs: I) -> Attributes
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Renders an open tag with attributes: `<name a="1" b="2">`.
pub fn tagf(name: &str, attrs: &Attributes) -> String {
    let mut out = format!("<{name}");
    for (key, value) in attrs {
        out.push_str(&format!(" {key}=\"{value}\""));
    }
    out.push('>');
    out
}

/// Renders an open tag, the content and the matching close tag plus a newline.
pub fn tag(name: &str, attrs: &Attributes, content: &str) -> String {
    format!("{}{content}</{name}>\n", tagf(name, attrs))
}

/// Builds any tag from its name and up to two positional arguments.
///
/// * no arguments: bare open tag
/// * one attribute map: open tag with attributes
/// * attribute map and content: full element with close tag
///
/// Anything else fails with [`Error::UnsupportedTagCall`].
pub fn tag_call(name: &str, args: &[TagArg]) -> Result<String> {
    let unsupported = || Error::UnsupportedTagCall {
        name: name.to_string(),
        count: args.len(),
    };

    match args {
        [] => Ok(format!("<{name}>")),
        [TagArg::Attrs(attrs)] => Ok(tagf(name, attrs)),
        [TagArg::Attrs(attrs), TagArg::Content(content)] => Ok(tag(name, attrs, content)),
        _ => Err(unsupported()),
    }
}

/// Script include for a file under the scripts directory.
pub fn js(dirs: &AssetDirs, file: &str) -> String {
    format!(
        "<script type=\"text/javascript\" src=\"{}/{file}\"></script>\n",
        dirs.scripts
    )
}

/// Stylesheet link for a file under the stylesheets directory.
pub fn css(dirs: &AssetDirs, file: &str) -> String {
    tagf(
        "link",
        &attrs([
            ("rel", "stylesheet".to_string()),
            ("type", "text/css".to_string()),
            ("href", format!("{}/{file}", dirs.stylesheets)),
        ]),
    )
}

/// Image tag for a file under the images directory.
pub fn img(dirs: &AssetDirs, src: &str) -> String {
    tagf("img", &attrs([("src", format!("{}/{src}", dirs.images))]))
}

/// W3C validator badge pointing at `page_url`.
pub fn validator(page_url: &str) -> String {
    format!(
        "<a href=\"http://validator.w3.org/check?uri={}&amp;charset=%28detect+automatically%29&amp;doctype=Inline&amp;group=0\">VALIDATE!</a>",
        url_encode(page_url)
    )
}

/// Asynchronous Google Analytics snippet for the given account.
pub fn google_analytics(account: &str) -> String {
    format!(
        r#"<script type="text/javascript">
  var _gaq = _gaq || [];
  _gaq.push(['_setAccount', '{account}']);
  _gaq.push(['_trackPageview']);
  (function() {{
    var ga = document.createElement('script'); ga.type = 'text/javascript'; ga.async = true;
    ga.src = ('https:' == document.location.protocol ? 'https://ssl' : 'http://www') + '.google-analytics.com/ga.js';
    var s = document.getElementsByTagName('script')[0]; s.parentNode.insertBefore(ga, s);
  }})();
</script>
"#
    )
}

pub fn html_encode(s: &str) -> String {
    s.replace('&', "&amp;")
}

// Only ampersands for now, which is all query strings in page names need.
pub fn url_encode(s: &str) -> String {
    s.replace('&', "%26")
}

/// Label of a [`LangLink`]: one text for every locale, or one per locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkLabel {
    Single(String),
    PerLocale(IndexMap<Locale, String>),
}

/// Link to the same page in another language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangLink {
    pub url: String,
    pub label: LinkLabel,
}

impl LangLink {
    pub fn new(url: impl Into<String>, label: LinkLabel) -> Self {
        Self {
            url: url.into(),
            label,
        }
    }

    /// Renders the anchor with the label for `locale`.
    ///
    /// # Errors
    /// * `Error::UnknownLocale` if the label map has no entry for `locale`
    pub fn to_html_for(&self, locale: &Locale) -> Result<String> {
        let text = match &self.label {
            LinkLabel::Single(text) => text,
            LinkLabel::PerLocale(names) => names.get(locale).ok_or_else(|| Error::UnknownLocale {
                locale: locale.to_string(),
                options: names
                    .keys()
                    .map(Locale::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?,
        };
        Ok(format!("<a href=\"{}\">{text}</a>", self.url))
    }
}

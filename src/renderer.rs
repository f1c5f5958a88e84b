//! Page formatting for sitegen.
//! The pipeline only knows the [`Formatter`] trait; the binary plugs in
//! [`LayoutFormatter`], which wraps every page with a MiniJinja layout.
use crate::error::{Error, Result};
use crate::html::{self, AssetDirs, Attributes, TagArg};
use crate::page::PageContext;
use minijinja::value::{Rest, Value, ValueKind};
use minijinja::{context, AutoEscape, Environment, ErrorKind};

/// Turns a page's raw content into its final text.
pub trait Formatter {
    /// Formats the raw `content` of `page`.
    ///
    /// # Arguments
    /// * `page` - Context of the page being generated
    /// * `content` - Raw content of the source file
    ///
    /// # Returns
    /// * `Result<String>` - The complete page text
    fn format(&self, page: &PageContext, content: &str) -> Result<String>;
}

impl<F> Formatter for F
where
    F: Fn(&PageContext, &str) -> Result<String>,
{
    fn format(&self, page: &PageContext, content: &str) -> Result<String> {
        self(page, content)
    }
}

/// Name the layout is registered under.
const LAYOUT: &str = "layout";

/// MiniJinja-based formatter wrapping pages in a shared layout.
///
/// The layout sees `content`, `locale`, `other_locale`, `basename`, `ext`,
/// `page_url`, `other_url`, `analytics` and `analytics_account`, plus the tag
/// helpers as functions: `tag`, `tagf`, `js`, `css`, `img`,
/// `google_analytics`, `validator`, `html_encode` and `url_encode`.
///
/// Auto-escaping is off: the page content and the helper output are HTML.
pub struct LayoutFormatter {
    /// MiniJinja environment instance
    env: Environment<'static>,
    analytics: bool,
    analytics_account: Option<String>,
}

fn to_template_error(e: Error) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, e.to_string())
}

fn to_tag_arg(value: &Value) -> std::result::Result<TagArg, minijinja::Error> {
    if value.kind() != ValueKind::Map {
        return Ok(TagArg::Content(value.to_string()));
    }

    let mut attrs = Attributes::new();
    for key in value.try_iter()? {
        let item = value.get_item(&key)?;
        attrs.insert(key.to_string(), item.to_string());
    }
    Ok(TagArg::Attrs(attrs))
}

fn tag_function(name: String, args: Rest<Value>) -> std::result::Result<String, minijinja::Error> {
    let args = args
        .iter()
        .map(to_tag_arg)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    html::tag_call(&name, &args).map_err(to_template_error)
}

fn tagf_function(name: String, attrs: Value) -> std::result::Result<String, minijinja::Error> {
    match to_tag_arg(&attrs)? {
        TagArg::Attrs(attrs) => Ok(html::tagf(&name, &attrs)),
        TagArg::Content(_) => Err(minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("tagf({name}) expects an attribute map"),
        )),
    }
}

impl LayoutFormatter {
    /// Creates a formatter from the layout template source.
    ///
    /// # Errors
    /// * `Error::TemplateError` if the layout does not parse
    pub fn new(
        layout: String,
        dirs: AssetDirs,
        analytics: bool,
        analytics_account: Option<String>,
    ) -> Result<Self> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);

        env.add_function("tag", tag_function);
        env.add_function("tagf", tagf_function);

        let js_dirs = dirs.clone();
        env.add_function("js", move |file: String| html::js(&js_dirs, &file));
        let css_dirs = dirs.clone();
        env.add_function("css", move |file: String| html::css(&css_dirs, &file));
        let img_dirs = dirs;
        env.add_function("img", move |src: String| html::img(&img_dirs, &src));

        env.add_function("google_analytics", |account: String| {
            html::google_analytics(&account)
        });
        env.add_function("validator", |url: String| html::validator(&url));
        env.add_function("html_encode", |s: String| html::html_encode(&s));
        env.add_function("url_encode", |s: String| html::url_encode(&s));

        env.add_template_owned(LAYOUT, layout)?;

        Ok(Self {
            env,
            analytics,
            analytics_account,
        })
    }
}

impl Formatter for LayoutFormatter {
    /// Renders the layout with the page's content and context.
    ///
    /// # Errors
    /// * `Error::TemplateError` if rendering fails, e.g. a helper was called
    ///   with an unsupported argument list
    fn format(&self, page: &PageContext, content: &str) -> Result<String> {
        let tmpl = self.env.get_template(LAYOUT)?;

        let rendered = tmpl.render(context! {
            content => content,
            locale => page.locale().map(|l| l.as_str()),
            other_locale => page.other_locale().map(|l| l.as_str()),
            basename => page.basename(),
            ext => page.ext(),
            page_url => page.url_path(),
            other_url => page.other_url_path(),
            analytics => self.analytics,
            analytics_account => self.analytics_account.as_deref(),
        })?;
        Ok(rendered)
    }
}

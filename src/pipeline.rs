//! Run orchestration: staging reset, page generation, asset copy, deploy
//! configuration rewrite and transfer.
//!
//! A run walks through the [`Stage`]s in order. Only a failed staging reset
//! or a failed deploy configuration rewrite stops it; a page that cannot be
//! generated, an asset that cannot be copied or a failing transfer command is
//! logged, recorded in the [`RunReport`], and the run goes on.
//!
//! The staging directory is deleted at the start of every run, so two runs
//! must never share a staging path at the same time.

use globset::{GlobBuilder, GlobMatcher};
use log::{debug, error, info, warn};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::config::{RunConfiguration, SiteConfig};
use crate::error::{Error, Result};
use crate::fs::{FileSystem, TransferOutput, Transport};
use crate::locale::{Locale, LocaleSet};
use crate::page::PageContext;
use crate::renderer::Formatter;

static REWRITE_BASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*RewriteBase\s+(.*?)\s*$").unwrap());

const GLOB_CHARS: [char; 4] = ['*', '?', '[', '{'];

/// Shell running the transfer template; staging and destination arrive as
/// `$1` and `$2`.
const TRANSFER_SHELL: &str = "sh";

/// Phases of a run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    StagingReset,
    Generating,
    AssetCopy,
    ConfigRewrite,
    Transferring,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::StagingReset => "staging reset",
            Stage::Generating => "generating",
            Stage::AssetCopy => "asset copy",
            Stage::ConfigRewrite => "config rewrite",
            Stage::Transferring => "transferring",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A discovered source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub basename: String,
    pub ext: String,
    pub locale: Option<Locale>,
}

impl SourceFile {
    /// Splits `path`'s file name into base name, locale and extension.
    ///
    /// `index.de.html` with locale `de` and extension `html` has base name
    /// `index`; without a locale only the extension is stripped.
    pub fn parse(path: &Path, locale: Option<&Locale>, ext: &str) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidPage(format!("invalid file name: {}", path.display())))?;

        let pattern = match locale {
            Some(l) => format!(r"^(.*)\.{}\.{}$", regex::escape(l.as_str()), regex::escape(ext)),
            None => format!(r"^(.*)\.{}$", regex::escape(ext)),
        };
        let re = Regex::new(&pattern).map_err(|e| Error::ConfigError(e.to_string()))?;

        let basename = re
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                Error::InvalidPage(format!("'{file_name}' does not match '{pattern}'"))
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            basename,
            ext: ext.to_string(),
            locale: locale.cloned(),
        })
    }
}

/// Result of the transfer phase.
#[derive(Debug)]
pub enum TransferStatus {
    /// No destination was configured.
    Skipped,
    Completed {
        command: String,
        output: TransferOutput,
    },
    Failed {
        command: String,
        /// Present when the command ran but exited unsuccessfully.
        output: Option<TransferOutput>,
        error: Error,
    },
}

/// What a run produced and what went wrong along the way.
#[derive(Debug)]
pub struct RunReport {
    /// Pages written to staging, in generation order
    pub pages: Vec<PathBuf>,
    /// One `FileGenerationFailed` per page that could not be generated
    pub failures: Vec<Error>,
    /// One `AssetCopyFailed` per asset that could not be copied
    pub asset_failures: Vec<Error>,
    pub transfer: TransferStatus,
}

impl RunReport {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            failures: Vec::new(),
            asset_failures: Vec::new(),
            transfer: TransferStatus::Skipped,
        }
    }

    /// True when nothing at all went wrong.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && self.asset_failures.is_empty()
            && !matches!(self.transfer, TransferStatus::Failed { .. })
    }
}

fn write_output(f: &mut fmt::Formatter<'_>, output: &TransferOutput) -> fmt::Result {
    for line in output.stdout.lines() {
        writeln!(f, "  {}", line)?;
    }
    for line in output.stderr.lines() {
        writeln!(f, "  stderr: {}", line)?;
    }
    Ok(())
}

/// End-of-run summary: page count, failures and the transfer result.
impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generated {} page(s).", self.pages.len())?;

        if !self.failures.is_empty() {
            writeln!(f, "{} page(s) failed:", self.failures.len())?;
            for failure in &self.failures {
                writeln!(f, "  {}", failure)?;
            }
        }
        if !self.asset_failures.is_empty() {
            writeln!(f, "{} asset(s) failed:", self.asset_failures.len())?;
            for failure in &self.asset_failures {
                writeln!(f, "  {}", failure)?;
            }
        }

        match &self.transfer {
            TransferStatus::Skipped => writeln!(f, "Transfer skipped: no destination."),
            TransferStatus::Completed { command, output } => {
                writeln!(f, "Transferred: '{}'", command)?;
                write_output(f, output)
            }
            TransferStatus::Failed { error, output, .. } => {
                writeln!(f, "{}", error)?;
                match output {
                    Some(output) => write_output(f, output),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Rewrites every `RewriteBase` directive in `content` to `base`.
///
/// A replaced value that differs from `base` is logged as a warning. Without
/// any directive, one is inserted as the second line.
pub fn rewrite_base(content: &str, base: &str) -> String {
    let mut wrote_base = false;
    let mut lines: Vec<String> = content
        .split_inclusive('\n')
        .map(|line| {
            let body = line.trim_end_matches(['\n', '\r']);
            let ending = &line[body.len()..];
            match REWRITE_BASE.captures(body) {
                Some(caps) => {
                    let old = caps.get(1).map_or("", |m| m.as_str());
                    if old != base {
                        warn!("Replacing base \"{old}\" with \"{base}\"");
                    }
                    wrote_base = true;
                    format!("RewriteBase {base}{ending}")
                }
                None => line.to_string(),
            }
        })
        .collect();

    if !wrote_base {
        if let Some(first) = lines.first_mut() {
            if !first.ends_with('\n') {
                first.push('\n');
            }
        }
        let at = lines.len().min(1);
        lines.insert(at, format!("RewriteBase {base}\n"));
    }

    lines.concat()
}

/// True when a component of `relative` starts with a dot that the matching
/// component of `pattern` does not spell out, the way a shell glob skips
/// hidden files.
fn is_hidden(relative: &Path, pattern: &str) -> bool {
    let mut parts = pattern.split('/');
    relative.components().any(|c| {
        let explicit = parts.next().is_some_and(|p| p.starts_with('.'));
        c.as_os_str().to_string_lossy().starts_with('.') && !explicit
    })
}

fn file_glob(pattern: &str) -> Result<GlobMatcher> {
    Ok(GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// Drives one run of the generator.
pub struct Runner<'a> {
    options: &'a RunConfiguration,
    site: &'a SiteConfig,
    locales: LocaleSet,
    fs: &'a dyn FileSystem,
    transport: &'a dyn Transport,
    stage: Stage,
}

impl<'a> Runner<'a> {
    /// # Errors
    /// * `Error::InvalidLocaleSet` if the site's locales cannot be paired
    pub fn new(
        options: &'a RunConfiguration,
        site: &'a SiteConfig,
        fs: &'a dyn FileSystem,
        transport: &'a dyn Transport,
    ) -> Result<Self> {
        Ok(Self {
            options,
            site,
            locales: site.locale_set()?,
            fs,
            transport,
            stage: Stage::Idle,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Stage: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    fn staging(&self) -> &Path {
        &self.options.staging_dir
    }

    /// Absolute, symlink-free form of `path`, which need not exist yet: its
    /// nearest existing ancestor is canonicalized and the rest appended.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let absolute = std::path::absolute(path)?;
        let mut existing = absolute.as_path();
        let mut missing = Vec::new();
        while !self.fs.exists(existing) {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    missing.push(name.to_os_string());
                    existing = parent;
                }
                _ => break,
            }
        }

        let mut resolved = self.fs.canonicalize(existing)?;
        resolved.extend(missing.iter().rev());
        Ok(resolved)
    }

    /// Runs every stage and reports the outcome.
    ///
    /// # Errors
    /// * `Error::StagingResetFailed` if staging cannot be rebuilt
    /// * `Error::ConfigRewriteFailed` if the deploy configuration cannot be
    ///   produced
    ///
    /// Nothing is transferred after either of them.
    pub fn run<F: Formatter + ?Sized>(&mut self, formatter: &F) -> Result<RunReport> {
        let mut report = RunReport::new();

        self.enter(Stage::StagingReset);
        self.reset_staging()?;

        self.enter(Stage::Generating);
        let locales: Vec<Option<Locale>> = if self.locales.is_empty() {
            vec![None]
        } else {
            self.locales.iter().cloned().map(Some).collect()
        };
        for locale in &locales {
            self.generate_all(locale.as_ref(), formatter, &mut report);
        }

        self.enter(Stage::AssetCopy);
        report.asset_failures = self.copy_assets(&self.site.assets);

        self.enter(Stage::ConfigRewrite);
        self.rewrite_deploy_config(&self.site.deploy_config)?;

        self.enter(Stage::Transferring);
        report.transfer = self.transfer();

        self.enter(Stage::Done);
        Ok(report)
    }

    /// Deletes the staging directory if present and recreates it empty.
    ///
    /// # Errors
    /// * `Error::StagingResetFailed` if deletion or creation fails, or if the
    ///   staging directory is the source directory or one of its ancestors
    pub fn reset_staging(&self) -> Result<()> {
        let path = self.staging();
        let failed = |reason: String| Error::StagingResetFailed {
            path: path.to_path_buf(),
            reason,
        };

        if path.as_os_str().is_empty() {
            return Err(failed("empty staging path".to_string()));
        }
        let staging = self.resolve(path).map_err(|e| failed(e.to_string()))?;
        let source = self
            .resolve(&self.options.source_dir)
            .map_err(|e| failed(e.to_string()))?;
        if source.starts_with(&staging) {
            return Err(failed(format!(
                "refusing to delete {}, it holds the source directory",
                staging.display()
            )));
        }

        if self.fs.exists(path) {
            debug!("Removing staging directory {}", path.display());
            self.fs.remove_dir_all(path).map_err(|e| failed(e.to_string()))?;
        }
        self.fs.ensure_dir(path).map_err(|e| failed(e.to_string()))
    }

    /// Lists source pages for `locale`, sorted by path.
    ///
    /// Matches `*.<locale>.<ext>`, or `*.<ext>` without a locale, against the
    /// files directly inside the source directory. Hidden files are skipped.
    pub fn discover(&self, locale: Option<&Locale>) -> Result<Vec<PathBuf>> {
        let pattern = match locale {
            Some(l) => format!("*.{}.{}", l, self.site.extension),
            None => format!("*.{}", self.site.extension),
        };
        let matcher = file_glob(&pattern)?;

        let mut files: Vec<PathBuf> = self
            .fs
            .list_dir(&self.options.source_dir)?
            .into_iter()
            .filter(|p| !self.fs.is_dir(p))
            .filter(|p| {
                p.file_name().is_some_and(|n| {
                    matcher.is_match(n) && !is_hidden(Path::new(n), &pattern)
                })
            })
            .collect();
        files.sort();

        debug!("Discovered {} file(s) for '{}'", files.len(), pattern);
        Ok(files)
    }

    fn render_page<F: Formatter + ?Sized>(
        &self,
        locale: Option<&Locale>,
        file: &Path,
        formatter: &F,
    ) -> Result<PathBuf> {
        let source = SourceFile::parse(file, locale, &self.site.extension)?;
        let content = self.fs.read_to_string(&source.path)?;
        let page = PageContext::new(
            source.locale.as_ref(),
            &self.locales,
            source.basename,
            source.ext,
        )?;
        let rendered = page.wrap(&content, formatter)?;
        page.write_to(self.fs, self.staging(), &rendered)
    }

    /// Generates one page into staging.
    ///
    /// # Errors
    /// * `Error::FileGenerationFailed` wrapping whatever went wrong while
    ///   reading, formatting, checking or writing; it has already been logged
    pub fn generate<F: Formatter + ?Sized>(
        &self,
        locale: Option<&Locale>,
        file: &Path,
        formatter: &F,
    ) -> Result<PathBuf> {
        match self.render_page(locale, file, formatter) {
            Ok(target) => {
                debug!("Writing file: {}", target.display());
                Ok(target)
            }
            Err(e) => {
                let err = Error::FileGenerationFailed {
                    source_file: file.to_path_buf(),
                    reason: Box::new(e),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }

    fn generate_all<F: Formatter + ?Sized>(
        &self,
        locale: Option<&Locale>,
        formatter: &F,
        report: &mut RunReport,
    ) {
        let files = match self.discover(locale) {
            Ok(files) => files,
            Err(e) => {
                let err = Error::FileGenerationFailed {
                    source_file: self.options.source_dir.clone(),
                    reason: Box::new(e),
                };
                error!("{}", err);
                report.failures.push(err);
                return;
            }
        };

        for file in files {
            match self.generate(locale, &file, formatter) {
                Ok(target) => report.pages.push(target),
                Err(err) => report.failures.push(err),
            }
        }
    }

    fn copy_into_staging(&self, source: &Path) -> Result<()> {
        let name = source
            .file_name()
            .ok_or_else(|| Error::ConfigError(format!("no file name in {}", source.display())))?;
        let dest = self.staging().join(name);
        info!("Copying {} to {}", source.display(), dest.display());
        self.fs.copy_recursive(source, &dest)
    }

    fn expand_asset(&self, entry: &str) -> Result<Vec<PathBuf>> {
        if !entry.contains(GLOB_CHARS) {
            let path = self.options.source_dir.join(entry);
            if !self.fs.exists(&path) {
                return Err(Error::ConfigError("no such file or directory".to_string()));
            }
            return Ok(vec![path]);
        }

        let source_dir = &self.options.source_dir;
        let matcher = file_glob(entry)?;
        let source = self.resolve(source_dir)?;
        let staging = self.resolve(self.staging())?;
        let staging_inside = staging.strip_prefix(&source).ok();

        let mut paths = Vec::new();
        for path in self.fs.walk(source_dir)? {
            let Ok(relative) = path.strip_prefix(source_dir) else {
                continue;
            };
            if staging_inside.is_some_and(|s| relative.starts_with(s)) {
                continue;
            }
            if matcher.is_match(relative) && !is_hidden(relative, entry) {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            debug!("No files match '{}'", entry);
        }
        Ok(paths)
    }

    /// Copies each asset entry (a path or a glob) into the staging root.
    ///
    /// Returns the failures; they have been logged and did not stop the
    /// remaining copies.
    pub fn copy_assets(&self, entries: &[String]) -> Vec<Error> {
        let mut failures = Vec::new();
        let mut fail = |path: PathBuf, e: Error| {
            let err = Error::AssetCopyFailed {
                path,
                reason: e.to_string(),
            };
            warn!("{}", err);
            failures.push(err);
        };

        for entry in entries {
            let sources = match self.expand_asset(entry) {
                Ok(sources) => sources,
                Err(e) => {
                    fail(self.options.source_dir.join(entry), e);
                    continue;
                }
            };
            for source in sources {
                if let Err(e) = self.copy_into_staging(&source) {
                    fail(source, e);
                }
            }
        }
        failures
    }

    /// Produces the deploy configuration `name` in staging.
    ///
    /// In remote mode its `RewriteBase` is pointed at the configured remote
    /// base; otherwise the file is copied as is, or skipped if absent.
    ///
    /// # Errors
    /// * `Error::ConfigRewriteFailed` if the file cannot be read, rewritten or
    ///   copied, or remote mode lacks a remote base
    pub fn rewrite_deploy_config(&self, name: &str) -> Result<()> {
        let source = self.options.source_dir.join(name);
        let target = self.staging().join(name);
        let failed = |reason: String| Error::ConfigRewriteFailed {
            path: source.clone(),
            reason,
        };

        if !self.options.remote {
            if !self.fs.exists(&source) {
                debug!("No {} to copy", source.display());
                return Ok(());
            }
            info!("Copying {} to {}", source.display(), target.display());
            return self
                .fs
                .copy_recursive(&source, &target)
                .map_err(|e| failed(e.to_string()));
        }

        let base = self
            .options
            .remote_base
            .as_deref()
            .ok_or_else(|| failed("remote mode needs a remote base".to_string()))?;
        let content = self
            .fs
            .read_to_string(&source)
            .map_err(|e| failed(e.to_string()))?;

        debug!("Rewriting {} with base {}", source.display(), base);
        self.fs
            .write(&target, &rewrite_base(&content, base))
            .map_err(|e| failed(e.to_string()))
    }

    /// Runs the transfer command against the staging tree.
    ///
    /// The configured template runs through `sh -c` followed by `<staging>/`
    /// and the destination, so quoting in the template works as in a shell.
    /// Its output is logged; a failure is reported in the returned status,
    /// never raised.
    pub fn transfer(&self) -> TransferStatus {
        let Some(destination) = self.options.destination.as_deref() else {
            info!("No destination configured, skipping transfer");
            return TransferStatus::Skipped;
        };

        let template = self.options.transfer_command.trim();
        if template.is_empty() {
            let error = Error::TransferFailed {
                command: String::new(),
                reason: "empty transfer command".to_string(),
            };
            error!("{}", error);
            return TransferStatus::Failed {
                command: String::new(),
                output: None,
                error,
            };
        }

        let staging = self.staging().display().to_string();
        let staging = format!("{}/", staging.trim_end_matches('/'));
        let command = format!("{template} {staging} {destination}");
        let args = vec![
            "-c".to_string(),
            format!(r#"{template} "$1" "$2""#),
            env!("CARGO_PKG_NAME").to_string(),
            staging,
            destination.to_string(),
        ];

        info!("Running: {}", command);
        match self.transport.run(TRANSFER_SHELL, &args) {
            Ok(output) => {
                for line in output.stdout.lines() {
                    info!("{}", line);
                }
                for line in output.stderr.lines() {
                    warn!("{}", line);
                }

                if output.success() {
                    TransferStatus::Completed { command, output }
                } else {
                    let status = output
                        .code
                        .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit status {c}"));
                    let error = Error::TransferFailed {
                        command: command.clone(),
                        reason: status,
                    };
                    error!("{}", error);
                    TransferStatus::Failed {
                        command,
                        output: Some(output),
                        error,
                    }
                }
            }
            Err(e) => {
                let error = Error::TransferFailed {
                    command: command.clone(),
                    reason: e.to_string(),
                };
                error!("{}", error);
                TransferStatus::Failed {
                    command,
                    output: None,
                    error,
                }
            }
        }
    }
}

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use sitegen::config::{RunConfiguration, SiteConfig};
use sitegen::error::{Error, Result};
use sitegen::fs::{CommandTransport, FileSystem, LocalFileSystem, TransferOutput, Transport};
use sitegen::html::AssetDirs;
use sitegen::locale::Locale;
use sitegen::page::PageContext;
use sitegen::pipeline::{RunReport, Runner, Stage, TransferStatus};
use sitegen::renderer::LayoutFormatter;
use tempfile::TempDir;

/// Transport that records invocations instead of running anything.
struct RecordingTransport {
    calls: RefCell<Vec<(String, Vec<String>)>>,
    code: i32,
}

impl RecordingTransport {
    fn new(code: i32) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            code,
        }
    }
}

impl Transport for RecordingTransport {
    fn run(&self, program: &str, args: &[String]) -> Result<TransferOutput> {
        self.calls
            .borrow_mut()
            .push((program.to_string(), args.to_vec()));
        Ok(TransferOutput {
            code: Some(self.code),
            stdout: "sent 42 bytes\n".to_string(),
            stderr: String::new(),
        })
    }
}

/// File system whose staging directory can never be created.
struct NoStagingFileSystem;

impl FileSystem for NoStagingFileSystem {
    fn exists(&self, path: &Path) -> bool {
        LocalFileSystem.exists(path)
    }
    fn is_dir(&self, path: &Path) -> bool {
        LocalFileSystem.is_dir(path)
    }
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        LocalFileSystem.list_dir(dir)
    }
    fn walk(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        LocalFileSystem.walk(dir)
    }
    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        LocalFileSystem.canonicalize(path)
    }
    fn read_to_string(&self, path: &Path) -> Result<String> {
        LocalFileSystem.read_to_string(path)
    }
    fn write(&self, path: &Path, content: &str) -> Result<()> {
        LocalFileSystem.write(path, content)
    }
    fn ensure_dir(&self, _path: &Path) -> Result<()> {
        Err(Error::IoError(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        LocalFileSystem.remove_dir_all(path)
    }
    fn copy_recursive(&self, source: &Path, dest: &Path) -> Result<()> {
        LocalFileSystem.copy_recursive(source, dest)
    }
}

struct Fixture {
    _temp_dir: TempDir,
    options: RunConfiguration,
    site: SiteConfig,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let options = RunConfiguration {
            source_dir: temp_dir.path().join("site"),
            staging_dir: temp_dir.path().join("stage"),
            ..Default::default()
        };
        fs::create_dir_all(&options.source_dir).unwrap();
        let site = SiteConfig {
            assets: Vec::new(),
            ..Default::default()
        };
        Self {
            _temp_dir: temp_dir,
            options,
            site,
        }
    }

    fn source(&self, name: &str, content: &str) {
        let path = self.options.source_dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn staged(&self, name: &str) -> PathBuf {
        self.options.staging_dir.join(name)
    }
}

fn uppercase(_: &PageContext, content: &str) -> Result<String> {
    Ok(content.to_uppercase())
}

fn identity(_: &PageContext, content: &str) -> Result<String> {
    Ok(content.to_string())
}

fn fail_on_boom(_: &PageContext, content: &str) -> Result<String> {
    if content.contains("boom") {
        Err(Error::ConfigError("formatter exploded".to_string()))
    } else {
        Ok(content.to_string())
    }
}

#[test_log::test]
fn test_end_to_end_two_locales() {
    let fx = Fixture::new();
    fx.source("index.de.html", "hallo welt");
    fx.source("index.us.html", "hello world");
    fx.source("notes.txt", "not a page");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&uppercase).unwrap();

    assert_eq!(runner.stage(), Stage::Done);
    assert!(report.is_clean());
    assert_eq!(
        report.pages,
        vec![fx.staged("de/index.html"), fx.staged("us/index.html")]
    );

    let expected = TempDir::new().unwrap();
    fs::create_dir_all(expected.path().join("de")).unwrap();
    fs::create_dir_all(expected.path().join("us")).unwrap();
    fs::write(expected.path().join("de/index.html"), "HALLO WELT").unwrap();
    fs::write(expected.path().join("us/index.html"), "HELLO WORLD").unwrap();
    assert!(!dir_diff::is_different(&fx.options.staging_dir, expected.path()).unwrap());

    assert!(matches!(report.transfer, TransferStatus::Skipped));
    assert!(transport.calls.borrow().is_empty());
}

#[test_log::test]
fn test_one_bad_page_does_not_abort_the_batch() {
    let fx = Fixture::new();
    fx.source("a.de.html", "boom");
    fx.source("b.de.html", "fine");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&fail_on_boom).unwrap();

    assert_eq!(report.pages, vec![fx.staged("de/b.html")]);
    assert!(!fx.staged("de/a.html").exists());
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        Error::FileGenerationFailed { source_file, reason } => {
            assert_eq!(source_file, &fx.options.source_dir.join("a.de.html"));
            assert!(matches!(**reason, Error::ConfigError(_)));
        }
        other => panic!("Expected FileGenerationFailed, got {other:?}"),
    }
}

#[test]
fn test_forbidden_markup_fails_only_that_page() {
    let fx = Fixture::new();
    fx.source("index.de.html", "<?php echo 1; ?>");
    fx.source("index.us.html", "clean");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&identity).unwrap();

    assert_eq!(report.pages, vec![fx.staged("us/index.html")]);
    assert_eq!(report.failures.len(), 1);
    let message = report.failures[0].to_string();
    assert!(message.contains("index.de.html"));
    assert!(message.contains("<?php echo 1; ?>"));
}

#[test]
fn test_reset_staging_removes_stale_files() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.staged("old")).unwrap();
    fs::write(fx.staged("old/stale.html"), "stale").unwrap();
    fs::write(fx.staged("stale.css"), "stale").unwrap();

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.reset_staging().unwrap();

    assert!(fx.options.staging_dir.is_dir());
    assert_eq!(fs::read_dir(&fx.options.staging_dir).unwrap().count(), 0);
}

#[test]
fn test_reset_staging_refuses_source_dir() {
    let mut fx = Fixture::new();
    fx.source("index.de.html", "keep me");
    fx.options.staging_dir = fx.options.source_dir.join(".");

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    assert!(matches!(
        runner.reset_staging(),
        Err(Error::StagingResetFailed { .. })
    ));
    assert!(fx.options.source_dir.join("index.de.html").exists());
}

#[test]
fn test_reset_staging_refuses_source_dir_spelled_differently() {
    let mut fx = Fixture::new();
    fx.source("index.de.html", "keep me");
    let source = fx.options.source_dir.clone();
    fx.options.staging_dir = source.join("../site");

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    assert!(matches!(
        runner.reset_staging(),
        Err(Error::StagingResetFailed { .. })
    ));
    assert!(source.join("index.de.html").exists());

    fx.options.source_dir = source.join("../site/.");
    fx.options.staging_dir = fs::canonicalize(&source).unwrap();
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    assert!(matches!(
        runner.reset_staging(),
        Err(Error::StagingResetFailed { .. })
    ));
    assert!(source.join("index.de.html").exists());
}

#[test]
fn test_reset_staging_refuses_ancestor_of_source() {
    let mut fx = Fixture::new();
    fx.source("index.de.html", "keep me");
    fx.options.staging_dir = fx.options.source_dir.parent().unwrap().to_path_buf();

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let err = runner.run(&identity).unwrap_err();

    assert!(matches!(err, Error::StagingResetFailed { .. }));
    assert!(fx.options.source_dir.join("index.de.html").exists());
}

#[test]
fn test_staging_inside_source_is_allowed() {
    let mut fx = Fixture::new();
    fx.source("index.de.html", "hallo");
    fx.source("site.css", "body {}");
    fx.site.assets = vec!["*".to_string()];
    fx.options.staging_dir = fx.options.source_dir.join("out");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&identity).unwrap();

    assert!(report.asset_failures.is_empty());
    assert!(fx.staged("de/index.html").exists());
    assert!(fx.staged("site.css").exists());
    assert!(!fx.staged("out").exists());
}

#[test]
fn test_staging_failure_is_fatal() {
    let mut fx = Fixture::new();
    fx.source("index.de.html", "x");
    fx.options.destination = Some("dest".to_string());

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &NoStagingFileSystem, &transport).unwrap();
    let err = runner.run(&identity).unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, Error::StagingResetFailed { .. }));
    assert_eq!(runner.stage(), Stage::StagingReset);
    assert!(transport.calls.borrow().is_empty());
}

#[test]
fn test_discover_is_sorted_and_skips_directories() {
    let fx = Fixture::new();
    fx.source("zeta.de.html", "");
    fx.source("alpha.de.html", "");
    fx.source("alpha.us.html", "");
    fs::create_dir_all(fx.options.source_dir.join("dir.de.html")).unwrap();

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let de = Locale::new("de").unwrap();
    let found = runner.discover(Some(&de)).unwrap();

    assert_eq!(
        found,
        vec![
            fx.options.source_dir.join("alpha.de.html"),
            fx.options.source_dir.join("zeta.de.html"),
        ]
    );
}

#[test]
fn test_discover_skips_hidden_files() {
    let fx = Fixture::new();
    fx.source("index.de.html", "hallo");
    fx.source(".draft.de.html", "unfertig");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let de = Locale::new("de").unwrap();
    assert_eq!(
        runner.discover(Some(&de)).unwrap(),
        vec![fx.options.source_dir.join("index.de.html")]
    );

    let report = runner.run(&identity).unwrap();
    assert_eq!(report.pages, vec![fx.staged("de/index.html")]);
    assert!(!fx.staged("de/.draft.html").exists());
}

#[test]
fn test_without_locales() {
    let mut fx = Fixture::new();
    fx.site.locales = Vec::new();
    fx.source("index.html", "home");
    fx.source("about.html", "about");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&uppercase).unwrap();

    assert_eq!(
        report.pages,
        vec![fx.staged("about.html"), fx.staged("index.html")]
    );
    assert_eq!(fs::read_to_string(fx.staged("index.html")).unwrap(), "HOME");
}

#[test]
fn test_write_to_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let de = Locale::new("de").unwrap();
    let page = PageContext::new(Some(&de), &Default::default(), "index", "html").unwrap();

    let path = page.write_to(&LocalFileSystem, temp_dir.path(), "first").unwrap();
    assert_eq!(path, temp_dir.path().join("de/index.html"));
    page.write_to(&LocalFileSystem, temp_dir.path(), "second").unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "second");
}

#[test_log::test]
fn test_copy_assets() {
    let fx = Fixture::new();
    fx.source("style.css", "body {}");
    fx.source("print.css", "@media print {}");
    fx.source("images/logo.png", "png");
    fx.source("images/icons/home.svg", "svg");

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.reset_staging().unwrap();
    let entries = vec!["*.css".to_string(), "images".to_string(), "js".to_string()];
    let failures = runner.copy_assets(&entries);

    assert_eq!(failures.len(), 1);
    match &failures[0] {
        Error::AssetCopyFailed { path, .. } => assert_eq!(path, &fx.options.source_dir.join("js")),
        other => panic!("Expected AssetCopyFailed, got {other:?}"),
    }
    assert_eq!(fs::read_to_string(fx.staged("style.css")).unwrap(), "body {}");
    assert!(fx.staged("print.css").exists());
    assert_eq!(fs::read_to_string(fx.staged("images/icons/home.svg")).unwrap(), "svg");
}

#[test]
fn test_copy_assets_glob_in_subdirectory() {
    let fx = Fixture::new();
    fx.source("css/site.css", "body {}");
    fx.source("css/print.css", "@media print {}");
    fx.source("css/.backup.css", "old");
    fx.source("css/readme.txt", "notes");
    fx.source("top.css", "top");

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.reset_staging().unwrap();
    let failures = runner.copy_assets(&["css/*.css".to_string()]);

    assert!(failures.is_empty());
    assert_eq!(fs::read_to_string(fx.staged("site.css")).unwrap(), "body {}");
    assert!(fx.staged("print.css").exists());
    assert!(!fx.staged(".backup.css").exists());
    assert!(!fx.staged("readme.txt").exists());
    assert!(!fx.staged("top.css").exists());
}

#[test]
fn test_copy_assets_skips_hidden_unless_named() {
    let fx = Fixture::new();
    fx.source("site.css", "body {}");
    fx.source(".old.css", "old");
    fx.source(".htpasswd", "secret");

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.reset_staging().unwrap();

    assert!(runner.copy_assets(&["*.css".to_string()]).is_empty());
    assert!(fx.staged("site.css").exists());
    assert!(!fx.staged(".old.css").exists());

    assert!(runner.copy_assets(&[".ht*".to_string()]).is_empty());
    assert!(fx.staged(".htpasswd").exists());
}

#[test_log::test]
fn test_remote_rewrite_replaces_base() {
    let mut fx = Fixture::new();
    fx.options.remote = true;
    fx.options.remote_base = Some("/new".to_string());
    let original = "RewriteEngine On\nRewriteBase /old\nRewriteRule ^(.*)$ index.html\n";
    fx.source(".htaccess", original);

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.run(&identity).unwrap();

    let staged = fs::read_to_string(fx.staged(".htaccess")).unwrap();
    assert!(staged.contains("RewriteBase /new\n"));
    assert!(!staged.contains("/old"));
    assert_eq!(
        fs::read_to_string(fx.options.source_dir.join(".htaccess")).unwrap(),
        original
    );
}

#[test]
fn test_remote_rewrite_inserts_missing_base() {
    let mut fx = Fixture::new();
    fx.options.remote = true;
    fx.options.remote_base = Some("/~me/site".to_string());
    fx.source(".htaccess", "RewriteEngine On\nRewriteRule ^(.*)$ index.html\n");

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.reset_staging().unwrap();
    runner.rewrite_deploy_config(".htaccess").unwrap();

    let staged = fs::read_to_string(fx.staged(".htaccess")).unwrap();
    let lines: Vec<&str> = staged.lines().collect();
    assert_eq!(lines[1], "RewriteBase /~me/site");
    assert_eq!(staged.matches("RewriteBase").count(), 1);
}

#[test]
fn test_remote_rewrite_failure_is_fatal() {
    let mut fx = Fixture::new();
    fx.options.remote = true;
    fx.options.remote_base = Some("/new".to_string());
    fx.options.destination = Some("host:/var/www".to_string());
    fx.source("index.de.html", "x");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let err = runner.run(&identity).unwrap_err();

    assert!(matches!(err, Error::ConfigRewriteFailed { .. }));
    assert!(err.is_fatal());
    assert_eq!(runner.stage(), Stage::ConfigRewrite);
    assert!(transport.calls.borrow().is_empty());
}

#[test]
fn test_remote_rewrite_needs_base() {
    let mut fx = Fixture::new();
    fx.options.remote = true;
    fx.source(".htaccess", "RewriteBase /old\n");

    let transport = RecordingTransport::new(0);
    let runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.reset_staging().unwrap();
    assert!(matches!(
        runner.rewrite_deploy_config(".htaccess"),
        Err(Error::ConfigRewriteFailed { .. })
    ));
}

#[test]
fn test_local_mode_copies_deploy_config_verbatim() {
    let fx = Fixture::new();
    fx.source(".htaccess", "RewriteBase /old\n");

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    runner.run(&identity).unwrap();

    assert_eq!(
        fs::read_to_string(fx.staged(".htaccess")).unwrap(),
        "RewriteBase /old\n"
    );
}

#[test]
fn test_transfer_command_line() {
    let mut fx = Fixture::new();
    fx.options.destination = Some("user@host:/var/www".to_string());
    fx.options.transfer_command = "rsync -a --delete".to_string();

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&identity).unwrap();

    let staging = format!("{}/", fx.options.staging_dir.display());
    let calls = transport.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "sh");
    assert_eq!(
        calls[0].1,
        vec![
            "-c".to_string(),
            r#"rsync -a --delete "$1" "$2""#.to_string(),
            "sitegen".to_string(),
            staging.clone(),
            "user@host:/var/www".to_string(),
        ]
    );
    match &report.transfer {
        TransferStatus::Completed { command, output } => {
            assert_eq!(command, &format!("rsync -a --delete {staging} user@host:/var/www"));
            assert_eq!(output.stdout, "sent 42 bytes\n");
        }
        other => panic!("Expected Completed, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn test_transfer_keeps_quoted_arguments() {
    let mut fx = Fixture::new();
    fx.options.destination = Some("me@host:/var/www".to_string());
    fx.options.transfer_command = r#"printf '[%s]\n' -e "ssh -p 2222""#.to_string();

    let transport = CommandTransport::new();
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&identity).unwrap();

    match &report.transfer {
        TransferStatus::Completed { output, .. } => assert_eq!(
            output.stdout,
            format!(
                "[-e]\n[ssh -p 2222]\n[{}/]\n[me@host:/var/www]\n",
                fx.options.staging_dir.display()
            )
        ),
        other => panic!("Expected Completed, got {other:?}"),
    }
}

#[test]
fn test_failed_transfer_is_reported_not_raised() {
    let mut fx = Fixture::new();
    fx.options.destination = Some("/srv/www".to_string());

    let transport = RecordingTransport::new(23);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&identity).unwrap();

    assert!(!report.is_clean());
    match report.transfer {
        TransferStatus::Failed { output, error, .. } => {
            assert_eq!(output.and_then(|o| o.code), Some(23));
            assert!(matches!(error, Error::TransferFailed { .. }));
            assert!(!error.is_fatal());
        }
        other => panic!("Expected Failed, got {other:?}"),
    }
}

#[test]
fn test_report_summary() {
    let mut fx = Fixture::new();
    fx.source("index.de.html", "hallo");
    fx.source("index.us.html", "boom");
    fx.site.assets = vec!["js".to_string()];
    fx.options.destination = Some("/srv/www".to_string());

    let transport = RecordingTransport::new(23);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&fail_on_boom).unwrap();
    let summary = report.to_string();

    assert!(summary.starts_with("Generated 1 page(s).\n1 page(s) failed:\n"));
    assert!(summary.contains("1 asset(s) failed:\n  Could not copy "));
    assert!(summary.contains("Transfer failed: "));
    assert!(summary.ends_with("exit status 23\n  sent 42 bytes\n"));

    let report = RunReport {
        pages: Vec::new(),
        failures: Vec::new(),
        asset_failures: Vec::new(),
        transfer: TransferStatus::Completed {
            command: "rsync -a .gen/ out".to_string(),
            output: TransferOutput {
                code: Some(0),
                stdout: "sent 42 bytes\n".to_string(),
                stderr: "warning: slow\n".to_string(),
            },
        },
    };
    assert_eq!(
        report.to_string(),
        "Generated 0 page(s).\nTransferred: 'rsync -a .gen/ out'\n  sent 42 bytes\n  stderr: warning: slow\n"
    );
}

#[test]
fn test_layout_formatter_end_to_end() {
    let fx = Fixture::new();
    fx.source("index.de.html", "<p>Hallo</p>");
    fx.source("index.us.html", "<p>Hello</p>");

    let layout = "<html lang=\"{{ locale }}\">{{ tag(\"a\", {\"href\": \"../\" ~ other_url}, other_locale) }}{{ content }}</html>";
    let formatter =
        LayoutFormatter::new(layout.to_string(), AssetDirs::default(), false, None).unwrap();

    let transport = RecordingTransport::new(0);
    let mut runner = Runner::new(&fx.options, &fx.site, &LocalFileSystem, &transport).unwrap();
    let report = runner.run(&formatter).unwrap();

    assert!(report.is_clean());
    assert_eq!(
        fs::read_to_string(fx.staged("de/index.html")).unwrap(),
        "<html lang=\"de\"><a href=\"../us/index.html\">us</a>\n<p>Hallo</p></html>"
    );
}

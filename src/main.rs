//! sitegen's main application entry point.
//! Parses arguments, loads the site configuration and layout, runs the
//! pipeline and prints a summary of the run.

use sitegen::{
    cli::{get_args, Args},
    config::get_config,
    error::{default_error_handler, Error, Result},
    fs::{CommandTransport, LocalFileSystem},
    pipeline::Runner,
    renderer::LayoutFormatter,
};

/// Main application entry point.
fn main() {
    let args = get_args();

    // Logger configuration
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

/// Main application logic execution.
///
/// # Flow
/// 1. Loads the site configuration from the source directory
/// 2. Reads the layout template and builds the formatter
/// 3. Runs the pipeline
/// 4. Prints the run report
fn run(args: Args) -> Result<()> {
    let options = args.run_configuration();
    let mut site = get_config(&options.source_dir)?;
    if let Some(layout) = args.layout {
        site.layout = layout;
    }

    let layout_path = options.source_dir.join(&site.layout);
    let layout = std::fs::read_to_string(&layout_path).map_err(|e| {
        Error::ConfigError(format!("Could not read layout {}: {}", layout_path.display(), e))
    })?;
    let formatter = LayoutFormatter::new(
        layout,
        site.dirs.clone(),
        options.analytics,
        site.analytics_account.clone(),
    )?;

    let fs = LocalFileSystem::new();
    let transport = CommandTransport::new();
    let mut runner = Runner::new(&options, &site, &fs, &transport)?;
    let report = runner.run(&formatter)?;

    print!("{}", report);
    Ok(())
}

use colored::Colorize;
use util::{Categorize, ErrorCategory};

/// High-level command line app
mod app;
/// Definition of command-line args
mod args;
/// Splitting pipeline arguments and task blocks
mod cmdline;
/// Writing Makefiles
mod emit;
/// Running make
mod exec;
/// Graphviz and parameter set exports
mod export;
/// Filesystem operations
mod fs;
/// Combined command-line run settings
mod settings;
/// Text UI
mod ui;

// exported for tests:
pub use app::{App, Outcome};
pub use args::Args;
pub use cmdline::split_pipeline_args;
pub use settings::Settings;

/// Run the command-line app.
pub fn run() -> Result<(), anyhow::Error> {
    use clap::Parser;
    let args = Args::parse();

    // INTERPRET SETTINGS ///////////////
    let settings: Settings = args.try_into()?;

    let log_level = match settings.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    simple_logging::log_to_stderr(log_level);

    // RUN THE THING /////////////////
    let app = App::new(settings);
    app.run()?;

    Ok(())
}

/// The category of the outermost error in the chain that has one.
pub fn error_category(err: &anyhow::Error) -> Option<ErrorCategory> {
    err.chain().find_map(|cause| {
        macro_rules! try_category {
            ($($ty:ty),* $(,)?) => {
                $(if let Some(e) = cause.downcast_ref::<$ty>() {
                    return Some(e.category());
                })*
            };
        }
        try_category!(
            config::Error,
            workflow::Error,
            graph::Error,
            cmdline::Error,
            settings::Error,
            emit::Error,
            exec::Error,
            fs::Error,
        );
        None
    })
}

/// Print an error with its context chain, and return the exit code for it.
pub fn report(err: &anyhow::Error) -> i32 {
    let category = error_category(err);
    let label = category.map_or("error", |c| c.label());
    eprintln!("{} {label}: {err}", "ERROR:".red());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {cause}", "caused by:".dimmed());
    }
    category.map_or(1, ErrorCategory::exit_code)
}

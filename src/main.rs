//! upgrade-preflight CLI entry point
//!
//! Validates cluster health before and after a disruptive upgrade.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};
use upgrade_preflight::cli::args::{CheckArgs, Cli, Command, ListArgs};
use upgrade_preflight::cli::{self, EXIT_ERROR};
use upgrade_preflight::config::ValidationConfig;
use upgrade_preflight::engine::cancel::cancellation;
use upgrade_preflight::events::{EventSink, JsonLinesSink, NullSink};
use upgrade_preflight::output::store::ReportStore;
use upgrade_preflight::output::{ConsoleFormatter, Renderer};
use upgrade_preflight::session::{Session, StorageOutcome};
use upgrade_preflight::version::get_build_info;
use upgrade_preflight::{logging, CheckRegistry};

#[tokio::main]
async fn main() -> ExitCode {
    match Cli::parse().into_command() {
        Command::Version => {
            println!("{}", get_build_info());
            ExitCode::SUCCESS
        }
        Command::List(args) => print_check_list(&args),
        Command::Check(args) => run_checks(args).await,
    }
}

fn print_check_list(args: &ListArgs) -> ExitCode {
    let mut config = match &args.config {
        Some(path) => match ValidationConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        },
        None => ValidationConfig::default(),
    };
    if !args.category.is_empty() {
        config.categories = args.category.clone();
    }

    match CheckRegistry::standard(&config) {
        Ok(registry) => {
            print!("{}", cli::format_check_list(&registry, args.mode));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run_checks(args: CheckArgs) -> ExitCode {
    logging::init(args.log_json, args.verbose);

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let targets = match cli::build_targets(&args, &config) {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let output_dir = config.output_dir.clone();
    let session = match Session::new(config) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling remaining checks");
            handle.cancel();
        }
    });

    let sink: Arc<dyn EventSink> = match &args.event_file {
        Some(path) => Arc::new(JsonLinesSink::new(path)),
        None => Arc::new(NullSink),
    };
    let renderer = Renderer::new(
        ConsoleFormatter::new(!args.no_color, args.verbose, args.quiet),
        args.format.formatter(),
    );
    let session = session
        .with_renderer(renderer)
        .with_store(ReportStore::new(output_dir))
        .with_sink(sink)
        .with_cancellation(signal);

    let mut outcomes = Vec::new();
    let mut task_failed = false;
    for result in session.run_clusters(targets, args.mode).await {
        match result {
            Ok(runs) => {
                for run in runs {
                    println!("{}", run.rendered.console);
                    match &run.storage {
                        StorageOutcome::Written(paths) if !args.quiet => {
                            println!("Report: {}", paths.document.display());
                        }
                        StorageOutcome::Failed(e) => eprintln!("Error: {}", e),
                        _ => {}
                    }
                    outcomes.push(run);
                }
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                task_failed = true;
            }
        }
    }

    ExitCode::from(cli::exit_code(&outcomes, task_failed))
}

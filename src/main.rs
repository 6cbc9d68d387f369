use oneplay::cli::Args;
use oneplay::config::{self, CoordinatorConfig};
use oneplay::core::coordinator::PresentationCoordinator;
use oneplay::core::event_bus::SessionEvent;
use oneplay::script::{self, Step, StepResult};
use oneplay::sim::SimEngineFactory;

use clap::Parser;
use log::{debug, info, warn};
use std::time::Duration;

/// Time allowed for late engine messages after the last step.
const SETTLE: Duration = Duration::from_millis(100);

fn init_logging(args: &Args, path_config: &config::PathConfig) -> anyhow::Result<()> {
    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        // File logging with specified verbosity level
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));

        let file = std::fs::File::create(&log_path)
            .map_err(|e| anyhow::anyhow!("Failed to create log file {}: {}", log_path.display(), e))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn print_result(index: usize, step: &Step, result: &StepResult) {
    let detail = match result {
        StepResult::Command(outcome) if outcome.is_ignored() => format!(" -> {:?}", outcome),
        StepResult::Command(_) => String::new(),
        StepResult::Drag(res) => format!(" -> {:?}", res),
        StepResult::Waited(n) => format!(" ({} engine messages)", n),
    };
    println!("#{:02} {:?}{}", index, step, detail);
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());

    // Ensure directories exist
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logging(&args, &path_config)?;

    info!("Oneplay coordinator starting...");
    debug!("Command-line args: {:?}", args);

    let config_path = config::config_file(config::CONFIG_FILE, &path_config);
    info!("Config path: {}", config_path.display());
    let coordinator_config = CoordinatorConfig::load(&config_path).unwrap_or_else(|e| {
        warn!("{:#}, using defaults", e);
        CoordinatorConfig::default()
    });

    let steps = match &args.script {
        Some(path) => script::load_script(path)?,
        None => {
            info!("No script given, running built-in demo");
            script::parse_script(script::DEMO_SCRIPT)?
        }
    };

    let mut coord = PresentationCoordinator::new(Box::new(SimEngineFactory::new()), coordinator_config);
    if args.events {
        coord.subscribe(|event| match event {
            SessionEvent::SessionChanged(_) => {}
            other => println!("     event: {:?}", other),
        });
    }

    for (i, step) in steps.iter().enumerate() {
        let result = script::apply(&mut coord, step);
        print_result(i, step, &result);
        println!("     {}", script::describe(&coord.state()));
    }

    script::wait(&mut coord, SETTLE);
    println!("final: {}", script::describe(&coord.state()));
    coord.close();
    info!("Done");
    Ok(())
}

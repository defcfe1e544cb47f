//! FlowRunner CLI Entry Point
//!
//! Provides command-line interface for workflow execution.
//!
//! # Usage
//!
//! ```bash
//! # Execute a workflow
//! flowrunner milestone.yaml
//!
//! # Resolve data files relative to another directory
//! flowrunner milestone.yaml --working-dir /path/to/data
//!
//! # Shorten delays and print the timeline afterwards
//! flowrunner milestone.yaml --delay-unit-ms 10 --timeline
//!
//! # Write the log and a JSON trace to files
//! flowrunner milestone.yaml --log-file run.log --trace-json trace.json
//! ```

use std::env;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use colored::Colorize;
use log::{error, info};

use flowrunner::execution::Engine;
use flowrunner::workflow::parser::load_workflow;
use flowrunner::{APP_NAME, VERSION};

/// Default workflow file used when none is specified.
const DEFAULT_WORKFLOW: &str = "workflow.yaml";

/// Default length of one Delay unit, in milliseconds.
const DEFAULT_DELAY_UNIT_MS: u64 = 1000;

/// Timestamp prefix of every log line.
const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Command-line configuration parsed from arguments.
#[derive(Debug, PartialEq)]
struct Config {
    workflow_path: String,
    working_dir: Option<PathBuf>,
    delay_unit_ms: u64,
    log_file: Option<PathBuf>,
    show_timeline: bool,
    trace_json: Option<PathBuf>,
    verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow_path: DEFAULT_WORKFLOW.to_string(),
            working_dir: None,
            delay_unit_ms: DEFAULT_DELAY_UNIT_MS,
            log_file: None,
            show_timeline: false,
            trace_json: None,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
///
/// Every line is prefixed with a local timestamp. With a log file, the
/// stream goes there instead of stderr.
fn setup_logging(verbose: bool, log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose { "debug" } else { "info" };

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format(|buf, record| {
        use std::io::Write;

        let timestamp = chrono::Local::now().format(LOG_TIMESTAMP_FORMAT);
        writeln!(buf, "{}", log_line(timestamp, record.level(), record.args()))
    });

    if let Some(path) = log_file {
        let file = File::create(path)
            .map_err(|e| format!("Could not create log file '{}': {}", path.display(), e))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Formats one log line as `<timestamp>;<message>`.
fn log_line(timestamp: impl fmt::Display, level: log::Level, message: impl fmt::Display) -> String {
    match level {
        log::Level::Warn | log::Level::Error => format!("{};[{}] {}", timestamp, level, message),
        _ => format!("{};{}", timestamp, message),
    }
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Workflow Tree Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: flowrunner [OPTIONS] <WORKFLOW_FILE>");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW_FILE>       Path to workflow YAML file");
    println!();
    println!("Options:");
    println!("  --working-dir PATH    Set working directory for file operations");
    println!(
        "  --delay-unit-ms N     Length of one Delay unit in ms (default: {})",
        DEFAULT_DELAY_UNIT_MS
    );
    println!("  --log-file PATH       Write the log to a file instead of stderr");
    println!("  --timeline            Print the execution timeline when done");
    println!("  --trace-json PATH     Save the execution timeline as JSON");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Examples:");
    println!("  flowrunner milestone.yaml");
    println!("  flowrunner milestone.yaml --delay-unit-ms 10 --timeline");
    println!("  flowrunner milestone.yaml --working-dir /data --log-file run.log");
}

/// Returns the value following an option, advancing the cursor.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires an argument", option))
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--timeline" => {
                config.show_timeline = true;
            }
            "--working-dir" => {
                config.working_dir = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--log-file" => {
                config.log_file = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--trace-json" => {
                config.trace_json = Some(PathBuf::from(option_value(args, &mut i, arg)?));
            }
            "--delay-unit-ms" => {
                let value = option_value(args, &mut i, arg)?;
                config.delay_unit_ms = value
                    .parse()
                    .map_err(|_| format!("Invalid delay unit: {}", value))?;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => config.workflow_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(config)
}

/// Validates and switches to the working directory.
fn setup_working_directory(working_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(dir) = working_dir else {
        let current = env::current_dir()?;
        info!("Working directory: {}", current.display());
        return Ok(());
    };

    if !dir.exists() {
        return Err(format!("Working directory does not exist: {}", dir.display()).into());
    }

    if !dir.is_dir() {
        return Err(format!("Path is not a directory: {}", dir.display()).into());
    }

    // Relative paths in the workflow resolve against this directory
    env::set_current_dir(&dir)?;
    info!("Working directory: {}", env::current_dir()?.display());

    Ok(())
}

/// Prints and exports the timeline as configured.
fn report_timeline(engine: &Engine, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.show_timeline {
        println!();
        println!("{}", engine.timeline().gantt_chart());
    }

    if let Some(ref path) = config.trace_json {
        engine.timeline().save_json(path)?;
    }

    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose, config.log_file.as_deref())?;

    // Print banner
    print_banner();

    // The workflow path is taken relative to the directory we started in
    let workflow_path = env::current_dir()?.join(&config.workflow_path);
    setup_working_directory(config.working_dir.clone())?;

    // Load workflow
    let workflow = load_workflow(&workflow_path).map_err(|e| {
        error!("Failed to load workflow: {}", e);
        format!(
            "Could not load workflow from '{}': {}",
            config.workflow_path, e
        )
    })?;

    info!(
        "Workflow loaded: {} nodes, {} tasks",
        workflow.node_count(),
        workflow.task_count()
    );

    // Create and configure engine
    let mut engine = Engine::new(workflow);
    engine.set_delay_unit(Duration::from_millis(config.delay_unit_ms));

    // Execute workflow
    let result = engine.run();
    report_timeline(&engine, &config)?;
    result?;

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => {
            println!();
            println!("{}", "Workflow completed successfully".green().bold());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("flowrunner")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_log_line_format() {
        let timestamp = "2026-10-19 12:00:00.000001";
        assert_eq!(
            log_line(timestamp, log::Level::Info, "root.Load Entry"),
            "2026-10-19 12:00:00.000001;root.Load Entry"
        );
        assert_eq!(
            log_line(timestamp, log::Level::Error, "root failed"),
            "2026-10-19 12:00:00.000001;[ERROR] root failed"
        );
    }

    #[test]
    fn test_default_config() {
        let config = parse_arguments(&args(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.delay_unit_ms, DEFAULT_DELAY_UNIT_MS);
    }

    #[test]
    fn test_parse_all_options() {
        let config = parse_arguments(&args(&[
            "milestone.yaml",
            "--working-dir",
            "/data",
            "--delay-unit-ms",
            "10",
            "--log-file",
            "run.log",
            "--timeline",
            "--trace-json",
            "trace.json",
            "-v",
        ]))
        .unwrap();

        assert_eq!(config.workflow_path, "milestone.yaml");
        assert_eq!(config.working_dir, Some(PathBuf::from("/data")));
        assert_eq!(config.delay_unit_ms, 10);
        assert_eq!(config.log_file, Some(PathBuf::from("run.log")));
        assert!(config.show_timeline);
        assert_eq!(config.trace_json, Some(PathBuf::from("trace.json")));
        assert!(config.verbose);
    }

    #[test]
    fn test_missing_option_value() {
        let err = parse_arguments(&args(&["--working-dir"])).unwrap_err();
        assert!(err.contains("--working-dir"));
    }

    #[test]
    fn test_invalid_delay_unit() {
        assert!(parse_arguments(&args(&["--delay-unit-ms", "fast"])).is_err());
    }

    #[test]
    fn test_unknown_option_and_extra_argument() {
        assert!(parse_arguments(&args(&["--parallel"])).is_err());
        assert!(parse_arguments(&args(&["a.yaml", "b.yaml"])).is_err());
    }
}

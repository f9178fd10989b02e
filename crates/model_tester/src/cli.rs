//! Command-line interface handling for the model tester.
//!
//! Arguments given here override the matching values in `tester.toml`.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the tester's own configuration file
    pub config_path: PathBuf,
    /// Optional override for the settings file the models bind to
    pub store_path: Option<PathBuf>,
    /// Optional override for the settings file used by the profile switch
    pub profile_path: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Bind against a file that is never written to disk
    pub in_memory: bool,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    ///
    /// Every argument has a default or is optional, so this only exits on
    /// `--help`, `--version` or malformed input.
    pub fn parse() -> Self {
        Self::from_matches(Self::command().get_matches())
    }

    fn command() -> Command {
        Command::new("Config Model Tester")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Binds the example configuration models and logs what they read")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Tester configuration file path")
                    .default_value("tester.toml"),
            )
            .arg(
                Arg::new("store")
                    .short('s')
                    .long("store")
                    .value_name("FILE")
                    .help("Settings file the models bind to"),
            )
            .arg(
                Arg::new("profile")
                    .short('p')
                    .long("profile")
                    .value_name("FILE")
                    .help("Second settings file used for the profile switch"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .arg(
                Arg::new("in-memory")
                    .long("in-memory")
                    .help("Keep every settings file in memory instead of on disk")
                    .action(clap::ArgAction::SetTrue),
            )
    }

    fn from_matches(matches: clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tester.toml")),
            store_path: matches.get_one::<String>("store").map(PathBuf::from),
            profile_path: matches.get_one::<String>("profile").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            in_memory: matches.get_flag("in-memory"),
        }
    }
}

//! # Config Model Tester
//!
//! Binds a set of example models to a settings file and logs what each of
//! them reads, covering declarative models, attribute-driven models with
//! hooks, process-wide static members, config arrays and profile switching.
//!
//! ```bash
//! # Run with default configuration
//! model_tester
//!
//! # Bind against a specific settings file
//! model_tester --store plugin.cfg --profile plugin_profile2.cfg
//!
//! # Keep everything in memory and print JSON logs
//! model_tester --in-memory --json-logs
//! ```
//!
//! The tester reads its own settings from `tester.toml` (created with
//! defaults when missing). Command-line flags override the file.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod models;

use app::Application;
use cli::CliArgs;
use config::TesterConfig;

/// Runs the tester from the command line.
///
/// # Exit Codes
///
/// * **0**: every check ran
/// * **1**: logging, configuration or a settings file could not be set up
pub fn init() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config = match TesterConfig::load_from_file(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("⚠️ Using default configuration: {e:#}");
            TesterConfig::default()
        }
    };

    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    let logging = config::LoggingSettings {
        level,
        ..config.logging
    };
    if let Err(e) = logging::setup_logging(&logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args) {
        Ok(app) => {
            if let Err(e) = app.run() {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{LoggingSettings, ModelSettings, StoreSettings};

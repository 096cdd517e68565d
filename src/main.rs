use clap::Parser;
use ipam_engine::cli::{self, Cli};
use ipam_engine::Config;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config as LogConfig, Root};
use std::path::Path;

/// Console logging at warn level on stderr, for when no log4rs file exists.
fn init_fallback_logging() -> Result<(), Box<dyn std::error::Error>> {
    let stderr = ConsoleAppender::builder().target(Target::Stderr).build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(LevelFilter::Warn))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn init_logging(path: &Path) {
    let result = if path.exists() {
        log4rs::init_file(path, Default::default()).map_err(|e| e.to_string())
    } else {
        init_fallback_logging().map_err(|e| e.to_string())
    };
    if let Err(e) = result {
        eprintln!("Error initializing log4rs from {}: {e}", path.display());
    }
}

fn main() {
    // Do as little as possible in main.rs as it can't contain any tests
    dotenv::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    init_logging(&config.log_config);
    log::info!("#Start main()");
    log::debug!("Config: {config:?}");

    let cli = Cli::parse();
    std::process::exit(cli::run(cli, config));
}

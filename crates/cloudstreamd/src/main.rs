use std::process::ExitCode;

use cloudstream_config::{Config, ConfigError};
use cloudstreamd::run_daemon;

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Arguments(error)) => error.exit(),
    };

    match run_daemon(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("cloudstreamd: {error}");
            ExitCode::FAILURE
        }
    }
}

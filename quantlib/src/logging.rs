use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::errors::ConfigError;

const PATTERN: &str = "[{d(%Y-%m-%d %H:%M:%S%.3f)}][{l}] {m}{n}";

// HTTP client internals are only interesting when something is wrong
const QUIET_MODULES: [&str; 3] = ["hyper", "reqwest", "rustls"];

pub fn build_config(log_path: &str, level: &str) -> Result<Config, ConfigError> {
    let level: LevelFilter = level
        .parse()
        .map_err(|_| ConfigError::Logger(format!("unknown log level: {}", level)))?;

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    // Parent directories are created by the appender
    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(log_path)
        .map_err(|e| ConfigError::Logger(format!("cannot open {}: {}", log_path, e)))?;

    let mut builder = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .appender(Appender::builder().build("file", Box::new(file)));
    for module in QUIET_MODULES {
        builder = builder.logger(Logger::builder().build(module, LevelFilter::Warn));
    }

    builder
        .build(Root::builder().appender("stdout").appender("file").build(level))
        .map_err(|e| ConfigError::Logger(e.to_string()))
}

/// Logs to stdout and to `log_path`. Call once, before anything else logs.
pub fn configure_logger(log_path: &str, level: &str) -> Result<log4rs::Handle, ConfigError> {
    let config = build_config(log_path, level)?;
    log4rs::init_config(config).map_err(|e| ConfigError::Logger(e.to_string()))
}

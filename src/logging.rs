use anyhow::anyhow;
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l} {t} - {m}{n}";
const LOG_FILE_NAME: &str = "vortex.log";

/// Log to stderr and to a file in `log_dir`.
pub fn init_log(log_dir: &Path, level: LevelFilter) -> anyhow::Result<()> {
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let log_file = log_dir.join(LOG_FILE_NAME);
    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&log_file)
        .map_err(|e| anyhow!("Failed to open log file '{log_file:?}': {e}"))?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("console")
                .appender("file")
                .build(level),
        )
        .map_err(|e| anyhow!("Invalid log configuration: {e}"))?;

    log4rs::init_config(config).map_err(|e| anyhow!("Failed to install logger: {e}"))?;
    Ok(())
}

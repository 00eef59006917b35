//! Serial-style console logger for hosts without the ESP-IDF logger.
use log::{LevelFilter, Log, Metadata, Record};
use std::{sync::OnceLock, time::Instant};

static LOGGER: OnceLock<Logger> = OnceLock::new();

pub fn init() -> Result<(), log::SetLoggerError> {
    #[cfg(debug_assertions)]
    let max_level = LevelFilter::Debug;
    #[cfg(not(debug_assertions))]
    let max_level = LevelFilter::Info;
    init_with_level(max_level)
}

pub fn init_with_level(max_level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let logger = LOGGER.get_or_init(|| Logger {
        max_level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(logger.max_level);
    Ok(())
}

#[derive(Debug)]
struct Logger {
    max_level: LevelFilter,
    started: Instant,
}

impl Logger {
    fn format(&self, record: &Record<'_>) -> String {
        static LEVEL_STRS: [&str; 5] = ["[x]", "[!]", "[i]", "[?]", "[.]"];
        let level = LEVEL_STRS[record.level() as usize - 1];
        let uptime = self.started.elapsed().as_secs_f32();
        format!("{uptime:>9.3} {level} {}: {}", record.target(), record.args())
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            println!("{}", self.format(record));
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_glyphs() {
        let logger = Logger {
            max_level: LevelFilter::Info,
            started: Instant::now(),
        };
        let line = logger.format(
            &Record::builder()
                .level(log::Level::Warn)
                .target("envstation::sensor")
                .args(format_args!("error reading from BME280"))
                .build(),
        );
        assert!(
            line.ends_with("[!] envstation::sensor: error reading from BME280"),
            "{line}"
        );
        assert!(logger.enabled(&Metadata::builder().level(log::Level::Info).build()));
        assert!(!logger.enabled(&Metadata::builder().level(log::Level::Debug).build()));
    }

    #[test]
    fn second_init_fails_as_anyhow_error() {
        let _ = init();
        let result: anyhow::Result<()> = init().map_err(anyhow::Error::from);
        let error = result.unwrap_err();
        assert!(error.to_string().contains("logger"), "{error}");
    }
}

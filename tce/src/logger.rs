use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};
use spin::Once;

/// Console the embedding host provides for log output.
pub trait LogSink: Sync {
    fn write(&self, level: Level, target: &str, args: &core::fmt::Arguments<'_>);
}

struct SimpleLogger;

static SINK: Once<&'static dyn LogSink> = Once::new();

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= Level::Trace
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = SINK.get() {
            sink.write(record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;

/// Records go to `sink` from now on. Only the first sink is kept.
pub fn set_sink(sink: &'static dyn LogSink) {
    SINK.call_once(|| sink);
}

pub fn register_global_logger(maxlevel: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(maxlevel);
    Ok(())
}

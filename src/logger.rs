use std::io::Write;
use std::thread;

use log::{Level, LevelFilter, Log, Metadata, Record};

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let current = thread::current();
        let name = current.name().unwrap_or("main");
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "\x1b[{}m[{:>5} {}] {}\x1b[0m",
            level_to_color_code(record.level()),
            record.level(),
            name,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_to_color_code(level: Level) -> u8 {
    match level {
        Level::Error => 31, // Red
        Level::Warn => 93,  // BrightYellow
        Level::Info => 34,  // Blue
        Level::Debug => 32, // Green
        Level::Trace => 90, // BrightBlack
    }
}

/// Parses a level name, falling back to `info` for anything unknown.
pub fn parse_level(name: Option<&str>) -> LevelFilter {
    match name.map(str::to_ascii_lowercase).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Installs the stderr logger. `level` wins over the `LOG` environment
/// variable. Calling it twice keeps the first logger.
pub fn init(level: Option<&str>) {
    static LOGGER: Logger = Logger;
    let env = std::env::var("LOG").ok();
    let filter = parse_level(level.or(env.as_deref()));
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(filter);
    }
}

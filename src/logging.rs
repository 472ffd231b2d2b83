//! File-backed sink for the `log` facade. The terminal belongs to the UI, so records go to a file.

use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

struct FileLogger {
    file: Mutex<File>,
    level: LevelFilter,
    started: Instant,
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        if let Ok(mut file) = self.file.lock() {
            let _ = file.write_all(line.as_bytes());
            let _ = file.flush();
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
    }
}

fn format_line(elapsed: f64, level: log::Level, target: &str, message: &str) -> String {
    format!("{elapsed:>9.3} {level:<5} {target}: {message}\n")
}

/// Truncate `path` and route every record at or above `level` into it.
pub fn init(path: &Path, level: LevelFilter) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let logger = FileLogger {
        file: Mutex::new(file),
        level,
        started: Instant::now(),
    };
    log::set_boxed_logger(Box::new(logger))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let line = format_line(1.5, log::Level::Info, "chainpit::board", "game over");
        assert_eq!(line, "    1.500 INFO  chainpit::board: game over\n");
    }
}

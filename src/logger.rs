use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{self, Write};
use std::sync::Mutex;

/// Colored stderr logger. Records are held back until `print_deferred` is
/// called, so messages logged while the configuration is still being resolved
/// are filtered by the configured level rather than the provisional one.
///
/// Each line carries the pid, since `run` logs from both the supervisor and
/// the child it forks.
pub struct JailLogger {
    level: Mutex<LevelFilter>,
    output: Mutex<Box<dyn Write + Send>>,
    deferred: Mutex<Vec<(Level, ColoredString)>>,
    defer_output: Mutex<bool>,
}

impl JailLogger {
    pub fn new(level: LevelFilter) -> &'static Self {
        Self::with_output(level, Box::new(io::stderr()))
    }

    fn with_output(
        level: LevelFilter,
        output: Box<dyn Write + Send>,
    ) -> &'static Self {
        Box::leak(Box::new(Self {
            level: Mutex::new(level),
            output: Mutex::new(output),
            deferred: Mutex::new(Vec::new()),
            defer_output: Mutex::new(true),
        }))
    }

    pub fn init(&'static self) -> Result<&'static Self, log::SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(LevelFilter::Trace);
        Ok(self)
    }

    pub fn set_level(&self, level: LevelFilter) {
        *self.level.lock().expect("Failed to lock level") = level;
    }

    /// Replays held back records at the configured level and stops deferring.
    pub fn print_deferred(&self) {
        let deferred = std::mem::take(
            &mut *self.deferred.lock().expect("Failed to lock deferred"),
        );
        *self
            .defer_output
            .lock()
            .expect("Failed to lock defer_output") = false;

        let level_filter = *self.level.lock().expect("Failed to lock level");
        let mut output = self.output.lock().expect("Failed to lock output");
        for (_, line) in deferred
            .into_iter()
            .filter(|(level, _)| *level <= level_filter)
        {
            let _ = writeln!(output, "{}", line);
        }
    }

    fn color(level: Level) -> colored::Color {
        match level {
            Level::Error => colored::Color::Red,
            Level::Warn => colored::Color::Yellow,
            Level::Info => colored::Color::White,
            Level::Debug => colored::Color::Blue,
            Level::Trace => colored::Color::BrightBlack,
        }
    }

    fn format(record: &Record) -> ColoredString {
        let color = Self::color(record.level());
        let level_str = format!("{:<5}", record.level().as_str()).color(color);
        format!(
            "[{}] {} {}: {}",
            level_str,
            std::process::id(),
            record.target(),
            record.args()
        )
        .color(color)
    }
}

impl Log for JailLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= *self.level.lock().expect("Failed to lock level")
    }

    fn log(&self, record: &Record) {
        let line = Self::format(record);
        if *self
            .defer_output
            .lock()
            .expect("Failed to lock defer_output")
        {
            self.deferred
                .lock()
                .expect("Failed to lock deferred")
                .push((record.level(), line));
        } else if self.enabled(record.metadata()) {
            let mut output = self.output.lock().expect("Failed to lock output");
            let _ = writeln!(output, "{}", line);
        }
    }

    fn flush(&self) {
        let _ = self.output.lock().expect("Failed to lock output").flush();
    }
}

//! Logging and progress output for the build step.
//!
//! [`Notifier`] sits in front of `env_logger` and `indicatif` behind one verbosity switch:
//! - [`VerbosityLevel::Quiet`] → no text logs below warn; a spinner tracks the current
//!   stage and [`Notifier::progress_bar`] hands out bars for downloads and packing.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] → plain
//!   log lines, which is what CI build logs want.
//!
//! `RUST_LOG` is still honoured; the verbosity only sets the default filter.

use env_logger::Env;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Record};
use std::cell::RefCell;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    Quiet = 0,
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    fn level_filter(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    logger: env_logger::Logger,
    bars: Option<MultiProgress>,
    stage: RefCell<Option<ProgressBar>>,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        let verbosity = VerbosityLevel::from(verbosity_level);

        let logger = env_logger::Builder::from_env(Env::default())
            .filter_level(verbosity.level_filter())
            .build();

        let bars = if verbosity == VerbosityLevel::Quiet {
            Some(MultiProgress::new())
        } else {
            None
        };

        Self {
            verbosity,
            logger,
            bars,
            stage: RefCell::new(None),
        }
    }

    /// A notifier that prints nothing except warnings and never draws bars.
    /// Used by tests and library callers that bring their own output.
    pub fn silent() -> Self {
        let logger = env_logger::Builder::new()
            .filter_level(LevelFilter::Warn)
            .build();

        Self {
            verbosity: VerbosityLevel::Quiet,
            logger,
            bars: None,
            stage: RefCell::new(None),
        }
    }

    fn emit(&self, level: Level, message: &str) {
        // Logger::log applies the level filter itself
        self.logger.log(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(level)
                .target(module_path!())
                .build(),
        );
    }

    /// Reports the current build stage. In quiet mode this moves the spinner
    /// instead of printing a line.
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            self.emit(Level::Info, message);
            return;
        }

        let Some(bars) = &self.bars else {
            return;
        };

        let mut stage = self.stage.borrow_mut();
        let spinner = stage.get_or_insert_with(|| {
            let spinner = bars.add(ProgressBar::new_spinner());
            let style = ProgressStyle::default_spinner().template("{spinner:.green} {msg}");
            if let Ok(style) = style {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });
        spinner.set_message(message.to_string());
    }

    pub fn debug(&self, message: &str) {
        self.emit(Level::Debug, message);
    }

    pub fn trace(&self, message: &str) {
        self.emit(Level::Trace, message);
    }

    pub fn warn(&self, message: &str) {
        if let Some(spinner) = self.stage.borrow().as_ref() {
            spinner.suspend(|| self.emit(Level::Warn, message));
        } else {
            self.emit(Level::Warn, message);
        }
    }

    /// Returns a byte/count progress bar in quiet mode, `None` otherwise.
    pub fn progress_bar(&self, length: u64, message: &str) -> Option<ProgressBar> {
        let bars = self.bars.as_ref()?;

        let bar = bars.add(ProgressBar::new(length));
        let style = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
        );
        if let Ok(style) = style {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message.to_string());
        Some(bar)
    }

    /// Textual progress for log mode, throttled to every 100th step and the last one.
    pub fn progress(&self, current: u64, total: u64, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet && (current % 100 == 0 || current == total) {
            self.emit(Level::Info, &format!("{}: {}/{}", message, current, total));
        }
    }

    /// Clears the stage spinner, leaving `message` behind.
    pub fn finish(&self, message: &str) {
        match self.stage.borrow_mut().take() {
            Some(spinner) => spinner.finish_with_message(message.to_string()),
            None => self.emit(Level::Info, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(VerbosityLevel::from(0), VerbosityLevel::Quiet);
        assert_eq!(VerbosityLevel::from(1), VerbosityLevel::Info);
        assert_eq!(VerbosityLevel::from(2), VerbosityLevel::Debug);
        assert_eq!(VerbosityLevel::from(3), VerbosityLevel::Trace);
        assert_eq!(VerbosityLevel::from(9), VerbosityLevel::Trace);
    }

    #[test]
    fn test_log_mode_emits_every_level() {
        let notifier = Notifier::new(3);
        notifier.info("resolving model");
        notifier.debug("artifact directory");
        notifier.trace("adding config.json");
        notifier.warn("hub file renamed");
        notifier.progress(100, 200, "Packed files");
        notifier.finish("done");
    }

    #[test]
    fn test_quiet_mode_spinner_lifecycle() {
        let notifier = Notifier::new(0);
        notifier.info("resolving model");
        notifier.warn("hub file renamed");
        notifier.finish("done");
        assert!(notifier.stage.borrow().is_none());
    }

    #[test]
    fn test_progress_bar_only_in_quiet_mode() {
        assert!(Notifier::new(0).progress_bar(10, "packing").is_some());
        assert!(Notifier::new(1).progress_bar(10, "packing").is_none());
        assert!(Notifier::silent().progress_bar(10, "packing").is_none());
    }
}

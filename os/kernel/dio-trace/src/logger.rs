use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use dio_sync::SyncOnceCell;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Receives one fully formatted line per record.
pub type Sink = fn(fmt::Arguments<'_>);

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    #[error("a logger is already installed")]
    AlreadyInstalled,
}

static LOGGER: SyncOnceCell<DioLogger> = SyncOnceCell::new();

pub struct DioLogger {
    max_level: LevelFilter,
    show_debug_output: AtomicBool,
    sink: Sink,
}

impl DioLogger {
    /// A logger writing to the platform's default sink.
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self::with_sink(max_level, default_sink())
    }

    #[must_use]
    pub const fn with_sink(max_level: LevelFilter, sink: Sink) -> Self {
        Self {
            max_level,
            show_debug_output: AtomicBool::new(false),
            sink,
        }
    }

    /// Make this the process-wide logger.
    ///
    /// # Errors
    /// [`TraceError::AlreadyInstalled`] if any logger was installed before.
    pub fn install(self) -> Result<&'static Self, TraceError> {
        let logger = LOGGER.set(self).map_err(|_| TraceError::AlreadyInstalled)?;
        log::set_logger(logger).map_err(|_| TraceError::AlreadyInstalled)?;
        log::set_max_level(logger.max_level);
        Ok(logger)
    }

    pub fn set_show_debug_output(&self, on: bool) {
        self.show_debug_output.store(on, Ordering::Relaxed);
    }

    #[must_use]
    pub fn show_debug_output(&self) -> bool {
        self.show_debug_output.load(Ordering::Relaxed)
    }
}

const fn default_sink() -> Sink {
    #[cfg(all(feature = "qemu", any(target_arch = "x86", target_arch = "x86_64")))]
    {
        crate::qemu::debug_port_sink
    }
    #[cfg(not(all(feature = "qemu", any(target_arch = "x86", target_arch = "x86_64"))))]
    {
        crate::null_sink
    }
}

impl Log for DioLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.level() > self.max_level {
            return false;
        }
        metadata.level() <= Level::Info || self.show_debug_output()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        (self.sink)(format_args!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Flip the debug-output switch of the installed logger, if any.
pub fn set_show_debug_output(on: bool) {
    if let Some(logger) = LOGGER.get() {
        logger.set_show_debug_output(on);
    }
}

/// Whether the installed logger currently emits `Debug`/`Trace` records.
#[must_use]
pub fn show_debug_output() -> bool {
    LOGGER.get().is_some_and(DioLogger::show_debug_output)
}

//! Wires the `log` facade to the serial port: `log::info!`/`log::warn!`
//! calls throughout the dispatcher and scheduler otherwise have nowhere to
//! go, since this kernel has no separate log-destination abstraction the
//! way the teacher's userspace services do.

use log::{LevelFilter, Metadata, Record};

struct SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= LevelFilter::Info
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            super::serial::_print(format_args!(
                "[{:<5}] {}\n",
                record.level(),
                record.args()
            ));
        }
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger;

/// Install the serial logger. Idempotent in the sense that a second call is
/// harmless to observe (just logged), matching `log::set_logger`'s contract
/// of succeeding exactly once per process.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
}

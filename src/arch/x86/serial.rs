//! Serial port driver for kernel diagnostics, distinct from the VGA-backed
//! terminal output user processes see. Adapted directly from the teacher's
//! x86_64 serial module: same `uart_16550` crate, same COM1 port, same
//! lazily-initialized `Mutex<SerialPort>`.

use lazy_static::lazy_static;
use spin::Mutex;
use uart_16550::SerialPort;

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        let mut serial_port = unsafe { SerialPort::new(0x3F8) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

#[doc(hidden)]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;

    // SAFETY: disabling interrupts here would require the generic
    // cross-arch abstraction this kernel doesn't carry; diagnostics are
    // best-effort and an interrupted write simply interleaves lines.
    SERIAL1
        .lock()
        .write_fmt(args)
        .expect("printing to serial failed");
}

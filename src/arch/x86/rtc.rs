//! CMOS real-time clock, virtualized per terminal.
//!
//! The hardware is programmed once for a 512 Hz periodic interrupt; each
//! terminal's apparent rate is a software divisor (`rtc_constant`) of that
//! base rate, independently settable by `rtc_write` and consumed by
//! `rtc_read`'s spin-wait. This mirrors the original driver, which never
//! reprograms register A after boot -- only the per-terminal software
//! counters change.

use super::port::{inb, outb};
use crate::terminal;

const INDEX_PORT: u16 = 0x70;
const DATA_PORT: u16 = 0x71;
const REG_A: u8 = 0x8A;
const REG_B: u8 = 0x8B;
const REG_C: u8 = 0x8C;
const NMI_DISABLE: u8 = 0x80;

const BASE_RATE_HZ: u32 = 512;
const DEFAULT_VIRTUAL_HZ: u32 = 2;

const RTC_IRQ: u8 = 8;

/// Enable the RTC's periodic interrupt at its default 512 Hz hardware rate
/// and unmask IRQ8.
pub fn init() {
    // SAFETY: standard CMOS register-A/B programming sequence. NMI is
    // masked for the duration of each register access, matching the
    // hardware's documented access protocol.
    unsafe {
        outb(INDEX_PORT, NMI_DISABLE | REG_A);
        let prev_a = inb(DATA_PORT);
        outb(INDEX_PORT, NMI_DISABLE | REG_A);
        outb(DATA_PORT, (prev_a & 0xF0) | 0x06); // rate selector -> 512 Hz

        outb(INDEX_PORT, NMI_DISABLE | REG_B);
        let prev_b = inb(DATA_PORT);
        outb(INDEX_PORT, NMI_DISABLE | REG_B);
        outb(DATA_PORT, prev_b | 0x40); // enable periodic interrupt
    }
    super::pic::enable_irq(RTC_IRQ);
}

/// IRQ8 handler: re-arm the next interrupt by reading register C, then
/// decrement the scheduled terminal's remaining-iteration counter.
pub fn handle_interrupt() {
    super::pic::send_eoi(RTC_IRQ);
    // SAFETY: reading register C is required by the hardware to clear the
    // interrupt-pending condition and arm the next tick.
    unsafe {
        outb(INDEX_PORT, REG_C);
        let _ = inb(DATA_PORT);
    }
    terminal::rtc_tick_scheduled_terminal();
}

/// `rtc_open`: reset the caller's virtual rate to the default 2 Hz.
pub fn open(terminal_id: usize) {
    terminal::set_rtc_period(terminal_id, BASE_RATE_HZ / DEFAULT_VIRTUAL_HZ);
}

/// `rtc_read`: block (by spin-waiting with interrupts enabled) until one
/// virtual period's worth of hardware ticks has elapsed.
pub fn read(terminal_id: usize) {
    terminal::arm_rtc_wait(terminal_id);
    // SAFETY: enabling interrupts so the IRQ8 handler can drain the counter.
    unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
    while !terminal::rtc_wait_elapsed(terminal_id) {
        core::hint::spin_loop();
    }
}

/// `rtc_write`: validate `rate` is a power of two in `(1, 512]` and recompute
/// the virtual divisor.
pub fn write(terminal_id: usize, rate: i32) -> Result<(), crate::error::FsError> {
    if rate <= 1 || rate > BASE_RATE_HZ as i32 || (rate & (rate - 1)) != 0 {
        return Err(crate::error::FsError::InvalidPath);
    }
    terminal::set_rtc_period(terminal_id, BASE_RATE_HZ / rate as u32);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_power_of_two_in_range(rate: i32) -> bool {
        rate > 1 && rate <= BASE_RATE_HZ as i32 && (rate & (rate - 1)) == 0
    }

    #[test]
    fn accepts_valid_power_of_two_rates() {
        for rate in [2, 4, 8, 16, 32, 64, 128, 256, 512] {
            assert!(is_power_of_two_in_range(rate), "{rate} should be accepted");
        }
    }

    #[test]
    fn rejects_non_power_of_two_and_out_of_range() {
        for rate in [0, 1, 3, 5, 513, 1024, -4] {
            assert!(!is_power_of_two_in_range(rate), "{rate} should be rejected");
        }
    }

    #[test]
    fn period_for_rate_eight_is_sixty_four() {
        assert_eq!(BASE_RATE_HZ / 8, 64);
    }
}

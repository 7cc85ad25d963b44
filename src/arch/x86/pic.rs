//! 8259 programmable interrupt controller cascade.
//!
//! Two chained chips: master at ports 0x20/0x21, slave at 0xA0/0xA1, with
//! the slave's output wired to the master's IRQ2 input. Masking is tracked
//! in software (`master_mask`/`slave_mask`) rather than read back from the
//! hardware, matching the original driver.

use spin::Mutex;

use super::port::{inb, io_wait, outb};

const MASTER_CMD: u16 = 0x20;
const MASTER_DATA: u16 = 0x21;
const SLAVE_CMD: u16 = 0xA0;
const SLAVE_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x11; // edge-triggered, cascade mode, ICW4 present
const ICW4_8086: u8 = 0x01; // 8086/88 (MCS-80/85) mode

const ICW2_MASTER: u8 = 0x20; // master IRQs mapped to vectors 0x20..0x27
const ICW2_SLAVE: u8 = 0x28; // slave IRQs mapped to vectors 0x28..0x2F
const ICW3_MASTER_CASCADE: u8 = 1 << 2; // IRQ2 carries the slave
const ICW3_SLAVE_CASCADE_ID: u8 = 2;

const CASCADE_IRQ: u8 = 2;
const SPECIFIC_EOI: u8 = 0x60;

struct PicState {
    master_mask: u8,
    slave_mask: u8,
}

static STATE: Mutex<PicState> = Mutex::new(PicState {
    master_mask: 0xFF,
    slave_mask: 0xFF,
});

/// Remap both chips past the Intel-reserved vector range, mask every line,
/// then unmask the cascade line on the master so slave interrupts can reach
/// the CPU once individually enabled.
pub fn init() {
    // SAFETY: standard 8259 initialization sequence on the well-known
    // legacy command/data ports, executed once at boot with interrupts
    // disabled by the caller.
    unsafe {
        outb(MASTER_CMD, ICW1_INIT);
        io_wait();
        outb(SLAVE_CMD, ICW1_INIT);
        io_wait();

        outb(MASTER_DATA, ICW2_MASTER);
        io_wait();
        outb(SLAVE_DATA, ICW2_SLAVE);
        io_wait();

        outb(MASTER_DATA, ICW3_MASTER_CASCADE);
        io_wait();
        outb(SLAVE_DATA, ICW3_SLAVE_CASCADE_ID);
        io_wait();

        outb(MASTER_DATA, ICW4_8086);
        io_wait();
        outb(SLAVE_DATA, ICW4_8086);
        io_wait();

        outb(MASTER_DATA, 0xFF);
        outb(SLAVE_DATA, 0xFF);
    }

    let mut state = STATE.lock();
    state.master_mask = 0xFF;
    state.slave_mask = 0xFF;
    drop(state);

    enable_irq(CASCADE_IRQ);
}

/// Unmask `irq` (0..=15). No-op on an out-of-range line.
pub fn enable_irq(irq: u8) {
    if irq > 15 {
        return;
    }
    let mut state = STATE.lock();
    if irq <= 7 {
        state.master_mask &= !(1 << irq);
        let mask = state.master_mask;
        // SAFETY: writing the cached mask to the master's data port.
        unsafe { outb(MASTER_DATA, mask) };
    } else {
        let bit = irq - 8;
        state.slave_mask &= !(1 << bit);
        let mask = state.slave_mask;
        // SAFETY: writing the cached mask to the slave's data port.
        unsafe { outb(SLAVE_DATA, mask) };
    }
}

/// Mask `irq` (0..=15). No-op on an out-of-range line.
pub fn disable_irq(irq: u8) {
    if irq > 15 {
        return;
    }
    let mut state = STATE.lock();
    if irq <= 7 {
        state.master_mask |= 1 << irq;
        let mask = state.master_mask;
        // SAFETY: writing the cached mask to the master's data port.
        unsafe { outb(MASTER_DATA, mask) };
    } else {
        let bit = irq - 8;
        state.slave_mask |= 1 << bit;
        let mask = state.slave_mask;
        // SAFETY: writing the cached mask to the slave's data port.
        unsafe { outb(SLAVE_DATA, mask) };
    }
}

/// Acknowledge `irq` with specific EOI. Slave-owned lines additionally EOI
/// the cascade line on the master. Always leaves interrupts enabled on
/// return, matching the original (which force-`sti()`s at the end of
/// `send_eoi` regardless of the caller's prior interrupt state).
pub fn send_eoi(irq: u8) {
    if irq > 15 {
        return;
    }
    // SAFETY: specific-EOI writes to the command ports of the chip(s) that
    // own `irq`, per the 8259 programming model.
    unsafe {
        if irq >= 8 {
            outb(SLAVE_CMD, SPECIFIC_EOI | (irq - 8));
            outb(MASTER_CMD, SPECIFIC_EOI | CASCADE_IRQ);
        } else {
            outb(MASTER_CMD, SPECIFIC_EOI | irq);
        }
    }
    // SAFETY: re-enabling interrupts is the documented final act of this
    // routine; callers rely on it rather than restoring a saved flag.
    unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
}

/// Read the in-service register of the chip owning `irq` (diagnostic use).
pub fn in_service(irq: u8) -> bool {
    const READ_ISR: u8 = 0x0B;
    // SAFETY: OCW3 read of the in-service register, standard 8259 protocol.
    unsafe {
        if irq >= 8 {
            outb(SLAVE_CMD, READ_ISR);
            (inb(SLAVE_CMD) & (1 << (irq - 8))) != 0
        } else {
            outb(MASTER_CMD, READ_ISR);
            (inb(MASTER_CMD) & (1 << irq)) != 0
        }
    }
}

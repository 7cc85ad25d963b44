//! PS/2 keyboard driver: scancode set 1, decoded via the `pc_keyboard` crate
//! rather than a hand-rolled table, plus the hotkeys this kernel treats
//! specially (Ctrl+L, Alt+F1/F2/F3).
//!
//! Grounded on `doublegate-VeridianOS`'s own `drivers/keyboard.rs`, which
//! wraps a `pc_keyboard::Keyboard<Us104Key, ScancodeSet1>` behind a spinlock
//! and tracks Ctrl/Alt as sticky booleans from the raw key events rather
//! than asking the crate to interpret them. `HandleControl::Ignore` is used
//! (not `MapLettersToUnicode`) so Ctrl+L still reaches us as a plain `L`
//! keycode instead of being folded into a control character.

use pc_keyboard::{layouts, DecodedKey, HandleControl, KeyCode, KeyState, Keyboard, ScancodeSet1};
use spin::Mutex;

use super::port::inb;

const DATA_PORT: u16 = 0x60;
const KEYBOARD_IRQ: u8 = 1;

static KEYBOARD: Mutex<Keyboard<layouts::Us104Key, ScancodeSet1>> = Mutex::new(Keyboard::new(
    ScancodeSet1::new(),
    layouts::Us104Key,
    HandleControl::Ignore,
));

struct Modifiers {
    ctrl: bool,
    alt: bool,
}

static MODS: Mutex<Modifiers> = Mutex::new(Modifiers {
    ctrl: false,
    alt: false,
});

pub fn init() {
    super::pic::enable_irq(KEYBOARD_IRQ);
}

/// IRQ1 handler: read one scancode from the controller's output buffer and
/// feed it through the crate's decoder.
pub fn handle_interrupt() {
    // SAFETY: reading the keyboard controller's output buffer after IRQ1
    // fires is the documented way to retrieve the pending scancode.
    let scancode = unsafe { inb(DATA_PORT) };
    super::pic::send_eoi(KEYBOARD_IRQ);
    dispatch(scancode);
}

fn dispatch(scancode: u8) {
    let mut kb = KEYBOARD.lock();
    let Ok(Some(event)) = kb.add_byte(scancode) else {
        return;
    };

    let code = event.code;
    let is_down = event.state == KeyState::Down;

    match code {
        KeyCode::LControl | KeyCode::RControl => MODS.lock().ctrl = is_down,
        KeyCode::LAlt | KeyCode::RAltGr => MODS.lock().alt = is_down,
        _ => {}
    }

    if !is_down {
        return;
    }

    if MODS.lock().ctrl && code == KeyCode::L {
        crate::terminal::ctrl_l();
        return;
    }
    if MODS.lock().alt {
        match code {
            KeyCode::F1 => return crate::terminal::switch_foreground(0),
            KeyCode::F2 => return crate::terminal::switch_foreground(1),
            KeyCode::F3 => return crate::terminal::switch_foreground(2),
            _ => {}
        }
    }

    match kb.process_keyevent(event) {
        Some(DecodedKey::Unicode('\n')) => crate::terminal::press_enter(),
        Some(DecodedKey::Unicode('\u{8}')) => crate::terminal::backspace(),
        Some(DecodedKey::Unicode('\t')) => crate::terminal::push_tab(),
        Some(DecodedKey::Unicode(c)) if c.is_ascii() => crate::terminal::push_char(c as u8),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_start_released() {
        let m = Modifiers {
            ctrl: false,
            alt: false,
        };
        assert!(!m.ctrl && !m.alt);
    }
}

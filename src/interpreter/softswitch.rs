//! Soft-switch address dispatch (spec §6, §4.D, §9).
//!
//! A small fixed table of known addresses, not a generic mountable
//! device abstraction: every switch is matched directly against
//! [`crate::constants`]. Addresses outside the table fall through to a
//! plain byte store in [`crate::memory::Memory`].

use crate::constants::*;
use crate::memory::Memory;

use super::render::GraphicsState;

/// Latched keyboard state: the last key code with its high bit set
/// while unread, cleared once the strobe address is read (spec §6).
#[derive(Default)]
pub struct KeyboardLatch {
    pub data: u8,
}

impl KeyboardLatch {
    pub fn press(&mut self, ch: u8) {
        self.data = ch | 0x80;
    }
}

/// Applies the side effect, if any, of writing `value` to `address`.
/// The raw byte is always stored in `mem` regardless of whether the
/// address is also a recognized switch, so an unrecognized address is
/// simply a plain byte write (spec §4.D).
pub fn poke(mem: &mut Memory, gfx: &mut GraphicsState, address: u16, value: u8) {
    mem.poke(address, value);
    match address {
        CURSOR_X => gfx.cursor_x = value,
        CURSOR_Y => gfx.cursor_y = value,
        TEXT_ATTR => {
            gfx.inverse = value == 63;
            gfx.flash = value == 127;
        }
        GRAPHICS_SWITCH_BASE..=GRAPHICS_SWITCH_END => apply_graphics_switch(gfx, address),
        SPEAKER_TOGGLE => log::trace!("speaker click"),
        _ => log::warn!("poke to unrecognized address {address}"),
    }
}

fn apply_graphics_switch(gfx: &mut GraphicsState, address: u16) {
    match address - GRAPHICS_SWITCH_BASE {
        0 => gfx.text_switch = false, // TXTCLR: display graphics
        1 => gfx.text_switch = true,  // TXTSET: display text
        2 => gfx.mixed = false,       // MIXCLR: full-screen graphics
        3 => gfx.mixed = true,        // MIXSET: mixed text/graphics
        4 => gfx.page = 1,            // LOWSCR
        5 => gfx.page = 2,            // HISCR
        6 => gfx.hires_switch = false, // LORES
        7 => gfx.hires_switch = true,  // HIRES
        _ => unreachable!("address restricted to the graphics switch range"),
    }
}

/// Reads `address`, computing a dynamic value for the addresses whose
/// content isn't simply whatever was last stored (spec §9): the text
/// cursor (mirrors `GraphicsState`, since cursor motion can happen
/// without an explicit `POKE`) and the keyboard strobe (clearing the
/// latch's high bit as a side effect of the read).
pub fn peek(
    mem: &Memory,
    gfx: &GraphicsState,
    keyboard: &mut KeyboardLatch,
    address: u16,
) -> u8 {
    match address {
        CURSOR_X => gfx.cursor_x,
        CURSOR_Y => gfx.cursor_y,
        KEYBOARD_DATA => keyboard.data,
        KEYBOARD_STROBE => {
            let v = keyboard.data;
            keyboard.data &= 0x7F;
            v
        }
        _ => mem.peek(address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_switch_is_address_equivalent_across_folding() {
        let mut mem = Memory::new();
        let mut gfx = GraphicsState::new();
        let folded_positive = crate::constants::fold_address(49235);
        let folded_negative = crate::constants::fold_address(-16301);
        assert_eq!(folded_positive, folded_negative);
        poke(&mut mem, &mut gfx, folded_negative, 0);
        assert!(gfx.mixed);
    }

    #[test]
    fn keyboard_strobe_clears_high_bit_on_read() {
        let mem = Memory::new();
        let gfx = GraphicsState::new();
        let mut kb = KeyboardLatch::default();
        kb.press(b'A');
        assert_eq!(peek(&mem, &gfx, &mut kb, KEYBOARD_STROBE), b'A' | 0x80);
        assert_eq!(kb.data, b'A');
    }

    #[test]
    fn cursor_poke_updates_graphics_state() {
        let mut mem = Memory::new();
        let mut gfx = GraphicsState::new();
        poke(&mut mem, &mut gfx, CURSOR_X, 12);
        assert_eq!(gfx.cursor_x, 12);
    }
}

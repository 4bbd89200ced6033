//! Fixed sizes and well-known memory addresses.
//!
//! The address constants mirror the subset of the soft-switch map this
//! core is required to honor (spec §6); everything else in the 64 KiB
//! space is plain storage.

/// Size of the linear address space exposed to `PEEK`/`POKE`/`CALL`.
pub const MEMORY_SIZE: usize = 65536;

/// Upper bound on an axis of an array that is auto-dimensioned on first
/// reference (11 elements per axis, indices `0..=10`).
pub const AUTO_DIM_BOUND: u16 = 10;

/// Highest line number an implementation is required to store.
pub const MAX_LINE_NUMBER: u32 = 63999;

/// Default value returned by `FRE(x)`.
pub const DEFAULT_FRE: f64 = 30000.0;

/// Poll the cancellation flag and execution timeout every `K` statement
/// parts executed, per spec §4.G.
pub const POLL_INTERVAL: u64 = 100;

// --- soft switches (decimal addresses, spec §6) ---------------------

/// Text cursor column (readable and writable).
pub const CURSOR_X: u16 = 36;
/// Text cursor row (readable and writable).
pub const CURSOR_Y: u16 = 37;
/// Text attribute: 63 inverse, 127 flash, 255 normal.
pub const TEXT_ATTR: u16 = 50;
/// `LOMEM` pointer, low byte.
pub const LOMEM_LO: u16 = 103;
/// `LOMEM` pointer, high byte.
pub const LOMEM_HI: u16 = 104;
/// `HIMEM` pointer, low byte.
pub const HIMEM_LO: u16 = 115;
/// `HIMEM` pointer, high byte.
pub const HIMEM_HI: u16 = 116;
/// Nonzero when an `ONERR` handler is armed.
pub const ONERR_FLAG: u16 = 216;
/// Line number of the last trapped error, low byte.
pub const ERR_LINE_LO: u16 = 218;
/// Line number of the last trapped error, high byte.
pub const ERR_LINE_HI: u16 = 219;
/// Error code of the last trapped error.
pub const ERR_CODE: u16 = 222;
/// Keyboard data; bit 7 set when a new key is waiting.
pub const KEYBOARD_DATA: u16 = 49152;
/// Keyboard strobe; reading clears bit 7 of [`KEYBOARD_DATA`].
pub const KEYBOARD_STROBE: u16 = 49168;
/// Speaker toggle (click).
pub const SPEAKER_TOGGLE: u16 = 49200;

/// First address of the graphics-mode soft-switch bank (spec §6: 49232-49239).
pub const GRAPHICS_SWITCH_BASE: u16 = 49232;
/// Last address of the graphics-mode soft-switch bank, inclusive.
pub const GRAPHICS_SWITCH_END: u16 = 49239;

/// Reduce a possibly-negative source address to its unsigned 16-bit form
/// (spec §3: "negative source addresses are reduced modulo 65536").
pub fn fold_address(addr: i32) -> u16 {
    addr.rem_euclid(65536) as u16
}

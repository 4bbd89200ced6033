//! Abstract graphics/text state and the renderer boundary (spec §6).
//!
//! The core owns every bit of state a program can observe or mutate
//! through a statement or `PEEK`; the [`Renderer`] a host plugs in only
//! ever receives already-decided draw commands and never makes policy
//! decisions about color or mode.

/// Display mode, one of the four the dialect supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Text,
    Gr,
    Hgr,
    Hgr2,
}

/// Everything a `PEEK`/renderer-facing statement can see or change.
pub struct GraphicsState {
    pub mode: Mode,
    pub mixed: bool,
    pub page: u8,
    pub lores_color: u8,
    pub hires_color: u8,
    pub inverse: bool,
    pub flash: bool,
    pub cursor_x: u8,
    pub cursor_y: u8,
    pub last_point: (i32, i32),
    /// The hi-res color last actually used to plot a point, distinct
    /// from `hires_color` (spec §4.D: `HPLOT TO x,y` draws with this,
    /// not with whatever `HCOLOR=` has since been set to).
    pub last_plot_color: u8,
    pub scale: f64,
    pub rotation: f64,
    /// Raw soft-switch bits (spec §6, addresses 49232-49239), tracked
    /// independently of `mode`/`page` so a `PEEK`/`POKE` program that
    /// only ever pokes the switches (never `GR`/`HGR`/`TEXT`) still
    /// observes consistent state.
    pub text_switch: bool,
    pub hires_switch: bool,
}

impl GraphicsState {
    pub fn new() -> Self {
        GraphicsState {
            mode: Mode::Text,
            mixed: false,
            page: 1,
            lores_color: 0,
            hires_color: 0,
            inverse: false,
            flash: false,
            cursor_x: 0,
            cursor_y: 0,
            last_point: (0, 0),
            last_plot_color: 0,
            scale: 1.0,
            rotation: 0.0,
            text_switch: true,
            hires_switch: false,
        }
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState::new()
    }
}

/// Sink for the core's drawing decisions. A text-only host can make
/// every method besides `put_char`/`clear_text`/`scroll_text_up` a
/// no-op; a graphical host rasterizes `plot`.
pub trait Renderer {
    fn plot(&mut self, x: i32, y: i32, color: u8);
    fn clear_text(&mut self);
    fn scroll_text_up(&mut self);
    fn put_char(&mut self, ch: u8);
}

/// A `Renderer` that only logs what it's told, for headless runs and
/// tests. `dialect-cli`'s text renderer wraps this with real stdout
/// writing for `put_char`.
#[derive(Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn plot(&mut self, x: i32, y: i32, color: u8) {
        log::trace!("plot({x}, {y}) color={color}");
    }
    fn clear_text(&mut self) {
        log::trace!("clear_text");
    }
    fn scroll_text_up(&mut self) {
        log::trace!("scroll_text_up");
    }
    fn put_char(&mut self, ch: u8) {
        log::trace!("put_char({ch})");
    }
}

/// Integer Bresenham line rasterization over the logical hi-res grid
/// (spec §4.D), inclusive of both endpoints.
pub fn bresenham_line(x1: i32, y1: i32, x2: i32, y2: i32) -> Vec<(i32, i32)> {
    let mut points = Vec::new();
    let dx = (x2 - x1).abs();
    let dy = -(y2 - y1).abs();
    let sx = if x1 < x2 { 1 } else { -1 };
    let sy = if y1 < y2 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x1, y1);
    loop {
        points.push((x, y));
        if x == x2 && y == y2 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bresenham_covers_a_horizontal_run() {
        let pts = bresenham_line(0, 0, 3, 0);
        assert_eq!(pts, vec![(0, 0), (1, 0), (2, 0), (3, 0)]);
    }

    #[test]
    fn bresenham_covers_a_diagonal() {
        let pts = bresenham_line(0, 0, 2, 2);
        assert_eq!(pts, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn bresenham_is_symmetric_in_direction() {
        let mut forward = bresenham_line(0, 0, 4, 2);
        let mut backward = bresenham_line(4, 2, 0, 0);
        backward.reverse();
        forward.sort();
        backward.sort();
        assert_eq!(forward, backward);
    }
}

//! Local mirror of the brick's monochrome LCD.
//!
//! The raster is 100x64 pixels stored in 8 banks of 100 bytes. Byte `x` of
//! bank `b` holds the column of 8 pixels at rows `8b..8b+8`, least significant
//! bit on top. This is the layout of the display module's IO map, so the
//! buffer can be pulled from and pushed to the brick unchanged.

mod bitmap;
mod font;

use crate::types::Pattern;
use log::trace;

pub use self::bitmap::BITMAP_FILE_SIZE;

/// Display width in pixels.
pub const DISPLAY_WIDTH: i32 = 100;

/// Display height in pixels.
pub const DISPLAY_HEIGHT: i32 = 64;

/// Raster size in bytes.
pub const DISPLAY_BUFFER_SIZE: usize = (DISPLAY_WIDTH * DISPLAY_HEIGHT / 8) as usize;

/// 800 byte frame buffer with raster drawing primitives.
///
/// Every drawing operation clips silently: coordinates outside the screen are
/// ignored, never rejected.
#[derive(Clone, PartialEq, Eq)]
pub struct DisplayBuffer {
    raster: [u8; DISPLAY_BUFFER_SIZE],
}

impl Default for DisplayBuffer {
    fn default() -> DisplayBuffer {
        DisplayBuffer::new()
    }
}

impl std::fmt::Debug for DisplayBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayBuffer")
            .field("lit_pixels", &self.lit_pixels())
            .finish()
    }
}

#[inline]
fn locate(x: i32, y: i32) -> Option<(usize, u8)> {
    if !(0..DISPLAY_WIDTH).contains(&x) || !(0..DISPLAY_HEIGHT).contains(&y) {
        return None;
    }
    let index = (y / 8 * DISPLAY_WIDTH + x) as usize;
    Some((index, 1 << (y % 8)))
}

/// Largest outline radius drawn with the midpoint walk.
const MIDPOINT_MAX_RADIUS: i64 = 4096;

type Point = (i32, i32);

/// Clips a segment to the screen (Liang-Barsky).
///
/// Segments already on screen are returned unchanged; `None` if the segment
/// misses the screen entirely.
fn clip_line(start: Point, end: Point) -> Option<(Point, Point)> {
    if locate(start.0, start.1).is_some() && locate(end.0, end.1).is_some() {
        return Some((start, end));
    }

    let (x1, y1) = (f64::from(start.0), f64::from(start.1));
    let dx = f64::from(end.0) - x1;
    let dy = f64::from(end.1) - y1;
    let x_max = f64::from(DISPLAY_WIDTH - 1);
    let y_max = f64::from(DISPLAY_HEIGHT - 1);

    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [(-dx, x1), (dx, x_max - x1), (-dy, y1), (dy, y_max - y1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }

    let point = |t: f64| {
        let x = (x1 + t * dx).round().clamp(0.0, x_max) as i32;
        let y = (y1 + t * dy).round().clamp(0.0, y_max) as i32;
        (x, y)
    };
    Some((point(t0), point(t1)))
}

impl DisplayBuffer {
    /// Creates a blank buffer.
    pub fn new() -> DisplayBuffer {
        DisplayBuffer {
            raster: [0; DISPLAY_BUFFER_SIZE],
        }
    }

    /// Creates a buffer from a raw raster; `None` unless `bytes` is exactly 800 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<DisplayBuffer> {
        let raster = bytes.try_into().ok()?;
        Some(DisplayBuffer { raster })
    }

    /// The raw raster in device layout.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raster
    }

    /// Copies `bytes` into the raster starting at `offset`, clipped to the buffer end.
    ///
    /// Returns the number of bytes copied.
    pub fn copy_from_slice(&mut self, offset: usize, bytes: &[u8]) -> usize {
        if offset >= DISPLAY_BUFFER_SIZE {
            return 0;
        }
        let len = bytes.len().min(DISPLAY_BUFFER_SIZE - offset);
        self.raster[offset..offset + len].copy_from_slice(&bytes[..len]);
        len
    }

    pub fn clear(&mut self) {
        self.raster.fill(0);
    }

    /// Sets every pixel on or off.
    pub fn fill(&mut self, on: bool) {
        self.raster.fill(if on { 0xFF } else { 0x00 });
    }

    pub fn invert(&mut self) {
        for byte in self.raster.iter_mut() {
            *byte = !*byte;
        }
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, on: bool) {
        if let Some((index, mask)) = locate(x, y) {
            if on {
                self.raster[index] |= mask;
            } else {
                self.raster[index] &= !mask;
            }
        }
    }

    /// Returns `false` for coordinates outside the screen.
    pub fn get_pixel(&self, x: i32, y: i32) -> bool {
        match locate(x, y) {
            Some((index, mask)) => self.raster[index] & mask != 0,
            None => false,
        }
    }

    /// Lights a pixel given in widened coordinates.
    fn plot(&mut self, x: i64, y: i64) {
        if let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) {
            self.set_pixel(x, y, true);
        }
    }

    /// Draws a line with Bresenham's algorithm, both endpoints included.
    ///
    /// The walk always starts at the lexicographically smaller endpoint, so
    /// swapping the endpoints yields the same pixels. Segments reaching off
    /// screen are clipped to the screen before the walk.
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let (start, end) = if (x1, y1) <= (x2, y2) {
            ((x1, y1), (x2, y2))
        } else {
            ((x2, y2), (x1, y1))
        };
        let Some(((mut x, mut y), (x_end, y_end))) = clip_line(start, end) else {
            return;
        };

        let dx = (x_end - x).abs();
        let dy = (y_end - y).abs();
        let sx = if x < x_end { 1 } else { -1 };
        let sy = if y < y_end { 1 } else { -1 };
        let mut err = dx - dy;

        loop {
            self.set_pixel(x, y, true);
            if x == x_end && y == y_end {
                break;
            }
            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x += sx;
            }
            if e2 < dx {
                err += dx;
                y += sy;
            }
        }
    }

    /// Draws a `width` x `height` rectangle with its top left corner at `(x, y)`.
    pub fn draw_rect(&mut self, x: i32, y: i32, width: i32, height: i32, filled: bool) {
        if width <= 0 || height <= 0 {
            return;
        }
        let (left, top) = (i64::from(x), i64::from(y));
        let right = left + i64::from(width) - 1;
        let bottom = top + i64::from(height) - 1;
        let cols = left.max(0)..=right.min(i64::from(DISPLAY_WIDTH) - 1);
        let rows = top.max(0)..=bottom.min(i64::from(DISPLAY_HEIGHT) - 1);

        if filled {
            for row in rows {
                for col in cols.clone() {
                    self.plot(col, row);
                }
            }
            return;
        }

        for col in cols {
            self.plot(col, top);
            self.plot(col, bottom);
        }
        for row in rows {
            self.plot(left, row);
            self.plot(right, row);
        }
    }

    /// Draws a circle: midpoint outline, or every pixel with `dx² + dy² <= r²` when filled.
    ///
    /// Outlines too large for the midpoint walk are traced on screen instead,
    /// lighting every pixel of the disc with a 4-neighbour outside it.
    pub fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, filled: bool) {
        if radius < 0 {
            return;
        }
        let (cx, cy, radius) = (i64::from(cx), i64::from(cy), i64::from(radius));
        let inside = |px: i64, py: i64| {
            let (dx, dy) = (i128::from(px - cx), i128::from(py - cy));
            dx * dx + dy * dy <= i128::from(radius) * i128::from(radius)
        };

        if filled {
            for py in (cy - radius).max(0)..=(cy + radius).min(i64::from(DISPLAY_HEIGHT) - 1) {
                for px in (cx - radius).max(0)..=(cx + radius).min(i64::from(DISPLAY_WIDTH) - 1) {
                    if inside(px, py) {
                        self.plot(px, py);
                    }
                }
            }
            return;
        }

        if radius > MIDPOINT_MAX_RADIUS {
            for py in 0..i64::from(DISPLAY_HEIGHT) {
                for px in 0..i64::from(DISPLAY_WIDTH) {
                    let edge = !inside(px - 1, py)
                        || !inside(px + 1, py)
                        || !inside(px, py - 1)
                        || !inside(px, py + 1);
                    if inside(px, py) && edge {
                        self.plot(px, py);
                    }
                }
            }
            return;
        }

        let mut x = radius;
        let mut y = 0;
        let mut err = 0;
        while x >= y {
            for (px, py) in [
                (x, y),
                (y, x),
                (-y, x),
                (-x, y),
                (-x, -y),
                (-y, -x),
                (y, -x),
                (x, -y),
            ] {
                self.plot(cx + px, cy + py);
            }

            if err <= 0 {
                y += 1;
                err += 2 * y + 1;
            }
            if err > 0 {
                x -= 1;
                err -= 2 * x + 1;
            }
        }
    }

    /// Renders `text` with the 5x7 font, top left of the first glyph at `(x, y)`.
    pub fn draw_text(&mut self, text: &str, x: i32, y: i32) {
        let mut cursor = i64::from(x);
        for c in text.chars() {
            if cursor >= i64::from(DISPLAY_WIDTH) {
                break;
            }
            let columns = font::glyph(c);
            for (col, bits) in (0..font::GLYPH_WIDTH).zip(columns.iter()) {
                for row in 0..font::GLYPH_HEIGHT {
                    if bits & (1 << row) != 0 {
                        self.plot(cursor + i64::from(col), i64::from(y) + i64::from(row));
                    }
                }
            }
            cursor += i64::from(font::GLYPH_ADVANCE);
        }
    }

    /// Clears the buffer and draws `pattern` over the whole screen.
    pub fn draw_pattern(&mut self, pattern: Pattern) {
        trace!("Drawing display pattern {}", pattern.name());
        self.clear();
        match pattern {
            Pattern::Checkerboard => {
                for y in 0..DISPLAY_HEIGHT {
                    for x in 0..DISPLAY_WIDTH {
                        if (x + y) % 2 == 0 {
                            self.set_pixel(x, y, true);
                        }
                    }
                }
            }
            Pattern::HorizontalStripes => {
                for y in (0..DISPLAY_HEIGHT).step_by(4) {
                    for x in 0..DISPLAY_WIDTH {
                        self.set_pixel(x, y, true);
                        self.set_pixel(x, y + 1, true);
                    }
                }
            }
            Pattern::VerticalStripes => {
                for x in (0..DISPLAY_WIDTH).step_by(4) {
                    for y in 0..DISPLAY_HEIGHT {
                        self.set_pixel(x, y, true);
                        self.set_pixel(x + 1, y, true);
                    }
                }
            }
            Pattern::Grid => {
                for y in (0..DISPLAY_HEIGHT).step_by(8) {
                    self.draw_line(0, y, DISPLAY_WIDTH - 1, y);
                }
                for x in (0..DISPLAY_WIDTH).step_by(8) {
                    self.draw_line(x, 0, x, DISPLAY_HEIGHT - 1);
                }
            }
            Pattern::Dots => {
                for y in (2..DISPLAY_HEIGHT).step_by(8) {
                    for x in (2..DISPLAY_WIDTH).step_by(8) {
                        self.draw_rect(x, y, 2, 2, true);
                    }
                }
            }
            Pattern::Border => {
                self.draw_rect(0, 0, DISPLAY_WIDTH, DISPLAY_HEIGHT, false);
                self.draw_rect(2, 2, DISPLAY_WIDTH - 4, DISPLAY_HEIGHT - 4, false);
            }
            Pattern::Smile => {
                self.draw_circle(50, 32, 25, false);
                self.draw_circle(40, 26, 3, true);
                self.draw_circle(60, 26, 3, true);
                for x in 35..=65 {
                    let dx = x - 50;
                    let depth = f64::from(225 - dx * dx).sqrt() as i32 / 3;
                    self.set_pixel(x, 40 + depth, true);
                }
            }
        }
    }

    /// Draws the pattern called `name`; an unknown name leaves the buffer cleared.
    pub fn draw_pattern_named(&mut self, name: &str) {
        match name.parse::<Pattern>() {
            Ok(pattern) => self.draw_pattern(pattern),
            Err(_) => {
                trace!("Unknown display pattern '{}'", name);
                self.clear();
            }
        }
    }

    /// Serializes the buffer as a 1 bit per pixel BMP file.
    pub fn export_as_bitmap(&self) -> Vec<u8> {
        bitmap::encode(self)
    }

    fn lit_pixels(&self) -> usize {
        self.raster.iter().map(|b| b.count_ones() as usize).sum()
    }
}

//! Monochrome frame buffer shared by the renderer and the display drivers.
//!
//! Pixels are packed eight to a byte, most significant bit first, rows padded to
//! a whole byte. A set bit is white paper and a cleared bit is black ink, which
//! is the layout the panel's image RAM expects.

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};
use std::fmt::Write as _;

/// Rectangle in panel pixels, `x1`/`y1` exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Region {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Region {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn from_rect(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Smallest region covering both
    pub fn union(&self, other: &Region) -> Region {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Region {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow horizontally to whole bytes; the controller addresses RAM in 8 pixel columns.
    pub fn aligned_to_bytes(&self) -> Region {
        Region {
            x0: self.x0 / 8 * 8,
            y0: self.y0,
            x1: self.x1.div_ceil(8) * 8,
            y1: self.y1,
        }
    }

    /// Clip to a `width` x `height` panel
    pub fn clamped(&self, width: u32, height: u32) -> Region {
        Region::new(
            self.x0.min(width),
            self.y0.min(height),
            self.x1.min(width),
            self.y1.min(height),
        )
    }
}

/// 1-bit image the size of the panel
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    bits: Vec<u8>,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("black_pixels", &self.black_pixels())
            .finish()
    }
}

impl Frame {
    /// All-white frame
    pub fn new(width: u32, height: u32) -> Self {
        let bytes_per_row = width.div_ceil(8);
        Self {
            width,
            height,
            bits: vec![0xFF; (bytes_per_row * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width.div_ceil(8)
    }

    /// Raw packed image, row-major
    pub fn bytes(&self) -> &[u8] {
        &self.bits
    }

    /// The whole frame as a region
    pub fn bounds(&self) -> Region {
        Region::new(0, 0, self.width, self.height)
    }

    pub fn clear(&mut self) {
        self.bits.fill(0xFF);
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, black: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let byte_index = (y * self.bytes_per_row() + x / 8) as usize;
        let bit_mask = 0x80 >> (x % 8);
        if black {
            self.bits[byte_index] &= !bit_mask;
        } else {
            self.bits[byte_index] |= bit_mask;
        }
    }

    pub fn is_black(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let byte_index = (y * self.bytes_per_row() + x / 8) as usize;
        self.bits[byte_index] & (0x80 >> (x % 8)) == 0
    }

    /// Paint a rectangle solid
    pub fn fill_region(&mut self, region: Region, black: bool) {
        let region = region.clamped(self.width, self.height);
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                self.set_pixel(x, y, black);
            }
        }
    }

    pub fn black_pixels(&self) -> u32 {
        // Padding bits at the end of each row stay white, so they never count
        self.bits.iter().map(|b| b.count_zeros()).sum()
    }

    pub fn black_pixels_in(&self, region: Region) -> u32 {
        let region = region.clamped(self.width, self.height);
        let mut count = 0;
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                if self.is_black(x, y) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Packed bytes of a byte-aligned window, row by row.
    ///
    /// `region` is aligned outward and clipped to the frame first.
    pub fn window_bytes(&self, region: Region) -> Vec<u8> {
        let region = region
            .aligned_to_bytes()
            .clamped(self.bytes_per_row() * 8, self.height);
        let first = (region.x0 / 8) as usize;
        let last = (region.x1 / 8) as usize;
        let stride = self.bytes_per_row() as usize;
        let mut out = Vec::with_capacity((last - first) * region.height() as usize);
        for y in region.y0 as usize..region.y1 as usize {
            out.extend_from_slice(&self.bits[y * stride + first..y * stride + last]);
        }
        out
    }

    /// Copy `region` of `source` into this frame. Frames must be the same size.
    pub fn copy_region_from(&mut self, source: &Frame, region: Region) {
        let region = region.clamped(self.width, self.height);
        for y in region.y0..region.y1 {
            for x in region.x0..region.x1 {
                self.set_pixel(x, y, source.is_black(x, y));
            }
        }
    }

    /// Bounding box of the pixels that differ from `other`, if any
    pub fn diff_bounds(&self, other: &Frame) -> Option<Region> {
        let mut bounds: Option<Region> = None;
        for y in 0..self.height.min(other.height) {
            for x in 0..self.width.min(other.width) {
                if self.is_black(x, y) != other.is_black(x, y) {
                    let pixel = Region::from_rect(x, y, 1, 1);
                    bounds = Some(bounds.map_or(pixel, |b| b.union(&pixel)));
                }
            }
        }
        bounds
    }

    /// Binary PBM (P4) image; PBM uses 1 for black so the bits are inverted.
    pub fn to_pbm(&self) -> Vec<u8> {
        let mut header = String::new();
        let _ = write!(header, "P4\n{} {}\n", self.width, self.height);
        let mut out = header.into_bytes();
        out.extend(self.bits.iter().map(|b| !b));
        out
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Frame {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color.is_on());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_new_frame_is_white() {
        let frame = Frame::new(20, 3);
        assert_eq!(frame.bytes_per_row(), 3);
        assert_eq!(frame.bytes().len(), 9);
        assert_eq!(frame.black_pixels(), 0);
    }

    #[test]
    fn test_set_pixel_msb_first() {
        let mut frame = Frame::new(16, 1);
        frame.set_pixel(0, 0, true);
        frame.set_pixel(9, 0, true);
        assert_eq!(frame.bytes(), &[0x7F, 0xBF]);
        assert!(frame.is_black(9, 0));

        frame.set_pixel(9, 0, false);
        assert_eq!(frame.bytes(), &[0x7F, 0xFF]);

        // Out of bounds writes are ignored
        frame.set_pixel(16, 0, true);
        assert_eq!(frame.black_pixels(), 1);
    }

    #[test]
    fn test_region_union_and_alignment() {
        let a = Region::from_rect(10, 10, 5, 5);
        let b = Region::from_rect(30, 2, 4, 4);
        assert_eq!(a.union(&b), Region::new(10, 2, 34, 15));
        assert_eq!(a.union(&Region::new(0, 0, 0, 0)), a);

        let aligned = Region::new(10, 2, 34, 15).aligned_to_bytes();
        assert_eq!(aligned, Region::new(8, 2, 40, 15));
    }

    #[test]
    fn test_window_bytes_extracts_rows() {
        let mut frame = Frame::new(32, 4);
        frame.fill_region(Region::new(8, 1, 16, 3), true);
        let window = frame.window_bytes(Region::new(9, 1, 15, 3));
        assert_eq!(window, vec![0x00, 0x00]);

        let wide = frame.window_bytes(Region::new(0, 0, 24, 1));
        assert_eq!(wide, vec![0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_draw_target_paints_black() {
        let mut frame = Frame::new(40, 40);
        Rectangle::new(Point::new(5, 5), Size::new(10, 10))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(&mut frame)
            .unwrap();
        assert_eq!(frame.black_pixels(), 100);
        assert_eq!(frame.black_pixels_in(Region::from_rect(5, 5, 10, 10)), 100);
        assert_eq!(frame.diff_bounds(&Frame::new(40, 40)), Some(Region::from_rect(5, 5, 10, 10)));
    }

    #[test]
    fn test_pbm_header_and_polarity() {
        let mut frame = Frame::new(8, 1);
        frame.set_pixel(0, 0, true);
        let pbm = frame.to_pbm();
        assert!(pbm.starts_with(b"P4\n8 1\n"));
        assert_eq!(*pbm.last().unwrap(), 0x80);
    }
}

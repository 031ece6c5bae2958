//! Display codec
//!
//! A [`DisplayFrame`] is the caller's view of the LCD: 160x43 pixels, row
//! major, one bit per pixel, most significant bit leftmost. The device wants
//! the same pixels transposed into 8-row bands, one byte per column per band
//! with bit 0 as the topmost row, behind a 32-byte header whose first byte is
//! the protocol marker.

use crate::error::KeyboardError;

/// Display width in pixels
pub const LCD_WIDTH: usize = 160;
/// Display height in pixels
pub const LCD_HEIGHT: usize = 43;
/// Header bytes before the pixel data
pub const LCD_HEADER_LEN: usize = 32;
/// Number of 8-row bands (height rounded up)
pub const LCD_BANDS: usize = LCD_HEIGHT.div_ceil(8);
/// Full device buffer length
pub const LCD_BUFFER_LEN: usize = LCD_HEADER_LEN + LCD_BANDS * LCD_WIDTH;
/// First byte of every display write
pub const LCD_MARKER: u8 = 0x03;

/// Bytes per frame row
pub const FRAME_STRIDE: usize = LCD_WIDTH / 8;
/// Frame length in bytes
pub const FRAME_LEN: usize = FRAME_STRIDE * LCD_HEIGHT;

/// Monochrome frame in row-major, 1 bit per pixel layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    bits: Vec<u8>,
}

impl Default for DisplayFrame {
    fn default() -> Self {
        Self::blank()
    }
}

impl DisplayFrame {
    /// All pixels off
    pub fn blank() -> Self {
        Self {
            bits: vec![0; FRAME_LEN],
        }
    }

    /// All pixels on
    pub fn filled() -> Self {
        Self {
            bits: vec![0xFF; FRAME_LEN],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyboardError> {
        if bytes.len() != FRAME_LEN {
            return Err(KeyboardError::InvalidFrame {
                expected: FRAME_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bits: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Pixel state; coordinates outside the display read as off
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        if x >= LCD_WIDTH || y >= LCD_HEIGHT {
            return false;
        }
        self.bits[y * FRAME_STRIDE + x / 8] & (0x80 >> (x % 8)) != 0
    }

    /// Set a pixel; coordinates outside the display are ignored
    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        if x >= LCD_WIDTH || y >= LCD_HEIGHT {
            return;
        }
        let mask = 0x80 >> (x % 8);
        let byte = &mut self.bits[y * FRAME_STRIDE + x / 8];
        if on {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }

    pub fn invert(&mut self) {
        for byte in &mut self.bits {
            *byte = !*byte;
        }
    }

    /// Number of lit pixels
    pub fn lit_pixels(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }
}

/// Device-layout display buffer, ready for an interrupt write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcdBuffer {
    bytes: Vec<u8>,
}

impl LcdBuffer {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyboardError> {
        if bytes.len() != LCD_BUFFER_LEN {
            return Err(KeyboardError::InvalidFrame {
                expected: LCD_BUFFER_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Transposed pixel bytes after the header
    pub fn pixel_bytes(&self) -> &[u8] {
        &self.bytes[LCD_HEADER_LEN..]
    }
}

/// Transpose a frame into the device layout
pub fn encode(frame: &DisplayFrame) -> LcdBuffer {
    let mut bytes = vec![0u8; LCD_BUFFER_LEN];
    bytes[0] = LCD_MARKER;

    for band in 0..LCD_BANDS {
        let out = &mut bytes[LCD_HEADER_LEN + band * LCD_WIDTH..][..LCD_WIDTH];
        for (col, byte) in out.iter_mut().enumerate() {
            *byte = (0..8)
                .filter(|bit| frame.pixel(col, band * 8 + bit))
                .fold(0u8, |acc, bit| acc | (1 << bit));
        }
    }

    LcdBuffer { bytes }
}

/// Inverse of [`encode`]; bits below the last display row are dropped
pub fn decode(buffer: &LcdBuffer) -> DisplayFrame {
    let mut frame = DisplayFrame::blank();
    let pixels = buffer.pixel_bytes();

    for y in 0..LCD_HEIGHT {
        let (band, bit) = (y / 8, y % 8);
        for x in 0..LCD_WIDTH {
            if pixels[band * LCD_WIDTH + x] & (1 << bit) != 0 {
                frame.set_pixel(x, y, true);
            }
        }
    }

    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_geometry() {
        assert_eq!(LCD_BANDS, 6);
        assert_eq!(LCD_BUFFER_LEN, 992);
        assert_eq!(FRAME_LEN, 860);
    }

    #[test]
    fn test_blank_frame() {
        let buffer = encode(&DisplayFrame::blank());
        assert_eq!(buffer.as_bytes().len(), LCD_BUFFER_LEN);
        assert_eq!(buffer.as_bytes()[0], LCD_MARKER);
        assert!(buffer.as_bytes()[1..LCD_HEADER_LEN].iter().all(|&b| b == 0));
        assert!(buffer.pixel_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_filled_frame() {
        let buffer = encode(&DisplayFrame::filled());
        let pixels = buffer.pixel_bytes();
        assert!(pixels[..5 * LCD_WIDTH].iter().all(|&b| b == 0xFF));
        // Last band holds rows 40..43 only
        assert!(pixels[5 * LCD_WIDTH..].iter().all(|&b| b == 0x07));
        assert!(buffer.as_bytes()[1..LCD_HEADER_LEN].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_single_pixel_positions() {
        let mut frame = DisplayFrame::blank();
        frame.set_pixel(0, 0, true);
        frame.set_pixel(9, 10, true);
        frame.set_pixel(159, 42, true);
        let buffer = encode(&frame);
        let pixels = buffer.pixel_bytes();

        assert_eq!(pixels[0], 0x01);
        assert_eq!(pixels[LCD_WIDTH + 9], 0x04);
        assert_eq!(pixels[5 * LCD_WIDTH + 159], 0x04);
        assert_eq!(pixels.iter().filter(|&&b| b != 0).count(), 3);
    }

    #[test]
    fn test_msb_is_leftmost_pixel() {
        let mut bytes = vec![0u8; FRAME_LEN];
        bytes[0] = 0x80;
        let frame = DisplayFrame::from_bytes(&bytes).unwrap();
        assert!(frame.pixel(0, 0));
        assert!(!frame.pixel(7, 0));
    }

    #[test]
    fn test_wrong_sizes_rejected() {
        assert!(matches!(
            DisplayFrame::from_bytes(&[0; 10]),
            Err(KeyboardError::InvalidFrame {
                expected: FRAME_LEN,
                actual: 10
            })
        ));
        assert!(LcdBuffer::from_bytes(&[0; FRAME_LEN]).is_err());
    }

    #[test]
    fn test_out_of_range_pixels() {
        let mut frame = DisplayFrame::blank();
        frame.set_pixel(LCD_WIDTH, 0, true);
        frame.set_pixel(0, LCD_HEIGHT, true);
        assert_eq!(frame, DisplayFrame::blank());
        assert!(!frame.pixel(500, 500));
    }

    #[test]
    fn test_invert() {
        let mut frame = DisplayFrame::blank();
        frame.invert();
        assert_eq!(frame, DisplayFrame::filled());
        assert_eq!(frame.lit_pixels(), LCD_WIDTH * LCD_HEIGHT);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), FRAME_LEN)) {
            let frame = DisplayFrame::from_bytes(&bytes).unwrap();
            prop_assert_eq!(decode(&encode(&frame)), frame);
        }

        #[test]
        fn prop_lit_pixels_preserved(bytes in proptest::collection::vec(any::<u8>(), FRAME_LEN)) {
            let frame = DisplayFrame::from_bytes(&bytes).unwrap();
            let lit: usize = encode(&frame)
                .pixel_bytes()
                .iter()
                .map(|b| b.count_ones() as usize)
                .sum();
            prop_assert_eq!(lit, frame.lit_pixels());
        }
    }
}

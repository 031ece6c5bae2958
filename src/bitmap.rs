//! Image to LCD frame conversion
//!
//! Images are scaled to 160x43, converted to luma and thresholded. Dark
//! pixels become lit LCD pixels, since the LCD draws "on" pixels dark.

use std::path::Path;

use g15_keyboard::{DisplayFrame, LCD_HEIGHT, LCD_WIDTH};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitmapError {
    #[error("Failed to open image: {0}")]
    Image(#[from] image::ImageError),
}

/// Conversion options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapOptions {
    /// Luma below this value lights a pixel
    pub threshold: u8,
    /// Swap lit and unlit pixels
    pub invert: bool,
    /// Nearest-neighbour scaling instead of smoothing
    pub nearest: bool,
}

impl Default for BitmapOptions {
    fn default() -> Self {
        Self {
            threshold: 128,
            invert: false,
            nearest: false,
        }
    }
}

/// Scale and threshold an image into a frame
pub fn image_to_frame(img: &DynamicImage, opts: &BitmapOptions) -> DisplayFrame {
    let filter = if opts.nearest {
        FilterType::Nearest
    } else {
        FilterType::Triangle
    };
    let luma = img
        .resize_exact(LCD_WIDTH as u32, LCD_HEIGHT as u32, filter)
        .to_luma8();

    let mut frame = DisplayFrame::blank();
    for (x, y, px) in luma.enumerate_pixels() {
        let dark = px.0[0] < opts.threshold;
        frame.set_pixel(x as usize, y as usize, dark != opts.invert);
    }
    frame
}

/// Load an image file and convert it
pub fn load_frame(path: impl AsRef<Path>, opts: &BitmapOptions) -> Result<DisplayFrame, BitmapError> {
    let img = image::open(path.as_ref())?;
    Ok(image_to_frame(&img, opts))
}

/// Render a frame the way the LCD shows it (lit = black)
pub fn frame_to_image(frame: &DisplayFrame) -> GrayImage {
    GrayImage::from_fn(LCD_WIDTH as u32, LCD_HEIGHT as u32, |x, y| {
        if frame.pixel(x as usize, y as usize) {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(320, 86, Luma([value])))
    }

    #[test]
    fn test_black_image_lights_everything() {
        let frame = image_to_frame(&uniform(0), &BitmapOptions::default());
        assert_eq!(frame, DisplayFrame::filled());
    }

    #[test]
    fn test_white_image_is_blank() {
        let frame = image_to_frame(&uniform(255), &BitmapOptions::default());
        assert_eq!(frame, DisplayFrame::blank());
    }

    #[test]
    fn test_invert() {
        let opts = BitmapOptions {
            invert: true,
            ..Default::default()
        };
        assert_eq!(image_to_frame(&uniform(255), &opts), DisplayFrame::filled());
    }

    #[test]
    fn test_threshold() {
        let opts = BitmapOptions {
            threshold: 100,
            ..Default::default()
        };
        assert_eq!(image_to_frame(&uniform(120), &opts), DisplayFrame::blank());
        assert_eq!(image_to_frame(&uniform(80), &opts), DisplayFrame::filled());
    }

    #[test]
    fn test_left_half_dark() {
        let img = GrayImage::from_fn(LCD_WIDTH as u32, LCD_HEIGHT as u32, |x, _| {
            if x < 80 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let opts = BitmapOptions {
            nearest: true,
            ..Default::default()
        };
        let frame = image_to_frame(&DynamicImage::ImageLuma8(img), &opts);
        assert!(frame.pixel(0, 0));
        assert!(frame.pixel(79, 42));
        assert!(!frame.pixel(80, 0));
        assert_eq!(frame.lit_pixels(), 80 * LCD_HEIGHT);
    }

    #[test]
    fn test_preview_matches_frame() {
        let mut frame = DisplayFrame::blank();
        frame.set_pixel(3, 4, true);
        let img = frame_to_image(&frame);
        assert_eq!(img.dimensions(), (LCD_WIDTH as u32, LCD_HEIGHT as u32));
        assert_eq!(img.get_pixel(3, 4).0[0], 0);
        assert_eq!(img.get_pixel(4, 4).0[0], 255);

        let back = image_to_frame(&DynamicImage::ImageLuma8(img), &BitmapOptions::default());
        assert_eq!(back, frame);
    }
}

// Logitech G-series keyboard driver - shared library
// Config file handling and image conversion for the LCD

pub mod bitmap;
pub mod config;

pub use bitmap::{frame_to_image, image_to_frame, load_frame, BitmapError, BitmapOptions};
pub use config::DriverConfig;

pub use g15_keyboard as keyboard;
pub use g15_transport as transport;

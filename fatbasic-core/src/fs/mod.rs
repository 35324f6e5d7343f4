//! Filesystem seam for the file-command bridge.
//!
//! - `FatDriver`: the driver interface (directory services + byte I/O)
//! - `MemoryFatFs`: in-memory multi-volume implementation
//! - volume images: ZIP + manifest loading into a drive slot

mod fat_driver;
mod image;
mod memory_fat;

pub use fat_driver::{DriverError, DriverResult, FatDriver, Fd, OpenMode, DRIVE_COUNT};
pub use image::{
    load_image, load_image_from_path, ImageEntry, ImageError, ImageResult, VolumeImage,
    VolumeManifest,
};
pub use memory_fat::MemoryFatFs;

#[cfg(feature = "io_ext")]
pub mod io_ext;

pub mod texture;

/// PlayStation CD-ROM sector size in bytes
pub const SECTOR_SIZE: u64 = 2048;

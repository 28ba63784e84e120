//! Sector addressable storage for file system development. Real disks are driven through the
//! [`BlockStorage`] trait; [`FileBlockEmulator`] backs one with a plain host file.
mod blockio;
mod emulator;

pub use blockio::{BlockStorage, SectorNumber, SECTOR_SIZE};
pub use emulator::{FileBlockEmulator, FileBlockEmulatorBuilder};

//! A minimal sector-addressed file system.
//!
//! A device is split into an inode area followed by a data area. Files grow one
//! sector at a time as data is appended, and open files are tracked in a bounded
//! handle table.
mod alloc;
mod config;
mod error;
mod fs;
mod handle;
mod layout;
mod node;
pub mod vfs;

pub use crate::alloc::{BlockAllocator, NextAvailableAllocation};
pub use crate::config::{FsConfig, DEFAULT_MAX_OPEN_FILES, DEFAULT_OWNER};
pub use crate::error::{ErrorKind, FsError, Result};
pub use crate::fs::FileSystem;
pub use crate::handle::{HandleId, IO_BLOCK_SIZE};
pub use crate::layout::Layout;
pub use crate::node::{FileType, Inode, DIRECT_BLOCKS, INODES_PER_SECTOR};
pub use fileblock::{BlockStorage, FileBlockEmulator, FileBlockEmulatorBuilder, SECTOR_SIZE};

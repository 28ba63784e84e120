use std::convert::TryFrom;

use fileblock::SECTOR_SIZE;

use crate::error::{FsError, Result};
use crate::node::{inode_area_begin_sector, INODES_PER_SECTOR};

/// Where the inode area ends and the data area begins on a formatted device.
///
/// # Layout
/// ======================================
/// | Inodes (n sectors) | Data Region    |
/// ======================================
///
/// Computed once at format time and never changed afterwards. Every block address
/// handed to a file lies in `[data_area_start, total_sectors)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// The block size requested at format time.
    pub block_size: usize,
    pub total_sectors: u32,
    pub inode_area_start: u32,
    pub inode_area_sectors: u32,
    pub data_area_start: u32,
    /// How many `block_size` units the device holds.
    pub data_units: u32,
}

impl Layout {
    /// Plans the inode and data areas for a device of `total_sectors` sectors.
    ///
    /// The inode area gets one sector per `INODES_PER_SECTOR` block units when that
    /// divides evenly and a single sector otherwise. The single sector is a floor, it
    /// does not grow with the device.
    pub fn plan(total_sectors: u32, block_size: usize) -> Result<Self> {
        if block_size == 0 || block_size % SECTOR_SIZE != 0 {
            return Err(FsError::InvalidBlockSize(block_size));
        }
        let sectors_per_region = u32::try_from(block_size / SECTOR_SIZE)
            .map_err(|_| FsError::InvalidBlockSize(block_size))?;

        let data_units = total_sectors / sectors_per_region;
        if data_units == 0 {
            return Err(FsError::DeviceTooSmall { total_sectors });
        }

        let inode_area_sectors = if data_units % INODES_PER_SECTOR == 0 {
            data_units / INODES_PER_SECTOR
        } else {
            1
        };

        let inode_area_start = inode_area_begin_sector();
        let data_area_start = inode_area_start + inode_area_sectors;
        if total_sectors < data_area_start {
            return Err(FsError::DeviceTooSmall { total_sectors });
        }

        Ok(Self {
            block_size,
            total_sectors,
            inode_area_start,
            inode_area_sectors,
            data_area_start,
            data_units,
        })
    }

    /// Sectors left for file data once the inode area is carved out.
    pub fn free_sector_count(&self) -> u32 {
        self.total_sectors - self.data_area_start
    }

    /// The figure reported by format: block units not consumed by the inode area.
    pub fn available_blocks(&self) -> u32 {
        self.data_units.saturating_sub(self.inode_area_sectors)
    }

    pub fn inode_count(&self) -> u32 {
        self.inode_area_sectors * INODES_PER_SECTOR
    }

    pub fn is_data_sector(&self, addr: u32) -> bool {
        addr >= self.data_area_start && addr < self.total_sectors
    }
}

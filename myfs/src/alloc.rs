use crate::error::{FsError, Result};
use crate::layout::Layout;

/// Hands out data-area sector addresses to growing files.
///
/// Implementations must never return an address that is still bound to a live inode.
pub trait BlockAllocator {
    /// Reserves and returns the next free data sector.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NoSpace`] once the data area is exhausted.
    fn allocate(&mut self) -> Result<u32>;
    /// Sectors that can still be handed out.
    fn free_sectors(&self) -> u32;
}

/// Implements a naive block allocation policy for new data block requirements. This policy will
/// retrieve the next sequential sector and on each call to the iterator will return the
/// next consecutive one. Sectors are never returned to the pool.
///
/// ## Other Allocation Policies
///
/// 1. A free list fed by truncation and unlink, so released sectors are reused before the
///    marker advances.
/// 2. Allocation that attempts to spread randomly over blocks to prevent wear of physical devices
///    in the front section (that may be rewritten many times before allocating to the back).
#[derive(Debug, Clone)]
pub struct NextAvailableAllocation {
    /// The next sector to hand out.
    marker: u32,
    /// One past the last sector of the data area.
    end: u32,
}

impl NextAvailableAllocation {
    pub fn new(layout: &Layout) -> Self {
        Self {
            marker: layout.data_area_start,
            end: layout.total_sectors,
        }
    }
}

impl Iterator for NextAvailableAllocation {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.marker >= self.end {
            return None;
        }
        let sector = self.marker;
        self.marker += 1;
        Some(sector)
    }
}

impl BlockAllocator for NextAvailableAllocation {
    fn allocate(&mut self) -> Result<u32> {
        self.next().ok_or(FsError::NoSpace)
    }

    fn free_sectors(&self) -> u32 {
        self.end - self.marker
    }
}

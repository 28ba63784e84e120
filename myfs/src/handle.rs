use fileblock::SECTOR_SIZE;

use crate::error::{FsError, Result};
use crate::node::Inode;

/// Identifies an open file. Ids are 1-based; id `n` lives in slot `n - 1` and 0 never
/// names a handle.
pub type HandleId = u32;

/// Blocks the I/O engine walks per handle. One sector per block.
pub const IO_BLOCK_SIZE: usize = SECTOR_SIZE;

/// An open file: the path it was opened under, its inode and the two cursors.
#[derive(Debug)]
pub struct Handle {
    id: HandleId,
    path: String,
    pub(crate) inode: Inode,
    /// Bytes appended so far. Never decreases while the handle is open.
    pub(crate) cursor: u32,
    pub(crate) read_cursor: u32,
    block_size: usize,
}

impl Handle {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn inode(&self) -> &Inode {
        &self.inode
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

/// A fixed number of handle slots plus a free list of the empty ones.
#[derive(Debug)]
pub struct HandleTable {
    slots: Vec<Option<Handle>>,
    /// Empty slot indices in descending order, so the lowest index is popped first.
    free: Vec<usize>,
}

impl HandleTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            free: (0..capacity).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live(&self) -> usize {
        self.capacity() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty()
    }

    pub fn find_by_path(&self, path: &str) -> Option<HandleId> {
        self.slots
            .iter()
            .flatten()
            .find(|handle| handle.path == path)
            .map(|handle| handle.id)
    }

    /// Binds `inode` to a new handle with both cursors at 0.
    pub fn insert(&mut self, path: String, inode: Inode) -> Result<HandleId> {
        let slot = self.free.pop().ok_or(FsError::TooManyOpenFiles)?;
        let id = slot as HandleId + 1;
        self.slots[slot] = Some(Handle {
            id,
            path,
            inode,
            cursor: 0,
            read_cursor: 0,
            block_size: IO_BLOCK_SIZE,
        });
        Ok(id)
    }

    fn slot(&self, id: HandleId) -> Result<usize> {
        let slot = (id as usize)
            .checked_sub(1)
            .filter(|&slot| slot < self.capacity())
            .ok_or(FsError::BadHandle(id))?;
        Ok(slot)
    }

    pub fn get(&self, id: HandleId) -> Result<&Handle> {
        let slot = self.slot(id)?;
        self.slots[slot].as_ref().ok_or(FsError::BadHandle(id))
    }

    pub fn get_mut(&mut self, id: HandleId) -> Result<&mut Handle> {
        let slot = self.slot(id)?;
        self.slots[slot].as_mut().ok_or(FsError::BadHandle(id))
    }

    /// Clears the slot for `id` and returns its handle. The table is untouched on error.
    pub fn remove(&mut self, id: HandleId) -> Result<Handle> {
        let slot = self.slot(id)?;
        let handle = self.slots[slot].take().ok_or(FsError::BadHandle(id))?;
        let pos = self.free.partition_point(|&free| free > slot);
        self.free.insert(pos, slot);
        Ok(handle)
    }
}

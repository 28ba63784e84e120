use fileblock::{BlockStorage, SECTOR_SIZE};
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::error::{FsError, Result};
use crate::layout::Layout;

pub const INODE_SIZE: usize = 64;
pub const INODES_PER_SECTOR: u32 = (SECTOR_SIZE / INODE_SIZE) as u32;
/// Number of block addresses an inode can hold. There are no indirect blocks.
pub const DIRECT_BLOCKS: usize = 12;

const INODE_AREA_BEGIN: u32 = 0;

/// The first sector holding inode records.
pub fn inode_area_begin_sector() -> u32 {
    INODE_AREA_BEGIN
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// The inode is free.
    Unset,
    Regular,
    Directory,
}

impl FileType {
    fn from_raw(raw: u32) -> Self {
        match raw {
            1 => FileType::Regular,
            2 => FileType::Directory,
            _ => FileType::Unset,
        }
    }

    fn raw(self) -> u32 {
        match self {
            FileType::Unset => 0,
            FileType::Regular => 1,
            FileType::Directory => 2,
        }
    }
}

/// On-disk inode record. This structure __must be exactly 64 bytes.__
#[repr(C)]
#[derive(AsBytes, FromBytes, FromZeroes, Clone, Copy, Debug, PartialEq, Eq)]
struct DiskInode {
    file_type: U32<LittleEndian>,
    /// The id of the owning user.
    owner: U32<LittleEndian>,
    /// The total size of the file in bytes.
    size: U32<LittleEndian>,
    /// The number of references to this file.
    ref_count: U32<LittleEndian>,
    /// Sector address of each block of the file, 0 when unallocated.
    blocks: [U32<LittleEndian>; DIRECT_BLOCKS],
}

/// An inode loaded into memory together with the number it was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    number: u32,
    disk: DiskInode,
}

impl Inode {
    fn zeroed(number: u32) -> Self {
        Self {
            number,
            disk: DiskInode::new_zeroed(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Sector address bound at `index`, 0 if none is.
    pub fn block_addr_at(&self, index: usize) -> u32 {
        self.disk.blocks.get(index).map_or(0, |addr| addr.get())
    }

    /// Binds `addr` as the block at `index`.
    pub fn bind_block(&mut self, index: usize, addr: u32) -> Result<()> {
        let slot = self
            .disk
            .blocks
            .get_mut(index)
            .ok_or(FsError::FileTooLarge(DIRECT_BLOCKS))?;
        slot.set(addr);
        Ok(())
    }

    pub fn block_count(&self) -> usize {
        self.disk.blocks.iter().filter(|b| b.get() != 0).count()
    }

    /// Bound block addresses in file order.
    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.disk
            .blocks
            .iter()
            .map(|b| b.get())
            .take_while(|&addr| addr != 0)
    }

    pub fn file_size(&self) -> u32 {
        self.disk.size.get()
    }

    pub fn set_file_size(&mut self, size: u32) {
        self.disk.size.set(size);
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_raw(self.disk.file_type.get())
    }

    pub fn set_file_type(&mut self, file_type: FileType) {
        self.disk.file_type.set(file_type.raw());
    }

    pub fn owner(&self) -> u32 {
        self.disk.owner.get()
    }

    pub fn set_owner(&mut self, owner: u32) {
        self.disk.owner.set(owner);
    }

    pub fn ref_count(&self) -> u32 {
        self.disk.ref_count.get()
    }

    pub fn set_ref_count(&mut self, count: u32) {
        self.disk.ref_count.set(count);
    }
}

/// Persists inode records in the inode area. Inode numbers are 1-based; inode `n`
/// occupies slot `(n - 1) % INODES_PER_SECTOR` of sector `begin + (n - 1) / INODES_PER_SECTOR`.
#[derive(Debug, Clone)]
pub struct InodeStore {
    begin: u32,
    sectors: u32,
}

impl InodeStore {
    pub fn new(layout: &Layout) -> Self {
        Self {
            begin: layout.inode_area_start,
            sectors: layout.inode_area_sectors,
        }
    }

    pub fn inode_count(&self) -> u32 {
        self.sectors * INODES_PER_SECTOR
    }

    fn locate(&self, number: u32) -> Result<(usize, usize)> {
        if number == 0 || number > self.inode_count() {
            return Err(FsError::InvalidInode(number));
        }
        let index = number - 1;
        let sector = (self.begin + index / INODES_PER_SECTOR) as usize;
        let offset = (index % INODES_PER_SECTOR) as usize * INODE_SIZE;
        Ok((sector, offset))
    }

    /// A zeroed in-memory inode for `number`. Nothing is written until [`save`](Self::save).
    pub fn create(&self, number: u32) -> Result<Inode> {
        self.locate(number)?;
        Ok(Inode::zeroed(number))
    }

    pub fn load<T: BlockStorage>(&self, dev: &mut T, number: u32) -> Result<Inode> {
        let (sector, offset) = self.locate(number)?;
        let mut buf = [0; SECTOR_SIZE];
        dev.read_sector(sector, &mut buf)?;
        Ok(Inode {
            number,
            disk: decode(&buf[offset..offset + INODE_SIZE]),
        })
    }

    /// Writes the inode back into its slot, leaving the sector's other records intact.
    pub fn save<T: BlockStorage>(&self, dev: &mut T, inode: &Inode) -> Result<()> {
        let (sector, offset) = self.locate(inode.number)?;
        let mut buf = [0; SECTOR_SIZE];
        dev.read_sector(sector, &mut buf)?;
        buf[offset..offset + INODE_SIZE].copy_from_slice(inode.disk.as_bytes());
        dev.write_sector(sector, &buf)?;
        Ok(())
    }

    /// Creates and persists a zeroed record for every slot of the inode area.
    /// Returns the number of inodes written.
    pub fn populate<T: BlockStorage>(&self, dev: &mut T) -> Result<u32> {
        let mut number = 1;
        for sector in self.begin..self.begin + self.sectors {
            let mut buf = [0; SECTOR_SIZE];
            for slot in buf.chunks_exact_mut(INODE_SIZE) {
                let inode = self.create(number)?;
                slot.copy_from_slice(inode.disk.as_bytes());
                number += 1;
            }
            dev.write_sector(sector as usize, &buf)?;
        }
        Ok(number - 1)
    }

    /// The first inode number at or after `start_hint` whose type is unset.
    pub fn find_free<T: BlockStorage>(&self, dev: &mut T, start_hint: u32) -> Result<u32> {
        let start = start_hint.max(1);
        if start > self.inode_count() {
            return Err(FsError::NoFreeInode);
        }

        let mut buf = [0; SECTOR_SIZE];
        let mut loaded = None;
        for number in start..=self.inode_count() {
            let (sector, offset) = self.locate(number)?;
            if loaded != Some(sector) {
                dev.read_sector(sector, &mut buf)?;
                loaded = Some(sector);
            }
            let record = decode(&buf[offset..offset + INODE_SIZE]);
            if FileType::from_raw(record.file_type.get()) == FileType::Unset {
                return Ok(number);
            }
        }
        Err(FsError::NoFreeInode)
    }
}

fn decode(bytes: &[u8]) -> DiskInode {
    // Callers always slice exactly INODE_SIZE bytes.
    DiskInode::read_from(bytes).unwrap_or_else(DiskInode::new_zeroed)
}

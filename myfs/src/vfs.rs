//! Entry points an outer virtual file system dispatches into.
//!
//! The dispatcher only ever sees a [`Driver`]; it never calls into a [`FileSystem`]
//! directly. Directory operations are part of the capability set but not implemented
//! yet, they fail with [`FsError::Unsupported`] so callers can tell a missing feature
//! apart from an invalid call.
use fileblock::BlockStorage;
use log::info;

use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::handle::HandleId;

pub const FS_ID: char = '1';
pub const FS_NAME: &str = "myfs";

/// The identity a driver registers under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsInfo {
    pub fsid: char,
    pub fsname: &'static str,
}

/// One entry read from a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inumber: u32,
}

pub trait Driver {
    fn info(&self) -> FsInfo;
    fn is_idle(&self) -> bool;
    fn format(&mut self, block_size: usize) -> Result<u32>;
    fn open(&mut self, path: &str) -> Result<HandleId>;
    fn read(&mut self, fd: HandleId, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, fd: HandleId, buf: &[u8]) -> Result<usize>;
    fn close(&mut self, fd: HandleId) -> Result<()>;

    fn open_dir(&mut self, _path: &str) -> Result<HandleId> {
        Err(FsError::Unsupported("open_dir"))
    }

    /// The entry at the directory cursor, `None` at the end of the directory.
    fn read_dir(&mut self, _fd: HandleId) -> Result<Option<DirEntry>> {
        Err(FsError::Unsupported("read_dir"))
    }

    fn link(&mut self, _fd: HandleId, _filename: &str, _inumber: u32) -> Result<()> {
        Err(FsError::Unsupported("link"))
    }

    fn unlink(&mut self, _fd: HandleId, _filename: &str) -> Result<()> {
        Err(FsError::Unsupported("unlink"))
    }

    fn close_dir(&mut self, _fd: HandleId) -> Result<()> {
        Err(FsError::Unsupported("close_dir"))
    }
}

impl<T: BlockStorage> Driver for FileSystem<T> {
    fn info(&self) -> FsInfo {
        FsInfo {
            fsid: FS_ID,
            fsname: FS_NAME,
        }
    }

    fn is_idle(&self) -> bool {
        FileSystem::is_idle(self)
    }

    fn format(&mut self, block_size: usize) -> Result<u32> {
        FileSystem::format(self, block_size)
    }

    fn open(&mut self, path: &str) -> Result<HandleId> {
        FileSystem::open(self, path)
    }

    fn read(&mut self, fd: HandleId, buf: &mut [u8]) -> Result<usize> {
        FileSystem::read(self, fd, buf)
    }

    fn write(&mut self, fd: HandleId, buf: &[u8]) -> Result<usize> {
        FileSystem::write(self, fd, buf)
    }

    fn close(&mut self, fd: HandleId) -> Result<()> {
        FileSystem::close(self, fd)
    }
}

/// Registered drivers, addressed by the slot they were registered into.
#[derive(Default)]
pub struct Vfs {
    drivers: Vec<Box<dyn Driver>>,
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `driver` and returns its slot.
    pub fn register(&mut self, driver: Box<dyn Driver>) -> Result<usize> {
        let info = driver.info();
        if self.drivers.iter().any(|d| d.info().fsid == info.fsid) {
            return Err(FsError::AlreadyRegistered(info.fsid));
        }
        self.drivers.push(driver);
        let slot = self.drivers.len() - 1;
        info!("Registered {} ({:?}) in slot {}.", info.fsname, info.fsid, slot);
        Ok(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut (dyn Driver + 'static)> {
        self.drivers.get_mut(slot).map(|d| d.as_mut())
    }

    pub fn find(&mut self, fsid: char) -> Option<&mut (dyn Driver + 'static)> {
        self.drivers
            .iter_mut()
            .find(|d| d.info().fsid == fsid)
            .map(|d| d.as_mut())
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

/// Installs `fs` as a driver in `vfs` and returns its slot.
pub fn install<T: BlockStorage + 'static>(vfs: &mut Vfs, fs: FileSystem<T>) -> Result<usize> {
    vfs.register(Box::new(fs))
}

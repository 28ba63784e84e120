use crate::blockio::{BlockStorage, SectorNumber, SECTOR_SIZE};
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::{BufWriter, ErrorKind, SeekFrom};
use std::path::Path;

pub struct FileBlockEmulator {
    /// The file must be a fixed-size file some exact multiple of the size of a sector.
    fd: File,
    /// The total number of sectors available in the file store.
    sector_count: usize,
}

/// Emulates block disk/flash storage in userspace using a file as sector storage.
/// This is only meant to be used for file system development and testing.
impl FileBlockEmulator {
    /// Opens an existing disk image. The sector count is derived from the length
    /// of the file, which must be an exact multiple of [`SECTOR_SIZE`].
    pub fn open_disk<P: AsRef<Path>>(dest: P) -> std::io::Result<Self> {
        // Return error if the file does not exist rather than create one.
        let fd = OpenOptions::new().read(true).write(true).open(dest)?;
        let len = fd.metadata()?.len() as usize;
        if len % SECTOR_SIZE != 0 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                "disk image length is not a whole number of sectors",
            ));
        }

        Ok(FileBlockEmulator {
            fd,
            sector_count: len / SECTOR_SIZE,
        })
    }

    /// Returns ownership of the underlying file descriptor to the caller.
    pub fn into_file(self) -> File {
        self.fd
    }

    fn check_range(&self, sectornr: SectorNumber) -> std::io::Result<()> {
        if sectornr >= self.sector_count {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "sector out of range",
            ));
        }
        Ok(())
    }
}

impl BlockStorage for FileBlockEmulator {
    fn read_sector(&mut self, sectornr: SectorNumber, buf: &mut [u8]) -> std::io::Result<()> {
        self.check_range(sectornr)?;
        if buf.len() < SECTOR_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "buffer does not contain enough space to read sector",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((sectornr * SECTOR_SIZE) as u64))?;
        self.fd.read_exact(&mut buf[..SECTOR_SIZE])
    }

    fn write_sector(&mut self, sectornr: SectorNumber, buf: &[u8]) -> std::io::Result<()> {
        self.check_range(sectornr)?;
        if buf.len() != SECTOR_SIZE {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "writes must cover exactly one sector",
            ));
        }
        self.fd
            .seek(SeekFrom::Start((sectornr * SECTOR_SIZE) as u64))?;
        self.fd.write_all(buf)
    }

    fn sector_count(&self) -> usize {
        self.sector_count
    }

    fn sync_disk(&mut self) -> std::io::Result<()> {
        self.fd.sync_all()?;
        Ok(())
    }
}

pub struct FileBlockEmulatorBuilder {
    fd: File,
    sector_count: usize,
    clear: bool,
}

impl From<File> for FileBlockEmulatorBuilder {
    fn from(fd: File) -> Self {
        FileBlockEmulatorBuilder {
            fd,
            sector_count: 0,
            clear: true,
        }
    }
}

impl FileBlockEmulatorBuilder {
    /// Sets the number of desired sectors in the emulated device.
    pub fn with_sector_count(mut self, sectors: usize) -> Self {
        self.sector_count = sectors;
        self
    }

    /// Whether the medium is zeroed on build. Defaults to true; set to false to
    /// reuse a previously written image.
    pub fn clear_medium(mut self, clear: bool) -> Self {
        self.clear = clear;
        self
    }

    /// This builder assumed ownership of the file descriptor used and does
    /// destructive things to prepare the file for use. Additionally, ownership
    /// of the file is transfered to the emulator meaning this builder can only
    /// be used to create one emulator.
    pub fn build(mut self) -> std::io::Result<FileBlockEmulator> {
        if self.sector_count == 0 {
            return Err(std::io::Error::new(
                ErrorKind::InvalidInput,
                "device must have at least one sector",
            ));
        }
        if self.clear {
            self.zero_medium()?;
        } else {
            let want = (self.sector_count * SECTOR_SIZE) as u64;
            if self.fd.metadata()?.len() < want {
                self.fd.set_len(want)?;
            }
        }
        Ok(FileBlockEmulator {
            fd: self.fd,
            sector_count: self.sector_count,
        })
    }

    fn zero_medium(&mut self) -> std::io::Result<()> {
        self.fd.seek(SeekFrom::Start(0))?;
        let mut bfd = BufWriter::new(&self.fd);
        // Zero out the "disk", buffering each write to prevent excessive syscalls.
        let zeroes = [0x00; SECTOR_SIZE];
        for _ in 0..self.sector_count {
            bfd.write_all(&zeroes)?;
        }
        bfd.flush()
    }
}

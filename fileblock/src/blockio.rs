/// The atomic unit of every device read and write.
pub const SECTOR_SIZE: usize = 512;

/// The sector number to access ranging from 0 (the first sector) to n - 1 (the last
/// sector) where n is number of sectors available.
pub type SectorNumber = usize;

/// Tried to map as closely as possible to the prescribed interface found here:
/// http://web.mit.edu/6.033/1997/handouts/html/04sfs.html.
///
/// All addressing is in whole sectors, there are no sub-sector writes.
pub trait BlockStorage {
    /// Reads sector number into provided buffer.
    ///
    /// # Errors
    ///
    /// Attempting to read a sector out of range, or into a buffer smaller than
    /// [`SECTOR_SIZE`], will return an error.
    fn read_sector(&mut self, sectornr: SectorNumber, buf: &mut [u8]) -> std::io::Result<()>;
    /// Writes provided buffer into the specified sector number.
    ///
    /// # Errors
    ///
    /// Attempting to write a sector out of range, or a buffer that is not exactly
    /// [`SECTOR_SIZE`] bytes, will return an error.
    fn write_sector(&mut self, sectornr: SectorNumber, buf: &[u8]) -> std::io::Result<()>;
    /// The number of sectors the device exposes.
    fn sector_count(&self) -> usize;
    /// Flush any buffered disk IO from memory. This is useful if it must guaranteed
    /// the disk writes actually occurred, for instance, if being re-read from
    /// disk.
    fn sync_disk(&mut self) -> std::io::Result<()>;
}

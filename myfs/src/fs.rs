use std::cmp::min;
use std::convert::TryFrom;

use fileblock::{BlockStorage, SECTOR_SIZE};
use log::{debug, info, warn};

use crate::alloc::{BlockAllocator, NextAvailableAllocation};
use crate::config::FsConfig;
use crate::error::{FsError, Result};
use crate::handle::{HandleId, HandleTable};
use crate::layout::Layout;
use crate::node::{FileType, Inode, InodeStore, DIRECT_BLOCKS};

/// State that only exists once a device has been formatted.
struct Formatted {
    layout: Layout,
    inodes: InodeStore,
    allocator: Box<dyn BlockAllocator>,
    root: u32,
}

/// A file system driver bound to one block device.
///
/// Every entry point takes `&mut self`, so the handle table and the allocator are
/// only ever touched by one caller at a time. Callers that share a `FileSystem`
/// across threads wrap it in a single `Mutex`.
pub struct FileSystem<T: BlockStorage> {
    dev: T,
    config: FsConfig,
    handles: HandleTable,
    formatted: Option<Formatted>,
}

impl<T: BlockStorage> FileSystem<T> {
    pub fn new(dev: T) -> Self {
        Self::with_config(dev, FsConfig::default())
    }

    pub fn with_config(dev: T, config: FsConfig) -> Self {
        Self {
            dev,
            handles: HandleTable::with_capacity(config.max_open_files()),
            config,
            formatted: None,
        }
    }

    /// Lays out the inode and data areas for `block_size` and creates the root
    /// directory. Returns the number of blocks available for data.
    ///
    /// # Errors
    ///
    /// Fails if `block_size` is not a positive multiple of the sector size, if the device
    /// cannot hold the inode area, if files are still open, or if any inode fails to persist.
    pub fn format(&mut self, block_size: usize) -> Result<u32> {
        if !self.handles.is_empty() {
            warn!("Refusing to format with {} open files.", self.handles.live());
            return Err(FsError::Busy);
        }

        let sector_count = self.dev.sector_count();
        let total_sectors = u32::try_from(sector_count).map_err(|_| {
            warn!("Device of {} sectors exceeds 32-bit sector addressing.", sector_count);
            FsError::DeviceTooLarge(sector_count)
        })?;
        let layout = Layout::plan(total_sectors, block_size)?;
        let inodes = InodeStore::new(&layout);

        // The inode area is about to be overwritten; a failure from here on
        // leaves the device unformatted.
        self.formatted = None;
        let created = inodes.populate(&mut self.dev)?;

        // The inode area size depends on the block size, so the root is whatever
        // inode the scan turns up first.
        let root_number = inodes.find_free(&mut self.dev, 1)?;
        let mut root = inodes.load(&mut self.dev, root_number)?;
        root.set_file_type(FileType::Directory);
        root.set_file_size(0);
        root.set_owner(self.config.owner());
        root.set_ref_count(1);
        inodes.save(&mut self.dev, &root)?;
        self.dev.sync_disk()?;

        info!(
            "Formatted {} sectors: {} inodes in {} sectors, data from sector {}, {} blocks free.",
            layout.total_sectors,
            created,
            layout.inode_area_sectors,
            layout.data_area_start,
            layout.available_blocks()
        );

        self.formatted = Some(Formatted {
            layout,
            inodes,
            allocator: Box::new(NextAvailableAllocation::new(&layout)),
            root: root_number,
        });
        Ok(layout.available_blocks())
    }

    /// Creates a file for `path` and opens it for reading and appending.
    ///
    /// A path may only be open once; a second open fails rather than sharing the
    /// handle. The new inode stays allocated even if nothing is ever written.
    pub fn open(&mut self, path: &str) -> Result<HandleId> {
        let formatted = self.formatted.as_ref().ok_or(FsError::NotFormatted)?;
        if path.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        if let Some(id) = self.handles.find_by_path(path) {
            warn!("{} is already open as handle {}.", path, id);
            return Err(FsError::AlreadyOpen(path.to_string()));
        }
        if self.handles.is_full() {
            warn!("Cannot open {}: all {} handles in use.", path, self.handles.capacity());
            return Err(FsError::TooManyOpenFiles);
        }

        let number = formatted.inodes.find_free(&mut self.dev, 1)?;
        let mut inode = formatted.inodes.create(number)?;
        inode.set_file_type(FileType::Regular);
        inode.set_owner(self.config.owner());
        inode.set_ref_count(1);
        formatted.inodes.save(&mut self.dev, &inode)?;

        let id = self.handles.insert(path.to_string(), inode)?;
        info!("Opened {} as handle {} on inode {}.", path, id, number);
        Ok(id)
    }

    /// Appends `data` at the handle's cursor and returns the number of bytes written.
    ///
    /// A block left partially filled by an earlier write is read, patched after its
    /// last written byte and written back, so consecutive writes leave no gaps.
    ///
    /// # Errors
    ///
    /// If a block cannot be allocated or a sector write fails, blocks already written
    /// stay on the device but the inode is not saved, so its persisted size is unchanged.
    pub fn write(&mut self, fd: HandleId, data: &[u8]) -> Result<usize> {
        let formatted = self.formatted.as_mut().ok_or(FsError::NotFormatted)?;
        let handle = self.handles.get_mut(fd)?;
        if data.is_empty() {
            return Ok(0);
        }

        let block_size = handle.block_size();
        let end = handle.cursor as usize + data.len();
        if end > DIRECT_BLOCKS * block_size {
            warn!(
                "Write of {} bytes to handle {} exceeds the maximum file size.",
                data.len(),
                fd
            );
            return Err(FsError::FileTooLarge(DIRECT_BLOCKS));
        }

        let mut sector = [0; SECTOR_SIZE];
        let mut written = 0;
        while written < data.len() {
            let pos = handle.cursor as usize;
            let index = pos / block_size;
            let offset = pos % block_size;

            let mut addr = handle.inode.block_addr_at(index);
            if addr == 0 {
                addr = formatted.allocator.allocate().map_err(|e| {
                    warn!("Out of data sectors growing inode {}.", handle.inode.number());
                    e
                })?;
                handle.inode.bind_block(index, addr)?;
                debug!(
                    "Bound sector {} as block {} of inode {}.",
                    addr,
                    index,
                    handle.inode.number()
                );
            }

            self.dev.read_sector(addr as usize, &mut sector)?;
            let n = min(block_size - offset, data.len() - written);
            sector[offset..offset + n].copy_from_slice(&data[written..written + n]);
            self.dev.write_sector(addr as usize, &sector)?;

            written += n;
            handle.cursor += n as u32;
        }

        if handle.cursor > handle.inode.file_size() {
            handle.inode.set_file_size(handle.cursor);
        }
        formatted.inodes.save(&mut self.dev, &handle.inode)?;
        debug!("Wrote {} bytes to handle {}.", written, fd);
        Ok(written)
    }

    /// Reads from the handle's read cursor into `buf` and returns the number of bytes
    /// read. Reading at or past the end of the file returns fewer bytes than asked
    /// for, down to 0.
    pub fn read(&mut self, fd: HandleId, buf: &mut [u8]) -> Result<usize> {
        if self.formatted.is_none() {
            return Err(FsError::NotFormatted);
        }
        let handle = self.handles.get_mut(fd)?;

        let block_size = handle.block_size();
        let size = handle.inode.file_size() as usize;
        let mut sector = [0; SECTOR_SIZE];
        let mut read = 0;
        while read < buf.len() && (handle.read_cursor as usize) < size {
            let pos = handle.read_cursor as usize;
            let index = pos / block_size;
            let offset = pos % block_size;
            let n = min(min(block_size - offset, buf.len() - read), size - pos);

            match handle.inode.block_addr_at(index) {
                // Unbound blocks inside the file read as zeroes.
                0 => sector = [0; SECTOR_SIZE],
                addr => self.dev.read_sector(addr as usize, &mut sector)?,
            }
            buf[read..read + n].copy_from_slice(&sector[offset..offset + n]);

            read += n;
            handle.read_cursor += n as u32;
        }
        Ok(read)
    }

    /// Releases the handle. Writes have already persisted the inode, nothing is flushed.
    pub fn close(&mut self, fd: HandleId) -> Result<()> {
        let handle = self.handles.remove(fd)?;
        info!("Closed handle {} ({}).", fd, handle.path());
        Ok(())
    }

    /// True when no file is open.
    pub fn is_idle(&self) -> bool {
        self.handles.is_empty()
    }

    /// A copy of the inode behind an open handle, including unsaved changes.
    pub fn stat(&self, fd: HandleId) -> Result<Inode> {
        Ok(self.handles.get(fd)?.inode().clone())
    }

    /// Loads inode `number` as it is persisted on the device.
    pub fn load_inode(&mut self, number: u32) -> Result<Inode> {
        let formatted = self.formatted.as_ref().ok_or(FsError::NotFormatted)?;
        formatted.inodes.load(&mut self.dev, number)
    }

    pub fn layout(&self) -> Option<&Layout> {
        self.formatted.as_ref().map(|f| &f.layout)
    }

    /// Inode number of the root directory.
    pub fn root(&self) -> Option<u32> {
        self.formatted.as_ref().map(|f| f.root)
    }

    /// Data sectors the allocator can still hand out.
    pub fn free_sectors(&self) -> Result<u32> {
        let formatted = self.formatted.as_ref().ok_or(FsError::NotFormatted)?;
        Ok(formatted.allocator.free_sectors())
    }

    pub fn open_files(&self) -> usize {
        self.handles.live()
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Returns ownership of the underlying device, dropping every open handle.
    pub fn into_device(self) -> T {
        self.dev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use fileblock::{FileBlockEmulator, FileBlockEmulatorBuilder};

    fn create_test_device(sectors: usize) -> FileBlockEmulator {
        let dev = tempfile::tempfile().unwrap();
        FileBlockEmulatorBuilder::from(dev)
            .with_sector_count(sectors)
            .build()
            .expect("Could not initialize disk emulator.")
    }

    fn formatted(sectors: usize) -> FileSystem<FileBlockEmulator> {
        let mut fs = FileSystem::new(create_test_device(sectors));
        fs.format(512).unwrap();
        fs
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn block_contents(fs: FileSystem<FileBlockEmulator>, inode: &Inode) -> Vec<u8> {
        let mut dev = fs.into_device();
        let mut contents = Vec::new();
        for addr in inode.blocks() {
            let mut sector = [0; SECTOR_SIZE];
            dev.read_sector(addr as usize, &mut sector).unwrap();
            contents.extend_from_slice(&sector);
        }
        contents
    }

    #[test]
    fn format_reports_available_blocks() {
        let mut fs = FileSystem::new(create_test_device(64));

        assert_eq!(fs.format(512).unwrap(), 56);
        assert_eq!(fs.layout().unwrap().data_area_start, 8);
        assert_eq!(fs.free_sectors().unwrap(), 56);
    }

    #[test]
    fn format_creates_root_directory_inside_inode_area() {
        let mut fs = formatted(64);

        let root_number = fs.root().unwrap();
        let inode_count = fs.layout().unwrap().inode_count();
        let root = fs.load_inode(root_number).unwrap();

        assert!(root_number >= 1 && root_number <= inode_count);
        assert_eq!(root.file_type(), FileType::Directory);
        assert_eq!(root.file_size(), 0);
        assert_eq!(root.ref_count(), 1);
        assert_eq!(root.owner(), 1);
    }

    #[test]
    fn format_rejects_bad_block_size_and_tiny_device() {
        let mut fs = FileSystem::new(create_test_device(4));

        assert_eq!(fs.format(1000).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(fs.format(4096).unwrap_err().kind(), ErrorKind::Capacity);
        assert!(fs.layout().is_none());
    }

    #[cfg(target_pointer_width = "64")]
    struct HugeDevice;

    #[cfg(target_pointer_width = "64")]
    impl BlockStorage for HugeDevice {
        fn read_sector(&mut self, _: usize, _: &mut [u8]) -> std::io::Result<()> {
            unreachable!("format must fail before touching the device")
        }

        fn write_sector(&mut self, _: usize, _: &[u8]) -> std::io::Result<()> {
            unreachable!("format must fail before touching the device")
        }

        fn sector_count(&self) -> usize {
            u32::MAX as usize + 1
        }

        fn sync_disk(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn format_rejects_device_beyond_sector_addressing() {
        let mut fs = FileSystem::new(HugeDevice);

        let err = fs.format(512).unwrap_err();
        assert!(matches!(err, FsError::DeviceTooLarge(_)));
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(fs.layout().is_none());
    }

    #[test]
    fn open_reports_exhausted_inode_area() {
        // 100 sectors do not divide evenly, so the inode area is one sector of 8 inodes.
        let mut fs = formatted(100);
        assert_eq!(fs.layout().unwrap().inode_count(), 8);

        for i in 0..7 {
            fs.open(&format!("/f{}", i)).unwrap();
        }
        let err = fs.open("/f7").unwrap_err();
        assert!(matches!(err, FsError::NoFreeInode));
        assert_eq!(err.kind(), ErrorKind::Exhausted);
        assert_eq!(fs.open_files(), 7);
    }

    #[test]
    fn operations_before_format_fail() {
        let mut fs = FileSystem::new(create_test_device(16));

        assert!(matches!(fs.open("/a"), Err(FsError::NotFormatted)));
        assert!(matches!(fs.write(1, b"x"), Err(FsError::NotFormatted)));
        assert!(matches!(fs.free_sectors(), Err(FsError::NotFormatted)));
    }

    #[test]
    fn format_refuses_while_files_are_open() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();

        assert!(matches!(fs.format(512), Err(FsError::Busy)));
        fs.close(fd).unwrap();
        assert!(fs.format(512).is_ok());
    }

    #[test]
    fn second_open_of_same_path_conflicts() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();
        let number = fs.stat(fd).unwrap().number();

        let err = fs.open("/a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        // No second inode was taken for the rejected open.
        let next = fs.open("/b").unwrap();
        assert_eq!(fs.stat(next).unwrap().number(), number + 1);
    }

    #[test]
    fn open_allocates_regular_inode() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();

        assert_eq!(fd, 1);
        let inode = fs.stat(fd).unwrap();
        assert_ne!(Some(inode.number()), fs.root());
        let persisted = fs.load_inode(inode.number()).unwrap();
        assert_eq!(persisted.file_type(), FileType::Regular);
        assert_eq!(persisted.ref_count(), 1);
        assert_eq!(persisted.file_size(), 0);
    }

    #[test]
    fn write_sets_size_and_block_count() {
        for &n in &[1, 511, 512, 513, 1300, 6144] {
            let mut fs = formatted(64);
            let fd = fs.open("/a").unwrap();

            assert_eq!(fs.write(fd, &pattern(n)).unwrap(), n);

            let number = fs.stat(fd).unwrap().number();
            let inode = fs.load_inode(number).unwrap();
            assert_eq!(inode.file_size() as usize, n);
            assert_eq!(inode.block_count(), (n + 511) / 512);
        }
    }

    #[test]
    fn split_write_matches_single_write() {
        let data = pattern(1300);

        let mut whole = formatted(64);
        let fd = whole.open("/a").unwrap();
        whole.write(fd, &data).unwrap();
        let whole_inode = whole.stat(fd).unwrap();

        for &k in &[1, 200, 512, 700] {
            let mut split = formatted(64);
            let fd = split.open("/a").unwrap();
            assert_eq!(split.write(fd, &data[..k]).unwrap(), k);
            assert_eq!(split.write(fd, &data[k..]).unwrap(), data.len() - k);
            let split_inode = split.stat(fd).unwrap();

            assert_eq!(split_inode.file_size(), whole_inode.file_size());
            assert_eq!(split_inode.block_count(), whole_inode.block_count());
            let split_blocks = block_contents(split, &split_inode);
            let mut expected = data.clone();
            expected.resize(split_blocks.len(), 0);
            assert_eq!(split_blocks, expected);
        }
    }

    #[test]
    fn interleaved_files_never_share_a_sector() {
        let mut fs = formatted(64);
        let a = fs.open("/a").unwrap();
        let b = fs.open("/b").unwrap();

        for round in 0..5 {
            fs.write(a, &pattern(300 + round)).unwrap();
            fs.write(b, &pattern(700)).unwrap();
        }

        let layout = *fs.layout().unwrap();
        let mut a_blocks: Vec<u32> = fs.stat(a).unwrap().blocks().collect();
        let b_blocks: Vec<u32> = fs.stat(b).unwrap().blocks().collect();
        assert!(a_blocks.iter().chain(&b_blocks).all(|&s| layout.is_data_sector(s)));
        let total = a_blocks.len() + b_blocks.len();
        a_blocks.extend(b_blocks);
        a_blocks.sort_unstable();
        a_blocks.dedup();
        assert_eq!(a_blocks.len(), total);
    }

    #[test]
    fn read_returns_written_bytes_and_stops_at_eof() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();
        let data = pattern(1000);
        fs.write(fd, &data).unwrap();

        let mut buf = vec![0; 600];
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 600);
        assert_eq!(&buf[..], &data[..600]);
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 400);
        assert_eq!(&buf[..400], &data[600..]);
        assert_eq!(fs.read(fd, &mut buf).unwrap(), 0);
    }

    #[test]
    fn read_cursor_is_independent_of_append_cursor() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();
        fs.write(fd, b"hello ").unwrap();

        let mut buf = [0; 3];
        fs.read(fd, &mut buf).unwrap();
        assert_eq!(&buf, b"hel");

        fs.write(fd, b"world").unwrap();
        let mut rest = [0; 32];
        let n = fs.read(fd, &mut rest).unwrap();
        assert_eq!(&rest[..n], b"lo world");
    }

    #[test]
    fn write_past_direct_blocks_is_rejected_without_allocating() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();
        let before = fs.free_sectors().unwrap();

        let err = fs.write(fd, &pattern(DIRECT_BLOCKS * 512 + 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exhausted);
        assert_eq!(fs.free_sectors().unwrap(), before);
        assert_eq!(fs.stat(fd).unwrap().file_size(), 0);
    }

    #[test]
    fn running_out_of_sectors_keeps_persisted_size() {
        // 16 sectors: 2 for inodes, 14 for data.
        let mut fs = formatted(16);
        let a = fs.open("/a").unwrap();
        let b = fs.open("/b").unwrap();
        fs.write(a, &pattern(12 * 512)).unwrap();

        let err = fs.write(b, &pattern(3 * 512)).unwrap_err();
        assert!(matches!(err, FsError::NoSpace));
        assert_eq!(err.kind(), ErrorKind::Exhausted);

        let number = fs.stat(b).unwrap().number();
        assert_eq!(fs.load_inode(number).unwrap().file_size(), 0);
        assert_eq!(fs.free_sectors().unwrap(), 0);
    }

    #[test]
    fn close_rejects_unknown_and_closed_handles() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();

        for &bad in &[0, 129, 2] {
            assert_eq!(fs.close(bad).unwrap_err().kind(), ErrorKind::InvalidHandle);
        }
        assert_eq!(fs.open_files(), 1);

        fs.close(fd).unwrap();
        assert!(fs.is_idle());
        assert!(matches!(fs.close(fd), Err(FsError::BadHandle(1))));
        assert!(matches!(fs.write(fd, b"x"), Err(FsError::BadHandle(1))));
    }

    #[test]
    fn handle_table_exhaustion() {
        let max = 4;
        let mut fs =
            FileSystem::with_config(create_test_device(64), FsConfig::default().with_max_open_files(max));
        fs.format(512).unwrap();

        for i in 0..max {
            fs.open(&format!("/f{}", i)).unwrap();
        }
        let err = fs.open("/one-too-many").unwrap_err();
        assert!(matches!(err, FsError::TooManyOpenFiles));
        assert_eq!(fs.open_files(), max);
    }

    #[test]
    fn reopening_after_close_creates_a_new_file() {
        let mut fs = formatted(64);
        let fd = fs.open("/a").unwrap();
        fs.write(fd, b"first").unwrap();
        let first = fs.stat(fd).unwrap().number();
        fs.close(fd).unwrap();

        let fd = fs.open("/a").unwrap();
        assert_ne!(fs.stat(fd).unwrap().number(), first);
        assert_eq!(fs.stat(fd).unwrap().file_size(), 0);
    }
}

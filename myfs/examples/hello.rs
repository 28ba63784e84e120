use myfs::{FileBlockEmulatorBuilder, FileSystem};

pub fn main() {
    let tmp = tempfile::tempfile().unwrap();
    let dev = FileBlockEmulatorBuilder::from(tmp)
        .with_sector_count(64)
        .build()
        .expect("Could not initialize disk emulator.");

    // create a new file system on device and append to a file
    let mut fs = FileSystem::new(dev);
    let free = fs.format(512).expect("should format");
    let fd = fs.open("/hello").unwrap();
    fs.write(fd, b"hello world").unwrap();
    fs.close(fd).unwrap();
    println!("formatted with {} free blocks", free);
}

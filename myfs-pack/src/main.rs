mod cli;

use std::error::Error;
use std::fs::OpenOptions;

use clap::Parser;
use cli::Cli;
use log::info;
use myfs::{BlockStorage, FileBlockEmulatorBuilder, FileSystem, FsConfig};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let fd = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.image)?;
    let dev = FileBlockEmulatorBuilder::from(fd)
        .with_sector_count(cli.sectors)
        .build()?;

    let config = FsConfig::default().with_max_open_files(cli.max_open_files);
    let mut fs = FileSystem::with_config(dev, config);
    let free = fs.format(cli.block_size)?;
    println!("image={:?} sectors={} free blocks={}", cli.image, cli.sectors, free);

    for path in &cli.files {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format!("{:?} has no usable file name", path))?;
        let data = std::fs::read(path)?;

        let handle = fs.open(&format!("/{}", name))?;
        let written = fs.write(handle, &data)?;
        let inode = fs.stat(handle)?;
        fs.close(handle)?;
        info!("Packed {:?} into inode {}.", path, inode.number());
        println!("file: /{} ({} bytes, {} blocks)", name, written, inode.block_count());
    }

    fs.into_device().sync_disk()?;
    Ok(())
}

use clap::Parser;
use std::path::PathBuf;

/// Formats a disk image and appends host files into it.
#[derive(Parser)]
pub struct Cli {
    /// Image file to create, overwritten if it exists
    #[arg(long, short)]
    pub image: PathBuf,

    /// Number of 512 byte sectors in the image
    #[arg(long, short, default_value_t = 4096)]
    pub sectors: usize,

    /// Block size used to size the inode area
    #[arg(long, short, default_value_t = 512)]
    pub block_size: usize,

    /// Maximum number of files open at once
    #[arg(long, default_value_t = myfs::DEFAULT_MAX_OPEN_FILES)]
    pub max_open_files: usize,

    /// Host files to copy into the image
    pub files: Vec<PathBuf>,
}

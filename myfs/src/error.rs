use thiserror::Error;

use crate::handle::HandleId;

/// Broad failure categories callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested layout does not fit the device.
    Capacity,
    /// No free inode, handle slot, data sector or block address.
    Exhausted,
    /// The operation clashes with state already in place.
    Conflict,
    /// A sector read or write failed.
    Device,
    /// The handle id is unknown or already closed.
    InvalidHandle,
    /// The arguments are malformed or the call came out of order.
    InvalidArgument,
    /// The driver does not implement this capability.
    Unsupported,
}

#[derive(Error, Debug)]
pub enum FsError {
    #[error("block size {0} is not a positive multiple of the sector size")]
    InvalidBlockSize(usize),
    #[error("device of {total_sectors} sectors cannot hold an inode area")]
    DeviceTooSmall { total_sectors: u32 },
    #[error("device of {0} sectors exceeds 32-bit sector addressing")]
    DeviceTooLarge(usize),
    #[error("file system has not been formatted")]
    NotFormatted,
    #[error("cannot format while files are open")]
    Busy,
    #[error("no free inode available")]
    NoFreeInode,
    #[error("inode {0} lies outside the inode area")]
    InvalidInode(u32),
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("no free data sector available")]
    NoSpace,
    #[error("file would need more than {0} blocks")]
    FileTooLarge(usize),
    #[error("path is already open: {0}")]
    AlreadyOpen(String),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("bad file handle {0}")]
    BadHandle(HandleId),
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
    #[error("file system id {0:?} is already registered")]
    AlreadyRegistered(char),
    #[error("device I/O failed")]
    Device(#[from] std::io::Error),
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::DeviceTooSmall { .. } | FsError::DeviceTooLarge(_) => ErrorKind::Capacity,
            FsError::NoFreeInode
            | FsError::TooManyOpenFiles
            | FsError::NoSpace
            | FsError::FileTooLarge(_) => ErrorKind::Exhausted,
            FsError::AlreadyOpen(_) | FsError::Busy | FsError::AlreadyRegistered(_) => {
                ErrorKind::Conflict
            }
            FsError::Device(_) => ErrorKind::Device,
            FsError::BadHandle(_) => ErrorKind::InvalidHandle,
            FsError::InvalidBlockSize(_)
            | FsError::NotFormatted
            | FsError::InvalidInode(_)
            | FsError::InvalidPath(_) => ErrorKind::InvalidArgument,
            FsError::Unsupported(_) => ErrorKind::Unsupported,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

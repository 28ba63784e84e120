/// Matches the descriptor limit of the dispatcher this driver is installed into.
pub const DEFAULT_MAX_OPEN_FILES: usize = 128;
/// Owner id stamped on the root directory and on newly created files.
pub const DEFAULT_OWNER: u32 = 1;

/// Tunables fixed for the lifetime of a mounted [`FileSystem`](crate::FileSystem).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsConfig {
    max_open_files: usize,
    owner: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            owner: DEFAULT_OWNER,
        }
    }
}

impl FsConfig {
    /// Sets the number of handle slots, i.e. how many files may be open at once.
    pub fn with_max_open_files(mut self, max: usize) -> Self {
        self.max_open_files = max;
        self
    }

    pub fn with_owner(mut self, owner: u32) -> Self {
        self.owner = owner;
        self
    }

    pub fn max_open_files(&self) -> usize {
        self.max_open_files
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }
}

//! FatDriver trait - the filesystem driver interface the bridge calls into.

use thiserror::Error;

/// Number of mountable drive slots.
pub const DRIVE_COUNT: u8 = 2;

/// Access mode for byte-oriented opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read access only.
    ReadOnly,
    /// Create if absent, read-write access.
    CreateReadWrite,
}

/// File handle issued by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fd(pub u32);

/// Driver-side failure. The bridge only distinguishes ok from not-ok; the
/// variants exist for driver diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("invalid drive")]
    InvalidDrive,

    #[error("drive not mounted")]
    NotMounted,

    #[error("invalid path")]
    InvalidPath,

    #[error("entry exists")]
    Exists,

    #[error("directory not empty")]
    NotEmpty,

    #[error("bad file handle")]
    BadHandle,

    #[error("read fault")]
    ReadFault,
}

/// Result type for driver calls.
pub type DriverResult<T> = Result<T, DriverError>;

/// Filesystem interface over the mounted drive set.
///
/// Directory services mirror the FAT driver entry points; the byte I/O group
/// mirrors the POSIX-like layer above it. Volumes mount lazily: only `open`
/// mounts a volume on first access, directory services require the volume to
/// be mounted already.
///
/// Paths may carry a `<digit>:` drive prefix; without one they resolve on
/// the current drive, relative to that volume's working directory.
pub trait FatDriver: Send {
    /// Open a directory for enumeration.
    fn open_dir(&mut self, path: &str) -> DriverResult<()>;

    /// Make a drive the current one.
    fn change_drive(&mut self, drive: u8) -> DriverResult<()>;

    /// Change the working directory of the addressed volume.
    fn change_dir(&mut self, path: &str) -> DriverResult<()>;

    /// Working path of the current drive, in `N:/path` form.
    fn current_dir(&self) -> DriverResult<String>;

    /// Delete a file or an empty directory.
    fn remove(&mut self, path: &str) -> DriverResult<()>;

    /// Create a directory.
    fn make_dir(&mut self, path: &str) -> DriverResult<()>;

    /// Rename or move an entry within one volume.
    fn rename(&mut self, from: &str, to: &str) -> DriverResult<()>;

    /// Open a file for byte access.
    fn open(&mut self, path: &str, mode: OpenMode) -> DriverResult<Fd>;

    /// Close a handle. Unknown handles are ignored.
    fn close(&mut self, fd: Fd);

    /// Read up to `buf.len()` bytes. Returns 0 at end of stream.
    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> DriverResult<usize>;

    /// Write bytes, returning how many were accepted. A short count means
    /// the volume is out of space.
    fn write(&mut self, fd: Fd, data: &[u8]) -> DriverResult<usize>;
}

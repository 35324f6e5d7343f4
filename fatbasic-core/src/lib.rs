//! fatbasic File-Command Bridge Core
//!
//! This crate provides the file-manipulation command set of the fatbasic
//! interpreter over a multi-drive FAT-style filesystem:
//! - the six bridge operations (CD, PWD, KILL, MKDIR, COPY, RENAME)
//! - drive-prefix normalization and auto-mount probing
//! - streaming copy with cycle-counter throughput measurement
//!
//! # Architecture
//!
//! The bridge sits between two trait seams:
//! - `Interp`: the interpreter's expression evaluator and output
//! - `FatDriver`: the filesystem driver (directory services + byte I/O)
//! - `CycleClock`: the hardware cycle counter used by COPY
//!
//! Reference implementations (`ScriptedInterp`, `MemoryFatFs`, `HostClock`)
//! let the bridge run on a host machine exactly as it would on target.

pub mod clock;
pub mod commands;
pub mod error;
pub mod fs;
pub mod interp;

pub use clock::{decode_cpu_config, CycleClock, HostClock, ManualClock};
pub use commands::{FileBridge, FileCommand, COPY_BUF, MAX_PATH};
pub use error::{BasicError, BasicResult};
pub use fs::{
    load_image, load_image_from_path, DriverError, DriverResult, FatDriver, Fd, ImageError,
    MemoryFatFs, OpenMode, VolumeImage, VolumeManifest, DRIVE_COUNT,
};
pub use interp::{ArgStr, Interp, ScriptedInterp, StrPool};

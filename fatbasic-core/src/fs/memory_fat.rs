//! In-memory multi-volume filesystem driver.
//!
//! Behaves like the embedded FAT driver the bridge targets: a fixed set of
//! drive slots, per-volume working directories, case-folded names, and lazy
//! volume mounting triggered only by byte-oriented opens. Open-handle and
//! close accounting is kept so harnesses can prove no handle leaks.

use std::collections::{HashMap, HashSet};

use super::fat_driver::{DriverError, DriverResult, FatDriver, Fd, OpenMode, DRIVE_COUNT};
use super::image::VolumeImage;

/// One drive slot.
struct Volume {
    mounted: bool,
    cwd: String,
    dirs: HashSet<String>,
    files: HashMap<String, Vec<u8>>,
    capacity: Option<usize>,
}

impl Default for Volume {
    fn default() -> Self {
        let mut dirs = HashSet::new();
        dirs.insert("/".to_string());
        Self {
            mounted: false,
            cwd: "/".to_string(),
            dirs,
            files: HashMap::new(),
            capacity: None,
        }
    }
}

/// State of one open file handle.
struct OpenFile {
    drive: u8,
    path: String,
    data: Vec<u8>,
    pos: usize,
    writable: bool,
    modified: bool,
}

/// In-memory driver over `DRIVE_COUNT` volumes.
pub struct MemoryFatFs {
    volumes: [Volume; DRIVE_COUNT as usize],
    current: u8,
    handles: HashMap<u32, OpenFile>,
    next_fd: u32,
    opens: usize,
    closes: usize,
    read_faults: HashSet<(u8, String)>,
}

impl MemoryFatFs {
    pub fn new() -> Self {
        Self {
            volumes: std::array::from_fn(|_| Volume::default()),
            current: 0,
            handles: HashMap::new(),
            next_fd: 0,
            opens: 0,
            closes: 0,
            read_faults: HashSet::new(),
        }
    }

    /// Mark a volume as mounted without an open, as the boot code does for
    /// the system volume.
    pub fn mount(&mut self, drive: u8) -> DriverResult<()> {
        self.volume_mut(drive)?.mounted = true;
        Ok(())
    }

    pub fn is_mounted(&self, drive: u8) -> bool {
        self.volume(drive).map(|v| v.mounted).unwrap_or(false)
    }

    pub fn current_drive(&self) -> u8 {
        self.current
    }

    /// Create a directory (and its parents) on a volume. Test/setup helper;
    /// does not require the volume to be mounted.
    pub fn add_dir(&mut self, drive: u8, path: &str) {
        let canon = canon("/", path).expect("bad setup path");
        let vol = &mut self.volumes[drive as usize];
        let mut prefix = String::new();
        for seg in canon.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(seg);
            vol.dirs.insert(prefix.clone());
        }
    }

    /// Create a file on a volume, creating parent directories as needed.
    pub fn add_file(&mut self, drive: u8, path: &str, data: impl Into<Vec<u8>>) {
        let canon = canon("/", path).expect("bad setup path");
        let (parent, _) = parent_of(&canon);
        if parent != "/" {
            self.add_dir(drive, parent);
        }
        self.volumes[drive as usize].files.insert(canon, data.into());
    }

    /// Read a file's content back out, volume-absolute path.
    pub fn file_data(&self, drive: u8, path: &str) -> Option<Vec<u8>> {
        let canon = canon("/", path).ok()?;
        self.volume(drive).ok()?.files.get(&canon).cloned()
    }

    /// Whether a file or directory exists, volume-absolute path.
    pub fn entry_exists(&self, drive: u8, path: &str) -> bool {
        let Ok(canon) = canon("/", path) else {
            return false;
        };
        self.volume(drive)
            .map(|v| v.files.contains_key(&canon) || v.dirs.contains(&canon))
            .unwrap_or(false)
    }

    /// Cap a volume's total data size; writes past the cap come up short.
    pub fn set_capacity(&mut self, drive: u8, capacity: Option<usize>) {
        self.volumes[drive as usize].capacity = capacity;
    }

    /// Make the next read of the named file fail.
    pub fn inject_read_fault(&mut self, drive: u8, path: &str) {
        let canon = canon("/", path).expect("bad setup path");
        self.read_faults.insert((drive, canon));
    }

    /// Number of handles currently open.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    /// Successful opens since creation.
    pub fn total_opens(&self) -> usize {
        self.opens
    }

    /// Close calls since creation.
    pub fn total_closes(&self) -> usize {
        self.closes
    }

    /// Populate a drive slot from a loaded volume image. The volume stays
    /// unmounted until first open.
    pub fn install_image(&mut self, drive: u8, image: &VolumeImage) -> DriverResult<()> {
        if drive >= DRIVE_COUNT {
            return Err(DriverError::InvalidDrive);
        }
        for (path, data) in &image.files {
            self.add_file(drive, path, data.clone());
        }
        Ok(())
    }

    fn volume(&self, drive: u8) -> DriverResult<&Volume> {
        self.volumes
            .get(drive as usize)
            .ok_or(DriverError::InvalidDrive)
    }

    fn volume_mut(&mut self, drive: u8) -> DriverResult<&mut Volume> {
        self.volumes
            .get_mut(drive as usize)
            .ok_or(DriverError::InvalidDrive)
    }

    /// Split a drive prefix off and canonicalize the rest against the
    /// addressed volume's working directory.
    fn resolve(&self, path: &str) -> DriverResult<(u8, String)> {
        let (drive, rel) = self.split_drive(path)?;
        let vol = self.volume(drive)?;
        Ok((drive, canon(&vol.cwd, rel)?))
    }

    fn split_drive<'a>(&self, path: &'a str) -> DriverResult<(u8, &'a str)> {
        let bytes = path.as_bytes();
        if bytes.len() >= 2 && bytes[1] == b':' {
            let drive = bytes[0].wrapping_sub(b'0');
            if drive >= DRIVE_COUNT {
                return Err(DriverError::InvalidDrive);
            }
            Ok((drive, &path[2..]))
        } else {
            Ok((self.current, path))
        }
    }

    fn mounted(&self, drive: u8) -> DriverResult<&Volume> {
        let vol = self.volume(drive)?;
        if vol.mounted {
            Ok(vol)
        } else {
            Err(DriverError::NotMounted)
        }
    }

    fn mounted_mut(&mut self, drive: u8) -> DriverResult<&mut Volume> {
        let vol = self.volume_mut(drive)?;
        if vol.mounted {
            Ok(vol)
        } else {
            Err(DriverError::NotMounted)
        }
    }
}

impl Default for MemoryFatFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FatDriver for MemoryFatFs {
    fn open_dir(&mut self, path: &str) -> DriverResult<()> {
        let (drive, canon) = self.resolve(path)?;
        let vol = self.mounted(drive)?;
        if vol.dirs.contains(&canon) {
            Ok(())
        } else {
            Err(DriverError::NotFound(canon))
        }
    }

    fn change_drive(&mut self, drive: u8) -> DriverResult<()> {
        if drive >= DRIVE_COUNT {
            return Err(DriverError::InvalidDrive);
        }
        self.current = drive;
        Ok(())
    }

    fn change_dir(&mut self, path: &str) -> DriverResult<()> {
        let (drive, canon) = self.resolve(path)?;
        let vol = self.mounted_mut(drive)?;
        if vol.dirs.contains(&canon) {
            vol.cwd = canon;
            Ok(())
        } else {
            Err(DriverError::NotFound(canon))
        }
    }

    fn current_dir(&self) -> DriverResult<String> {
        let vol = self.mounted(self.current)?;
        Ok(format!("{}:{}", self.current, vol.cwd))
    }

    fn remove(&mut self, path: &str) -> DriverResult<()> {
        let (drive, canon) = self.resolve(path)?;
        let vol = self.mounted_mut(drive)?;
        if vol.files.remove(&canon).is_some() {
            return Ok(());
        }
        if vol.dirs.contains(&canon) {
            if canon == "/" || canon == vol.cwd {
                return Err(DriverError::InvalidPath);
            }
            let prefix = format!("{}/", canon);
            let occupied = vol.files.keys().any(|p| p.starts_with(&prefix))
                || vol.dirs.iter().any(|d| d.starts_with(&prefix));
            if occupied {
                return Err(DriverError::NotEmpty);
            }
            vol.dirs.remove(&canon);
            return Ok(());
        }
        Err(DriverError::NotFound(canon))
    }

    fn make_dir(&mut self, path: &str) -> DriverResult<()> {
        let (drive, canon) = self.resolve(path)?;
        let vol = self.mounted_mut(drive)?;
        if vol.dirs.contains(&canon) || vol.files.contains_key(&canon) {
            return Err(DriverError::Exists);
        }
        let (parent, _) = parent_of(&canon);
        if !vol.dirs.contains(parent) {
            return Err(DriverError::NotFound(parent.to_string()));
        }
        vol.dirs.insert(canon);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> DriverResult<()> {
        let (from_drive, from_canon) = self.resolve(from)?;
        let (to_drive, to_canon) = self.resolve(to)?;
        if from_drive != to_drive {
            return Err(DriverError::InvalidPath);
        }
        let vol = self.mounted_mut(from_drive)?;
        if vol.files.contains_key(&to_canon) || vol.dirs.contains(&to_canon) {
            return Err(DriverError::Exists);
        }
        let (to_parent, _) = parent_of(&to_canon);
        if !vol.dirs.contains(to_parent) {
            return Err(DriverError::NotFound(to_parent.to_string()));
        }

        if let Some(data) = vol.files.remove(&from_canon) {
            vol.files.insert(to_canon, data);
            return Ok(());
        }
        if vol.dirs.contains(&from_canon) {
            let prefix = format!("{}/", from_canon);
            if from_canon == "/" || to_canon.starts_with(&prefix) {
                return Err(DriverError::InvalidPath);
            }
            // Move the directory and everything under it.
            let moved_dirs: Vec<String> = vol
                .dirs
                .iter()
                .filter(|d| **d == from_canon || d.starts_with(&prefix))
                .cloned()
                .collect();
            for dir in moved_dirs {
                vol.dirs.remove(&dir);
                let renamed = format!("{}{}", to_canon, &dir[from_canon.len()..]);
                vol.dirs.insert(renamed);
            }
            let moved_files: Vec<String> = vol
                .files
                .keys()
                .filter(|p| p.starts_with(&prefix))
                .cloned()
                .collect();
            for path in moved_files {
                let data = vol.files.remove(&path).unwrap_or_default();
                let renamed = format!("{}{}", to_canon, &path[from_canon.len()..]);
                vol.files.insert(renamed, data);
            }
            return Ok(());
        }
        Err(DriverError::NotFound(from_canon))
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> DriverResult<Fd> {
        let (drive, canon) = self.resolve(path)?;

        // First access mounts the volume, whatever comes of the open itself.
        self.volumes[drive as usize].mounted = true;

        let vol = &mut self.volumes[drive as usize];
        if vol.dirs.contains(&canon) {
            return Err(DriverError::NotFound(canon));
        }
        let data = match vol.files.get(&canon) {
            Some(data) => data.clone(),
            None => {
                if mode == OpenMode::ReadOnly {
                    return Err(DriverError::NotFound(canon));
                }
                let (parent, _) = parent_of(&canon);
                if !vol.dirs.contains(parent) {
                    return Err(DriverError::NotFound(parent.to_string()));
                }
                vol.files.insert(canon.clone(), Vec::new());
                Vec::new()
            }
        };

        self.next_fd += 1;
        self.opens += 1;
        self.handles.insert(
            self.next_fd,
            OpenFile {
                drive,
                path: canon,
                data,
                pos: 0,
                writable: mode == OpenMode::CreateReadWrite,
                modified: false,
            },
        );
        Ok(Fd(self.next_fd))
    }

    fn close(&mut self, fd: Fd) {
        self.closes += 1;
        if let Some(file) = self.handles.remove(&fd.0) {
            if file.modified {
                self.volumes[file.drive as usize]
                    .files
                    .insert(file.path, file.data);
            }
        }
    }

    fn read(&mut self, fd: Fd, buf: &mut [u8]) -> DriverResult<usize> {
        let file = self.handles.get_mut(&fd.0).ok_or(DriverError::BadHandle)?;
        if self.read_faults.remove(&(file.drive, file.path.clone())) {
            return Err(DriverError::ReadFault);
        }
        let remaining = file.data.len().saturating_sub(file.pos);
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&file.data[file.pos..file.pos + n]);
        file.pos += n;
        Ok(n)
    }

    fn write(&mut self, fd: Fd, data: &[u8]) -> DriverResult<usize> {
        let file = self.handles.get_mut(&fd.0).ok_or(DriverError::BadHandle)?;
        if !file.writable {
            return Err(DriverError::BadHandle);
        }
        let vol = &self.volumes[file.drive as usize];

        let end = file.pos + data.len();
        let allowed_end = match vol.capacity {
            Some(cap) => {
                let others: usize = vol
                    .files
                    .iter()
                    .filter(|(p, _)| **p != file.path)
                    .map(|(_, d)| d.len())
                    .sum();
                end.min(cap.saturating_sub(others))
            }
            None => end,
        };
        let n = allowed_end.saturating_sub(file.pos).min(data.len());
        if n > 0 {
            if file.data.len() < file.pos + n {
                file.data.resize(file.pos + n, 0);
            }
            file.data[file.pos..file.pos + n].copy_from_slice(&data[..n]);
            file.pos += n;
            file.modified = true;
        }
        Ok(n)
    }
}

/// Canonicalize a path against a working directory: case-fold, resolve `.`
/// and `..`, collapse separators.
fn canon(cwd: &str, rel: &str) -> DriverResult<String> {
    let mut parts: Vec<String> = Vec::new();
    if !rel.starts_with('/') {
        for seg in cwd.split('/').filter(|s| !s.is_empty()) {
            parts.push(seg.to_string());
        }
    }
    for seg in rel.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(seg.to_ascii_uppercase()),
        }
    }
    if parts.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("/{}", parts.join("/")))
    }
}

/// Split a canonical path into parent directory and entry name.
fn parent_of(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(0) => ("/", &path[1..]),
        Some(i) => (&path[..i], &path[i + 1..]),
        None => ("/", path),
    }
}

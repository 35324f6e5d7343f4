//! The file-command bridge: CD, PWD, KILL, MKDIR, COPY, RENAME.
//!
//! Each operation pulls its string arguments off the expression evaluator,
//! normalizes drive prefixes, calls the filesystem driver, and maps any
//! failure into the interpreter's numeric error taxonomy. Argument storage
//! is leased and is released on every exit path; file handles opened inside
//! COPY are closed exactly once on every path.

use crate::clock::CycleClock;
use crate::error::{BasicError, BasicResult};
use crate::fs::{FatDriver, Fd, OpenMode, DRIVE_COUNT};
use crate::interp::Interp;

/// Copy loop buffer size in bytes.
pub const COPY_BUF: usize = 16 * 1024;

/// Capacity of the buffer a two-argument command stages its first path in.
pub const MAX_PATH: usize = 256;

/// The file commands the interpreter dispatches to this bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCommand {
    Cd,
    Pwd,
    Kill,
    Mkdir,
    Copy,
    Rename,
}

impl FileCommand {
    pub fn name(&self) -> &'static str {
        match self {
            FileCommand::Cd => "CD",
            FileCommand::Pwd => "PWD",
            FileCommand::Kill => "KILL",
            FileCommand::Mkdir => "MKDIR",
            FileCommand::Copy => "COPY",
            FileCommand::Rename => "RENAME",
        }
    }

    /// Look a command up by keyword, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "CD" => Some(FileCommand::Cd),
            "PWD" => Some(FileCommand::Pwd),
            "KILL" => Some(FileCommand::Kill),
            "MKDIR" => Some(FileCommand::Mkdir),
            "COPY" => Some(FileCommand::Copy),
            "RENAME" => Some(FileCommand::Rename),
            _ => None,
        }
    }
}

/// The command-to-filesystem bridge.
pub struct FileBridge<C: CycleClock> {
    clock: C,
    /// Log each dispatched command to stderr.
    pub trace: bool,
}

impl<C: CycleClock> FileBridge<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            trace: false,
        }
    }

    /// Run one file command against the interpreter and driver.
    pub fn dispatch<I: Interp, D: FatDriver>(
        &self,
        cmd: FileCommand,
        interp: &mut I,
        fs: &mut D,
    ) -> BasicResult<()> {
        if self.trace {
            eprintln!("[file] {}", cmd.name());
        }

        match cmd {
            FileCommand::Cd => self.cd(interp, fs),
            FileCommand::Pwd => self.pwd(interp, fs),
            FileCommand::Kill => self.kill(interp, fs),
            FileCommand::Mkdir => self.mkdir(interp, fs),
            FileCommand::Copy => self.copy(interp, fs),
            FileCommand::Rename => self.rename(interp, fs),
        }
    }

    /// Change drive and/or working directory.
    ///
    /// A `<digit>:` prefix selects a drive: the digit is range-checked, the
    /// volume is poked with a throwaway open so the driver's lazy mount
    /// fires (directory enumeration alone does not trigger it), the root is
    /// opened to confirm the volume is reachable, and the drive is made
    /// current. Whatever follows the prefix is an ordinary chdir. A bare
    /// `"N:"` changes only the drive.
    fn cd<I: Interp, D: FatDriver>(&self, interp: &mut I, fs: &mut D) -> BasicResult<()> {
        let path = interp.eval_string()?;
        interp.check_end()?;

        let mut start = 0;
        let bytes = path.as_bytes();
        if bytes.len() >= 2 && bytes[1] == b':' {
            let drive = bytes[0].wrapping_sub(b'0');
            if drive >= DRIVE_COUNT {
                return Err(BasicError::IoFailure);
            }
            let spec = &path[..2];

            // Dummy open, just to auto-mount the volume.
            if let Ok(fd) = fs.open(spec, OpenMode::ReadOnly) {
                fs.close(fd);
            }

            fs.open_dir(spec).map_err(|_| BasicError::IoFailure)?;
            fs.change_drive(drive).map_err(|_| BasicError::IoFailure)?;
            start = 2;
        }

        if path.len() > start {
            fs.change_dir(&path[start..])
                .map_err(|_| BasicError::IoFailure)?;
        }
        Ok(())
    }

    /// Print the working path of the current drive. A driver failure prints
    /// an empty line rather than raising an error.
    fn pwd<I: Interp, D: FatDriver>(&self, interp: &mut I, fs: &mut D) -> BasicResult<()> {
        interp.check_end()?;

        let cwd = fs.current_dir().unwrap_or_default();
        interp.print_line(&cwd);
        Ok(())
    }

    /// Delete the named file or directory.
    fn kill<I: Interp, D: FatDriver>(&self, interp: &mut I, fs: &mut D) -> BasicResult<()> {
        let path = interp.eval_string()?;
        interp.check_end()?;

        fs.remove(&path).map_err(|_| BasicError::IoFailure)?;
        Ok(())
    }

    /// Create the named directory.
    fn mkdir<I: Interp, D: FatDriver>(&self, interp: &mut I, fs: &mut D) -> BasicResult<()> {
        let path = interp.eval_string()?;
        interp.check_end()?;

        fs.make_dir(&path).map_err(|_| BasicError::IoFailure)?;
        Ok(())
    }

    /// Rename or move an entry. Existence checks are the driver's business.
    fn rename<I: Interp, D: FatDriver>(&self, interp: &mut I, fs: &mut D) -> BasicResult<()> {
        let from = stage_first_path(interp)?;
        let to = interp.eval_string()?;
        interp.check_end()?;

        fs.rename(&from, &to).map_err(|_| BasicError::IoFailure)?;
        Ok(())
    }

    /// Stream the source file into the destination through a fixed-size
    /// buffer and report byte count, elapsed time, and throughput.
    fn copy<I: Interp, D: FatDriver>(&self, interp: &mut I, fs: &mut D) -> BasicResult<()> {
        let freq_khz = self.clock.freq_khz();

        let src = stage_first_path(interp)?;
        let dst = interp.eval_string()?;
        interp.check_end()?;

        let from = fs
            .open(&src, OpenMode::ReadOnly)
            .map_err(|_| BasicError::SourceOpen)?;
        let to = match fs.open(&dst, OpenMode::CreateReadWrite) {
            Ok(fd) => fd,
            Err(_) => {
                fs.close(from);
                return Err(BasicError::CreateFailed);
            }
        };

        let start = self.clock.cycles();
        let streamed = stream(fs, from, to);
        let end = self.clock.cycles();

        // Both handles close exactly once, success or not.
        fs.close(from);
        fs.close(to);
        let total = streamed?;

        interp.print_line(&copy_report(total, end.wrapping_sub(start), freq_khz));
        Ok(())
    }
}

/// Acquire the first of two path arguments, bounds-check it into a local
/// staging buffer, release its lease, then consume the separating comma.
fn stage_first_path<I: Interp>(interp: &mut I) -> BasicResult<String> {
    let arg = interp.eval_string()?;
    if arg.len() > MAX_PATH {
        return Err(BasicError::PathTooLong);
    }
    let staged = arg.to_string();
    drop(arg);

    if interp.next_char() != Some(',') {
        return Err(BasicError::Syntax);
    }
    Ok(staged)
}

/// The copy loop proper. Handles stay open; the caller closes them.
fn stream<D: FatDriver>(fs: &mut D, from: Fd, to: Fd) -> BasicResult<u64> {
    let mut buf = vec![0u8; COPY_BUF];
    let mut total: u64 = 0;
    loop {
        let got = fs.read(from, &mut buf).map_err(|_| BasicError::ReadFailed)?;
        if got == 0 {
            break;
        }
        let wrote = fs
            .write(to, &buf[..got])
            .map_err(|_| BasicError::WriteFailed)?;
        if wrote < got {
            return Err(BasicError::WriteFailed);
        }
        total += wrote as u64;
    }
    Ok(total)
}

/// Format the copy statistics line. A zero cycle delta cannot yield a rate,
/// so the throughput field degrades to `n/a`.
fn copy_report(total: u64, cycles: u64, freq_khz: u32) -> String {
    if cycles == 0 || freq_khz == 0 {
        return format!("Copied {} bytes in 0.000 s (throughput n/a)", total);
    }
    let secs = cycles as f64 / (freq_khz as f64 * 1000.0);
    let rate = total as f64 / secs;
    format!("Copied {} bytes in {:.3} s ({:.0} bytes/s)", total, secs, rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fs::MemoryFatFs;
    use crate::interp::ScriptedInterp;

    fn bridge() -> FileBridge<ManualClock> {
        // 1 MHz clock, one million cycles between samples: 1.0 s per copy.
        FileBridge::new(ManualClock::new(1_000_000, 1_000))
    }

    fn fs_with_boot_volume() -> MemoryFatFs {
        let mut fs = MemoryFatFs::new();
        fs.mount(0).unwrap();
        fs
    }

    #[test]
    fn test_from_name() {
        assert_eq!(FileCommand::from_name("copy"), Some(FileCommand::Copy));
        assert_eq!(FileCommand::from_name("MKDIR"), Some(FileCommand::Mkdir));
        assert_eq!(FileCommand::from_name("DIR"), None);
    }

    #[test]
    fn test_cd_rejects_out_of_range_drive() {
        let mut fs = fs_with_boot_volume();
        let mut interp = ScriptedInterp::with_args(["7:"]);

        let err = bridge()
            .dispatch(FileCommand::Cd, &mut interp, &mut fs)
            .unwrap_err();
        assert_eq!(err, BasicError::IoFailure);
        // Rejected before any driver call.
        assert_eq!(fs.total_opens(), 0);
        assert_eq!(fs.current_drive(), 0);
    }

    #[test]
    fn test_cd_non_digit_prefix_rejected() {
        let mut fs = fs_with_boot_volume();
        let mut interp = ScriptedInterp::with_args(["A:"]);

        let err = bridge()
            .dispatch(FileCommand::Cd, &mut interp, &mut fs)
            .unwrap_err();
        assert_eq!(err, BasicError::IoFailure);
    }

    #[test]
    fn test_cd_probe_mounts_volume() {
        let mut fs = fs_with_boot_volume();
        assert!(!fs.is_mounted(1));
        let mut interp = ScriptedInterp::with_args(["1:"]);

        bridge()
            .dispatch(FileCommand::Cd, &mut interp, &mut fs)
            .unwrap();
        assert!(fs.is_mounted(1));
        assert_eq!(fs.current_drive(), 1);
    }

    #[test]
    fn test_rename_missing_comma_is_syntax_error() {
        let mut fs = fs_with_boot_volume();
        let mut interp = ScriptedInterp::new();
        interp.push_arg("A.TXT");
        interp.push_arg("B.TXT");
        // No comma token queued.

        let err = bridge()
            .dispatch(FileCommand::Rename, &mut interp, &mut fs)
            .unwrap_err();
        assert_eq!(err, BasicError::Syntax);
        assert_eq!(interp.pool().live(), 0);
    }

    #[test]
    fn test_first_path_bound_checked() {
        let mut fs = fs_with_boot_volume();
        let long = "X".repeat(MAX_PATH + 1);
        let mut interp = ScriptedInterp::with_args([long.as_str(), "B.TXT"]);

        let err = bridge()
            .dispatch(FileCommand::Copy, &mut interp, &mut fs)
            .unwrap_err();
        assert_eq!(err, BasicError::PathTooLong);
        assert_eq!(interp.pool().live(), 0);
    }

    #[test]
    fn test_pwd_prints_empty_line_on_driver_failure() {
        let mut fs = MemoryFatFs::new(); // nothing mounted
        let mut interp = ScriptedInterp::new();

        bridge()
            .dispatch(FileCommand::Pwd, &mut interp, &mut fs)
            .unwrap();
        assert_eq!(interp.output(), [""]);
    }

    #[test]
    fn test_copy_report_formatting() {
        assert_eq!(
            copy_report(32768, 2_000_000, 1_000),
            "Copied 32768 bytes in 2.000 s (16384 bytes/s)"
        );
        assert_eq!(
            copy_report(5, 0, 1_000),
            "Copied 5 bytes in 0.000 s (throughput n/a)"
        );
    }

    #[test]
    fn test_unterminated_statement_releases_argument() {
        let mut fs = fs_with_boot_volume();
        let mut interp = ScriptedInterp::with_args(["A.TXT"]);
        interp.mark_unterminated();

        let err = bridge()
            .dispatch(FileCommand::Kill, &mut interp, &mut fs)
            .unwrap_err();
        assert_eq!(err, BasicError::Syntax);
        assert_eq!(interp.pool().live(), 0);
        assert_eq!(interp.pool().issued(), 1);
    }
}

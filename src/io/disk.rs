use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use crate::APP_NAME;

/// Scratch file shared by every phase, removed when dropped
#[derive(Debug)]
pub struct TestFile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl TestFile {
    /// Name the test file `<dir>/diskprobe.<pid>`. Nothing is created yet.
    pub fn new(dir: &Path) -> Self {
        let name = format!("{}.{}", APP_NAME, std::process::id());
        Self {
            path: dir.join(name),
            cleanup_on_drop: true,
        }
    }

    /// Disable automatic cleanup (for debugging)
    pub fn keep_on_drop(&mut self) {
        self.cleanup_on_drop = false;
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file from scratch, replacing a stale one left by an earlier run
    pub fn create(&self) -> io::Result<File> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create_new(true);
        set_permissive_mode(&mut options);
        options.open(&self.path)
    }

    /// Reopen the existing file for reading and writing
    pub fn open(&self) -> io::Result<File> {
        open_read_write(&self.path)
    }
}

impl Drop for TestFile {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Open an existing file read-write; each seek worker holds its own handle
pub fn open_read_write(path: &Path) -> io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

/// File operations a seek probe needs, including a durable flush
pub trait DurableFile: Read + Write + Seek + Send {
    /// Force written data to stable storage
    fn sync_durable(&mut self) -> io::Result<()>;
}

impl DurableFile for File {
    fn sync_durable(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// Close `file`, reporting the error that dropping it would swallow
#[cfg(unix)]
pub fn close_file(file: File) -> io::Result<()> {
    use std::os::unix::io::IntoRawFd;

    let fd = file.into_raw_fd();
    // SAFETY: `fd` came from `into_raw_fd`, so this is its only owner.
    if unsafe { libc::close(fd) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn close_file(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

/// Fill `buf` from `reader`, stopping early only at end of file.
/// Returns the number of bytes read.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(unix)]
fn set_permissive_mode(options: &mut OpenOptions) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(0o777);
}

#[cfg(not(unix))]
fn set_permissive_mode(_options: &mut OpenOptions) {}

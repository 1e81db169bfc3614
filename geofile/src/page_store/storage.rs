//! Read-only access to the source file.
//!
//! Every read is positional: there is no shared seek cursor, so two threads
//! loading different frames never wait on each other here.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::{GeoFileError, GeoFileResult};

/// The source file, opened read-only.
pub struct SourceFile {
    file: File,
    path: PathBuf,
    len: u64,
}

impl SourceFile {
    /// Opens `path` for reading. Any failure is an open error.
    pub fn open(path: &Path) -> GeoFileResult<Self> {
        let file = File::open(path).map_err(|e| GeoFileError::open(path, e))?;
        let metadata = file.metadata().map_err(|e| GeoFileError::open(path, e))?;
        if metadata.is_dir() {
            return Err(GeoFileError::unreadable(path, "is a directory"));
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            len: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Modification time in nanoseconds since the epoch, 0 when unavailable.
    pub fn modified_nanos(&self) -> u64 {
        self.file
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    /// Fills `buf` from `offset`. Fails with `UnexpectedEof` past the end.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<()> {
        let end = offset.checked_add(buf.len() as u64).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "read range overflows u64")
        })?;
        if end > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read of {} bytes at offset {} past end of file ({} bytes)",
                    buf.len(),
                    offset,
                    self.len
                ),
            ));
        }
        read_at(&self.file, &self.path, buf, offset)
    }
}

#[cfg(unix)]
fn read_at(file: &File, _path: &Path, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, _path: &Path, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Targets without positional reads open a private handle per read, so no
/// seek cursor is shared between threads.
#[cfg(not(any(unix, windows)))]
fn read_at(_file: &File, path: &Path, buf: &mut [u8], offset: u64) -> io::Result<()> {
    reopen_read_at(path, buf, offset)
}

#[cfg(any(test, not(any(unix, windows))))]
fn reopen_read_at(path: &Path, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}

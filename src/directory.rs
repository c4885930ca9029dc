//! Directory abstraction over segment file storage
//!
//! A segment is written through `IndexOutput` handles and read back through
//! random-access `IndexInput` handles. Two implementations are provided:
//! `FsDirectory` for on-disk segments and `MemDirectory` for tests. A file
//! only becomes visible once its output is closed, so an abandoned writer
//! leaves no partially written file behind on `MemDirectory` and orphan
//! bytes at worst on `FsDirectory`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};

/// Random access handle to an immutable file
pub trait IndexInput: Send + Sync {
    /// Total file length in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` from the absolute `offset`
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Read the whole file into memory
    fn read_all(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.len() as usize];
        self.read_at(0, &mut buf)?;
        Ok(buf)
    }
}

/// Append-only handle to a file being written
pub trait IndexOutput {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Bytes written so far; the offset the next write lands at
    fn position(&self) -> u64;

    /// Flush and make the file visible to readers
    fn close(&mut self) -> Result<()>;
}

/// Storage for segment files
pub trait Directory: Send + Sync {
    fn list(&self) -> Result<Vec<String>>;
    fn open_read(&self, name: &str) -> Result<Box<dyn IndexInput>>;
    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>>;
    fn rename(&self, from: &str, to: &str) -> Result<()>;
    fn remove(&self, name: &str) -> Result<()>;
    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|n| n == name))
    }
}

// ---------------------------------------------------------------------------
// Filesystem-backed directory
// ---------------------------------------------------------------------------

/// Directory rooted at a filesystem path
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Directory for FsDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn open_read(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let file = File::open(self.path_of(name))?;
        let len = file.metadata()?.len();
        Ok(Box::new(FsInput {
            file: Mutex::new(file),
            len,
        }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.path_of(name))?;
        Ok(Box::new(FsOutput {
            writer: BufWriter::new(file),
            pos: 0,
        }))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.path_of(from), self.path_of(to))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        fs::remove_file(self.path_of(name))?;
        Ok(())
    }
}

struct FsInput {
    file: Mutex<File>,
    len: u64,
}

impl IndexInput for FsInput {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.len {
            return Err(Error::Corruption(format!(
                "read of {} bytes at offset {} past end of file ({} bytes)",
                buf.len(),
                offset,
                self.len
            )));
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

struct FsOutput {
    writer: BufWriter<File>,
    pos: u64,
}

impl IndexOutput for FsOutput {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory directory
// ---------------------------------------------------------------------------

type MemFiles = Arc<RwLock<HashMap<String, Arc<Vec<u8>>>>>;

/// In-memory directory for tests and ephemeral segments
#[derive(Default)]
pub struct MemDirectory {
    files: MemFiles,
}

impl MemDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directory for MemDirectory {
    fn list(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.files.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn open_read(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let data = self.files.read().get(name).cloned().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {name}"),
            ))
        })?;
        Ok(Box::new(MemInput { data }))
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        Ok(Box::new(MemOutput {
            name: name.to_string(),
            buf: Vec::new(),
            files: Arc::clone(&self.files),
            closed: false,
        }))
    }

    fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut files = self.files.write();
        let data = files.remove(from).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {from}"),
            ))
        })?;
        files.insert(to.to_string(), data);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.files.write().remove(name).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file: {name}"),
            ))
        })?;
        Ok(())
    }
}

struct MemInput {
    data: Arc<Vec<u8>>,
}

impl IndexInput for MemInput {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + buf.len();
        let slice = self.data.get(start..end).ok_or_else(|| {
            Error::Corruption(format!(
                "read of {} bytes at offset {} past end of file ({} bytes)",
                buf.len(),
                offset,
                self.data.len()
            ))
        })?;
        buf.copy_from_slice(slice);
        Ok(())
    }
}

struct MemOutput {
    name: String,
    buf: Vec<u8>,
    files: MemFiles,
    closed: bool,
}

impl IndexOutput for MemOutput {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn position(&self) -> u64 {
        self.buf.len() as u64
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            let data = Arc::new(std::mem::take(&mut self.buf));
            self.files.write().insert(self.name.clone(), data);
            self.closed = true;
        }
        Ok(())
    }
}

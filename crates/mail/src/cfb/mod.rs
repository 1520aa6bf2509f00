//! ## [Compound File Binary (CFB)](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/53989ce4-7b05-4f8d-829b-d08d6148375b)
//!
//! The OLE container used by `.msg` files: a sector-allocated filesystem
//! with a FAT, a MiniFAT for sub-cutoff streams, and a directory of named
//! storages and streams.

use std::{
    fs::File,
    io,
    path::Path,
    sync::Mutex,
};
use thiserror::Error;

pub mod directory;
pub mod fat;
pub mod header;

use crate::ContainerReader;
use directory::*;
use fat::*;
use header::*;

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("I/O error: {0:?}")]
    Io(#[from] io::Error),
    #[error("Failed to lock file")]
    FailedToLockFile,
    #[error("Invalid CFB signature")]
    InvalidSignature,
    #[error("Unsupported CFB major version: {0}")]
    UnsupportedVersion(u16),
    #[error("More than 109 DIFAT entries not supported")]
    UnsupportedDifat,
    #[error("Sector out of bounds: 0x{0:X}")]
    SectorOutOfBounds(u32),
    #[error("Sector chain does not terminate")]
    UnterminatedChain,
    #[error("Stream size does not match its sector chain: 0x{size:X} != 0x{chain:X} bytes")]
    StreamSizeMismatch { size: u64, chain: usize },
    #[error("Directory entry index out of bounds: 0x{0:X}")]
    EntryOutOfBounds(u32),
    #[error("Empty directory")]
    EmptyDirectory,
    #[error("Duplicate directory entry name: {0}")]
    DuplicateEntryName(String),
    #[error("Stream not found: {0}")]
    StreamNotFound(String),
    #[error("Directory entry is not a stream: {0}")]
    NotAStream(String),
}

impl CfbError {
    /// Whether the file is simply not a usable compound file, as opposed to
    /// structurally corrupted. Scanners skip such files.
    pub fn is_invalid_container(&self) -> bool {
        matches!(
            self,
            CfbError::InvalidSignature | CfbError::UnsupportedVersion(_)
        )
    }
}

impl From<CfbError> for io::Error {
    fn from(err: CfbError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type CfbResult<T> = Result<T, CfbError>;

/// An open compound file. The FAT, MiniFAT, mini stream, and directory are
/// assembled eagerly at open; stream payloads are fetched on demand.
pub struct CompoundFile {
    reader: Mutex<Box<dyn ContainerReader>>,
    header: CfbHeader,
    fat: Fat,
    mini_fat: MiniFat,
    directory: Directory,
}

impl CompoundFile {
    pub fn open(path: impl AsRef<Path>) -> CfbResult<Self> {
        Self::read_from(Box::new(File::open(path)?))
    }

    pub fn read_from(mut reader: Box<dyn ContainerReader>) -> CfbResult<Self> {
        let header = CfbHeader::read(&mut reader)?;
        let fat = Fat::read(&mut reader, &header)?;
        let mut mini_fat = MiniFat::read(&mut reader, &header, &fat)?;
        let directory = Directory::read(&mut reader, &header, &fat)?;

        // the mini stream lives in the FAT, anchored at the root entry
        let root = directory.root();
        if root.starting_sector() != ENDOFCHAIN {
            let mini_stream = fat.stream(
                &mut reader,
                &header,
                root.starting_sector(),
                root.stream_size(),
            )?;
            mini_fat.set_mini_stream(mini_stream);
        }

        Ok(Self {
            reader: Mutex::new(reader),
            header,
            fat,
            mini_fat,
            directory,
        })
    }

    pub fn header(&self) -> &CfbHeader {
        &self.header
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Fetch a stream's bytes, through the MiniFAT when it is smaller than
    /// the header's cutoff and through the FAT otherwise.
    pub fn entry_data(&self, index: usize) -> CfbResult<Vec<u8>> {
        let entry = self
            .directory
            .entry(index)
            .ok_or(CfbError::EntryOutOfBounds(index as u32))?;
        if !entry.is_stream() {
            return Err(CfbError::NotAStream(entry.name().to_string()));
        }

        if entry.stream_size() < u64::from(self.header.mini_stream_cutoff()) {
            self.mini_fat
                .stream(entry.starting_sector(), entry.stream_size())
        } else {
            let mut reader = self.reader.lock().map_err(|_| CfbError::FailedToLockFile)?;
            self.fat.stream(
                &mut **reader,
                &self.header,
                entry.starting_sector(),
                entry.stream_size(),
            )
        }
    }

    /// A named child stream of a storage entry.
    pub fn child_data(&self, parent: usize, name: &str) -> CfbResult<Vec<u8>> {
        let index = self
            .directory
            .child_index(parent, name)
            .ok_or_else(|| CfbError::StreamNotFound(name.to_string()))?;
        self.entry_data(index)
    }
}

//! ## [Lists, Tables, and Properties (LTP) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/4c24c7d2-5c5a-4b99-88b2-f4b84cc293ae)
//!
//! Heaps packed into block-data sequences (HN), B-trees packed into heaps
//! (BTH), and the two client structures built on them: property contexts and
//! table contexts.

use std::io;
use thiserror::Error;

pub mod heap;
pub mod prop_context;
pub mod table_context;
pub mod tree;

#[derive(Error, Debug)]
pub enum LtpError {
    #[error("I/O error: {0:?}")]
    Io(#[from] io::Error),
    #[error("Node Database error: {0}")]
    NodeDatabase(#[from] crate::ndb::NdbError),
    #[error("Property error: {0}")]
    Property(#[from] crate::props::PropertyError),
    #[error("Invalid HNHDR bSig: 0x{0:02X}")]
    InvalidHeapSignature(u8),
    #[error("Invalid HNHDR bClientSig: 0x{0:02X}")]
    InvalidHeapClientType(u8),
    #[error("Empty HN data")]
    EmptyHeapNode,
    #[error("HID hidBlockIndex not found: 0x{0:X}")]
    HeapBlockIndexNotFound(u16),
    #[error("HID hidIndex not found: 0x{0:X}")]
    HeapAllocIndexNotFound(u16),
    #[error("Invalid HNPAGEMAP rgibAlloc entry: 0x{0:04X}")]
    InvalidHeapAllocOffset(u16),
    #[error("Invalid HNPAGEMAP offset: 0x{0:04X}")]
    InvalidHeapPageMapOffset(u16),
    #[error("Invalid BTHHEADER bType: 0x{0:02X}")]
    InvalidHeapTreeType(u8),
    #[error("Truncated BTHHEADER: 0x{0:X} bytes")]
    TruncatedTreeHeader(usize),
    #[error("Invalid BTHHEADER record sizes: cbKey 0x{0:02X}, cbEnt 0x{1:02X}")]
    InvalidHeapTreeRecordSize(u8, u8),
    #[error("Expected a PC client signature, found {0:?}")]
    NotAPropertyContext(heap::HeapClientType),
    #[error("Duplicate PC property: 0x{0:04X}")]
    DuplicatePropertyId(u16),
    #[error("Expected a TC client signature, found {0:?}")]
    NotATableContext(heap::HeapClientType),
    #[error("Invalid TCINFO bType: 0x{0:02X}")]
    InvalidTableType(u8),
    #[error("Invalid TC row index key size: 0x{0:02X}")]
    InvalidRowIndexKeySize(u8),
    #[error("Truncated TCINFO: 0x{0:X} bytes")]
    TruncatedTableInfo(usize),
    #[error("Duplicate TC column: 0x{0:04X}")]
    DuplicateColumn(u16),
    #[error("TC row matrix is missing")]
    RowMatrixNotFound,
    #[error("Truncated TC row matrix: row 0x{0:X}")]
    TruncatedRowMatrix(usize),
    #[error("Sub-node not found: 0x{0:08X}")]
    SubNodeNotFound(u32),
}

impl From<LtpError> for io::Error {
    fn from(err: LtpError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type LtpResult<T> = Result<T, LtpError>;

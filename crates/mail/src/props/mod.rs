//! ## Typed Property Model
//!
//! Shared between the PST property/table contexts and the CFB property-stream
//! decoder: the [Property Data Types](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/MS-OXCDATA/0c77892e-288e-435a-9c49-be1c20c7afdb)
//! enumeration, the per-type layout descriptors, and the decoded value union.

use std::io;
use thiserror::Error;

pub mod prop_id;
pub mod prop_type;
pub mod time;
pub mod value;

#[derive(Error, Debug)]
pub enum PropertyError {
    #[error("Value decoding is not implemented for {0:?}")]
    UnsupportedPropertyType(prop_type::PropertyType),
    #[error("Truncated {0:?} value: 0x{1:X} bytes")]
    TruncatedValue(prop_type::PropertyType, usize),
    #[error("Invalid multi-value offset: 0x{0:X}")]
    InvalidMultiValueOffset(u32),
    #[error("Invalid multi-value count: 0x{0:X}")]
    InvalidMultiValueCount(u32),
    #[error("Invalid EntryID size: 0x{0:X}")]
    InvalidEntryIdSize(usize),
}

impl From<PropertyError> for io::Error {
    fn from(err: PropertyError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type PropertyResult<T> = Result<T, PropertyError>;

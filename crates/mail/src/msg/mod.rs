//! ## [Outlook Item File (.msg)](https://learn.microsoft.com/en-us/openspecs/exchange_server_protocols/ms-oxmsg/b046868c-9fbf-41ae-9ffb-8de2bd4eec82)
//!
//! A single message serialized into a CFB container: one property stream per
//! storage, with large values in sibling `__substg1.0_` streams and
//! recipients/attachments in numbered sub-storages.

use std::io;
use thiserror::Error;

pub mod message;
pub mod property_stream;

pub use message::MsgFile;

#[derive(Error, Debug)]
pub enum MsgError {
    #[error("Compound file error: {0}")]
    Cfb(#[from] crate::cfb::CfbError),
    #[error("Property error: {0}")]
    Property(#[from] crate::props::PropertyError),
    #[error("Property stream size less header is not divisible by 16: 0x{0:X}")]
    MisalignedPropertyStream(usize),
    #[error("Truncated property stream header: 0x{0:X} bytes")]
    TruncatedPropertyStream(usize),
    #[error("Property 0x{0:04X} size 0x{1:X} does not match stream length 0x{2:X}")]
    PropertySizeMismatch(u16, u32, usize),
    #[error("Duplicate property: 0x{0:04X}")]
    DuplicatePropertyId(u16),
}

impl From<MsgError> for io::Error {
    fn from(err: MsgError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type MsgResult<T> = Result<T, MsgError>;

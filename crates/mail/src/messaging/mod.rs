//! ## [Messaging Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/dee5b9d0-5513-4c5e-94aa-8bd28a9350b2)
//!
//! The logical mailbox on top of the LTP layer: the message store, the
//! named-property map, and the folder/message/attachment objects.

use std::io;
use thiserror::Error;

pub mod attachment;
pub mod folder;
pub mod message;
pub mod named_prop;
pub mod store;

use crate::ndb::node_id::NodeIdType;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("LTP error: {0}")]
    Ltp(#[from] crate::ltp::LtpError),
    #[error("Node Database error: {0}")]
    NodeDatabase(#[from] crate::ndb::NdbError),
    #[error("Invalid folder NID type: {0:?}")]
    InvalidFolderNodeType(NodeIdType),
    #[error("Invalid message NID type: {0:?}")]
    InvalidMessageNodeType(NodeIdType),
    #[error("Root folder EntryID not found")]
    RootEntryIdNotFound,
    #[error("Attachment sub-node not found: 0x{0:08X}")]
    AttachmentNotFound(u32),
}

impl From<MessagingError> for io::Error {
    fn from(err: MessagingError) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;

/// Subjects may carry the MAPI compressed prefix marker: a 0x01 code unit
/// followed by the prefix length. Both leading code units are dropped.
pub(crate) fn strip_subject_prefix(subject: String) -> String {
    if subject.starts_with('\u{01}') {
        subject.chars().skip(2).collect()
    } else {
        subject
    }
}

/// The trailing path component of a filename, with either separator style.
pub(crate) fn base_name(filename: &str) -> String {
    filename
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(filename)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_subject_prefix() {
        let marked: String = ['\u{01}', '\u{05}', 'R', 'E', ':', ' ', 'x'].iter().collect();
        assert_eq!(strip_subject_prefix(marked), "RE: x");
        assert_eq!(strip_subject_prefix(String::from("RE: x")), "RE: x");
        assert_eq!(strip_subject_prefix(String::new()), "");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("C:\\temp\\Report Q1.pdf"), "Report Q1.pdf");
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("plain.doc"), "plain.doc");
    }
}

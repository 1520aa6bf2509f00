//! ## [Attachment Objects](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/46eb4828-c6a5-420d-a137-9ee36df317c1)

use super::{base_name, message::ATTACH_BY_VALUE, MessagingResult};
use crate::{
    ltp::prop_context::PropertyContext,
    ndb::{block::SubNodeLeafEntry, NodeDatabase},
    props::{prop_id::*, value::PropertyValue},
};

/// A full attachment object: the PC reached through the parent message's
/// sub-node map, with the payload bytes decoded eagerly.
pub struct Attachment {
    properties: PropertyContext,
    display_name: Option<String>,
    method: i32,
    size: Option<i32>,
    filename: Option<String>,
    long_filename: Option<String>,
    mime_tag: Option<String>,
    extension: Option<String>,
    data: Option<Vec<u8>>,
}

impl Attachment {
    pub fn read(database: &NodeDatabase, entry: &SubNodeLeafEntry) -> MessagingResult<Self> {
        let properties = PropertyContext::read_sub_node(database, entry)?;

        let get_string = |prop_id| {
            properties
                .get(prop_id)
                .and_then(PropertyValue::as_string)
        };

        let display_name = get_string(PID_TAG_DISPLAY_NAME);
        let method = properties
            .get(PID_TAG_ATTACH_METHOD)
            .and_then(PropertyValue::as_i32)
            .unwrap_or_default();
        let size = properties
            .get(PID_TAG_ATTACHMENT_SIZE)
            .and_then(PropertyValue::as_i32);
        let filename = get_string(PID_TAG_ATTACH_FILENAME);
        let long_filename = get_string(PID_TAG_ATTACH_LONG_FILENAME);
        let mime_tag = get_string(PID_TAG_ATTACH_MIME_TAG);
        let extension = get_string(PID_TAG_ATTACH_EXTENSION);

        // by-value attachments carry PidTagAttachDataBinary; embedded and
        // storage attachments carry PidTagAttachDataObject under the same id
        let data = properties
            .get(PID_TAG_ATTACH_DATA_BINARY)
            .and_then(PropertyValue::as_bytes)
            .map(<[u8]>::to_vec);

        Ok(Self {
            properties,
            display_name,
            method,
            size,
            filename,
            long_filename,
            mime_tag,
            extension,
            data,
        })
    }

    pub fn properties(&self) -> &PropertyContext {
        &self.properties
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn method(&self) -> i32 {
        self.method
    }

    pub fn is_by_value(&self) -> bool {
        self.method == ATTACH_BY_VALUE
    }

    /// `PidTagAttachmentSize`, which counts more than the raw payload.
    pub fn size(&self) -> Option<i32> {
        self.size
    }

    /// Long filename if present, else the 8.3 name, else a placeholder
    /// naming the attach method; always reduced to its base name.
    pub fn filename(&self) -> String {
        match self.long_filename.as_deref().or(self.filename.as_deref()) {
            Some(name) if !name.is_empty() => base_name(name),
            _ => format!("[NoFilename_Method{}]", self.method),
        }
    }

    pub fn mime_tag(&self) -> Option<&str> {
        self.mime_tag.as_deref()
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

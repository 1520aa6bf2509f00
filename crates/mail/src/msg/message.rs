//! ## The Message Façade
//!
//! Composes the root storage's property stream with the numbered
//! `__recip_version1.0_#XXXXXXXX` and `__attach_version1.0_#XXXXXXXX`
//! storages into the same logical view the PST messaging layer exposes.

use std::path::Path;

use super::{
    property_stream::{PropertyStream, RECIPIENT_OR_ATTACHMENT_HEADER_SIZE, TOP_LEVEL_HEADER_SIZE},
    MsgResult,
};
use crate::{
    cfb::CompoundFile,
    messaging::base_name,
    props::{prop_id::*, time::FileTime, value::PropertyValue},
    ContainerReader,
};

const RECIPIENT_STORAGE_PREFIX: &str = "__recip_version1.0_#";
const ATTACHMENT_STORAGE_PREFIX: &str = "__attach_version1.0_#";

/// The root storage is always directory entry 0.
const ROOT_STORAGE: usize = 0;

/// One `__recip_version1.0_#XXXXXXXX` storage.
pub struct MsgRecipient {
    properties: PropertyStream,
}

impl MsgRecipient {
    pub fn properties(&self) -> &PropertyStream {
        &self.properties
    }

    fn get_string(&self, prop_id: u16) -> Option<String> {
        self.properties.get(prop_id).and_then(PropertyValue::as_string)
    }

    pub fn recipient_type(&self) -> Option<i32> {
        self.properties
            .get(PID_TAG_RECIPIENT_TYPE)
            .and_then(PropertyValue::as_i32)
    }

    pub fn display_name(&self) -> Option<String> {
        self.get_string(PID_TAG_DISPLAY_NAME)
    }

    pub fn object_type(&self) -> Option<i32> {
        self.properties
            .get(PID_TAG_OBJECT_TYPE)
            .and_then(PropertyValue::as_i32)
    }

    pub fn address_type(&self) -> Option<String> {
        self.get_string(PID_TAG_ADDRESS_TYPE)
    }

    pub fn email_address(&self) -> Option<String> {
        self.get_string(PID_TAG_EMAIL_ADDRESS)
    }

    pub fn display_type(&self) -> Option<i32> {
        self.properties
            .get(PID_TAG_DISPLAY_TYPE)
            .and_then(PropertyValue::as_i32)
    }
}

/// One `__attach_version1.0_#XXXXXXXX` storage.
pub struct MsgAttachment {
    properties: PropertyStream,
}

impl MsgAttachment {
    pub fn properties(&self) -> &PropertyStream {
        &self.properties
    }

    fn get_string(&self, prop_id: u16) -> Option<String> {
        self.properties.get(prop_id).and_then(PropertyValue::as_string)
    }

    pub fn display_name(&self) -> Option<String> {
        self.get_string(PID_TAG_DISPLAY_NAME)
    }

    pub fn method(&self) -> i32 {
        self.properties
            .get(PID_TAG_ATTACH_METHOD)
            .and_then(PropertyValue::as_i32)
            .unwrap_or_default()
    }

    /// `PidTagAttachmentSize`; draft messages may not carry it.
    pub fn size(&self) -> Option<i32> {
        self.properties
            .get(PID_TAG_ATTACHMENT_SIZE)
            .and_then(PropertyValue::as_i32)
    }

    /// Long filename if present, else the 8.3 name, else a placeholder
    /// naming the attach method; always reduced to its base name.
    pub fn filename(&self) -> String {
        let name = self
            .get_string(PID_TAG_ATTACH_LONG_FILENAME)
            .or_else(|| self.get_string(PID_TAG_ATTACH_FILENAME));
        match name.as_deref() {
            Some(name) if !name.is_empty() => base_name(name),
            _ => format!("[NoFilename_Method{}]", self.method()),
        }
    }

    pub fn mime_tag(&self) -> Option<String> {
        self.get_string(PID_TAG_ATTACH_MIME_TAG)
    }

    pub fn extension(&self) -> Option<String> {
        self.get_string(PID_TAG_ATTACH_EXTENSION)
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.properties
            .get(PID_TAG_ATTACH_DATA_BINARY)
            .and_then(PropertyValue::as_bytes)
    }
}

/// An open `.msg` file.
pub struct MsgFile {
    cfb: CompoundFile,
    properties: PropertyStream,
    recipients: Vec<MsgRecipient>,
    attachments: Vec<MsgAttachment>,
}

impl std::fmt::Debug for MsgFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgFile").finish_non_exhaustive()
    }
}

impl MsgFile {
    /// Open a `.msg` file. A non-CFB file surfaces the distinct
    /// invalid-container error ([`crate::cfb::CfbError::is_invalid_container`])
    /// so scanners can skip it.
    pub fn open(path: impl AsRef<Path>) -> MsgResult<Self> {
        Self::from_container(CompoundFile::open(path)?)
    }

    pub fn read_from(reader: Box<dyn ContainerReader>) -> MsgResult<Self> {
        Self::from_container(CompoundFile::read_from(reader)?)
    }

    fn from_container(cfb: CompoundFile) -> MsgResult<Self> {
        let properties = PropertyStream::read(&cfb, ROOT_STORAGE, TOP_LEVEL_HEADER_SIZE)?;

        // enumeration stops at the first missing index
        let mut recipients = Vec::new();
        for index in 0.. {
            let name = format!("{RECIPIENT_STORAGE_PREFIX}{index:08X}");
            let Some(storage) = cfb.directory().child_index(ROOT_STORAGE, &name) else {
                break;
            };
            recipients.push(MsgRecipient {
                properties: PropertyStream::read(
                    &cfb,
                    storage,
                    RECIPIENT_OR_ATTACHMENT_HEADER_SIZE,
                )?,
            });
        }

        let mut attachments = Vec::new();
        for index in 0.. {
            let name = format!("{ATTACHMENT_STORAGE_PREFIX}{index:08X}");
            let Some(storage) = cfb.directory().child_index(ROOT_STORAGE, &name) else {
                break;
            };
            attachments.push(MsgAttachment {
                properties: PropertyStream::read(
                    &cfb,
                    storage,
                    RECIPIENT_OR_ATTACHMENT_HEADER_SIZE,
                )?,
            });
        }

        Ok(Self {
            cfb,
            properties,
            recipients,
            attachments,
        })
    }

    pub fn container(&self) -> &CompoundFile {
        &self.cfb
    }

    pub fn properties(&self) -> &PropertyStream {
        &self.properties
    }

    pub fn recipients(&self) -> &[MsgRecipient] {
        &self.recipients
    }

    pub fn attachments(&self) -> &[MsgAttachment] {
        &self.attachments
    }

    fn get_string(&self, prop_id: u16) -> Option<String> {
        self.properties.get(prop_id).and_then(PropertyValue::as_string)
    }

    fn get_i32(&self, prop_id: u16) -> Option<i32> {
        self.properties.get(prop_id).and_then(PropertyValue::as_i32)
    }

    fn get_time(&self, prop_id: u16) -> Option<FileTime> {
        self.properties.get(prop_id).and_then(PropertyValue::as_time)
    }

    pub fn subject(&self) -> Option<String> {
        self.get_string(PID_TAG_SUBJECT)
    }

    pub fn body(&self) -> Option<String> {
        self.get_string(PID_TAG_BODY)
    }

    pub fn display_to(&self) -> Option<String> {
        self.get_string(PID_TAG_DISPLAY_TO)
    }

    pub fn sender_name(&self) -> Option<String> {
        self.get_string(PID_TAG_SENDER_NAME)
    }

    pub fn sender_smtp_address(&self) -> Option<String> {
        self.get_string(PID_TAG_SENDER_SMTP_ADDRESS)
    }

    pub fn sent_representing_name(&self) -> Option<String> {
        self.get_string(PID_TAG_SENT_REPRESENTING_NAME)
    }

    pub fn transport_message_headers(&self) -> Option<String> {
        self.get_string(PID_TAG_TRANSPORT_MESSAGE_HEADERS)
    }

    pub fn message_flags(&self) -> i32 {
        self.get_i32(PID_TAG_MESSAGE_FLAGS).unwrap_or_default()
    }

    pub fn message_status(&self) -> Option<i32> {
        self.get_i32(PID_TAG_MESSAGE_STATUS)
    }

    pub fn message_size(&self) -> Option<i32> {
        self.get_i32(PID_TAG_MESSAGE_SIZE)
    }

    pub fn client_submit_time(&self) -> Option<FileTime> {
        self.get_time(PID_TAG_CLIENT_SUBMIT_TIME)
    }

    pub fn message_delivery_time(&self) -> Option<FileTime> {
        self.get_time(PID_TAG_MESSAGE_DELIVERY_TIME)
    }

    pub fn x_originating_ip(&self) -> Option<String> {
        self.get_string(PID_TAG_X_ORIGINATING_IP)
    }
}

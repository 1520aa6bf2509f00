//! ## [Messages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/1042af37-aaa4-4edc-bffd-90a1ede24188)

use tracing::warn;

use super::{
    attachment::Attachment, store::MessageStore, strip_subject_prefix, MessagingError,
    MessagingResult,
};
use crate::{
    ltp::{prop_context::PropertyContext, table_context::TableContext},
    ndb::{node_id::*, NodeDatabase},
    props::{prop_id::*, time::FileTime, value::*},
};

/// `PidTagMessageFlags` bits.
pub const MSGFLAG_READ: i32 = 0x01;
pub const MSGFLAG_HASATTACH: i32 = 0x10;

/// `PidTagAttachMethod`: attachment data stored directly by value.
pub const ATTACH_BY_VALUE: i32 = 0x01;

/// A recipient-table row.
#[derive(Clone, Debug)]
pub struct Recipient {
    recipient_type: Option<i32>,
    display_name: Option<String>,
    object_type: Option<i32>,
    address_type: Option<String>,
    email_address: Option<String>,
    display_type: Option<i32>,
    entry_id: Option<EntryId>,
}

impl Recipient {
    pub fn recipient_type(&self) -> Option<i32> {
        self.recipient_type
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn object_type(&self) -> Option<i32> {
        self.object_type
    }

    pub fn address_type(&self) -> Option<&str> {
        self.address_type.as_deref()
    }

    pub fn email_address(&self) -> Option<&str> {
        self.email_address.as_deref()
    }

    pub fn display_type(&self) -> Option<i32> {
        self.display_type
    }

    pub fn entry_id(&self) -> Option<&EntryId> {
        self.entry_id.as_ref()
    }
}

/// An attachment-table row; the full attachment object is fetched on demand
/// through [`Message::fetch_attachment`].
#[derive(Clone, Debug)]
pub struct AttachmentSummary {
    node: NodeId,
    size: Option<i32>,
    filename: Option<String>,
    long_filename: Option<String>,
}

impl AttachmentSummary {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn size(&self) -> Option<i32> {
        self.size
    }

    /// Long filename if present, else the 8.3 name, else a placeholder;
    /// always reduced to its base name.
    pub fn filename(&self) -> String {
        match self.long_filename.as_deref().or(self.filename.as_deref()) {
            Some(name) if !name.is_empty() => super::base_name(name),
            _ => String::from("[None]"),
        }
    }
}

/// A message: its property context plus the attachment and recipient tables
/// found in the node's sub-node map.
pub struct Message {
    properties: PropertyContext,
    entry_id: Option<Vec<u8>>,
    message_class: Option<String>,
    message_flags: i32,
    message_size: Option<i32>,
    message_status: Option<i32>,
    subject: Option<String>,
    body: Option<String>,
    display_to: Option<String>,
    sender_name: Option<String>,
    sender_smtp_address: Option<String>,
    sent_representing_name: Option<String>,
    transport_message_headers: Option<String>,
    client_submit_time: Option<FileTime>,
    message_delivery_time: Option<FileTime>,
    recipients: Vec<Recipient>,
    attachments: Vec<AttachmentSummary>,
}

impl Message {
    pub fn read(
        database: &NodeDatabase,
        node: NodeId,
        store: Option<&MessageStore>,
    ) -> MessagingResult<Self> {
        let node_type = node.id_type()?;
        if node_type != NodeIdType::NormalMessage {
            return Err(MessagingError::InvalidMessageNodeType(node_type));
        }

        let properties = PropertyContext::read_node(database, node)?;
        let entry_id = store.and_then(|store| store.entry_id(node));

        let get_string = |prop_id| {
            properties
                .get(prop_id)
                .and_then(PropertyValue::as_string)
        };
        let get_i32 = |prop_id| properties.get(prop_id).and_then(PropertyValue::as_i32);
        let get_time = |prop_id| properties.get(prop_id).and_then(PropertyValue::as_time);

        let message_class = get_string(PID_TAG_MESSAGE_CLASS);
        let message_flags = get_i32(PID_TAG_MESSAGE_FLAGS).unwrap_or_default();
        let message_size = get_i32(PID_TAG_MESSAGE_SIZE);
        let message_status = get_i32(PID_TAG_MESSAGE_STATUS);
        let subject = get_string(PID_TAG_SUBJECT).map(strip_subject_prefix);
        let body = get_string(PID_TAG_BODY);
        let display_to = get_string(PID_TAG_DISPLAY_TO);
        let sender_name = get_string(PID_TAG_SENDER_NAME);
        let sender_smtp_address = get_string(PID_TAG_SENDER_SMTP_ADDRESS);
        let sent_representing_name = get_string(PID_TAG_SENT_REPRESENTING_NAME);
        let transport_message_headers = get_string(PID_TAG_TRANSPORT_MESSAGE_HEADERS);
        let client_submit_time = get_time(PID_TAG_CLIENT_SUBMIT_TIME);
        let message_delivery_time = get_time(PID_TAG_MESSAGE_DELIVERY_TIME);

        // the attachment and recipient tables are sub-nodes of the message
        let mut attachment_table = None;
        let mut recipient_table = None;
        for entry in properties.heap().sub_nodes().values() {
            match entry.node().id_type() {
                Ok(NodeIdType::AttachmentTable) => {
                    attachment_table = Self::read_sub_node_table(database, &properties, entry);
                }
                Ok(NodeIdType::RecipientTable) => {
                    recipient_table = Self::read_sub_node_table(database, &properties, entry);
                }
                _ => {}
            }
        }

        let recipients = match &recipient_table {
            Some(table) => (0..table.row_count())
                .map(|row| Recipient {
                    recipient_type: table
                        .get_value(row, PID_TAG_RECIPIENT_TYPE)
                        .and_then(PropertyValue::as_i32),
                    display_name: table
                        .get_value(row, PID_TAG_DISPLAY_NAME)
                        .and_then(PropertyValue::as_string),
                    object_type: table
                        .get_value(row, PID_TAG_OBJECT_TYPE)
                        .and_then(PropertyValue::as_i32),
                    address_type: table
                        .get_value(row, PID_TAG_ADDRESS_TYPE)
                        .and_then(PropertyValue::as_string),
                    email_address: table
                        .get_value(row, PID_TAG_EMAIL_ADDRESS)
                        .and_then(PropertyValue::as_string),
                    display_type: table
                        .get_value(row, PID_TAG_DISPLAY_TYPE)
                        .and_then(PropertyValue::as_i32),
                    entry_id: table
                        .get_value(row, PID_TAG_ENTRY_ID)
                        .and_then(PropertyValue::as_bytes)
                        .and_then(|payload| EntryId::parse(payload).ok()),
                })
                .collect(),
            None => Vec::new(),
        };

        let attachments = match &attachment_table {
            Some(table) => (0..table.row_count())
                .filter_map(|row| {
                    Some(AttachmentSummary {
                        node: table.row_node(row)?,
                        size: table
                            .get_value(row, PID_TAG_ATTACHMENT_SIZE)
                            .and_then(PropertyValue::as_i32),
                        filename: table
                            .get_value(row, PID_TAG_ATTACH_FILENAME)
                            .and_then(PropertyValue::as_string),
                        long_filename: table
                            .get_value(row, PID_TAG_ATTACH_LONG_FILENAME)
                            .and_then(PropertyValue::as_string),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        Ok(Self {
            properties,
            entry_id,
            message_class,
            message_flags,
            message_size,
            message_status,
            subject,
            body,
            display_to,
            sender_name,
            sender_smtp_address,
            sent_representing_name,
            transport_message_headers,
            client_submit_time,
            message_delivery_time,
            recipients,
            attachments,
        })
    }

    fn read_sub_node_table(
        database: &NodeDatabase,
        properties: &PropertyContext,
        entry: &crate::ndb::block::SubNodeLeafEntry,
    ) -> Option<TableContext> {
        match TableContext::read_sub_node(database, entry) {
            Ok(table) => Some(table),
            Err(err) => {
                warn!(
                    name: "MessageTableUnreadable",
                    message = ?properties.heap().user_root(),
                    table = ?entry.node(),
                    %err,
                    "Skipping unreadable message table"
                );
                None
            }
        }
    }

    /// Fetch a full attachment object through this message's sub-node map.
    pub fn fetch_attachment(
        &self,
        database: &NodeDatabase,
        summary: &AttachmentSummary,
    ) -> MessagingResult<Attachment> {
        let entry = self
            .properties
            .heap()
            .sub_nodes()
            .get(&u32::from(summary.node()))
            .ok_or(MessagingError::AttachmentNotFound(u32::from(summary.node())))?;
        Attachment::read(database, entry)
    }

    pub fn properties(&self) -> &PropertyContext {
        &self.properties
    }

    pub fn entry_id(&self) -> Option<&[u8]> {
        self.entry_id.as_deref()
    }

    pub fn message_class(&self) -> Option<&str> {
        self.message_class.as_deref()
    }

    pub fn message_flags(&self) -> i32 {
        self.message_flags
    }

    pub fn message_size(&self) -> Option<i32> {
        self.message_size
    }

    pub fn message_status(&self) -> Option<i32> {
        self.message_status
    }

    pub fn has_attachments(&self) -> bool {
        self.message_flags & MSGFLAG_HASATTACH == MSGFLAG_HASATTACH
    }

    pub fn is_read(&self) -> bool {
        self.message_flags & MSGFLAG_READ == MSGFLAG_READ
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn display_to(&self) -> Option<&str> {
        self.display_to.as_deref()
    }

    pub fn sender_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    pub fn sender_smtp_address(&self) -> Option<&str> {
        self.sender_smtp_address.as_deref()
    }

    pub fn sent_representing_name(&self) -> Option<&str> {
        self.sent_representing_name.as_deref()
    }

    pub fn transport_message_headers(&self) -> Option<&str> {
        self.transport_message_headers.as_deref()
    }

    pub fn client_submit_time(&self) -> Option<FileTime> {
        self.client_submit_time
    }

    pub fn message_delivery_time(&self) -> Option<FileTime> {
        self.message_delivery_time
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn attachments(&self) -> &[AttachmentSummary] {
        &self.attachments
    }
}

//! ## [Message Store](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/aa0539bd-e7bf-4cec-8bde-0b87c2a86baf)

use super::MessagingResult;
use crate::{
    ltp::prop_context::PropertyContext,
    ndb::{node_id::*, NodeDatabase},
    props::{prop_id::*, value::*},
};

/// The property context at `NID_MESSAGE_STORE`. EntryIDs elsewhere in the
/// file are synthesized from its record key; the password, when set, is only
/// a CRC-32 hash and is never required for access.
pub struct MessageStore {
    properties: PropertyContext,
    display_name: Option<String>,
    record_key: Option<Vec<u8>>,
    password_hash: Option<u32>,
    root_entry_id: Option<EntryId>,
    deleted_items_entry_id: Option<EntryId>,
}

impl MessageStore {
    pub fn read(database: &NodeDatabase) -> MessagingResult<Self> {
        let properties = PropertyContext::read_node(database, NID_MESSAGE_STORE)?;

        let display_name = properties
            .get(PID_TAG_DISPLAY_NAME)
            .and_then(PropertyValue::as_string);
        let record_key = properties
            .get(PID_TAG_RECORD_KEY)
            .and_then(PropertyValue::as_bytes)
            .map(<[u8]>::to_vec);
        let password_hash = properties
            .get(PID_TAG_PST_PASSWORD)
            .and_then(PropertyValue::as_i32)
            .map(|value| value as u32);
        let root_entry_id = properties
            .get(PID_TAG_IPM_SUB_TREE_ENTRY_ID)
            .and_then(PropertyValue::as_entry_id)
            .cloned();
        let deleted_items_entry_id = properties
            .get(PID_TAG_IPM_WASTEBASKET_ENTRY_ID)
            .and_then(PropertyValue::as_entry_id)
            .cloned();

        Ok(Self {
            properties,
            display_name,
            record_key,
            password_hash,
            root_entry_id,
            deleted_items_entry_id,
        })
    }

    pub fn properties(&self) -> &PropertyContext {
        &self.properties
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn record_key(&self) -> Option<&[u8]> {
        self.record_key.as_deref()
    }

    /// `PidTagPstPassword`: the stored CRC-32 of the password, surfaced
    /// as-is.
    pub fn password_hash(&self) -> Option<u32> {
        self.password_hash
    }

    pub fn root_entry_id(&self) -> Option<&EntryId> {
        self.root_entry_id.as_ref()
    }

    pub fn deleted_items_entry_id(&self) -> Option<&EntryId> {
        self.deleted_items_entry_id.as_ref()
    }

    /// Synthesize the 24-byte EntryID of a node in this store:
    /// `0x00000000 || store record key || nid`.
    pub fn entry_id(&self, node: NodeId) -> Option<Vec<u8>> {
        let record_key = self.record_key.as_deref()?;
        let mut bytes = Vec::with_capacity(8 + record_key.len());
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(record_key);
        bytes.extend_from_slice(&u32::from(node).to_le_bytes());
        Some(bytes)
    }
}

//! ## [PC (Property Context)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/294c83c6-ff92-42f5-b6b6-876c29fa9737)

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

use super::{heap::*, tree, LtpError, LtpResult};
use crate::{
    ndb::{block::SubNodeLeafEntry, node_id::*, NodeDatabase},
    props::{
        prop_id::*,
        prop_type::PropertyType,
        value::{EntryId, PropertyValue},
    },
};

/// The property-id keyed record set of one node: a BTH with `cbKey = 2` and
/// `cbEnt = 6`, fully decoded at read time so no heap pages are retained
/// beyond the context itself.
pub struct PropertyContext {
    heap: HeapNode,
    properties: BTreeMap<u16, PropertyValue>,
}

impl PropertyContext {
    pub fn read_node(database: &NodeDatabase, node: NodeId) -> LtpResult<Self> {
        let entry = *database.lookup_node(node)?;
        Self::read(database, HeapNode::read_node(database, &entry)?)
    }

    pub fn read_sub_node(database: &NodeDatabase, entry: &SubNodeLeafEntry) -> LtpResult<Self> {
        Self::read(database, HeapNode::read_sub_node(database, entry)?)
    }

    fn read(database: &NodeDatabase, heap: HeapNode) -> LtpResult<Self> {
        if heap.client_type() != HeapClientType::Properties {
            return Err(LtpError::NotAPropertyContext(heap.client_type()));
        }

        let header = tree::HeapTreeHeader::read(&heap, heap.user_root())?;
        if header.key_size() != 2 || header.entry_size() != 6 {
            return Err(LtpError::InvalidHeapTreeRecordSize(
                header.key_size() as u8,
                header.entry_size() as u8,
            ));
        }

        let mut properties = BTreeMap::new();
        for record in tree::read_records(&heap, &header)? {
            let prop_id = LittleEndian::read_u16(record.key());
            let type_bits = LittleEndian::read_u16(&record.data()[..2]);
            let mut value_bytes = [0_u8; 4];
            value_bytes.copy_from_slice(&record.data()[2..6]);

            let value = Self::resolve_value(database, &heap, type_bits, value_bytes)?;
            let value = retype_entry_id(prop_id, value);
            if properties.insert(prop_id, value).is_some() {
                return Err(LtpError::DuplicatePropertyId(prop_id));
            }
        }

        Ok(Self { heap, properties })
    }

    /// `dwValueHnid` resolution: fixed values of 4 bytes or fewer are the
    /// record bytes themselves; wider fixed values live behind an HID;
    /// variable and multi values live behind an HID or, when the NID type of
    /// the 4 bytes is not `NID_TYPE_HID`, behind a sub-node of this heap.
    fn resolve_value(
        database: &NodeDatabase,
        heap: &HeapNode,
        type_bits: u16,
        value_bytes: [u8; 4],
    ) -> LtpResult<PropertyValue> {
        let Some(prop_type) = PropertyType::from_bits(type_bits) else {
            return Ok(PropertyValue::Unspecified(value_bytes.to_vec()));
        };

        let raw = LittleEndian::read_u32(&value_bytes);
        let descriptor = prop_type.descriptor();

        if descriptor.is_fixed() {
            if descriptor.byte_count <= 4 {
                return Ok(PropertyValue::decode(
                    prop_type,
                    &value_bytes[..descriptor.byte_count],
                )?);
            }
            let payload = heap.find_entry(HeapId::from(raw))?;
            return Ok(PropertyValue::decode(prop_type, payload)?);
        }

        let heap_id = HeapId::from(raw);
        if heap_id.id_type() == NodeIdType::HeapNode as u8 {
            if heap_id.is_empty() {
                return Ok(PropertyValue::decode(prop_type, &[])?);
            }
            let payload = heap.find_entry(heap_id)?;
            return Ok(PropertyValue::decode(prop_type, payload)?);
        }

        let entry = heap.sub_node(NodeId::from(raw))?;
        let payload = database.fetch_all_block_data(entry.data())?.concat();
        Ok(PropertyValue::decode(prop_type, &payload)?)
    }

    pub fn get(&self, prop_id: u16) -> Option<&PropertyValue> {
        self.properties.get(&prop_id)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&u16, &PropertyValue)> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// The backing heap, still carrying the node's sub-node map; the
    /// messaging layer walks it for attachment and recipient tables.
    pub fn heap(&self) -> &HeapNode {
        &self.heap
    }
}

/// The well-known EntryID-bearing properties surface as
/// [`PropertyValue::EntryId`] instead of raw binary.
fn retype_entry_id(prop_id: u16, value: PropertyValue) -> PropertyValue {
    match prop_id {
        PID_TAG_ENTRY_ID
        | PID_TAG_FINDER_ENTRY_ID
        | PID_TAG_IPM_SUB_TREE_ENTRY_ID
        | PID_TAG_IPM_WASTEBASKET_ENTRY_ID => match &value {
            PropertyValue::Binary(payload) => match EntryId::parse(payload) {
                Ok(entry_id) => PropertyValue::EntryId(entry_id),
                Err(_) => value,
            },
            _ => value,
        },
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retype_entry_id() {
        let mut payload = vec![0_u8; 24];
        payload[20..].copy_from_slice(&0x122_u32.to_le_bytes());

        let value = retype_entry_id(
            PID_TAG_IPM_SUB_TREE_ENTRY_ID,
            PropertyValue::Binary(payload.clone()),
        );
        let PropertyValue::EntryId(entry_id) = value else {
            panic!("expected an EntryId");
        };
        assert_eq!(entry_id.node(), 0x122);

        // other properties keep their binary shape
        let value = retype_entry_id(PID_TAG_RECORD_KEY, PropertyValue::Binary(payload));
        assert!(matches!(value, PropertyValue::Binary(_)));

        // malformed payloads stay binary
        let value = retype_entry_id(PID_TAG_ENTRY_ID, PropertyValue::Binary(vec![0; 8]));
        assert!(matches!(value, PropertyValue::Binary(_)));
    }
}

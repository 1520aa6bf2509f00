//! ## The `__properties_version1.0` Stream
//!
//! Every storage in a `.msg` file carries one: a shape-dependent header
//! followed by 16-byte property records. Fixed values live in the record;
//! variable and multi values live in sibling `__substg1.0_<TAG>` streams.

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

use super::{MsgError, MsgResult};
use crate::{
    cfb::CompoundFile,
    props::{
        prop_type::PropertyType,
        value::{decode_utf16le, PropertyValue},
    },
};

pub const PROPERTY_STREAM_NAME: &str = "__properties_version1.0";
pub const SUBSTG_PREFIX: &str = "__substg1.0_";

/// Header size over the top-level message storage.
pub const TOP_LEVEL_HEADER_SIZE: usize = 32;
/// Header size over an embedded-message storage.
pub const EMBEDDED_HEADER_SIZE: usize = 24;
/// Header size over recipient and attachment storages.
pub const RECIPIENT_OR_ATTACHMENT_HEADER_SIZE: usize = 8;

const RECORD_SIZE: usize = 16;

/// The decoded property set of one storage.
#[derive(Default)]
pub struct PropertyStream {
    properties: BTreeMap<u16, PropertyValue>,
    next_recipient_id: Option<u32>,
    next_attachment_id: Option<u32>,
    recipient_count: Option<u32>,
    attachment_count: Option<u32>,
}

impl PropertyStream {
    /// Parse the property stream of `storage`, with `header_size` selecting
    /// the header shape. The record area must be an exact multiple of 16
    /// bytes.
    pub fn read(
        cfb: &CompoundFile,
        storage: usize,
        header_size: usize,
    ) -> MsgResult<Self> {
        let data = cfb.child_data(storage, PROPERTY_STREAM_NAME)?;
        if data.is_empty() {
            return Ok(Self::default());
        }
        if data.len() < header_size {
            return Err(MsgError::TruncatedPropertyStream(data.len()));
        }

        let mut stream = Self::default();
        if header_size >= EMBEDDED_HEADER_SIZE {
            stream.next_recipient_id = Some(LittleEndian::read_u32(&data[8..12]));
            stream.next_attachment_id = Some(LittleEndian::read_u32(&data[12..16]));
            stream.recipient_count = Some(LittleEndian::read_u32(&data[16..20]));
            stream.attachment_count = Some(LittleEndian::read_u32(&data[20..24]));
        }

        if (data.len() - header_size) % RECORD_SIZE != 0 {
            return Err(MsgError::MisalignedPropertyStream(data.len()));
        }

        for record in data[header_size..].chunks_exact(RECORD_SIZE) {
            let tag = LittleEndian::read_u32(&record[..4]);
            let prop_id = (tag >> 16) as u16;
            let type_bits = (tag & 0xFFFF) as u16;

            let value = Self::decode_record(cfb, storage, tag, type_bits, record)?;
            if stream.properties.insert(prop_id, value).is_some() {
                return Err(MsgError::DuplicatePropertyId(prop_id));
            }
        }

        Ok(stream)
    }

    fn decode_record(
        cfb: &CompoundFile,
        storage: usize,
        tag: u32,
        type_bits: u16,
        record: &[u8],
    ) -> MsgResult<PropertyValue> {
        let prop_id = (tag >> 16) as u16;
        let Some(prop_type) = PropertyType::from_bits(type_bits) else {
            return Ok(PropertyValue::Unspecified(record[8..16].to_vec()));
        };

        // sub-objects (embedded messages, OLE attachments) live in sibling
        // storages, not streams; only the reference bytes are surfaced
        if prop_type == PropertyType::Object {
            return Ok(PropertyValue::Unspecified(record[8..12].to_vec()));
        }

        let descriptor = prop_type.descriptor();
        if descriptor.is_fixed() {
            let width = descriptor.byte_count.min(8);
            return Ok(PropertyValue::decode(prop_type, &record[8..8 + width])?);
        }

        let size = LittleEndian::read_u32(&record[8..12]);
        let stream_name = format!("{SUBSTG_PREFIX}{tag:08X}");
        let payload = cfb.child_data(storage, &stream_name)?;

        let expected = payload.len()
            + match prop_type {
                PropertyType::Unicode => 2,
                PropertyType::String8 => 1,
                _ => 0,
            };
        if payload.len() != size as usize && expected != size as usize {
            return Err(MsgError::PropertySizeMismatch(
                prop_id,
                size,
                payload.len(),
            ));
        }

        if (descriptor.is_multi && descriptor.is_variable)
            || prop_type == PropertyType::MultipleBinary
        {
            return Self::decode_multi_variable(cfb, storage, &stream_name, prop_type, &payload);
        }

        Ok(PropertyValue::decode(prop_type, &payload)?)
    }

    /// Variable multi values: the main sub-stream is a per-element length
    /// table (4 bytes per string, 8 per binary entry) and each element lives
    /// in its own `…-XXXXXXXX` stream.
    fn decode_multi_variable(
        cfb: &CompoundFile,
        storage: usize,
        stream_name: &str,
        prop_type: PropertyType,
        length_table: &[u8],
    ) -> MsgResult<PropertyValue> {
        let length_entry_size = match prop_type {
            PropertyType::MultipleBinary => 8,
            _ => 4,
        };
        let count = length_table.len() / length_entry_size;

        let mut elements = Vec::with_capacity(count);
        for index in 0..count {
            let element_name = format!("{stream_name}-{index:08X}");
            elements.push(cfb.child_data(storage, &element_name)?);
        }

        Ok(match prop_type {
            PropertyType::MultipleUnicode => PropertyValue::MultipleUnicode(
                elements.iter().map(|bytes| decode_utf16le(bytes)).collect(),
            ),
            PropertyType::MultipleString8 => PropertyValue::MultipleString8(elements),
            _ => PropertyValue::MultipleBinary(elements),
        })
    }

    pub fn get(&self, prop_id: u16) -> Option<&PropertyValue> {
        self.properties.get(&prop_id)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&u16, &PropertyValue)> {
        self.properties.iter()
    }

    pub fn next_recipient_id(&self) -> Option<u32> {
        self.next_recipient_id
    }

    pub fn next_attachment_id(&self) -> Option<u32> {
        self.next_attachment_id
    }

    pub fn recipient_count(&self) -> Option<u32> {
        self.recipient_count
    }

    pub fn attachment_count(&self) -> Option<u32> {
        self.attachment_count
    }
}

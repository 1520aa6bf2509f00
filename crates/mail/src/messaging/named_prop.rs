//! ## [Named Property Lookup Map](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e17e195d-0454-4b9b-b398-c9127a26a678)

use byteorder::{ByteOrder, LittleEndian};

use super::MessagingResult;
use crate::{
    ltp::prop_context::PropertyContext,
    ndb::{node_id::NID_NAME_TO_ID_MAP, NodeDatabase},
    props::{prop_id::*, value::*},
};

/// `PS_MAPI`: {00020328-0000-0000-C000-000000000046}
pub const PS_MAPI: [u8; 16] = [
    0x28, 0x03, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

/// `PS_PUBLIC_STRINGS`: {00020329-0000-0000-C000-000000000046}
pub const PS_PUBLIC_STRINGS: [u8; 16] = [
    0x29, 0x03, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

/// One 8-byte `NAMEID` record from the entry stream. When the `N` bit is
/// set, `dwPropertyID` is a byte offset into the string stream where a
/// 4-byte length precedes the UTF-16LE name.
#[derive(Clone, Debug)]
pub struct NameId {
    property_id: u32,
    is_string: bool,
    guid_index: u16,
    prop_index: u16,
    name: Option<String>,
    guid: Option<[u8; 16]>,
}

impl NameId {
    fn parse(payload: &[u8]) -> Self {
        let property_id = LittleEndian::read_u32(&payload[..4]);
        let guid_bits = LittleEndian::read_u16(&payload[4..6]);
        let prop_index = LittleEndian::read_u16(&payload[6..8]);

        Self {
            property_id,
            is_string: guid_bits & 0x01 != 0,
            guid_index: guid_bits >> 1,
            prop_index,
            name: None,
            guid: None,
        }
    }

    /// `dwPropertyID`: a numeric id, or a string-stream offset when
    /// [`Self::is_string`].
    pub fn property_id(&self) -> u32 {
        self.property_id
    }

    pub fn is_string(&self) -> bool {
        self.is_string
    }

    /// The property id the named property is mapped to: `wPropIdx + 0x8000`.
    pub fn npid(&self) -> u16 {
        self.prop_index.wrapping_add(0x8000)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn guid(&self) -> Option<&[u8; 16]> {
        self.guid.as_ref()
    }
}

/// The property context at `NID_NAME_TO_ID_MAP`, holding the entry, string,
/// and GUID streams.
#[derive(Default)]
pub struct NameToIdMap {
    entries: Vec<NameId>,
}

impl NameToIdMap {
    pub fn read(database: &NodeDatabase) -> MessagingResult<Self> {
        let properties = PropertyContext::read_node(database, NID_NAME_TO_ID_MAP)?;

        let Some(entry_stream) = properties
            .get(PID_TAG_NAMEID_STREAM_ENTRY)
            .and_then(PropertyValue::as_bytes)
        else {
            return Ok(Self {
                entries: Vec::new(),
            });
        };

        let mut entries: Vec<NameId> = entry_stream.chunks_exact(8).map(NameId::parse).collect();

        let string_stream = properties
            .get(PID_TAG_NAMEID_STREAM_STRING)
            .and_then(PropertyValue::as_bytes);
        let guid_stream = properties
            .get(PID_TAG_NAMEID_STREAM_GUID)
            .and_then(PropertyValue::as_bytes);

        for entry in entries.iter_mut() {
            if entry.is_string {
                if let Some(stream) = string_stream {
                    entry.name = read_string_entry(stream, entry.property_id);
                }
            }

            entry.guid = match entry.guid_index {
                0 => None,
                1 => Some(PS_MAPI),
                2 => Some(PS_PUBLIC_STRINGS),
                index => guid_stream.and_then(|stream| {
                    let start = 16 * (usize::from(index) - 3);
                    stream.get(start..start + 16).map(|bytes| {
                        let mut guid = [0; 16];
                        guid.copy_from_slice(bytes);
                        guid
                    })
                }),
            };
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[NameId] {
        &self.entries
    }

    /// The string-named entries as `(NPID, name)` pairs.
    pub fn named_properties(&self) -> impl Iterator<Item = (u16, &str)> {
        self.entries
            .iter()
            .filter_map(|entry| Some((entry.npid(), entry.name()?)))
    }
}

fn read_string_entry(stream: &[u8], offset: u32) -> Option<String> {
    let start = offset as usize;
    let length = LittleEndian::read_u32(stream.get(start..start + 4)?) as usize;
    let name_bytes = stream.get(start + 4..start + 4 + length)?;
    Some(decode_utf16le(name_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_id_parse() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x10_u32.to_le_bytes());
        payload.extend_from_slice(&0x0007_u16.to_le_bytes());
        payload.extend_from_slice(&0x0002_u16.to_le_bytes());

        let entry = NameId::parse(&payload);
        assert_eq!(entry.property_id(), 0x10);
        assert!(entry.is_string());
        assert_eq!(entry.guid_index, 3);
        assert_eq!(entry.npid(), 0x8002);
    }

    #[test]
    fn test_read_string_entry() {
        let name: Vec<u8> = "x-pan".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut stream = vec![0_u8; 8];
        stream.extend_from_slice(&(name.len() as u32).to_le_bytes());
        stream.extend_from_slice(&name);

        assert_eq!(read_string_entry(&stream, 8).unwrap(), "x-pan");
        assert_eq!(read_string_entry(&stream, 100), None);
    }
}

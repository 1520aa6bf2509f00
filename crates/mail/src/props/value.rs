//! ## Decoded Property Values
//!
//! A tagged union over every concrete value shape, decoded from raw payload
//! bytes through the [`PropertyType::descriptor`] table. The same decoding is
//! used whether the payload came from a PC record, a TC row cell, or a CFB
//! property stream.

use byteorder::{ByteOrder, LittleEndian};

use super::{prop_type::PropertyType, time::*, PropertyError, PropertyResult};

/// [EntryID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/28dec1ea-b5d3-4a5f-bd91-9a35c370a67f):
/// 24 bytes of `{ rgbFlags, provider uid, nid }`. Well-known EntryID-bearing
/// properties are re-typed from [`PropertyValue::Binary`] to this shape.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EntryId {
    flags: u32,
    uid: [u8; 16],
    node: u32,
}

impl EntryId {
    const SIZE: usize = 24;

    pub fn parse(payload: &[u8]) -> PropertyResult<Self> {
        if payload.len() != Self::SIZE {
            return Err(PropertyError::InvalidEntryIdSize(payload.len()));
        }

        let mut uid = [0; 16];
        uid.copy_from_slice(&payload[4..20]);

        Ok(Self {
            flags: LittleEndian::read_u32(&payload[..4]),
            uid,
            node: LittleEndian::read_u32(&payload[20..]),
        })
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn uid(&self) -> &[u8; 16] {
        &self.uid
    }

    /// The referenced node, as a raw NID value.
    pub fn node(&self) -> u32 {
        self.node
    }
}

#[derive(Clone, PartialEq, Debug, Default)]
pub enum PropertyValue {
    #[default]
    Null,
    Integer16(i16),
    Integer32(i32),
    Integer64(i64),
    Floating32(f32),
    Floating64(f64),
    ErrorCode(u32),
    Boolean(bool),
    Time(FileTime),
    AppTime(AppTime),
    String8(Vec<u8>),
    Unicode(String),
    Binary(Vec<u8>),
    Guid([u8; 16]),
    EntryId(EntryId),
    /// Unknown or externally typed payloads, preserved as opaque bytes.
    Unspecified(Vec<u8>),
    MultipleInteger16(Vec<i16>),
    MultipleInteger32(Vec<i32>),
    MultipleInteger64(Vec<i64>),
    MultipleFloating32(Vec<f32>),
    MultipleFloating64(Vec<f64>),
    MultipleTime(Vec<FileTime>),
    MultipleAppTime(Vec<AppTime>),
    MultipleString8(Vec<Vec<u8>>),
    MultipleUnicode(Vec<String>),
    MultipleBinary(Vec<Vec<u8>>),
    MultipleGuid(Vec<[u8; 16]>),
}

impl PropertyValue {
    /// Decode a payload as `prop_type`. Fixed-width values fail on short
    /// payloads; multi-value sequences take as many complete elements as the
    /// payload holds; the variable multi types go through the
    /// `ulCount`/`rgulDataOffsets` offset table.
    pub fn decode(prop_type: PropertyType, payload: &[u8]) -> PropertyResult<Self> {
        use PropertyType::*;

        let descriptor = prop_type.descriptor();
        if descriptor.is_fixed() && payload.len() < descriptor.byte_count {
            return Err(PropertyError::TruncatedValue(prop_type, payload.len()));
        }

        Ok(match prop_type {
            Unspecified => Self::Unspecified(payload.to_vec()),
            Null => Self::Null,
            Integer16 => Self::Integer16(LittleEndian::read_i16(payload)),
            Integer32 => Self::Integer32(LittleEndian::read_i32(payload)),
            Floating32 => Self::Floating32(LittleEndian::read_f32(payload)),
            Floating64 => Self::Floating64(LittleEndian::read_f64(payload)),
            FloatingTime => Self::AppTime(LittleEndian::read_f64(payload).into()),
            ErrorCode => Self::ErrorCode(LittleEndian::read_u32(payload)),
            Boolean => Self::Boolean(payload[0] != 0),
            Integer64 => Self::Integer64(LittleEndian::read_i64(payload)),
            String8 => Self::String8(payload.to_vec()),
            PropertyType::Unicode => Self::Unicode(decode_utf16le(payload)),
            Time => Self::Time(FileTime::new(LittleEndian::read_i64(payload))),
            Guid => {
                let mut value = [0; 16];
                value.copy_from_slice(&payload[..16]);
                Self::Guid(value)
            }
            Binary => Self::Binary(payload.to_vec()),
            // Only the 4-byte sub-object reference of a COM object survives.
            Object => Self::Unspecified(payload[..payload.len().min(4)].to_vec()),
            Currency | ServerId | Restriction | RuleAction | MultipleCurrency => {
                return Err(PropertyError::UnsupportedPropertyType(prop_type));
            }
            MultipleInteger16 => Self::MultipleInteger16(
                payload
                    .chunks_exact(2)
                    .map(LittleEndian::read_i16)
                    .collect(),
            ),
            MultipleInteger32 => Self::MultipleInteger32(
                payload
                    .chunks_exact(4)
                    .map(LittleEndian::read_i32)
                    .collect(),
            ),
            MultipleInteger64 => Self::MultipleInteger64(
                payload
                    .chunks_exact(8)
                    .map(LittleEndian::read_i64)
                    .collect(),
            ),
            MultipleFloating32 => Self::MultipleFloating32(
                payload
                    .chunks_exact(4)
                    .map(LittleEndian::read_f32)
                    .collect(),
            ),
            MultipleFloating64 => Self::MultipleFloating64(
                payload
                    .chunks_exact(8)
                    .map(LittleEndian::read_f64)
                    .collect(),
            ),
            MultipleFloatingTime => Self::MultipleAppTime(
                payload
                    .chunks_exact(8)
                    .map(|chunk| AppTime::new(LittleEndian::read_f64(chunk)))
                    .collect(),
            ),
            MultipleTime => Self::MultipleTime(
                payload
                    .chunks_exact(8)
                    .map(|chunk| FileTime::new(LittleEndian::read_i64(chunk)))
                    .collect(),
            ),
            MultipleGuid => Self::MultipleGuid(
                payload
                    .chunks_exact(16)
                    .map(|chunk| {
                        let mut value = [0; 16];
                        value.copy_from_slice(chunk);
                        value
                    })
                    .collect(),
            ),
            MultipleString8 => Self::MultipleString8(
                multi_value_slices(payload)?
                    .into_iter()
                    .map(<[u8]>::to_vec)
                    .collect(),
            ),
            MultipleUnicode => Self::MultipleUnicode(
                multi_value_slices(payload)?
                    .into_iter()
                    .map(decode_utf16le)
                    .collect(),
            ),
            MultipleBinary => Self::MultipleBinary(
                multi_value_slices(payload)?
                    .into_iter()
                    .map(<[u8]>::to_vec)
                    .collect(),
            ),
        })
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::Unicode(value) => Some(value.clone()),
            Self::String8(value) => {
                let end = value.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                Some(String::from_utf8_lossy(&value[..end]).into_owned())
            }
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer16(value) => Some(i32::from(*value)),
            Self::Integer32(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(value) | Self::String8(value) | Self::Unspecified(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<FileTime> {
        match self {
            Self::Time(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_entry_id(&self) -> Option<&EntryId> {
        match self {
            Self::EntryId(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&PropertyValue> for PropertyType {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Null => Self::Null,
            PropertyValue::Integer16(_) => Self::Integer16,
            PropertyValue::Integer32(_) => Self::Integer32,
            PropertyValue::Integer64(_) => Self::Integer64,
            PropertyValue::Floating32(_) => Self::Floating32,
            PropertyValue::Floating64(_) => Self::Floating64,
            PropertyValue::ErrorCode(_) => Self::ErrorCode,
            PropertyValue::Boolean(_) => Self::Boolean,
            PropertyValue::Time(_) => Self::Time,
            PropertyValue::AppTime(_) => Self::FloatingTime,
            PropertyValue::String8(_) => Self::String8,
            PropertyValue::Unicode(_) => Self::Unicode,
            PropertyValue::Binary(_) | PropertyValue::EntryId(_) => Self::Binary,
            PropertyValue::Guid(_) => Self::Guid,
            PropertyValue::Unspecified(_) => Self::Unspecified,
            PropertyValue::MultipleInteger16(_) => Self::MultipleInteger16,
            PropertyValue::MultipleInteger32(_) => Self::MultipleInteger32,
            PropertyValue::MultipleInteger64(_) => Self::MultipleInteger64,
            PropertyValue::MultipleFloating32(_) => Self::MultipleFloating32,
            PropertyValue::MultipleFloating64(_) => Self::MultipleFloating64,
            PropertyValue::MultipleTime(_) => Self::MultipleTime,
            PropertyValue::MultipleAppTime(_) => Self::MultipleFloatingTime,
            PropertyValue::MultipleString8(_) => Self::MultipleString8,
            PropertyValue::MultipleUnicode(_) => Self::MultipleUnicode,
            PropertyValue::MultipleBinary(_) => Self::MultipleBinary,
            PropertyValue::MultipleGuid(_) => Self::MultipleGuid,
        }
    }
}

/// Decode UTF-16LE, dropping a trailing unpaired byte and any terminating
/// NUL code units; malformed sequences are replaced, never fatal.
pub fn decode_utf16le(payload: &[u8]) -> String {
    let mut units: Vec<u16> = payload
        .chunks_exact(2)
        .map(LittleEndian::read_u16)
        .collect();
    while units.last() == Some(&0) {
        units.pop();
    }
    String::from_utf16_lossy(&units)
}

/// Split a multi-value payload through its
/// [`ulCount`/`rgulDataOffsets`](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/8e4ae05c-3c24-4103-b7e5-ffef6f244834)
/// table. An empty payload is an empty sequence.
fn multi_value_slices(payload: &[u8]) -> PropertyResult<Vec<&[u8]>> {
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    if payload.len() < 4 {
        return Err(PropertyError::InvalidMultiValueCount(payload.len() as u32));
    }

    let count = LittleEndian::read_u32(&payload[..4]) as usize;
    if payload.len() < 4 * (count + 1) {
        return Err(PropertyError::InvalidMultiValueCount(count as u32));
    }

    let mut offsets = Vec::with_capacity(count + 1);
    for index in 1..=count {
        offsets.push(LittleEndian::read_u32(&payload[4 * index..]) as usize);
    }
    offsets.push(payload.len());

    offsets
        .windows(2)
        .map(|window| {
            let (start, end) = (window[0], window[1]);
            if start > end || end > payload.len() {
                return Err(PropertyError::InvalidMultiValueOffset(start as u32));
            }
            Ok(&payload[start..end])
        })
        .collect()
}

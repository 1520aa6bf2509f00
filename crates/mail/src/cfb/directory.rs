//! [Compound File Directory](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/b37413bb-f3ef-4adc-b18e-29bddd62c26e)

use byteorder::{ByteOrder, LittleEndian};
use std::{
    collections::BTreeMap,
    io::{Read, Seek, SeekFrom},
};

use super::{
    fat::{Fat, ENDOFCHAIN},
    header::CfbHeader,
    CfbError, CfbResult,
};
use crate::props::{time::FileTime, value::decode_utf16le};

pub const ENTRY_SIZE: usize = 128;
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

/// Object type of a directory entry. Unknown values stay parseable; such
/// entries are simply never linked into a storage.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ObjectType {
    Unknown,
    Storage,
    Stream,
    RootStorage,
}

impl From<u8> for ObjectType {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Self::Storage,
            0x02 => Self::Stream,
            0x05 => Self::RootStorage,
            _ => Self::Unknown,
        }
    }
}

/// One 128-byte directory entry. The tree links (`left_sibling`,
/// `right_sibling`, `child`) are red-black in the file; the balance is
/// ignored here and the links are only walked to build flat child maps.
#[derive(Clone, Debug)]
pub struct DirectoryEntry {
    name: String,
    object_type: ObjectType,
    color: u8,
    left_sibling: u32,
    right_sibling: u32,
    child: u32,
    clsid: [u8; 16],
    state_bits: u32,
    creation_time: Option<FileTime>,
    modified_time: Option<FileTime>,
    starting_sector: u32,
    stream_size: u64,
}

impl DirectoryEntry {
    fn parse(payload: &[u8], major_version: u16) -> Self {
        let name_length = usize::from(LittleEndian::read_u16(&payload[64..66]));
        let name = if (2..=64).contains(&name_length) {
            decode_utf16le(&payload[..name_length - 2])
        } else {
            String::new()
        };

        let mut clsid = [0_u8; 16];
        clsid.copy_from_slice(&payload[80..96]);

        let creation_time = LittleEndian::read_i64(&payload[100..108]);
        let modified_time = LittleEndian::read_i64(&payload[108..116]);

        let stream_size = LittleEndian::read_u64(&payload[120..128]);
        // the upper 32 bits are not guaranteed to be zero in version 3 files
        let stream_size = if major_version == 3 {
            stream_size & 0xFFFF_FFFF
        } else {
            stream_size
        };

        Self {
            name,
            object_type: ObjectType::from(payload[66]),
            color: payload[67],
            left_sibling: LittleEndian::read_u32(&payload[68..72]),
            right_sibling: LittleEndian::read_u32(&payload[72..76]),
            child: LittleEndian::read_u32(&payload[76..80]),
            clsid,
            state_bits: LittleEndian::read_u32(&payload[96..100]),
            creation_time: (creation_time != 0).then(|| FileTime::new(creation_time)),
            modified_time: (modified_time != 0).then(|| FileTime::new(modified_time)),
            starting_sector: LittleEndian::read_u32(&payload[116..120]),
            stream_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn is_stream(&self) -> bool {
        self.object_type == ObjectType::Stream
    }

    pub fn color(&self) -> u8 {
        self.color
    }

    pub fn left_sibling(&self) -> u32 {
        self.left_sibling
    }

    pub fn right_sibling(&self) -> u32 {
        self.right_sibling
    }

    pub fn child(&self) -> u32 {
        self.child
    }

    pub fn clsid(&self) -> &[u8; 16] {
        &self.clsid
    }

    pub fn state_bits(&self) -> u32 {
        self.state_bits
    }

    pub fn creation_time(&self) -> Option<FileTime> {
        self.creation_time
    }

    pub fn modified_time(&self) -> Option<FileTime> {
        self.modified_time
    }

    pub fn starting_sector(&self) -> u32 {
        self.starting_sector
    }

    pub fn stream_size(&self) -> u64 {
        self.stream_size
    }
}

/// All directory entries plus, per storage, a flat `name -> entry index`
/// map assembled by a breadth-first walk of the sibling links. Duplicate
/// names under one parent are fatal.
pub struct Directory {
    entries: Vec<DirectoryEntry>,
    children: Vec<BTreeMap<String, usize>>,
}

impl Directory {
    pub fn read<R: Read + Seek + ?Sized>(
        reader: &mut R,
        header: &CfbHeader,
        fat: &Fat,
    ) -> CfbResult<Self> {
        let mut entries = Vec::new();
        let mut sector = header.first_directory_sector();
        let mut hops = 0_usize;
        while sector != ENDOFCHAIN {
            if hops > header.fat_sectors() as usize * header.sector_size() / 4 {
                return Err(CfbError::UnterminatedChain);
            }
            hops += 1;

            reader.seek(SeekFrom::Start(header.sector_offset(sector)))?;
            let mut sector_bytes = vec![0_u8; header.sector_size()];
            reader.read_exact(&mut sector_bytes)?;
            for payload in sector_bytes.chunks_exact(ENTRY_SIZE) {
                entries.push(DirectoryEntry::parse(payload, header.major_version()));
            }

            sector = fat.next(sector)?;
        }

        if entries.is_empty() {
            return Err(CfbError::EmptyDirectory);
        }

        let children = Self::build_children(&entries)?;
        Ok(Self { entries, children })
    }

    /// Populate the per-storage child maps, starting from the root entry
    /// and descending into every linked storage.
    fn build_children(entries: &[DirectoryEntry]) -> CfbResult<Vec<BTreeMap<String, usize>>> {
        let mut children = vec![BTreeMap::new(); entries.len()];
        let mut visited = vec![false; entries.len()];
        let mut parents = vec![0_usize];
        visited[0] = true;

        while let Some(parent) = parents.pop() {
            let mut queue = Vec::new();
            if entries[parent].child() != NOSTREAM {
                queue.push(entries[parent].child());
            }

            while let Some(index) = queue.pop() {
                let index = index as usize;
                let entry = entries
                    .get(index)
                    .ok_or(CfbError::EntryOutOfBounds(index as u32))?;

                if children[parent]
                    .insert(entry.name().to_string(), index)
                    .is_some()
                {
                    return Err(CfbError::DuplicateEntryName(entry.name().to_string()));
                }

                if entry.left_sibling() != NOSTREAM {
                    queue.push(entry.left_sibling());
                }
                if entry.right_sibling() != NOSTREAM {
                    queue.push(entry.right_sibling());
                }
                if entry.child() != NOSTREAM && !visited[index] {
                    visited[index] = true;
                    parents.push(index);
                }
            }
        }

        Ok(children)
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&DirectoryEntry> {
        self.entries.get(index)
    }

    /// The root storage entry; its stream anchors the mini stream.
    pub fn root(&self) -> &DirectoryEntry {
        &self.entries[0]
    }

    pub fn child_index(&self, parent: usize, name: &str) -> Option<usize> {
        self.children.get(parent)?.get(name).copied()
    }

    pub fn children_of(&self, parent: usize) -> impl Iterator<Item = (&str, usize)> {
        self.children
            .get(parent)
            .into_iter()
            .flat_map(|map| map.iter().map(|(name, &index)| (name.as_str(), index)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn build_entry(
        name: &str,
        object_type: u8,
        left: u32,
        right: u32,
        child: u32,
        starting_sector: u32,
        stream_size: u64,
    ) -> Vec<u8> {
        let mut payload = vec![0_u8; ENTRY_SIZE];
        let encoded: Vec<u8> = name.encode_utf16().flat_map(u16::to_le_bytes).collect();
        payload[..encoded.len()].copy_from_slice(&encoded);
        payload[64..66].copy_from_slice(&((encoded.len() + 2) as u16).to_le_bytes());
        payload[66] = object_type;
        payload[68..72].copy_from_slice(&left.to_le_bytes());
        payload[72..76].copy_from_slice(&right.to_le_bytes());
        payload[76..80].copy_from_slice(&child.to_le_bytes());
        payload[116..120].copy_from_slice(&starting_sector.to_le_bytes());
        payload[120..128].copy_from_slice(&stream_size.to_le_bytes());
        payload
    }

    #[test]
    fn test_parse_entry() {
        let payload = build_entry("Root Entry", 0x05, NOSTREAM, NOSTREAM, 1, 3, 192);
        let entry = DirectoryEntry::parse(&payload, 3);
        assert_eq!(entry.name(), "Root Entry");
        assert_eq!(entry.object_type(), ObjectType::RootStorage);
        assert_eq!(entry.child(), 1);
        assert_eq!(entry.starting_sector(), 3);
        assert_eq!(entry.stream_size(), 192);
    }

    #[test]
    fn test_version3_stream_size_masks_high_bits() {
        let payload = build_entry("s", 0x02, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0xDEAD_BEEF_0000_0100);
        assert_eq!(DirectoryEntry::parse(&payload, 3).stream_size(), 0x100);
        assert_eq!(
            DirectoryEntry::parse(&payload, 4).stream_size(),
            0xDEAD_BEEF_0000_0100
        );
    }

    #[test]
    fn test_build_children() {
        let entries: Vec<DirectoryEntry> = [
            build_entry("Root Entry", 0x05, NOSTREAM, NOSTREAM, 2, 0, 0),
            build_entry("a", 0x02, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0),
            build_entry("b", 0x01, 1, 3, 4, 0, 0),
            build_entry("c", 0x02, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0),
            build_entry("d", 0x02, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0),
        ]
        .iter()
        .map(|payload| DirectoryEntry::parse(payload, 3))
        .collect();

        let children = Directory::build_children(&entries).unwrap();
        assert_eq!(children[0].len(), 3);
        assert_eq!(children[0]["a"], 1);
        assert_eq!(children[0]["b"], 2);
        assert_eq!(children[0]["c"], 3);
        assert_eq!(children[2]["d"], 4);
    }

    #[test]
    fn test_duplicate_names_are_fatal() {
        let entries: Vec<DirectoryEntry> = [
            build_entry("Root Entry", 0x05, NOSTREAM, NOSTREAM, 1, 0, 0),
            build_entry("same", 0x02, 2, NOSTREAM, NOSTREAM, 0, 0),
            build_entry("same", 0x02, NOSTREAM, NOSTREAM, NOSTREAM, 0, 0),
        ]
        .iter()
        .map(|payload| DirectoryEntry::parse(payload, 3))
        .collect();

        let Err(CfbError::DuplicateEntryName(name)) = Directory::build_children(&entries) else {
            panic!("duplicate sibling names should fail");
        };
        assert_eq!(name, "same");
    }
}

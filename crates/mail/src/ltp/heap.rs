//! ## [HN (Heap-on-Node)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/77ce49a3-3772-4d8d-bb2c-2f7520a238a6)

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

use super::{LtpError, LtpResult};
use crate::ndb::{
    block::SubNodeLeafEntry, block_id::BlockId, node_id::NodeId, page::NodeBTreeEntry,
    NodeDatabase,
};

const HEAP_SIGNATURE: u8 = 0xEC;

/// [HID](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/85b9e985-ea53-447f-b70c-eb82bfbdcbc9):
/// 5 bits of type, an 11-bit 1-based allocation index, and a 16-bit
/// block (heap page) index.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct HeapId(u32);

impl HeapId {
    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn id_type(&self) -> u8 {
        (self.0 & 0x1F) as u8
    }

    /// `hidIndex`, 1-based; zero means an empty reference.
    pub fn index(&self) -> u16 {
        ((self.0 >> 5) & 0x7FF) as u16
    }

    pub fn block_index(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn is_empty(&self) -> bool {
        self.index() == 0
    }
}

impl From<u32> for HeapId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// `bClientSig`: which client structure lives in this heap.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HeapClientType {
    /// `bTypeTC`: Table Context
    Table = 0x7C,
    /// `bTypeBTH`: BTree-on-Heap
    Tree = 0xB5,
    /// `bTypePC`: Property Context
    Properties = 0xBC,
}

impl TryFrom<u8> for HeapClientType {
    type Error = LtpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x7C => Ok(Self::Table),
            0xB5 => Ok(Self::Tree),
            0xBC => Ok(Self::Properties),
            _ => Err(LtpError::InvalidHeapClientType(value)),
        }
    }
}

/// [HNPAGEMAP](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/291653c0-b347-4c5b-ba41-85ad780b4ba4):
/// the allocation offsets at the end of each heap page. `rgibAlloc` holds
/// `cAlloc + 1` monotonically non-decreasing offsets; allocation `k`
/// (1-based) spans `[rgibAlloc[k-1], rgibAlloc[k])`.
#[derive(Clone, Debug)]
struct HeapPageMap {
    offsets: Vec<u16>,
}

impl HeapPageMap {
    fn parse(section: &[u8], page_map_offset: u16) -> LtpResult<Self> {
        let start = usize::from(page_map_offset);
        if start + 4 > section.len() {
            return Err(LtpError::InvalidHeapPageMapOffset(page_map_offset));
        }

        let alloc_count = usize::from(LittleEndian::read_u16(&section[start..]));
        let _free_count = LittleEndian::read_u16(&section[start + 2..]);

        let offsets_start = start + 4;
        if offsets_start + (alloc_count + 1) * 2 > section.len() {
            return Err(LtpError::InvalidHeapPageMapOffset(page_map_offset));
        }

        let mut offsets = Vec::with_capacity(alloc_count + 1);
        let mut last = 0_u16;
        for index in 0..=alloc_count {
            let offset = LittleEndian::read_u16(&section[offsets_start + index * 2..]);
            if offset < last || usize::from(offset) > section.len() {
                return Err(LtpError::InvalidHeapAllocOffset(offset));
            }
            offsets.push(offset);
            last = offset;
        }

        Ok(Self { offsets })
    }
}

/// A heap spanning the block-data sequence of a node, together with the
/// node's resolved sub-node map. Section 0 carries the `HNHDR`; every
/// further section starts with its own page-map offset (`HNPAGEHDR` and
/// `HNBITMAPHDR` both lead with `ibHnpm`).
pub struct HeapNode {
    client_type: HeapClientType,
    user_root: HeapId,
    sections: Vec<Vec<u8>>,
    page_maps: Vec<HeapPageMap>,
    sub_nodes: BTreeMap<u32, SubNodeLeafEntry>,
}

impl HeapNode {
    /// Read the heap of a node from the NBT entry's data and sub-node block
    /// chains.
    pub fn read_node(database: &NodeDatabase, entry: &NodeBTreeEntry) -> LtpResult<Self> {
        Self::read(database, entry.data(), entry.sub_node())
    }

    /// Read the heap of a sub-node; its own nested sub-node chain comes
    /// along when present.
    pub fn read_sub_node(database: &NodeDatabase, entry: &SubNodeLeafEntry) -> LtpResult<Self> {
        Self::read(database, entry.data(), entry.sub_node())
    }

    fn read(database: &NodeDatabase, data: BlockId, sub_node: BlockId) -> LtpResult<Self> {
        let sections = database.fetch_all_block_data(data)?;
        let sub_nodes = if sub_node.is_zero() {
            BTreeMap::new()
        } else {
            database.fetch_sub_nodes(sub_node)?
        };
        Self::parse(sections, sub_nodes)
    }

    pub(crate) fn parse(
        sections: Vec<Vec<u8>>,
        sub_nodes: BTreeMap<u32, SubNodeLeafEntry>,
    ) -> LtpResult<Self> {
        if sections.is_empty() {
            return Err(LtpError::EmptyHeapNode);
        }

        let first = &sections[0];
        if first.len() < 12 {
            return Err(LtpError::EmptyHeapNode);
        }
        let signature = first[2];
        if signature != HEAP_SIGNATURE {
            return Err(LtpError::InvalidHeapSignature(signature));
        }
        let client_type = HeapClientType::try_from(first[3])?;
        let user_root = HeapId::from(LittleEndian::read_u32(&first[4..8]));

        let page_maps = sections
            .iter()
            .map(|section| {
                if section.len() < 2 {
                    return Err(LtpError::EmptyHeapNode);
                }
                HeapPageMap::parse(section, LittleEndian::read_u16(&section[..2]))
            })
            .collect::<LtpResult<_>>()?;

        Ok(Self {
            client_type,
            user_root,
            sections,
            page_maps,
            sub_nodes,
        })
    }

    pub fn client_type(&self) -> HeapClientType {
        self.client_type
    }

    pub fn user_root(&self) -> HeapId {
        self.user_root
    }

    pub fn sub_nodes(&self) -> &BTreeMap<u32, SubNodeLeafEntry> {
        &self.sub_nodes
    }

    pub fn sub_node(&self, node: NodeId) -> LtpResult<&SubNodeLeafEntry> {
        self.sub_nodes
            .get(&u32::from(node))
            .ok_or(LtpError::SubNodeNotFound(u32::from(node)))
    }

    /// Slice the allocation a HID refers to.
    pub fn find_entry(&self, heap_id: HeapId) -> LtpResult<&[u8]> {
        let block_index = heap_id.block_index();
        let (section, page_map) = self
            .sections
            .get(usize::from(block_index))
            .zip(self.page_maps.get(usize::from(block_index)))
            .ok_or(LtpError::HeapBlockIndexNotFound(block_index))?;

        let index = usize::from(heap_id.index());
        if index == 0 || index >= page_map.offsets.len() {
            return Err(LtpError::HeapAllocIndexNotFound(heap_id.index()));
        }

        let start = usize::from(page_map.offsets[index - 1]);
        let end = usize::from(page_map.offsets[index]);
        Ok(&section[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_id_packing() {
        let heap_id = HeapId::from(0x0002_0040);
        assert_eq!(heap_id.id_type(), 0);
        assert_eq!(heap_id.index(), 2);
        assert_eq!(heap_id.block_index(), 2);
        assert!(!heap_id.is_empty());
        assert!(HeapId::from(0).is_empty());
    }

    #[test]
    fn test_page_map_monotonic() {
        let mut section = vec![0_u8; 32];
        // cAlloc = 2, cFree = 0, offsets 12, 16, 20
        section[8..10].copy_from_slice(&2_u16.to_le_bytes());
        section[12..14].copy_from_slice(&12_u16.to_le_bytes());
        section[14..16].copy_from_slice(&16_u16.to_le_bytes());
        section[16..18].copy_from_slice(&20_u16.to_le_bytes());

        let page_map = HeapPageMap::parse(&section, 8).unwrap();
        assert_eq!(page_map.offsets, vec![12, 16, 20]);
    }

    #[test]
    fn test_page_map_rejects_decreasing_offsets() {
        let mut section = vec![0_u8; 32];
        section[8..10].copy_from_slice(&2_u16.to_le_bytes());
        section[12..14].copy_from_slice(&16_u16.to_le_bytes());
        section[14..16].copy_from_slice(&12_u16.to_le_bytes());
        section[16..18].copy_from_slice(&20_u16.to_le_bytes());

        let Err(LtpError::InvalidHeapAllocOffset(12)) = HeapPageMap::parse(&section, 8) else {
            panic!("decreasing rgibAlloc should fail");
        };
    }

    #[test]
    fn test_page_map_rejects_out_of_bounds() {
        let mut section = vec![0_u8; 16];
        section[8..10].copy_from_slice(&1_u16.to_le_bytes());
        section[12..14].copy_from_slice(&12_u16.to_le_bytes());
        section[14..16].copy_from_slice(&200_u16.to_le_bytes());

        let Err(LtpError::InvalidHeapAllocOffset(200)) = HeapPageMap::parse(&section, 8) else {
            panic!("out-of-bounds rgibAlloc should fail");
        };
    }
}

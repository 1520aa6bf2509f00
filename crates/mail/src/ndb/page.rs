//! [Pages](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5774b4f2-cdc4-453e-996a-8c8230116930)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use super::{block_id::*, header::PstVersion, node_id::*, NdbError, NdbResult};
use crate::crc::compute_crc;

pub const PAGE_SIZE: usize = 512;

const ANSI_PAGE_TRAILER_SIZE: usize = 12;
const UNICODE_PAGE_TRAILER_SIZE: usize = 16;

/// `ptype`
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PageType {
    /// `ptypeBBT`: Block BTree page
    BlockBTree = 0x80,
    /// `ptypeNBT`: Node BTree page
    NodeBTree = 0x81,
    /// `ptypeFMap`: Free Map page
    FreeMap = 0x82,
    /// `ptypePMap`: Allocation Page Map page
    AllocationPageMap = 0x83,
    /// `ptypeAMap`: Allocation Map page
    AllocationMap = 0x84,
    /// `ptypeFPMap`: Free Page Map page
    FreePageMap = 0x85,
    /// `ptypeDL`: Density List page
    DensityList = 0x86,
}

impl TryFrom<u8> for PageType {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80 => Ok(PageType::BlockBTree),
            0x81 => Ok(PageType::NodeBTree),
            0x82 => Ok(PageType::FreeMap),
            0x83 => Ok(PageType::AllocationPageMap),
            0x84 => Ok(PageType::AllocationMap),
            0x85 => Ok(PageType::FreePageMap),
            0x86 => Ok(PageType::DensityList),
            _ => Err(NdbError::InvalidPageType(value)),
        }
    }
}

/// [PAGETRAILER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/f4ccb38a-930a-4db4-98df-a69c195926ba):
/// 12 bytes on ANSI files, 16 on Unicode, at the end of every page.
#[derive(Clone, Copy, Debug)]
pub struct PageTrailer {
    page_type: PageType,
    signature: u16,
    block_id: u64,
    crc: u32,
}

impl PageTrailer {
    pub fn size(version: PstVersion) -> usize {
        match version {
            PstVersion::Ansi => ANSI_PAGE_TRAILER_SIZE,
            PstVersion::Unicode => UNICODE_PAGE_TRAILER_SIZE,
        }
    }

    pub fn read(f: &mut dyn Read, version: PstVersion) -> NdbResult<Self> {
        let ptype = f.read_u8()?;
        let repeat = f.read_u8()?;
        if ptype != repeat {
            return Err(NdbError::PageTypeRepeatMismatch { ptype, repeat });
        }
        let page_type = PageType::try_from(ptype)?;
        let signature = f.read_u16::<LittleEndian>()?;

        let (block_id, crc) = match version {
            PstVersion::Ansi => {
                let block_id = u64::from(f.read_u32::<LittleEndian>()?);
                let crc = f.read_u32::<LittleEndian>()?;
                (block_id, crc)
            }
            PstVersion::Unicode => {
                let crc = f.read_u32::<LittleEndian>()?;
                let block_id = f.read_u64::<LittleEndian>()?;
                (block_id, crc)
            }
        };

        Ok(Self {
            page_type,
            signature,
            block_id,
            crc,
        })
    }

    pub fn page_type(&self) -> PageType {
        self.page_type
    }

    pub fn signature(&self) -> u16 {
        self.signature
    }

    pub fn block_id(&self) -> u64 {
        self.block_id
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }
}

/// [BTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/bc8052a3-f300-4022-be31-f0f408fffca0):
/// an intermediate entry pointing at a child page.
#[derive(Clone, Copy, Debug)]
pub struct BTreeEntry {
    key: u64,
    block: BlockRef,
}

impl BTreeEntry {
    fn read(f: &mut dyn Read, version: PstVersion) -> NdbResult<Self> {
        let key = match version {
            PstVersion::Ansi => u64::from(f.read_u32::<LittleEndian>()?),
            PstVersion::Unicode => f.read_u64::<LittleEndian>()?,
        };
        let block = BlockRef::read(f, version)?;
        Ok(Self { key, block })
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn block(&self) -> BlockRef {
        self.block
    }
}

/// [NBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd):
/// a leaf mapping of a node onto its data and sub-node blocks.
#[derive(Clone, Copy, Debug)]
pub struct NodeBTreeEntry {
    node: NodeId,
    data: BlockId,
    sub_node: BlockId,
    parent: NodeId,
}

impl NodeBTreeEntry {
    fn read(f: &mut dyn Read, version: PstVersion) -> NdbResult<Self> {
        let node = NodeId::read(f)?;
        if version == PstVersion::Unicode {
            let _ = f.read_u32::<LittleEndian>()?;
        }
        let data = BlockId::read(f, version)?;
        let sub_node = BlockId::read(f, version)?;
        let parent = NodeId::read(f)?;
        Ok(Self {
            node,
            data,
            sub_node,
            parent,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn data(&self) -> BlockId {
        self.data
    }

    pub fn sub_node(&self) -> BlockId {
        self.sub_node
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }
}

/// [BBTENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/53a4b926-8ac4-45c9-9c6d-8358d951dbcd):
/// a leaf mapping of a block onto its file offset and byte count.
#[derive(Clone, Copy, Debug)]
pub struct BlockBTreeEntry {
    block: BlockRef,
    size: u16,
    ref_count: u16,
}

impl BlockBTreeEntry {
    fn read(f: &mut dyn Read, version: PstVersion) -> NdbResult<Self> {
        let block = BlockRef::read(f, version)?;
        let size = f.read_u16::<LittleEndian>()?;
        let ref_count = f.read_u16::<LittleEndian>()?;
        Ok(Self {
            block,
            size,
            ref_count,
        })
    }

    pub fn block(&self) -> BlockRef {
        self.block
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn ref_count(&self) -> u16 {
        self.ref_count
    }
}

/// The heterogeneous entry list of one B-tree page.
#[derive(Clone, Debug)]
pub enum PageEntries {
    Intermediate(Vec<BTreeEntry>),
    Node(Vec<NodeBTreeEntry>),
    Block(Vec<BlockBTreeEntry>),
}

/// A single NBT or BBT page: `rgEntries`, the B-tree metadata, and the
/// trailer.
#[derive(Clone, Debug)]
pub struct BTreePage {
    level: u8,
    entries: PageEntries,
    trailer: PageTrailer,
}

impl BTreePage {
    /// Parse a raw 512-byte page as `expected` (NBT or BBT). Entries are laid
    /// out from offset 0 with a stride of `cbEnt`, which may exceed the entry
    /// size.
    pub fn parse(
        buffer: &[u8],
        expected: PageType,
        version: PstVersion,
        verify_crc: bool,
    ) -> NdbResult<Self> {
        if buffer.len() != PAGE_SIZE {
            return Err(NdbError::InvalidPageSize(buffer.len()));
        }

        let trailer_size = PageTrailer::size(version);
        let trailer =
            PageTrailer::read(&mut Cursor::new(&buffer[PAGE_SIZE - trailer_size..]), version)?;

        if trailer.page_type() != expected {
            return Err(NdbError::UnexpectedPageType {
                expected,
                actual: trailer.page_type(),
            });
        }

        if verify_crc {
            let computed = compute_crc(0, &buffer[..PAGE_SIZE - trailer_size]);
            if computed != trailer.crc() {
                return Err(NdbError::PageCrcMismatch {
                    stored: trailer.crc(),
                    computed,
                });
            }
        }

        let metadata_offset = match version {
            PstVersion::Ansi => PAGE_SIZE - trailer_size - 4,
            PstVersion::Unicode => PAGE_SIZE - trailer_size - 8,
        };
        let mut metadata = Cursor::new(&buffer[metadata_offset..]);
        let entry_count = usize::from(metadata.read_u8()?);
        let _max_entries = metadata.read_u8()?;
        let entry_stride = usize::from(metadata.read_u8()?);
        let level = metadata.read_u8()?;

        let base_size = match version {
            PstVersion::Ansi => 12,
            PstVersion::Unicode => 24,
        };
        let entry_size = if level == 0 && expected == PageType::NodeBTree {
            base_size + base_size / 3
        } else {
            base_size
        };

        if entry_count > 0
            && (entry_stride < entry_size
                || (entry_count - 1) * entry_stride + entry_size > metadata_offset)
        {
            return Err(NdbError::InvalidPageSize(entry_count * entry_stride));
        }

        let slices: Vec<&[u8]> = (0..entry_count)
            .map(|index| {
                let start = index * entry_stride;
                &buffer[start..start + entry_size]
            })
            .collect();

        let entries = if level > 0 {
            PageEntries::Intermediate(
                slices
                    .into_iter()
                    .map(|slice| BTreeEntry::read(&mut Cursor::new(slice), version))
                    .collect::<NdbResult<_>>()?,
            )
        } else if expected == PageType::NodeBTree {
            PageEntries::Node(
                slices
                    .into_iter()
                    .map(|slice| NodeBTreeEntry::read(&mut Cursor::new(slice), version))
                    .collect::<NdbResult<_>>()?,
            )
        } else {
            PageEntries::Block(
                slices
                    .into_iter()
                    .map(|slice| BlockBTreeEntry::read(&mut Cursor::new(slice), version))
                    .collect::<NdbResult<_>>()?,
            )
        };

        Ok(Self {
            level,
            entries,
            trailer,
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn entries(&self) -> &PageEntries {
        &self.entries
    }

    pub fn trailer(&self) -> &PageTrailer {
        &self.trailer
    }
}

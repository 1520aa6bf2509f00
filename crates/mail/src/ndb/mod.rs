//! ## [Node Database (NDB) Layer](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/e4efaad0-1876-446e-9d34-bb921588f924)
//!
//! The bottom of the PST stack: the header, 512-byte B-tree pages, and
//! trailer-terminated blocks. [`NodeDatabase`] owns the reader for the life
//! of the session and exposes node/block lookup to the LTP layer above it.

use std::{
    collections::BTreeMap,
    io::{self, Read, Seek, SeekFrom},
    sync::Mutex,
};
use thiserror::Error;

use crate::ContainerReader;

pub mod block;
pub mod block_id;
pub mod header;
pub mod node_id;
pub mod page;

use block::*;
use block_id::*;
use header::*;
use node_id::*;
use page::*;

#[derive(Error, Debug)]
pub enum NdbError {
    #[error("I/O error: {0:?}")]
    Io(#[from] io::Error),
    #[error("Failed to lock file")]
    FailedToLockFile,
    #[error("Invalid PST magic")]
    InvalidMagic,
    #[error("Invalid PST wVer: {0}")]
    InvalidVersion(u16),
    #[error("Unsupported bCryptMethod: 0x{0:02X}")]
    UnsupportedCryptMethod(u8),
    #[error("Invalid NID nidType: 0x{0:02X}")]
    InvalidNodeIdType(u8),
    #[error("Invalid NID nidIndex: 0x{0:X}")]
    InvalidNodeIndex(u32),
    #[error("Invalid page ptype: 0x{0:02X}")]
    InvalidPageType(u8),
    #[error("Page ptype 0x{ptype:02X} does not match ptypeRepeat 0x{repeat:02X}")]
    PageTypeRepeatMismatch { ptype: u8, repeat: u8 },
    #[error("Unexpected page ptype: {expected:?} != {actual:?}")]
    UnexpectedPageType {
        expected: PageType,
        actual: PageType,
    },
    #[error("Invalid page size: 0x{0:X}")]
    InvalidPageSize(usize),
    #[error("Page CRC mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    PageCrcMismatch { stored: u32, computed: u32 },
    #[error("Duplicate NBT leaf key: {0:?}")]
    DuplicateNodeEntry(NodeId),
    #[error("Duplicate BBT leaf key: 0x{0:X}")]
    DuplicateBlockEntry(u64),
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("Block not found in BBT: 0x{0:X}")]
    BlockNotFound(u64),
    #[error("Block bid 0x{actual:X} does not match BBT bid 0x{expected:X}")]
    BlockIdMismatch { expected: u64, actual: u64 },
    #[error("BBT entry cb 0x{expected:X} does not match block trailer cb 0x{actual:X}")]
    BlockSizeMismatch { expected: u16, actual: u16 },
    #[error("Block CRC mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    BlockCrcMismatch { stored: u32, computed: u32 },
    #[error("Invalid block btype: 0x{0:02X}")]
    InvalidBlockType(u8),
    #[error("Block storage too small: 0x{0:X} bytes")]
    TruncatedBlock(usize),
    #[error("Block entries overflow cb: 0x{0:X}")]
    BlockEntriesOverflow(usize),
    #[error("Invalid block cLevel: 0x{0:02X} for btype 0x{1:02X}")]
    InvalidBlockLevel(u8, u8),
    #[error("Expected a data block: 0x{0:X}")]
    NotADataBlock(u64),
    #[error("Expected an XBLOCK: 0x{0:X}")]
    NotAnExtendedBlock(u64),
    #[error("Expected a SLBLOCK or SIBLOCK: 0x{0:X}")]
    NotASubNodeBlock(u64),
    #[error("Duplicate sub-node entry: {0:?}")]
    DuplicateSubNodeEntry(NodeId),
}

pub type NdbResult<T> = Result<T, NdbError>;

/// The open PST database: header plus the eagerly collected NBT/BBT leaf
/// maps. Block payloads are fetched and decoded on demand.
pub struct NodeDatabase {
    reader: Mutex<Box<dyn ContainerReader>>,
    header: Header,
    node_entries: BTreeMap<u32, NodeBTreeEntry>,
    block_entries: BTreeMap<u64, BlockBTreeEntry>,
    verify_crc: bool,
}

impl NodeDatabase {
    pub fn read(
        reader: Box<dyn ContainerReader>,
        header: Header,
        verify_crc: bool,
    ) -> NdbResult<Self> {
        let mut database = Self {
            reader: Mutex::new(reader),
            header,
            node_entries: BTreeMap::new(),
            block_entries: BTreeMap::new(),
            verify_crc,
        };

        {
            let mut reader = database.reader.lock().map_err(|_| NdbError::FailedToLockFile)?;
            let reader = &mut **reader;

            let node_root = database.header.root().node_btree().index();
            let mut node_entries = BTreeMap::new();
            Self::collect_leaf_entries(
                reader,
                &database.header,
                database.verify_crc,
                PageType::NodeBTree,
                node_root,
                &mut node_entries,
                &mut BTreeMap::new(),
            )?;

            let block_root = database.header.root().block_btree().index();
            let mut block_entries = BTreeMap::new();
            Self::collect_leaf_entries(
                reader,
                &database.header,
                database.verify_crc,
                PageType::BlockBTree,
                block_root,
                &mut BTreeMap::new(),
                &mut block_entries,
            )?;

            database.node_entries = node_entries;
            database.block_entries = block_entries;
        }

        Ok(database)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn node_entries(&self) -> &BTreeMap<u32, NodeBTreeEntry> {
        &self.node_entries
    }

    pub fn block_entries(&self) -> &BTreeMap<u64, BlockBTreeEntry> {
        &self.block_entries
    }

    pub fn lookup_node(&self, node: NodeId) -> NdbResult<&NodeBTreeEntry> {
        self.node_entries
            .get(&u32::from(node))
            .ok_or(NdbError::NodeNotFound(node))
    }

    /// Recursive descent over a root B-tree: intermediate `BTENTRY` pages
    /// recurse into their child page, leaf pages land in the maps with
    /// duplicate keys fatal.
    #[allow(clippy::too_many_arguments)]
    fn collect_leaf_entries<R: Read + Seek + ?Sized>(
        reader: &mut R,
        header: &Header,
        verify_crc: bool,
        expected: PageType,
        page_offset: u64,
        node_entries: &mut BTreeMap<u32, NodeBTreeEntry>,
        block_entries: &mut BTreeMap<u64, BlockBTreeEntry>,
    ) -> NdbResult<()> {
        let page = Self::fetch_page_at(reader, header, verify_crc, expected, page_offset)?;

        match page.entries() {
            PageEntries::Intermediate(entries) => {
                for entry in entries {
                    Self::collect_leaf_entries(
                        reader,
                        header,
                        verify_crc,
                        expected,
                        entry.block().index(),
                        node_entries,
                        block_entries,
                    )?;
                }
            }
            PageEntries::Node(entries) => {
                for entry in entries {
                    let key = u32::from(entry.node());
                    if node_entries.insert(key, *entry).is_some() {
                        return Err(NdbError::DuplicateNodeEntry(entry.node()));
                    }
                }
            }
            PageEntries::Block(entries) => {
                for entry in entries {
                    let key = entry.block().block().raw();
                    if block_entries.insert(key, *entry).is_some() {
                        return Err(NdbError::DuplicateBlockEntry(key));
                    }
                }
            }
        }

        Ok(())
    }

    fn fetch_page_at<R: Read + Seek + ?Sized>(
        reader: &mut R,
        header: &Header,
        verify_crc: bool,
        expected: PageType,
        offset: u64,
    ) -> NdbResult<BTreePage> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut buffer = [0_u8; PAGE_SIZE];
        reader.read_exact(&mut buffer)?;
        BTreePage::parse(&buffer, expected, header.version(), verify_crc)
    }

    /// Look up a BID in the BBT and fetch the block it references, validating
    /// the trailer against the BBT entry.
    pub fn fetch_block(&self, block: BlockId) -> NdbResult<Block> {
        let entry = self
            .block_entries
            .get(&block.raw())
            .ok_or(NdbError::BlockNotFound(block.raw()))?;

        let data_size = usize::from(entry.size());
        let storage_size = block_storage_size(data_size, self.header.version());

        let mut buffer = vec![0_u8; storage_size];
        {
            let mut reader = self.reader.lock().map_err(|_| NdbError::FailedToLockFile)?;
            let reader = &mut **reader;
            reader.seek(SeekFrom::Start(entry.block().index()))?;
            reader.read_exact(&mut buffer)?;
        }

        Block::parse(
            &buffer,
            data_size,
            block,
            self.header.version(),
            self.header.crypt_method(),
            self.verify_crc,
        )
    }

    /// Concatenate the data-block payloads reached from `block`, unwrapping
    /// one or two levels of XBLOCK/XXBLOCK indirection.
    pub fn fetch_all_block_data(&self, block: BlockId) -> NdbResult<Vec<Vec<u8>>> {
        let mut sections = Vec::new();
        match self.fetch_block(block)? {
            Block::Data(data) => sections.push(data),
            Block::Extended(extended) => match extended.level() {
                ExtendedBlockLevel::External => {
                    for &data_block in extended.blocks() {
                        match self.fetch_block(data_block)? {
                            Block::Data(data) => sections.push(data),
                            _ => return Err(NdbError::NotADataBlock(data_block.raw())),
                        }
                    }
                }
                ExtendedBlockLevel::DoublyExtended => {
                    for &extended_block in extended.blocks() {
                        match self.fetch_block(extended_block)? {
                            Block::Extended(inner)
                                if inner.level() == ExtendedBlockLevel::External =>
                            {
                                sections.append(&mut self.fetch_all_block_data(extended_block)?);
                            }
                            _ => return Err(NdbError::NotAnExtendedBlock(extended_block.raw())),
                        }
                    }
                }
            },
            _ => return Err(NdbError::NotADataBlock(block.raw())),
        }
        Ok(sections)
    }

    /// Merge the SLBLOCK leaves reached from `block` (recursing through
    /// SIBLOCK intermediates) into a `nid -> entry` map.
    pub fn fetch_sub_nodes(&self, block: BlockId) -> NdbResult<BTreeMap<u32, SubNodeLeafEntry>> {
        let mut sub_nodes = BTreeMap::new();
        self.fetch_sub_nodes_into(block, &mut sub_nodes)?;
        Ok(sub_nodes)
    }

    fn fetch_sub_nodes_into(
        &self,
        block: BlockId,
        sub_nodes: &mut BTreeMap<u32, SubNodeLeafEntry>,
    ) -> NdbResult<()> {
        match self.fetch_block(block)? {
            Block::SubNodeLeaf(entries) => {
                for entry in entries {
                    let key = u32::from(entry.node());
                    if sub_nodes.insert(key, entry).is_some() {
                        return Err(NdbError::DuplicateSubNodeEntry(entry.node()));
                    }
                }
            }
            Block::SubNodeIntermediate(entries) => {
                for entry in entries {
                    self.fetch_sub_nodes_into(entry.block(), sub_nodes)?;
                }
            }
            _ => return Err(NdbError::NotASubNodeBlock(block.raw())),
        }
        Ok(())
    }
}

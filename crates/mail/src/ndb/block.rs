//! [Blocks](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/a9c1981d-d1ea-457c-b39e-dc7fb0eb95d4)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use super::{block_id::*, header::*, node_id::*, NdbError, NdbResult};
use crate::{crc::compute_crc, encode};

const ANSI_BLOCK_TRAILER_SIZE: usize = 12;
const UNICODE_BLOCK_TRAILER_SIZE: usize = 16;

/// Blocks are stored 64-byte aligned: `cb` data bytes, padding, then the
/// trailer flush against the end.
pub fn block_storage_size(data_size: usize, version: PstVersion) -> usize {
    (data_size + BlockTrailer::size(version)).div_ceil(64) * 64
}

/// [BLOCKTRAILER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/a14943ef-70c2-403f-898c-5bc3747117e1)
#[derive(Clone, Copy, Debug)]
pub struct BlockTrailer {
    size: u16,
    signature: u16,
    crc: u32,
    block_id: u64,
}

impl BlockTrailer {
    pub fn size(version: PstVersion) -> usize {
        match version {
            PstVersion::Ansi => ANSI_BLOCK_TRAILER_SIZE,
            PstVersion::Unicode => UNICODE_BLOCK_TRAILER_SIZE,
        }
    }

    pub fn read(f: &mut dyn Read, version: PstVersion) -> NdbResult<Self> {
        let size = f.read_u16::<LittleEndian>()?;
        let signature = f.read_u16::<LittleEndian>()?;
        let (crc, block_id) = match version {
            PstVersion::Ansi => {
                let block_id = u64::from(f.read_u32::<LittleEndian>()?);
                let crc = f.read_u32::<LittleEndian>()?;
                (crc, block_id)
            }
            PstVersion::Unicode => {
                let crc = f.read_u32::<LittleEndian>()?;
                let block_id = f.read_u64::<LittleEndian>()?;
                (crc, block_id)
            }
        };

        Ok(Self {
            size,
            signature,
            crc,
            block_id,
        })
    }

    pub fn data_size(&self) -> u16 {
        self.size
    }

    pub fn signature(&self) -> u16 {
        self.signature
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn block_id(&self) -> u64 {
        self.block_id
    }
}

/// `cLevel` of an XBLOCK/XXBLOCK: one or two levels of BID indirection.
/// Deeper nesting is undefined by the format.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExtendedBlockLevel {
    /// XBLOCK: the listed BIDs are data blocks
    External,
    /// XXBLOCK: the listed BIDs are XBLOCKs
    DoublyExtended,
}

/// [XBLOCK / XXBLOCK](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5b7a6935-e83d-4917-9f62-6ce3707f09e0)
#[derive(Clone, Debug)]
pub struct ExtendedBlock {
    level: ExtendedBlockLevel,
    total_size: u32,
    blocks: Vec<BlockId>,
}

impl ExtendedBlock {
    pub fn level(&self) -> ExtendedBlockLevel {
        self.level
    }

    /// `lcbTotal`: total bytes of all reachable data blocks.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }
}

/// [SLENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/85c4d943-0779-43c5-bd98-61dc9bb5dfd6)
#[derive(Clone, Copy, Debug)]
pub struct SubNodeLeafEntry {
    node: NodeId,
    data: BlockId,
    sub_node: BlockId,
}

impl SubNodeLeafEntry {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn data(&self) -> BlockId {
        self.data
    }

    pub fn sub_node(&self) -> BlockId {
        self.sub_node
    }
}

/// [SIENTRY](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/9e79c673-d2f4-49fb-a00b-51b08fd2d1e4)
#[derive(Clone, Copy, Debug)]
pub struct SubNodeIntermediateEntry {
    node: NodeId,
    block: BlockId,
}

impl SubNodeIntermediateEntry {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn block(&self) -> BlockId {
        self.block
    }
}

/// One decoded block. External blocks carry payload bytes; internal blocks
/// are one of the four `(btype, cLevel)` shapes.
#[derive(Clone, Debug)]
pub enum Block {
    Data(Vec<u8>),
    Extended(ExtendedBlock),
    SubNodeLeaf(Vec<SubNodeLeafEntry>),
    SubNodeIntermediate(Vec<SubNodeIntermediateEntry>),
}

impl Block {
    /// Parse an aligned block storage buffer. The trailer's `bid` must match
    /// the BBT entry it was reached through and its `cb` must match the BBT
    /// entry's `cb`; both mismatches are fatal.
    pub fn parse(
        buffer: &[u8],
        data_size: usize,
        expected: BlockId,
        version: PstVersion,
        crypt_method: CryptMethod,
        verify_crc: bool,
    ) -> NdbResult<Self> {
        let trailer_size = BlockTrailer::size(version);
        if buffer.len() < data_size + trailer_size {
            return Err(NdbError::TruncatedBlock(buffer.len()));
        }

        let trailer = BlockTrailer::read(
            &mut Cursor::new(&buffer[buffer.len() - trailer_size..]),
            version,
        )?;

        if trailer.block_id() != expected.raw() {
            return Err(NdbError::BlockIdMismatch {
                expected: expected.raw(),
                actual: trailer.block_id(),
            });
        }
        if usize::from(trailer.data_size()) != data_size {
            return Err(NdbError::BlockSizeMismatch {
                expected: data_size as u16,
                actual: trailer.data_size(),
            });
        }
        if verify_crc {
            let computed = compute_crc(0, &buffer[..data_size]);
            if computed != trailer.crc() {
                return Err(NdbError::BlockCrcMismatch {
                    stored: trailer.crc(),
                    computed,
                });
            }
        }

        if !expected.is_internal() {
            let mut data = buffer[..data_size].to_vec();
            if crypt_method == CryptMethod::Permute {
                encode::decode_block(&mut data);
            }
            return Ok(Self::Data(data));
        }

        let data = &buffer[..data_size];
        let mut cursor = Cursor::new(data);
        let block_type = cursor.read_u8()?;
        let level = cursor.read_u8()?;
        let entry_count = usize::from(cursor.read_u16::<LittleEndian>()?);

        match block_type {
            0x01 => {
                let total_size = cursor.read_u32::<LittleEndian>()?;
                let level = match level {
                    1 => ExtendedBlockLevel::External,
                    2 => ExtendedBlockLevel::DoublyExtended,
                    _ => return Err(NdbError::InvalidBlockLevel(level, block_type)),
                };

                let block_id_size = match version {
                    PstVersion::Ansi => 4,
                    PstVersion::Unicode => 8,
                };
                if 8 + entry_count * block_id_size > data_size {
                    return Err(NdbError::BlockEntriesOverflow(entry_count));
                }

                let mut cursor = Cursor::new(&data[8..]);
                let blocks = (0..entry_count)
                    .map(|_| BlockId::read(&mut cursor, version))
                    .collect::<Result<_, _>>()?;

                Ok(Self::Extended(ExtendedBlock {
                    level,
                    total_size,
                    blocks,
                }))
            }
            0x02 => {
                // ANSI SLBLOCKs and SIBLOCKs are not padded to 8 bytes before
                // the first entry, contrary to the published layout.
                let entries_offset = match version {
                    PstVersion::Ansi => 4,
                    PstVersion::Unicode => 8,
                };

                match level {
                    0 => {
                        let entry_size = match version {
                            PstVersion::Ansi => 12,
                            PstVersion::Unicode => 24,
                        };
                        if entries_offset + entry_count * entry_size > data_size {
                            return Err(NdbError::BlockEntriesOverflow(entry_count));
                        }

                        let mut cursor = Cursor::new(&data[entries_offset..]);
                        let entries = (0..entry_count)
                            .map(|_| {
                                let node = NodeId::read(&mut cursor)?;
                                if version == PstVersion::Unicode {
                                    let _ = cursor.read_u32::<LittleEndian>()?;
                                }
                                let data = BlockId::read(&mut cursor, version)?;
                                let sub_node = BlockId::read(&mut cursor, version)?;
                                Ok(SubNodeLeafEntry {
                                    node,
                                    data,
                                    sub_node,
                                })
                            })
                            .collect::<NdbResult<_>>()?;
                        Ok(Self::SubNodeLeaf(entries))
                    }
                    1 => {
                        let entry_size = match version {
                            PstVersion::Ansi => 8,
                            PstVersion::Unicode => 16,
                        };
                        if entries_offset + entry_count * entry_size > data_size {
                            return Err(NdbError::BlockEntriesOverflow(entry_count));
                        }

                        let mut cursor = Cursor::new(&data[entries_offset..]);
                        let entries = (0..entry_count)
                            .map(|_| {
                                let node = NodeId::read(&mut cursor)?;
                                if version == PstVersion::Unicode {
                                    let _ = cursor.read_u32::<LittleEndian>()?;
                                }
                                let block = BlockId::read(&mut cursor, version)?;
                                Ok(SubNodeIntermediateEntry { node, block })
                            })
                            .collect::<NdbResult<_>>()?;
                        Ok(Self::SubNodeIntermediate(entries))
                    }
                    _ => Err(NdbError::InvalidBlockLevel(level, block_type)),
                }
            }
            _ => Err(NdbError::InvalidBlockType(block_type)),
        }
    }
}

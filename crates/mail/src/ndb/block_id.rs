//! [BID (Block ID)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/d3155aa1-ccdd-4dee-a0a9-5363ccca5352)
//! and [BREF](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/844a5ebf-488a-45fd-8fce-92a84d8e24a3)

use byteorder::{LittleEndian, ReadBytesExt};
use std::{
    fmt::Debug,
    io::{self, Read},
};

use super::header::PstVersion;

/// A block id, 32 bits on ANSI files and 64 bits on Unicode files; ANSI
/// values are zero-extended. Bit 0 is reserved and cleared on read so ids
/// compare equal to BBT keys; bit 1 distinguishes internal (extended or
/// sub-node) blocks from external data blocks.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    pub fn read(f: &mut dyn Read, version: PstVersion) -> io::Result<Self> {
        let raw = match version {
            PstVersion::Ansi => u64::from(f.read_u32::<LittleEndian>()?),
            PstVersion::Unicode => f.read_u64::<LittleEndian>()?,
        };
        Ok(Self(raw & !1))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_internal(&self) -> bool {
        self.0 & 0x2 == 0x2
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BlockId {{ 0x{:X}: {} }}",
            self.0,
            if self.is_internal() {
                "internal"
            } else {
                "external"
            }
        )
    }
}

impl From<u64> for BlockId {
    fn from(value: u64) -> Self {
        Self(value & !1)
    }
}

/// `BREF`: a [`BlockId`] together with its absolute file byte offset `ib`.
#[derive(Clone, Copy, Default, Debug)]
pub struct BlockRef {
    block: BlockId,
    index: u64,
}

impl BlockRef {
    pub fn read(f: &mut dyn Read, version: PstVersion) -> io::Result<Self> {
        let block = BlockId::read(f, version)?;
        let index = match version {
            PstVersion::Ansi => u64::from(f.read_u32::<LittleEndian>()?),
            PstVersion::Unicode => f.read_u64::<LittleEndian>()?,
        };
        Ok(Self { block, index })
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn index(&self) -> u64 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reserved_bit_cleared() {
        let block = BlockId::from(0x125);
        assert_eq!(block.raw(), 0x124);
        assert!(!block.is_internal());
    }

    #[test]
    fn test_internal_flag() {
        assert!(BlockId::from(0x6).is_internal());
        assert!(!BlockId::from(0x4).is_internal());
    }

    #[test]
    fn test_ansi_read_widens() {
        let mut cursor = Cursor::new(0x8004_u32.to_le_bytes());
        let block = BlockId::read(&mut cursor, PstVersion::Ansi).unwrap();
        assert_eq!(block.raw(), 0x8004);
    }

    #[test]
    fn test_bref_read() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x1C_u64.to_le_bytes());
        payload.extend_from_slice(&0x4400_u64.to_le_bytes());
        let mut cursor = Cursor::new(payload);

        let bref = BlockRef::read(&mut cursor, PstVersion::Unicode).unwrap();
        assert_eq!(bref.block().raw(), 0x1C);
        assert_eq!(bref.index(), 0x4400);
    }
}

//! [HEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/c9876f5a-664b-46a3-9887-ba63f113abf5)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use super::{block_id::*, NdbError, NdbResult};

/// `dwMagic` / `wMagicClient`
const HEADER_MAGIC: [u8; 4] = *b"!BDN";
const HEADER_MAGIC_CLIENT: [u8; 2] = *b"SM";

/// `wVer`: ANSI files are version 14 or 15, Unicode files version 23.
#[repr(u16)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum PstVersion {
    Ansi = 15,
    #[default]
    Unicode = 23,
}

impl TryFrom<u16> for PstVersion {
    type Error = NdbError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            14..=15 => Ok(PstVersion::Ansi),
            23 => Ok(PstVersion::Unicode),
            _ => Err(NdbError::InvalidVersion(value)),
        }
    }
}

impl PstVersion {
    pub fn is_ansi(&self) -> bool {
        *self == PstVersion::Ansi
    }
}

/// `bCryptMethod`: how external data-block payloads are obfuscated. Anything
/// beyond the permutation encoding is unsupported and fails at open.
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Default, Debug)]
pub enum CryptMethod {
    /// `NDB_CRYPT_NONE`: data blocks are stored as-is
    #[default]
    None = 0x00,
    /// `NDB_CRYPT_PERMUTE`: byte substitution through the fixed table in
    /// [crate::encode]
    Permute = 0x01,
}

impl TryFrom<u8> for CryptMethod {
    type Error = NdbError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CryptMethod::None),
            0x01 => Ok(CryptMethod::Permute),
            _ => Err(NdbError::UnsupportedCryptMethod(value)),
        }
    }
}

/// [ROOT](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/32ce8c94-4757-46c8-a169-3fd21abee584):
/// file extents and the two root B-tree references.
#[derive(Clone, Copy, Debug)]
pub struct Root {
    file_eof: u64,
    amap_last: u64,
    amap_free: u64,
    pmap_free: u64,
    node_btree: BlockRef,
    block_btree: BlockRef,
    amap_valid: u8,
}

impl Root {
    pub fn read(f: &mut dyn Read, version: PstVersion) -> NdbResult<Self> {
        // dwReserved
        let _ = f.read_u32::<LittleEndian>()?;

        let mut read_index = || -> NdbResult<u64> {
            Ok(match version {
                PstVersion::Ansi => u64::from(f.read_u32::<LittleEndian>()?),
                PstVersion::Unicode => f.read_u64::<LittleEndian>()?,
            })
        };

        let file_eof = read_index()?;
        let amap_last = read_index()?;
        let amap_free = read_index()?;
        let pmap_free = read_index()?;

        let node_btree = BlockRef::read(f, version)?;
        let block_btree = BlockRef::read(f, version)?;
        let amap_valid = f.read_u8()?;

        // bReserved, wReserved
        let mut reserved = [0_u8; 3];
        f.read_exact(&mut reserved)?;

        Ok(Self {
            file_eof,
            amap_last,
            amap_free,
            pmap_free,
            node_btree,
            block_btree,
            amap_valid,
        })
    }

    pub fn file_eof(&self) -> u64 {
        self.file_eof
    }

    pub fn amap_last(&self) -> u64 {
        self.amap_last
    }

    pub fn amap_free(&self) -> u64 {
        self.amap_free
    }

    pub fn pmap_free(&self) -> u64 {
        self.pmap_free
    }

    pub fn node_btree(&self) -> BlockRef {
        self.node_btree
    }

    pub fn block_btree(&self) -> BlockRef {
        self.block_btree
    }

    pub fn amap_valid(&self) -> u8 {
        self.amap_valid
    }
}

/// The fixed header at offset 0. Only the fields a read-only session needs
/// are retained: version, crypt method, and the root structure.
#[derive(Clone, Debug)]
pub struct Header {
    version: PstVersion,
    crypt_method: CryptMethod,
    root: Root,
}

impl Header {
    /// Parse the header from the start of the file. A bad magic or an
    /// unknown version marks the whole container invalid; an unknown crypt
    /// method is unsupported. Both are distinct error values so callers can
    /// skip such files.
    pub fn read(f: &mut dyn Read) -> NdbResult<Self> {
        let mut magic = [0_u8; 4];
        f.read_exact(&mut magic)?;
        if magic != HEADER_MAGIC {
            return Err(NdbError::InvalidMagic);
        }

        // dwCRCPartial
        let _ = f.read_u32::<LittleEndian>()?;

        let mut magic_client = [0_u8; 2];
        f.read_exact(&mut magic_client)?;
        if magic_client != HEADER_MAGIC_CLIENT {
            return Err(NdbError::InvalidMagic);
        }

        let version = PstVersion::try_from(f.read_u16::<LittleEndian>()?)?;

        // wVerClient, bPlatformCreate, bPlatformAccess, dwReserved1, dwReserved2
        let mut skipped = [0_u8; 12];
        f.read_exact(&mut skipped)?;

        let root;
        let crypt_method;
        match version {
            PstVersion::Ansi => {
                // bidNextB, bidNextP, dwUnique
                let mut skipped = [0_u8; 12];
                f.read_exact(&mut skipped)?;
                // rgnid
                let mut nids = [0_u8; 128];
                f.read_exact(&mut nids)?;

                root = Root::read(f, version)?;

                // rgbFM, rgbFP
                let mut free_maps = [0_u8; 256];
                f.read_exact(&mut free_maps)?;

                // bSentinel
                let _ = f.read_u8()?;
                crypt_method = CryptMethod::try_from(f.read_u8()?)?;
            }
            PstVersion::Unicode => {
                // bidUnused, bidNextP, dwUnique
                let mut skipped = [0_u8; 20];
                f.read_exact(&mut skipped)?;
                // rgnid
                let mut nids = [0_u8; 128];
                f.read_exact(&mut nids)?;
                // qwUnused
                let mut unused = [0_u8; 8];
                f.read_exact(&mut unused)?;

                root = Root::read(f, version)?;

                // dwAlign
                let _ = f.read_u32::<LittleEndian>()?;
                // rgbFM, rgbFP
                let mut free_maps = [0_u8; 256];
                f.read_exact(&mut free_maps)?;

                // bSentinel
                let _ = f.read_u8()?;
                crypt_method = CryptMethod::try_from(f.read_u8()?)?;
            }
        }

        Ok(Self {
            version,
            crypt_method,
            root,
        })
    }

    pub fn version(&self) -> PstVersion {
        self.version
    }

    pub fn crypt_method(&self) -> CryptMethod {
        self.crypt_method
    }

    pub fn root(&self) -> &Root {
        &self.root
    }
}

//! [Compound File Header](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/05060311-bfce-4b12-874d-71fd4ce63aea)

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use super::{fat::ENDOFCHAIN, CfbError, CfbResult};

const HEADER_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// The 512-byte structure at offset 0, including the first 109 DIFAT
/// entries. Sector N begins at byte `(N + 1) * SectorSize`.
#[derive(Clone, Debug)]
pub struct CfbHeader {
    minor_version: u16,
    major_version: u16,
    byte_order: u16,
    sector_shift: u16,
    mini_sector_shift: u16,
    directory_sectors: u32,
    fat_sectors: u32,
    first_directory_sector: u32,
    transaction_signature: u32,
    mini_stream_cutoff: u32,
    first_mini_fat_sector: u32,
    mini_fat_sectors: u32,
    first_difat_sector: u32,
    difat_sectors: u32,
    difat: [u32; 109],
}

impl CfbHeader {
    /// Parse the header. A bad signature or an unknown major version marks
    /// the file as not-a-compound-file so callers can skip it. A populated
    /// `FirstDIFATSectorLocation` is a documented limitation: files with
    /// more than 109 DIFAT entries are not supported.
    pub fn read(f: &mut dyn Read) -> CfbResult<Self> {
        let mut signature = [0_u8; 8];
        f.read_exact(&mut signature)?;
        if signature != HEADER_SIGNATURE {
            return Err(CfbError::InvalidSignature);
        }

        let mut clsid = [0_u8; 16];
        f.read_exact(&mut clsid)?;

        let minor_version = f.read_u16::<LittleEndian>()?;
        let major_version = f.read_u16::<LittleEndian>()?;
        if !matches!(major_version, 3 | 4) {
            return Err(CfbError::UnsupportedVersion(major_version));
        }

        let byte_order = f.read_u16::<LittleEndian>()?;
        let sector_shift = f.read_u16::<LittleEndian>()?;
        let mini_sector_shift = f.read_u16::<LittleEndian>()?;

        let mut reserved = [0_u8; 6];
        f.read_exact(&mut reserved)?;

        let directory_sectors = f.read_u32::<LittleEndian>()?;
        let fat_sectors = f.read_u32::<LittleEndian>()?;
        let first_directory_sector = f.read_u32::<LittleEndian>()?;
        let transaction_signature = f.read_u32::<LittleEndian>()?;
        let mini_stream_cutoff = f.read_u32::<LittleEndian>()?;
        let first_mini_fat_sector = f.read_u32::<LittleEndian>()?;
        let mini_fat_sectors = f.read_u32::<LittleEndian>()?;
        let first_difat_sector = f.read_u32::<LittleEndian>()?;
        let difat_sectors = f.read_u32::<LittleEndian>()?;

        let mut difat = [0_u32; 109];
        for entry in difat.iter_mut() {
            *entry = f.read_u32::<LittleEndian>()?;
        }

        if first_difat_sector != ENDOFCHAIN {
            return Err(CfbError::UnsupportedDifat);
        }

        Ok(Self {
            minor_version,
            major_version,
            byte_order,
            sector_shift,
            mini_sector_shift,
            directory_sectors,
            fat_sectors,
            first_directory_sector,
            transaction_signature,
            mini_stream_cutoff,
            first_mini_fat_sector,
            mini_fat_sectors,
            first_difat_sector,
            difat_sectors,
            difat,
        })
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn byte_order(&self) -> u16 {
        self.byte_order
    }

    pub fn sector_shift(&self) -> u16 {
        self.sector_shift
    }

    pub fn mini_sector_shift(&self) -> u16 {
        self.mini_sector_shift
    }

    /// 512 bytes for major version 3, 4096 for major version 4.
    pub fn sector_size(&self) -> usize {
        match self.major_version {
            3 => 512,
            _ => 4096,
        }
    }

    pub fn sector_offset(&self, sector: u32) -> u64 {
        (u64::from(sector) + 1) * self.sector_size() as u64
    }

    pub fn directory_sectors(&self) -> u32 {
        self.directory_sectors
    }

    pub fn fat_sectors(&self) -> u32 {
        self.fat_sectors
    }

    pub fn first_directory_sector(&self) -> u32 {
        self.first_directory_sector
    }

    pub fn transaction_signature(&self) -> u32 {
        self.transaction_signature
    }

    /// Streams below this byte count live in the mini stream.
    pub fn mini_stream_cutoff(&self) -> u32 {
        self.mini_stream_cutoff
    }

    pub fn first_mini_fat_sector(&self) -> u32 {
        self.first_mini_fat_sector
    }

    pub fn mini_fat_sectors(&self) -> u32 {
        self.mini_fat_sectors
    }

    pub fn first_difat_sector(&self) -> u32 {
        self.first_difat_sector
    }

    pub fn difat_sectors(&self) -> u32 {
        self.difat_sectors
    }

    pub fn difat(&self) -> &[u32; 109] {
        &self.difat
    }
}

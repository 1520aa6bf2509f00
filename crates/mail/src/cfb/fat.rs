//! [FAT and MiniFAT](https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/30e1013a-a0ff-4404-9ccf-d75d835ff404):
//! sector allocation tables; each entry is the next sector in a chain.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use super::{header::CfbHeader, CfbError, CfbResult};

pub const DIFSECT: u32 = 0xFFFF_FFFC;
pub const FATSECT: u32 = 0xFFFF_FFFD;
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
pub const FREESECT: u32 = 0xFFFF_FFFF;

/// Mini stream sectors are fixed at 64 bytes.
pub const MINI_SECTOR_SIZE: usize = 64;

fn read_sector<R: Read + Seek + ?Sized>(
    reader: &mut R,
    header: &CfbHeader,
    sector: u32,
) -> CfbResult<Vec<u8>> {
    reader.seek(SeekFrom::Start(header.sector_offset(sector)))?;
    let mut buffer = vec![0_u8; header.sector_size()];
    reader.read_exact(&mut buffer)?;
    Ok(buffer)
}

fn next_pointers(sector_bytes: &[u8]) -> Vec<u32> {
    let mut cursor = Cursor::new(sector_bytes);
    let mut entries = Vec::with_capacity(sector_bytes.len() / 4);
    while let Ok(entry) = cursor.read_u32::<LittleEndian>() {
        entries.push(entry);
    }
    entries
}

/// The full allocation table, assembled by walking the header's DIFAT
/// entries until the first `FREESECT`.
pub struct Fat {
    entries: Vec<u32>,
}

impl Fat {
    pub fn read<R: Read + Seek + ?Sized>(
        reader: &mut R,
        header: &CfbHeader,
    ) -> CfbResult<Self> {
        let mut entries = Vec::new();
        for &sector in header.difat().iter().take_while(|&&sector| sector != FREESECT) {
            entries.extend(next_pointers(&read_sector(reader, header, sector)?));
        }
        Ok(Self { entries })
    }

    pub fn next(&self, sector: u32) -> CfbResult<u32> {
        self.entries
            .get(sector as usize)
            .copied()
            .ok_or(CfbError::SectorOutOfBounds(sector))
    }

    /// Follow a chain from `start`, concatenating sector bytes until
    /// `ENDOFCHAIN`, and truncate to `size`. A chain shorter than `size` or
    /// longer than one extra sector is corrupt.
    pub fn stream<R: Read + Seek + ?Sized>(
        &self,
        reader: &mut R,
        header: &CfbHeader,
        start: u32,
        size: u64,
    ) -> CfbResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut sector = start;
        let mut hops = 0_usize;
        while sector != ENDOFCHAIN {
            if hops > self.entries.len() {
                return Err(CfbError::UnterminatedChain);
            }
            hops += 1;

            bytes.extend_from_slice(&read_sector(reader, header, sector)?);
            sector = self.next(sector)?;
        }

        check_stream_size(size, bytes.len(), header.sector_size())?;
        bytes.truncate(size as usize);
        Ok(bytes)
    }
}

/// The secondary allocation table for sub-cutoff streams. Its chains index
/// into the mini stream, which itself is a FAT stream anchored at the root
/// directory entry.
pub struct MiniFat {
    entries: Vec<u32>,
    mini_stream: Vec<u8>,
}

impl MiniFat {
    pub fn read<R: Read + Seek + ?Sized>(
        reader: &mut R,
        header: &CfbHeader,
        fat: &Fat,
    ) -> CfbResult<Self> {
        let mut entries = Vec::new();
        let mut sector = header.first_mini_fat_sector();
        for _ in 0..header.mini_fat_sectors() {
            if sector == ENDOFCHAIN || sector == FREESECT {
                break;
            }
            entries.extend(next_pointers(&read_sector(reader, header, sector)?));
            sector = fat.next(sector)?;
        }

        Ok(Self {
            entries,
            mini_stream: Vec::new(),
        })
    }

    pub(crate) fn set_mini_stream(&mut self, mini_stream: Vec<u8>) {
        self.mini_stream = mini_stream;
    }

    pub fn stream(&self, start: u32, size: u64) -> CfbResult<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut sector = start;
        let mut hops = 0_usize;
        while sector != ENDOFCHAIN {
            if hops > self.entries.len() {
                return Err(CfbError::UnterminatedChain);
            }
            hops += 1;

            let offset = sector as usize * MINI_SECTOR_SIZE;
            let section = self
                .mini_stream
                .get(offset..offset + MINI_SECTOR_SIZE)
                .ok_or(CfbError::SectorOutOfBounds(sector))?;
            bytes.extend_from_slice(section);

            sector = self
                .entries
                .get(sector as usize)
                .copied()
                .ok_or(CfbError::SectorOutOfBounds(sector))?;
        }

        check_stream_size(size, bytes.len(), MINI_SECTOR_SIZE)?;
        bytes.truncate(size as usize);
        Ok(bytes)
    }
}

fn check_stream_size(size: u64, chain: usize, sector_size: usize) -> CfbResult<()> {
    if size > chain as u64 || size + sector_size as u64 <= chain as u64 {
        return Err(CfbError::StreamSizeMismatch { size, chain });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfb::header::tests::build_header;
    use std::io::Cursor;

    fn fat_sector(entries: &[u32]) -> Vec<u8> {
        let mut bytes: Vec<u8> = entries.iter().flat_map(|entry| entry.to_le_bytes()).collect();
        bytes.resize(512, 0xFF);
        bytes
    }

    fn build_file(fat_entries: &[u32], payload_sectors: &[&[u8]]) -> (CfbHeader, Cursor<Vec<u8>>) {
        let header_bytes = build_header(1, &[0]);
        let header = CfbHeader::read(&mut Cursor::new(header_bytes.clone())).unwrap();

        let mut file = header_bytes;
        file.extend_from_slice(&fat_sector(fat_entries));
        for payload in payload_sectors {
            let mut sector = payload.to_vec();
            sector.resize(512, 0);
            file.extend_from_slice(&sector);
        }
        (header, Cursor::new(file))
    }

    #[test]
    fn test_stream_assembly() {
        // sector 0 is the FAT itself; the stream chain is 1 -> 2 -> end
        let (header, mut reader) =
            build_file(&[FATSECT, 2, ENDOFCHAIN], &[b"first sector ", b"second sector"]);
        let fat = Fat::read(&mut reader, &header).unwrap();

        let bytes = fat.stream(&mut reader, &header, 1, 525).unwrap();
        assert_eq!(bytes.len(), 525);
        assert!(bytes.starts_with(b"first sector "));
        assert_eq!(&bytes[512..], b"second sector");
    }

    #[test]
    fn test_stream_size_mismatch() {
        let (header, mut reader) = build_file(&[FATSECT, ENDOFCHAIN], &[b"only sector"]);
        let fat = Fat::read(&mut reader, &header).unwrap();

        // one 512-byte sector cannot back a 600-byte stream
        let Err(CfbError::StreamSizeMismatch { size: 600, chain: 512 }) =
            fat.stream(&mut reader, &header, 1, 600)
        else {
            panic!("short chain should fail");
        };

        // nor a stream more than a sector smaller than the chain
        let Err(CfbError::StreamSizeMismatch { size: 0, chain: 512 }) =
            fat.stream(&mut reader, &header, 1, 0)
        else {
            panic!("oversized chain should fail");
        };
    }

    #[test]
    fn test_cyclic_chain_detected() {
        let (header, mut reader) = build_file(&[FATSECT, 2, 1], &[b"a", b"b"]);
        let fat = Fat::read(&mut reader, &header).unwrap();

        let Err(CfbError::UnterminatedChain) = fat.stream(&mut reader, &header, 1, 512) else {
            panic!("a cyclic chain should be detected");
        };
    }

    #[test]
    fn test_mini_fat_stream() {
        let (header, mut reader) = build_file(&[FATSECT, ENDOFCHAIN], &[]);
        let fat = Fat::read(&mut reader, &header).unwrap();
        let mut mini_fat = MiniFat::read(&mut reader, &header, &fat).unwrap();

        let mut mini_stream = vec![0_u8; 128];
        mini_stream[..5].copy_from_slice(b"hello");
        mini_stream[64..69].copy_from_slice(b"world");
        mini_fat.set_mini_stream(mini_stream);
        mini_fat.entries = vec![1, ENDOFCHAIN];

        let bytes = mini_fat.stream(0, 69).unwrap();
        assert_eq!(&bytes[..5], b"hello");
        assert_eq!(&bytes[64..], b"world");
    }
}

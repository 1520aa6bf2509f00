//! ## [BTH (BTree-on-Heap)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/2dd1a95a-c8b1-4ac5-87d1-10cb8de64053)

use byteorder::{ByteOrder, LittleEndian};

use super::{heap::*, LtpError, LtpResult};

/// [BTHHEADER](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/8e4ae05c-3c24-4103-b7e5-ffef6f244834)
#[derive(Clone, Copy, Debug)]
pub struct HeapTreeHeader {
    key_size: usize,
    entry_size: usize,
    index_levels: u8,
    root: HeapId,
}

impl HeapTreeHeader {
    pub fn read(heap: &HeapNode, heap_id: HeapId) -> LtpResult<Self> {
        let data = heap.find_entry(heap_id)?;
        if data.len() < 8 {
            return Err(LtpError::TruncatedTreeHeader(data.len()));
        }

        if data[0] != HeapClientType::Tree as u8 {
            return Err(LtpError::InvalidHeapTreeType(data[0]));
        }

        let key_size = data[1];
        let entry_size = data[2];
        if key_size == 0 {
            return Err(LtpError::InvalidHeapTreeRecordSize(key_size, entry_size));
        }

        Ok(Self {
            key_size: usize::from(key_size),
            entry_size: usize::from(entry_size),
            index_levels: data[3],
            root: HeapId::from(LittleEndian::read_u32(&data[4..8])),
        })
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn entry_size(&self) -> usize {
        self.entry_size
    }

    pub fn index_levels(&self) -> u8 {
        self.index_levels
    }

    pub fn root(&self) -> HeapId {
        self.root
    }
}

/// One leaf record: `cbKey` key bytes followed by `cbEnt` data bytes.
#[derive(Clone, Debug)]
pub struct HeapTreeRecord {
    key: Vec<u8>,
    data: Vec<u8>,
}

impl HeapTreeRecord {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Collect every leaf record, walking intermediate levels with an explicit
/// working stack. Intermediate records are `(key, hidNextLevel)`; an empty
/// `hidRoot` is an empty tree.
pub fn read_records(heap: &HeapNode, header: &HeapTreeHeader) -> LtpResult<Vec<HeapTreeRecord>> {
    let mut records = Vec::new();
    if header.root().is_empty() {
        return Ok(records);
    }

    let mut working_stack = vec![(header.root(), header.index_levels())];
    while let Some((heap_id, level)) = working_stack.pop() {
        let payload = heap.find_entry(heap_id)?;

        if level == 0 {
            let record_size = header.key_size() + header.entry_size();
            for chunk in payload.chunks_exact(record_size) {
                records.push(HeapTreeRecord {
                    key: chunk[..header.key_size()].to_vec(),
                    data: chunk[header.key_size()..].to_vec(),
                });
            }
        } else {
            let record_size = header.key_size() + 4;
            for chunk in payload.chunks_exact(record_size) {
                let next = HeapId::from(LittleEndian::read_u32(&chunk[header.key_size()..]));
                working_stack.push((next, level - 1));
            }
        }
    }

    Ok(records)
}

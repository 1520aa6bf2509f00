//! ## [TC (Table Context)](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/5e48be0d-a75a-4918-a277-50408ff96740)

use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeMap;

use super::{heap::*, tree, LtpError, LtpResult};
use crate::{
    ndb::{block::BlockTrailer, block::SubNodeLeafEntry, node_id::*, NodeDatabase},
    props::{prop_type::PropertyType, value::PropertyValue},
};

/// `rgib` slots: end offsets of the 4-, 2-, and 1-byte column groups, then
/// the total row width. The cell-existence bitmap sits between the 1-byte
/// group end and the row end.
const TCI_1B: usize = 2;
const TCI_BM: usize = 3;

/// Row matrix blocks are sized against an 8 KiB data block.
const ROW_MATRIX_BLOCK_SIZE: usize = 8192;

/// [TCOLDESC](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/3a2f63cf-bb40-4559-910c-e55ec43d9cbb)
#[derive(Clone, Copy, Debug)]
pub struct ColumnDescriptor {
    type_bits: u16,
    prop_id: u16,
    data_offset: u16,
    data_size: u8,
    existence_bit: u8,
}

impl ColumnDescriptor {
    fn parse(payload: &[u8]) -> Self {
        Self {
            type_bits: LittleEndian::read_u16(&payload[..2]),
            prop_id: LittleEndian::read_u16(&payload[2..4]),
            data_offset: LittleEndian::read_u16(&payload[4..6]),
            data_size: payload[6],
            existence_bit: payload[7],
        }
    }

    pub fn prop_id(&self) -> u16 {
        self.prop_id
    }

    pub fn type_bits(&self) -> u16 {
        self.type_bits
    }

    pub fn existence_bit(&self) -> u8 {
        self.existence_bit
    }
}

/// One row-index record: `dwRowID` (also a NID in hierarchy and contents
/// tables) and the row's position in the matrix.
#[derive(Clone, Copy, Debug)]
pub struct TableRowId {
    row_id: u32,
    row_index: u32,
}

impl TableRowId {
    pub fn row_id(&self) -> u32 {
        self.row_id
    }

    pub fn node(&self) -> NodeId {
        NodeId::from(self.row_id)
    }
}

/// A fully decoded table: the column set, the row index in matrix order,
/// and per-row cell values keyed by property id. Heap pages and the row
/// matrix are dropped once decoding finishes.
pub struct TableContext {
    columns: Vec<ColumnDescriptor>,
    row_index: Vec<TableRowId>,
    rows: BTreeMap<u32, BTreeMap<u16, PropertyValue>>,
}

impl TableContext {
    pub fn read_node(database: &NodeDatabase, node: NodeId) -> LtpResult<Self> {
        let entry = *database.lookup_node(node)?;
        Self::read(database, HeapNode::read_node(database, &entry)?)
    }

    pub fn read_sub_node(database: &NodeDatabase, entry: &SubNodeLeafEntry) -> LtpResult<Self> {
        Self::read(database, HeapNode::read_sub_node(database, entry)?)
    }

    fn read(database: &NodeDatabase, heap: HeapNode) -> LtpResult<Self> {
        if heap.client_type() != HeapClientType::Table {
            return Err(LtpError::NotATableContext(heap.client_type()));
        }

        // TCINFO
        let info = heap.find_entry(heap.user_root())?;
        if info.len() < 22 {
            return Err(LtpError::TruncatedTableInfo(info.len()));
        }
        if info[0] != HeapClientType::Table as u8 {
            return Err(LtpError::InvalidTableType(info[0]));
        }

        let column_count = usize::from(info[1]);
        if info.len() < 22 + column_count * 8 {
            return Err(LtpError::TruncatedTableInfo(info.len()));
        }

        let mut group_offsets = [0_u16; 4];
        for (slot, offset) in group_offsets.iter_mut().enumerate() {
            *offset = LittleEndian::read_u16(&info[2 + slot * 2..]);
        }
        let row_index_id = HeapId::from(LittleEndian::read_u32(&info[10..14]));
        let rows_id = LittleEndian::read_u32(&info[14..18]);

        let mut columns = Vec::with_capacity(column_count);
        for index in 0..column_count {
            let column = ColumnDescriptor::parse(&info[22 + index * 8..22 + (index + 1) * 8]);
            if columns
                .iter()
                .any(|existing: &ColumnDescriptor| existing.prop_id == column.prop_id)
            {
                return Err(LtpError::DuplicateColumn(column.prop_id));
            }
            columns.push(column);
        }

        let row_index = Self::read_row_index(&heap, row_index_id, rows_id)?;
        let rows = Self::read_row_matrix(
            database,
            &heap,
            &columns,
            &group_offsets,
            rows_id,
            &row_index,
        )?;

        Ok(Self {
            columns,
            row_index,
            rows,
        })
    }

    /// The row-index BTH maps `dwRowID` onto `dwRowIndex`; its value width
    /// follows the file version (2 bytes on ANSI, 4 on Unicode).
    fn read_row_index(
        heap: &HeapNode,
        row_index_id: HeapId,
        rows_id: u32,
    ) -> LtpResult<Vec<TableRowId>> {
        let rows_heap_id = HeapId::from(rows_id);
        if rows_heap_id.id_type() == NodeIdType::HeapNode as u8 && rows_heap_id.is_empty() {
            return Ok(Vec::new());
        }

        let header = tree::HeapTreeHeader::read(heap, row_index_id)?;
        if header.key_size() != 4 {
            return Err(LtpError::InvalidRowIndexKeySize(header.key_size() as u8));
        }

        let mut row_index = Vec::new();
        for record in tree::read_records(heap, &header)? {
            let row_id = LittleEndian::read_u32(record.key());
            let index = match record.data().len() {
                2 => u32::from(LittleEndian::read_u16(record.data())),
                4 => LittleEndian::read_u32(record.data()),
                invalid => return Err(LtpError::InvalidRowIndexKeySize(invalid as u8)),
            };
            row_index.push(TableRowId {
                row_id,
                row_index: index,
            });
        }

        row_index.sort_by_key(|entry| entry.row_index);
        Ok(row_index)
    }

    fn read_row_matrix(
        database: &NodeDatabase,
        heap: &HeapNode,
        columns: &[ColumnDescriptor],
        group_offsets: &[u16; 4],
        rows_id: u32,
        row_index: &[TableRowId],
    ) -> LtpResult<BTreeMap<u32, BTreeMap<u16, PropertyValue>>> {
        let mut rows = BTreeMap::new();
        if row_index.is_empty() {
            return Ok(rows);
        }

        let row_size = usize::from(group_offsets[TCI_BM]);
        if row_size < 4 || usize::from(group_offsets[TCI_1B]) > row_size {
            return Err(LtpError::TruncatedTableInfo(row_size));
        }

        let trailer_size = BlockTrailer::size(database.header().version());
        let rows_per_block = (ROW_MATRIX_BLOCK_SIZE - trailer_size) / row_size;
        let rows_heap_id = HeapId::from(rows_id);

        let sections: Vec<Vec<u8>> =
            if rows_heap_id.id_type() == NodeIdType::HeapNode as u8 {
                vec![heap.find_entry(rows_heap_id)?.to_vec()]
            } else {
                let entry = heap.sub_node(NodeId::from(rows_id))?;
                database.fetch_all_block_data(entry.data())?
            };

        for position in 0..row_index.len() {
            let block_index = position / rows_per_block;
            let row_offset = (position % rows_per_block) * row_size;

            let section = sections
                .get(block_index)
                .ok_or(LtpError::TruncatedRowMatrix(position))?;
            if row_offset + row_size > section.len() {
                return Err(LtpError::TruncatedRowMatrix(position));
            }
            let row = &section[row_offset..row_offset + row_size];

            let row_id = LittleEndian::read_u32(&row[..4]);
            let existence_map = &row[usize::from(group_offsets[TCI_1B])..];

            let mut cells = BTreeMap::new();
            for column in columns {
                let byte = usize::from(column.existence_bit) / 8;
                if byte >= existence_map.len() {
                    return Err(LtpError::TruncatedRowMatrix(position));
                }
                let present =
                    existence_map[byte] & (1 << (7 - column.existence_bit % 8)) != 0;
                if !present {
                    continue;
                }

                let start = usize::from(column.data_offset);
                let end = start + usize::from(column.data_size);
                if end > row.len() {
                    return Err(LtpError::TruncatedRowMatrix(position));
                }

                let value = Self::resolve_cell(database, heap, column, &row[start..end])?;
                cells.insert(column.prop_id, value);
            }

            rows.insert(row_id, cells);
        }

        Ok(rows)
    }

    /// Cell resolution matches the PC rules with a wider inline limit: fixed
    /// values of up to 8 bytes are stored in the row itself.
    fn resolve_cell(
        database: &NodeDatabase,
        heap: &HeapNode,
        column: &ColumnDescriptor,
        data: &[u8],
    ) -> LtpResult<PropertyValue> {
        let Some(prop_type) = PropertyType::from_bits(column.type_bits) else {
            return Ok(PropertyValue::Unspecified(data.to_vec()));
        };

        let descriptor = prop_type.descriptor();
        if descriptor.is_fixed() && descriptor.byte_count <= 8 {
            return Ok(PropertyValue::decode(prop_type, data)?);
        }

        if data.len() < 4 {
            return Err(crate::props::PropertyError::TruncatedValue(prop_type, data.len()).into());
        }
        let raw = LittleEndian::read_u32(&data[..4]);

        if descriptor.is_fixed() {
            let payload = heap.find_entry(HeapId::from(raw))?;
            return Ok(PropertyValue::decode(prop_type, payload)?);
        }

        let heap_id = HeapId::from(raw);
        if heap_id.id_type() == NodeIdType::HeapNode as u8 {
            if heap_id.is_empty() {
                return Ok(PropertyValue::decode(prop_type, &[])?);
            }
            let payload = heap.find_entry(heap_id)?;
            return Ok(PropertyValue::decode(prop_type, payload)?);
        }

        let entry = heap.sub_node(NodeId::from(raw))?;
        let payload = database.fetch_all_block_data(entry.data())?.concat();
        Ok(PropertyValue::decode(prop_type, &payload)?)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_index.len()
    }

    /// The NID a row stands for, in hierarchy, contents, and sub-node
    /// tables.
    pub fn row_node(&self, position: usize) -> Option<NodeId> {
        self.row_index.get(position).map(TableRowId::node)
    }

    /// A cell by row position and property id; absent cells are `None`.
    pub fn get_value(&self, position: usize, prop_id: u16) -> Option<&PropertyValue> {
        let row_id = self.row_index.get(position)?.row_id();
        self.rows.get(&row_id)?.get(&prop_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existence_bitmap_masks() {
        // iBit 0 is the most significant bit of the first bitmap byte
        for (bit, byte, mask) in [(0_u8, 0_usize, 0x80_u8), (7, 0, 0x01), (9, 1, 0x40)] {
            assert_eq!(usize::from(bit) / 8, byte);
            assert_eq!(1_u8 << (7 - bit % 8), mask);
        }
    }

    #[test]
    fn test_column_descriptor_parse() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x001F_u16.to_le_bytes());
        payload.extend_from_slice(&0x3001_u16.to_le_bytes());
        payload.extend_from_slice(&8_u16.to_le_bytes());
        payload.push(4);
        payload.push(2);

        let column = ColumnDescriptor::parse(&payload);
        assert_eq!(column.type_bits(), 0x001F);
        assert_eq!(column.prop_id(), 0x3001);
        assert_eq!(column.data_offset, 8);
        assert_eq!(column.data_size, 4);
        assert_eq!(column.existence_bit(), 2);
    }
}

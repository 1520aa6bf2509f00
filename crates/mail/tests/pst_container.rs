//! End-to-end traversal of a synthetic Unicode PST assembled in memory:
//! header, NBT/BBT leaf pages, heap-on-node blocks for the store and
//! name-to-id contexts, a two-folder hierarchy, and one message carrying a
//! recipient table and a by-value attachment.

use std::io::Cursor;

use outlook_mail::{
    messaging::named_prop::PS_MAPI,
    props::value::PropertyValue,
    PstFile,
};

const PAGE_SIZE: usize = 512;

// property ids used by the fixture
const PID_SUBJECT: u16 = 0x0037;
const PID_CLIENT_SUBMIT_TIME: u16 = 0x0039;
const PID_SENT_REPRESENTING_NAME: u16 = 0x0042;
const PID_RECIPIENT_TYPE: u16 = 0x0C15;
const PID_MESSAGE_FLAGS: u16 = 0x0E07;
const PID_ATTACHMENT_SIZE: u16 = 0x0E20;
const PID_RECORD_KEY: u16 = 0x0FF9;
const PID_BODY: u16 = 0x1000;
const PID_DISPLAY_NAME: u16 = 0x3001;
const PID_EMAIL_ADDRESS: u16 = 0x3003;
const PID_IPM_SUB_TREE_ENTRY_ID: u16 = 0x35E0;
const PID_CONTENT_COUNT: u16 = 0x3602;
const PID_SUBFOLDERS: u16 = 0x360A;
const PID_ATTACH_DATA_BINARY: u16 = 0x3701;
const PID_ATTACH_METHOD: u16 = 0x3705;
const PID_ATTACH_LONG_FILENAME: u16 = 0x3707;
const PID_PST_PASSWORD: u16 = 0x67FF;
const PID_NAMEID_STREAM_ENTRY: u16 = 0x0003;

const PT_INTEGER32: u16 = 0x0003;
const PT_BOOLEAN: u16 = 0x000B;
const PT_UNICODE: u16 = 0x001F;
const PT_TIME: u16 = 0x0040;
const PT_BINARY: u16 = 0x0102;

// node ids
const NID_MESSAGE_STORE: u32 = 0x21;
const NID_NAME_TO_ID_MAP: u32 = 0x61;
const NID_ROOT_FOLDER: u32 = 0x122;
const NID_ROOT_HIERARCHY: u32 = (0x9 << 5) | 0x0D;
const NID_ROOT_CONTENTS: u32 = (0x9 << 5) | 0x0E;
const NID_INBOX: u32 = (0x20 << 5) | 0x02;
const NID_INBOX_CONTENTS: u32 = (0x20 << 5) | 0x0E;
const NID_MESSAGE: u32 = (0x21 << 5) | 0x04;
const NID_RECIPIENT_TABLE: u32 = (0x30 << 5) | 0x12;
const NID_ATTACHMENT_TABLE: u32 = (0x31 << 5) | 0x11;
const NID_ATTACHMENT: u32 = (0x32 << 5) | 0x05;

const PASSWORD_HASH: i32 = 0x1234_ABCD_u32 as i32;
const RECORD_KEY: [u8; 16] = [0xAB; 16];
const ATTACHMENT_DATA: &[u8] = b"%PDF-1.4 report payload";

fn utf16le(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

fn hid(index: u32) -> u32 {
    index << 5
}

/// A single-section heap: HNHDR, the allocations in order, then HNPAGEMAP.
/// Allocation `k` (1-based) gets HID `k << 5`.
fn heap_section(client_type: u8, user_root: u32, allocations: &[Vec<u8>]) -> Vec<u8> {
    let mut section = Vec::new();
    section.extend_from_slice(&[0, 0]);
    section.push(0xEC);
    section.push(client_type);
    section.extend_from_slice(&user_root.to_le_bytes());
    section.extend_from_slice(&0_u32.to_le_bytes());

    let mut offsets = vec![section.len() as u16];
    for allocation in allocations {
        section.extend_from_slice(allocation);
        offsets.push(section.len() as u16);
    }

    let page_map_offset = section.len() as u16;
    section[..2].copy_from_slice(&page_map_offset.to_le_bytes());
    section.extend_from_slice(&(allocations.len() as u16).to_le_bytes());
    section.extend_from_slice(&0_u16.to_le_bytes());
    for offset in &offsets {
        section.extend_from_slice(&offset.to_le_bytes());
    }
    section
}

fn bth_header(key_size: u8, entry_size: u8, root: u32) -> Vec<u8> {
    let mut header = vec![0xB5, key_size, entry_size, 0];
    header.extend_from_slice(&root.to_le_bytes());
    header
}

/// A PC heap: allocation 1 is the BTH header, allocation 2 the records,
/// further allocations are out-of-line payloads referenced by HID.
fn pc_heap(records: &[(u16, u16, [u8; 4])], payloads: &[Vec<u8>]) -> Vec<u8> {
    let mut record_bytes = Vec::new();
    for (prop_id, prop_type, value) in records {
        record_bytes.extend_from_slice(&prop_id.to_le_bytes());
        record_bytes.extend_from_slice(&prop_type.to_le_bytes());
        record_bytes.extend_from_slice(value);
    }

    let mut allocations = vec![bth_header(2, 6, hid(2)), record_bytes];
    allocations.extend_from_slice(payloads);
    heap_section(0xBC, hid(1), &allocations)
}

struct TcColumn {
    prop_type: u16,
    prop_id: u16,
    data_offset: u16,
    data_size: u8,
    existence_bit: u8,
}

/// A TC heap: allocation 1 is TCINFO, 2 the row-index BTH header, 3 the
/// row-index records, 4 the HID-resident row matrix; further allocations are
/// out-of-line cell payloads.
fn tc_heap(
    columns: &[TcColumn],
    row_end_1b: u16,
    row_size: u16,
    rows: &[(u32, Vec<u8>)],
    payloads: &[Vec<u8>],
) -> Vec<u8> {
    let mut info = vec![0x7C, columns.len() as u8];
    for offset in [row_end_1b, row_end_1b, row_end_1b, row_size] {
        info.extend_from_slice(&offset.to_le_bytes());
    }
    info.extend_from_slice(&hid(2).to_le_bytes());
    let rows_hnid = if rows.is_empty() { 0 } else { hid(4) };
    info.extend_from_slice(&rows_hnid.to_le_bytes());
    info.extend_from_slice(&0_u32.to_le_bytes());
    for column in columns {
        info.extend_from_slice(&column.prop_type.to_le_bytes());
        info.extend_from_slice(&column.prop_id.to_le_bytes());
        info.extend_from_slice(&column.data_offset.to_le_bytes());
        info.push(column.data_size);
        info.push(column.existence_bit);
    }

    let row_index_root = if rows.is_empty() { 0 } else { hid(3) };
    let mut row_index_records = Vec::new();
    let mut row_matrix = Vec::new();
    for (position, (row_id, row)) in rows.iter().enumerate() {
        assert_eq!(row.len(), usize::from(row_size));
        row_index_records.extend_from_slice(&row_id.to_le_bytes());
        row_index_records.extend_from_slice(&(position as u32).to_le_bytes());
        row_matrix.extend_from_slice(row);
    }

    let mut allocations = vec![
        info,
        bth_header(4, 4, row_index_root),
        row_index_records,
        row_matrix,
    ];
    allocations.extend_from_slice(payloads);
    heap_section(0x7C, hid(1), &allocations)
}

#[derive(Default)]
struct FileBuilder {
    bytes: Vec<u8>,
    nbt: Vec<(u32, u64, u64)>,
    bbt: Vec<(u64, u64, u16)>,
    next_bid: u64,
}

impl FileBuilder {
    fn new() -> Self {
        Self {
            bytes: vec![0; 0x800],
            next_bid: 4,
            ..Self::default()
        }
    }

    fn align(&mut self, alignment: usize) -> u64 {
        let offset = self.bytes.len().div_ceil(alignment) * alignment;
        self.bytes.resize(offset, 0);
        offset as u64
    }

    /// Append an external data block and register it in the BBT.
    fn add_data_block(&mut self, data: &[u8]) -> u64 {
        let bid = self.next_bid;
        self.next_bid += 4;
        self.append_block(bid, data);
        bid
    }

    /// Append a sub-node SLBLOCK (internal bid) and register it.
    fn add_sub_node_block(&mut self, entries: &[(u32, u64, u64)]) -> u64 {
        let bid = self.next_bid + 2;
        self.next_bid += 4;

        let mut data = vec![0x02, 0x00];
        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        for (node, data_bid, sub_bid) in entries {
            data.extend_from_slice(&node.to_le_bytes());
            data.extend_from_slice(&0_u32.to_le_bytes());
            data.extend_from_slice(&data_bid.to_le_bytes());
            data.extend_from_slice(&sub_bid.to_le_bytes());
        }

        self.append_block(bid, &data);
        bid
    }

    fn append_block(&mut self, bid: u64, data: &[u8]) {
        let offset = self.align(64);
        let storage_size = (data.len() + 16).div_ceil(64) * 64;
        let mut storage = vec![0_u8; storage_size];
        storage[..data.len()].copy_from_slice(data);

        let trailer = storage_size - 16;
        storage[trailer..trailer + 2].copy_from_slice(&(data.len() as u16).to_le_bytes());
        storage[trailer + 8..].copy_from_slice(&bid.to_le_bytes());

        self.bytes.extend_from_slice(&storage);
        self.bbt.push((bid, offset, data.len() as u16));
    }

    fn add_node(&mut self, node: u32, data: &[u8], sub_node_bid: u64) {
        let bid = self.add_data_block(data);
        self.nbt.push((node, bid, sub_node_bid));
    }

    fn append_page(&mut self, page_type: u8, entries: &[Vec<u8>]) -> u64 {
        let offset = self.align(PAGE_SIZE);
        let mut page = vec![0_u8; PAGE_SIZE];

        let stride = entries[0].len();
        let mut cursor = 0;
        for entry in entries {
            page[cursor..cursor + entry.len()].copy_from_slice(entry);
            cursor += stride;
        }

        page[488] = entries.len() as u8;
        page[489] = entries.len() as u8;
        page[490] = stride as u8;
        page[491] = 0;
        page[496] = page_type;
        page[497] = page_type;

        self.bytes.extend_from_slice(&page);
        offset as u64
    }

    fn finish(mut self) -> Vec<u8> {
        let nbt_entries: Vec<Vec<u8>> = {
            let mut nodes = self.nbt.clone();
            nodes.sort_by_key(|&(node, ..)| node);
            nodes
                .iter()
                .map(|&(node, data_bid, sub_bid)| {
                    let mut entry = Vec::with_capacity(32);
                    entry.extend_from_slice(&node.to_le_bytes());
                    entry.extend_from_slice(&0_u32.to_le_bytes());
                    entry.extend_from_slice(&data_bid.to_le_bytes());
                    entry.extend_from_slice(&sub_bid.to_le_bytes());
                    entry.extend_from_slice(&0_u32.to_le_bytes());
                    entry.extend_from_slice(&0_u32.to_le_bytes());
                    entry
                })
                .collect()
        };
        let nbt_offset = self.append_page(0x81, &nbt_entries);

        let bbt_entries: Vec<Vec<u8>> = {
            let mut blocks = self.bbt.clone();
            blocks.sort_by_key(|&(bid, ..)| bid);
            blocks
                .iter()
                .map(|&(bid, offset, size)| {
                    let mut entry = Vec::with_capacity(24);
                    entry.extend_from_slice(&bid.to_le_bytes());
                    entry.extend_from_slice(&offset.to_le_bytes());
                    entry.extend_from_slice(&size.to_le_bytes());
                    entry.extend_from_slice(&1_u16.to_le_bytes());
                    entry.extend_from_slice(&0_u32.to_le_bytes());
                    entry
                })
                .collect()
        };
        let bbt_offset = self.append_page(0x80, &bbt_entries);

        let header = build_header(self.bytes.len() as u64, nbt_offset, bbt_offset);
        self.bytes[..header.len()].copy_from_slice(&header);
        self.bytes
    }
}

fn build_header(file_eof: u64, nbt_offset: u64, bbt_offset: u64) -> Vec<u8> {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(b"!BDN");
    buffer.extend_from_slice(&0_u32.to_le_bytes());
    buffer.extend_from_slice(b"SM");
    buffer.extend_from_slice(&23_u16.to_le_bytes());
    buffer.extend_from_slice(&19_u16.to_le_bytes());
    buffer.extend_from_slice(&[0x01, 0x01]);
    buffer.extend_from_slice(&[0; 8]);
    buffer.extend_from_slice(&[0; 20]);
    buffer.extend_from_slice(&[0; 128]);
    buffer.extend_from_slice(&[0; 8]);

    // root
    buffer.extend_from_slice(&0_u32.to_le_bytes());
    buffer.extend_from_slice(&file_eof.to_le_bytes());
    buffer.extend_from_slice(&0_u64.to_le_bytes());
    buffer.extend_from_slice(&0_u64.to_le_bytes());
    buffer.extend_from_slice(&0_u64.to_le_bytes());
    buffer.extend_from_slice(&0x1000_u64.to_le_bytes());
    buffer.extend_from_slice(&nbt_offset.to_le_bytes());
    buffer.extend_from_slice(&0x1004_u64.to_le_bytes());
    buffer.extend_from_slice(&bbt_offset.to_le_bytes());
    buffer.push(1);
    buffer.extend_from_slice(&[0; 3]);

    buffer.extend_from_slice(&0_u32.to_le_bytes());
    buffer.extend_from_slice(&[0xFF; 256]);
    buffer.push(0x80);
    buffer.push(0x00);
    buffer
}

fn unicode_cell() -> TcColumn {
    TcColumn {
        prop_type: PT_UNICODE,
        prop_id: 0,
        data_offset: 0,
        data_size: 4,
        existence_bit: 0,
    }
}

fn build_fixture() -> Vec<u8> {
    let mut builder = FileBuilder::new();

    // message store
    let mut root_entry_id = vec![0_u8; 4];
    root_entry_id.extend_from_slice(&RECORD_KEY);
    root_entry_id.extend_from_slice(&NID_ROOT_FOLDER.to_le_bytes());
    let store = pc_heap(
        &[
            (PID_RECORD_KEY, PT_BINARY, hid(3).to_le_bytes()),
            (PID_DISPLAY_NAME, PT_UNICODE, hid(4).to_le_bytes()),
            (PID_IPM_SUB_TREE_ENTRY_ID, PT_BINARY, hid(5).to_le_bytes()),
            (PID_PST_PASSWORD, PT_INTEGER32, PASSWORD_HASH.to_le_bytes()),
        ],
        &[
            RECORD_KEY.to_vec(),
            utf16le("Personal Folders"),
            root_entry_id,
        ],
    );
    builder.add_node(NID_MESSAGE_STORE, &store, 0);

    // name-to-id map: one numeric entry against PS_MAPI
    let mut name_entry = Vec::new();
    name_entry.extend_from_slice(&0x8500_u32.to_le_bytes());
    name_entry.extend_from_slice(&(1_u16 << 1).to_le_bytes());
    name_entry.extend_from_slice(&5_u16.to_le_bytes());
    let name_map = pc_heap(
        &[(PID_NAMEID_STREAM_ENTRY, PT_BINARY, hid(3).to_le_bytes())],
        &[name_entry],
    );
    builder.add_node(NID_NAME_TO_ID_MAP, &name_map, 0);

    // root folder and its hierarchy/contents tables
    let root_folder = pc_heap(
        &[
            (PID_DISPLAY_NAME, PT_UNICODE, hid(3).to_le_bytes()),
            (PID_CONTENT_COUNT, PT_INTEGER32, 0_i32.to_le_bytes()),
            (PID_SUBFOLDERS, PT_BOOLEAN, [1, 0, 0, 0]),
        ],
        &[utf16le("Root")],
    );
    builder.add_node(NID_ROOT_FOLDER, &root_folder, 0);

    let mut hierarchy_row = Vec::new();
    hierarchy_row.extend_from_slice(&NID_INBOX.to_le_bytes());
    hierarchy_row.extend_from_slice(&hid(5).to_le_bytes());
    hierarchy_row.push(0x80);
    let root_hierarchy = tc_heap(
        &[TcColumn {
            prop_id: PID_DISPLAY_NAME,
            data_offset: 4,
            ..unicode_cell()
        }],
        8,
        9,
        &[(NID_INBOX, hierarchy_row)],
        &[utf16le("Inbox")],
    );
    builder.add_node(NID_ROOT_HIERARCHY, &root_hierarchy, 0);

    let root_contents = tc_heap(
        &[TcColumn {
            prop_id: PID_SUBJECT,
            data_offset: 4,
            ..unicode_cell()
        }],
        8,
        9,
        &[],
        &[],
    );
    builder.add_node(NID_ROOT_CONTENTS, &root_contents, 0);

    // Inbox and its contents table
    let inbox = pc_heap(
        &[
            (PID_DISPLAY_NAME, PT_UNICODE, hid(3).to_le_bytes()),
            (PID_CONTENT_COUNT, PT_INTEGER32, 1_i32.to_le_bytes()),
            (PID_SUBFOLDERS, PT_BOOLEAN, [0, 0, 0, 0]),
        ],
        &[utf16le("Inbox")],
    );
    builder.add_node(NID_INBOX, &inbox, 0);

    // contents row: [row id][subject hnid][sender hnid][submit time][ceb]
    let mut contents_row = Vec::new();
    contents_row.extend_from_slice(&NID_MESSAGE.to_le_bytes());
    contents_row.extend_from_slice(&hid(5).to_le_bytes());
    contents_row.extend_from_slice(&hid(6).to_le_bytes());
    contents_row.extend_from_slice(&631_152_000_0000000_i64.to_le_bytes());
    contents_row.push(0xE0);
    let inbox_contents = tc_heap(
        &[
            TcColumn {
                prop_id: PID_SUBJECT,
                data_offset: 4,
                ..unicode_cell()
            },
            TcColumn {
                prop_id: PID_SENT_REPRESENTING_NAME,
                data_offset: 8,
                existence_bit: 1,
                ..unicode_cell()
            },
            TcColumn {
                prop_type: PT_TIME,
                prop_id: PID_CLIENT_SUBMIT_TIME,
                data_offset: 12,
                data_size: 8,
                existence_bit: 2,
            },
        ],
        20,
        21,
        &[(NID_MESSAGE, contents_row)],
        &[utf16le("Hello, world"), utf16le("Archivist")],
    );
    builder.add_node(NID_INBOX_CONTENTS, &inbox_contents, 0);

    // attachment object reached through the message's sub-node map
    let attachment = pc_heap(
        &[
            (PID_ATTACH_METHOD, PT_INTEGER32, 1_i32.to_le_bytes()),
            (
                PID_ATTACHMENT_SIZE,
                PT_INTEGER32,
                (ATTACHMENT_DATA.len() as i32).to_le_bytes(),
            ),
            (PID_ATTACH_LONG_FILENAME, PT_UNICODE, hid(3).to_le_bytes()),
            (PID_ATTACH_DATA_BINARY, PT_BINARY, hid(4).to_le_bytes()),
        ],
        &[
            utf16le("C:\\out\\Report Q1.pdf"),
            ATTACHMENT_DATA.to_vec(),
        ],
    );
    let attachment_bid = builder.add_data_block(&attachment);

    // recipient table
    let mut recipient_row = Vec::new();
    recipient_row.extend_from_slice(&0x10_u32.to_le_bytes());
    recipient_row.extend_from_slice(&hid(5).to_le_bytes());
    recipient_row.extend_from_slice(&hid(6).to_le_bytes());
    recipient_row.extend_from_slice(&1_i32.to_le_bytes());
    recipient_row.push(0xE0);
    let recipient_table = tc_heap(
        &[
            TcColumn {
                prop_id: PID_DISPLAY_NAME,
                data_offset: 4,
                ..unicode_cell()
            },
            TcColumn {
                prop_id: PID_EMAIL_ADDRESS,
                data_offset: 8,
                existence_bit: 1,
                ..unicode_cell()
            },
            TcColumn {
                prop_type: PT_INTEGER32,
                prop_id: PID_RECIPIENT_TYPE,
                data_offset: 12,
                data_size: 4,
                existence_bit: 2,
            },
        ],
        16,
        17,
        &[(0x10, recipient_row)],
        &[utf16le("Aster Pannell"), utf16le("aster@example.com")],
    );
    let recipient_table_bid = builder.add_data_block(&recipient_table);

    // attachment table
    let mut attachment_row = Vec::new();
    attachment_row.extend_from_slice(&NID_ATTACHMENT.to_le_bytes());
    attachment_row.extend_from_slice(&(ATTACHMENT_DATA.len() as i32).to_le_bytes());
    attachment_row.extend_from_slice(&hid(5).to_le_bytes());
    attachment_row.push(0xE0);
    let attachment_table = tc_heap(
        &[
            TcColumn {
                prop_type: PT_INTEGER32,
                prop_id: PID_ATTACHMENT_SIZE,
                data_offset: 4,
                data_size: 4,
                existence_bit: 0,
            },
            TcColumn {
                prop_id: PID_ATTACH_LONG_FILENAME,
                data_offset: 8,
                existence_bit: 1,
                ..unicode_cell()
            },
        ],
        12,
        13,
        &[(NID_ATTACHMENT, attachment_row)],
        &[utf16le("Report Q1.pdf")],
    );
    let attachment_table_bid = builder.add_data_block(&attachment_table);

    let sub_node_bid = builder.add_sub_node_block(&[
        (NID_ATTACHMENT_TABLE, attachment_table_bid, 0),
        (NID_RECIPIENT_TABLE, recipient_table_bid, 0),
        (NID_ATTACHMENT, attachment_bid, 0),
    ]);

    // the message itself: MSGFLAG_READ | MSGFLAG_HASATTACH
    let message = pc_heap(
        &[
            (PID_SUBJECT, PT_UNICODE, hid(3).to_le_bytes()),
            (PID_MESSAGE_FLAGS, PT_INTEGER32, 0x11_i32.to_le_bytes()),
            (PID_BODY, PT_UNICODE, hid(4).to_le_bytes()),
            (PID_SENT_REPRESENTING_NAME, PT_UNICODE, hid(5).to_le_bytes()),
        ],
        &[
            utf16le("Hello, world"),
            utf16le("Quarterly numbers attached."),
            utf16le("Archivist"),
        ],
    );
    builder.add_node(NID_MESSAGE, &message, sub_node_bid);

    builder.finish()
}

fn open_fixture() -> PstFile {
    PstFile::read_from(Box::new(Cursor::new(build_fixture())), false).unwrap()
}

#[test]
fn test_store_properties() {
    let pst = open_fixture();
    let store = pst.store();

    assert_eq!(store.display_name(), Some("Personal Folders"));
    assert_eq!(store.record_key(), Some(&RECORD_KEY[..]));
    assert_eq!(store.password_hash(), Some(0x1234_ABCD));
    assert_eq!(store.root_entry_id().unwrap().node(), NID_ROOT_FOLDER);

    let status = pst.status();
    assert!(status.contains("Unicode: true"), "{status}");
    assert!(status.contains("Personal Folders"), "{status}");
}

#[test]
fn test_folder_traversal() {
    let pst = open_fixture();
    let folders: Vec<_> = pst.folders().collect();
    assert_eq!(folders.len(), 2);

    let root = &folders[0];
    assert_eq!(root.display_name(), "Root");
    assert_eq!(root.path(), "\\Root");
    assert!(root.has_subfolders());
    assert_eq!(root.subfolders().len(), 1);
    assert_eq!(root.subfolders()[0].name(), "Inbox");
    assert!(root.submessages().is_empty());

    let inbox = &folders[1];
    assert_eq!(inbox.display_name(), "Inbox");
    assert_eq!(inbox.path(), "\\Root\\Inbox");
    assert_eq!(inbox.content_count(), Some(1));
    assert!(!inbox.has_subfolders());
    assert_eq!(inbox.submessages().len(), 1);
    assert_eq!(inbox.submessages()[0].subject(), Some("Hello, world"));

    // EntryIDs are synthesized from the store record key
    let entry_id = inbox.entry_id().unwrap();
    assert_eq!(&entry_id[..4], &[0; 4]);
    assert_eq!(&entry_id[4..20], &RECORD_KEY);
    assert_eq!(&entry_id[20..], &NID_INBOX.to_le_bytes());
}

#[test]
fn test_total_counts_match_folder_sums() {
    let pst = open_fixture();
    assert_eq!(pst.total_folder_count(), 2);
    assert_eq!(
        pst.total_message_count(),
        pst.folders()
            .map(|folder| folder.submessages().len())
            .sum::<usize>()
    );
    assert_eq!(pst.total_message_count(), 1);
    assert_eq!(pst.total_attachment_count(), 1);
}

#[test]
fn test_message_and_recipients() {
    let pst = open_fixture();
    let inbox = pst.folders().nth(1).unwrap();
    let message = pst.messages(&inbox).next().unwrap();

    assert_eq!(message.subject(), Some("Hello, world"));
    assert_eq!(message.body(), Some("Quarterly numbers attached."));
    assert_eq!(message.sent_representing_name(), Some("Archivist"));
    assert!(message.is_read());
    assert!(message.has_attachments());

    assert_eq!(message.recipients().len(), 1);
    let recipient = &message.recipients()[0];
    assert_eq!(recipient.display_name(), Some("Aster Pannell"));
    assert_eq!(recipient.email_address(), Some("aster@example.com"));
    assert_eq!(recipient.recipient_type(), Some(1));
}

#[test]
fn test_attachment_fetch() {
    let pst = open_fixture();
    let inbox = pst.folders().nth(1).unwrap();
    let message = pst.messages(&inbox).next().unwrap();

    assert_eq!(message.attachments().len(), 1);
    let summary = &message.attachments()[0];
    assert_eq!(summary.filename(), "Report Q1.pdf");
    assert_eq!(summary.size(), Some(ATTACHMENT_DATA.len() as i32));

    let attachment = message.fetch_attachment(pst.database(), summary).unwrap();
    assert!(attachment.is_by_value());
    assert_eq!(attachment.filename(), "Report Q1.pdf");
    assert_eq!(attachment.data(), Some(ATTACHMENT_DATA));
    assert_eq!(
        attachment.data().unwrap().len(),
        attachment.size().unwrap() as usize
    );
}

#[test]
fn test_named_property_entries() {
    let pst = open_fixture();
    let entries = pst.name_to_id().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].npid(), 0x8005);
    assert!(!entries[0].is_string());
    assert_eq!(entries[0].guid(), Some(&PS_MAPI));
}

#[test]
fn test_message_properties_are_exposed() {
    let pst = open_fixture();
    let inbox = pst.folders().nth(1).unwrap();
    let message = pst.messages(&inbox).next().unwrap();

    let Some(PropertyValue::Integer32(flags)) = message.properties().get(PID_MESSAGE_FLAGS)
    else {
        panic!("message flags should be a 32-bit integer");
    };
    assert_eq!(*flags, 0x11);
}

#[test]
fn test_corrupt_magic_is_invalid_container() {
    let mut file = build_fixture();
    file[..4].copy_from_slice(b"!BDX");

    let err = PstFile::read_from(Box::new(Cursor::new(file)), false).unwrap_err();
    assert!(err.is_invalid_container(), "{err}");
}

#[test]
fn test_crc_validation_accepts_zeroed_trailers_off_only() {
    // the fixture writes no CRCs, so validation must be opt-in
    let file = build_fixture();
    assert!(PstFile::read_from(Box::new(Cursor::new(file.clone())), false).is_ok());
    assert!(PstFile::read_from(Box::new(Cursor::new(file)), true).is_err());
}

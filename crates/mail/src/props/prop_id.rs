//! ## Well-Known Property Ids
//!
//! The 16-bit `wPropId` half of a property tag for every property the
//! messaging layers read. Names follow [MS-OXPROPS].

pub const PID_TAG_NAMEID_STREAM_GUID: u16 = 0x0002;
pub const PID_TAG_NAMEID_STREAM_ENTRY: u16 = 0x0003;
pub const PID_TAG_NAMEID_STREAM_STRING: u16 = 0x0004;

pub const PID_TAG_MESSAGE_CLASS: u16 = 0x001A;
pub const PID_TAG_SUBJECT: u16 = 0x0037;
pub const PID_TAG_CLIENT_SUBMIT_TIME: u16 = 0x0039;
pub const PID_TAG_SENT_REPRESENTING_NAME: u16 = 0x0042;
pub const PID_TAG_TRANSPORT_MESSAGE_HEADERS: u16 = 0x007D;

pub const PID_TAG_RECIPIENT_TYPE: u16 = 0x0C15;
pub const PID_TAG_SENDER_NAME: u16 = 0x0C1A;

pub const PID_TAG_DISPLAY_TO: u16 = 0x0E04;
pub const PID_TAG_MESSAGE_DELIVERY_TIME: u16 = 0x0E06;
pub const PID_TAG_MESSAGE_FLAGS: u16 = 0x0E07;
pub const PID_TAG_MESSAGE_SIZE: u16 = 0x0E08;
pub const PID_TAG_MESSAGE_STATUS: u16 = 0x0E17;
pub const PID_TAG_ATTACHMENT_SIZE: u16 = 0x0E20;

pub const PID_TAG_RECORD_KEY: u16 = 0x0FF9;
pub const PID_TAG_OBJECT_TYPE: u16 = 0x0FFE;
pub const PID_TAG_ENTRY_ID: u16 = 0x0FFF;

pub const PID_TAG_BODY: u16 = 0x1000;

pub const PID_TAG_DISPLAY_NAME: u16 = 0x3001;
pub const PID_TAG_ADDRESS_TYPE: u16 = 0x3002;
pub const PID_TAG_EMAIL_ADDRESS: u16 = 0x3003;

pub const PID_TAG_IPM_SUB_TREE_ENTRY_ID: u16 = 0x35E0;
pub const PID_TAG_IPM_WASTEBASKET_ENTRY_ID: u16 = 0x35E3;
pub const PID_TAG_FINDER_ENTRY_ID: u16 = 0x35E7;

pub const PID_TAG_CONTENT_COUNT: u16 = 0x3602;
pub const PID_TAG_SUBFOLDERS: u16 = 0x360A;
pub const PID_TAG_CONTAINER_CLASS: u16 = 0x3613;

pub const PID_TAG_ATTACH_DATA_BINARY: u16 = 0x3701;
pub const PID_TAG_ATTACH_EXTENSION: u16 = 0x3703;
pub const PID_TAG_ATTACH_FILENAME: u16 = 0x3704;
pub const PID_TAG_ATTACH_METHOD: u16 = 0x3705;
pub const PID_TAG_ATTACH_LONG_FILENAME: u16 = 0x3707;
pub const PID_TAG_ATTACH_MIME_TAG: u16 = 0x370E;

pub const PID_TAG_DISPLAY_TYPE: u16 = 0x3900;

pub const PID_TAG_SENDER_SMTP_ADDRESS: u16 = 0x5D01;

pub const PID_TAG_PST_PASSWORD: u16 = 0x67FF;

/// Named property mapped by most senders to `x-originating-ip`.
pub const PID_TAG_X_ORIGINATING_IP: u16 = 0x8028;

/// `PidTagAttachDataObject` shares the tag id of `PidTagAttachDataBinary`
/// with the [`super::prop_type::PropertyType::Object`] type.
pub const PID_TAG_ATTACH_DATA_OBJECT: u16 = PID_TAG_ATTACH_DATA_BINARY;

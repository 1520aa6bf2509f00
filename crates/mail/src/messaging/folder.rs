//! ## [Folders](https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/dee5b9d0-5513-4c5e-94aa-8bd28a9350b2)

use tracing::warn;

use super::{store::MessageStore, strip_subject_prefix, MessagingError, MessagingResult};
use crate::{
    ltp::{prop_context::PropertyContext, table_context::TableContext},
    ndb::{node_id::*, NodeDatabase},
    props::{prop_id::*, time::FileTime, value::PropertyValue},
};

/// A hierarchy-table row: just enough to reach the child folder.
#[derive(Clone, Debug)]
pub struct SubFolder {
    node: NodeId,
    name: String,
    parent_path: String,
}

impl SubFolder {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }
}

/// A contents-table row: the summary columns of one contained message.
#[derive(Clone, Debug)]
pub struct SubMessage {
    node: NodeId,
    sent_representing_name: Option<String>,
    subject: Option<String>,
    client_submit_time: Option<FileTime>,
}

impl SubMessage {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn sent_representing_name(&self) -> Option<&str> {
        self.sent_representing_name.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn client_submit_time(&self) -> Option<FileTime> {
        self.client_submit_time
    }
}

/// A folder: its property context plus the three sibling table contexts at
/// the NIDs derived from the folder's NID index. Missing or broken tables
/// degrade to empty listings so traversal of damaged files keeps going.
pub struct Folder {
    properties: PropertyContext,
    display_name: String,
    path: String,
    entry_id: Option<Vec<u8>>,
    content_count: Option<i32>,
    container_class: Option<String>,
    has_subfolders: bool,
    subfolders: Vec<SubFolder>,
    submessages: Vec<SubMessage>,
    associated_count: usize,
}

impl Folder {
    pub fn read(
        database: &NodeDatabase,
        node: NodeId,
        parent_path: &str,
        store: Option<&MessageStore>,
    ) -> MessagingResult<Self> {
        let node_type = node.id_type()?;
        if node_type != NodeIdType::NormalFolder {
            return Err(MessagingError::InvalidFolderNodeType(node_type));
        }

        let properties = PropertyContext::read_node(database, node)?;

        let display_name = properties
            .get(PID_TAG_DISPLAY_NAME)
            .and_then(PropertyValue::as_string)
            .unwrap_or_default();
        let path = format!("{parent_path}\\{display_name}");

        let entry_id = store.and_then(|store| store.entry_id(node));
        let content_count = properties
            .get(PID_TAG_CONTENT_COUNT)
            .and_then(PropertyValue::as_i32);
        let container_class = properties
            .get(PID_TAG_CONTAINER_CLASS)
            .and_then(PropertyValue::as_string);
        let has_subfolders = properties
            .get(PID_TAG_SUBFOLDERS)
            .map(|value| value.as_bool().unwrap_or(value.as_i32() == Some(1)))
            .unwrap_or_default();

        let subfolders = match Self::read_table(database, node, NodeIdType::HierarchyTable)? {
            Some(table) => (0..table.row_count())
                .filter_map(|row| {
                    Some(SubFolder {
                        node: table.row_node(row)?,
                        name: table
                            .get_value(row, PID_TAG_DISPLAY_NAME)
                            .and_then(PropertyValue::as_string)
                            .unwrap_or_default(),
                        parent_path: path.clone(),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        let submessages = match Self::read_table(database, node, NodeIdType::ContentsTable)? {
            Some(table) => (0..table.row_count())
                .filter_map(|row| {
                    Some(SubMessage {
                        node: table.row_node(row)?,
                        sent_representing_name: table
                            .get_value(row, PID_TAG_SENT_REPRESENTING_NAME)
                            .and_then(PropertyValue::as_string),
                        subject: table
                            .get_value(row, PID_TAG_SUBJECT)
                            .and_then(PropertyValue::as_string)
                            .map(strip_subject_prefix),
                        client_submit_time: table
                            .get_value(row, PID_TAG_CLIENT_SUBMIT_TIME)
                            .and_then(PropertyValue::as_time),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        let associated_count =
            match Self::read_table(database, node, NodeIdType::AssociatedContentsTable)? {
                Some(table) => table.row_count(),
                None => 0,
            };

        Ok(Self {
            properties,
            display_name,
            path,
            entry_id,
            content_count,
            container_class,
            has_subfolders,
            subfolders,
            submessages,
            associated_count,
        })
    }

    /// A sibling table at the folder's NID index. Absent tables are normal
    /// for leaf folders; parse failures are logged and treated as absent.
    fn read_table(
        database: &NodeDatabase,
        node: NodeId,
        table_type: NodeIdType,
    ) -> MessagingResult<Option<TableContext>> {
        let table_node = NodeId::new(table_type, node.index())?;
        if database.lookup_node(table_node).is_err() {
            return Ok(None);
        }

        match TableContext::read_node(database, table_node) {
            Ok(table) => Ok(Some(table)),
            Err(err) => {
                warn!(
                    name: "FolderTableUnreadable",
                    folder = ?node,
                    table = ?table_type,
                    %err,
                    "Skipping unreadable folder table"
                );
                Ok(None)
            }
        }
    }

    pub fn properties(&self) -> &PropertyContext {
        &self.properties
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The backslash-joined path from the root folder down to this one.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn entry_id(&self) -> Option<&[u8]> {
        self.entry_id.as_deref()
    }

    pub fn content_count(&self) -> Option<i32> {
        self.content_count
    }

    pub fn container_class(&self) -> Option<&str> {
        self.container_class.as_deref()
    }

    pub fn has_subfolders(&self) -> bool {
        self.has_subfolders
    }

    pub fn subfolders(&self) -> &[SubFolder] {
        &self.subfolders
    }

    pub fn submessages(&self) -> &[SubMessage] {
        &self.submessages
    }

    /// Row count of the folder-associated-information table.
    pub fn associated_count(&self) -> usize {
        self.associated_count
    }
}

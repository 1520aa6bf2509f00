//! Read-only readers for Microsoft's mail container formats: the PST
//! mailbox database ([MS-PST]) and the CFB envelope used by single-message
//! `.msg` files ([MS-CFB]). Both expose the same logical view — folders,
//! messages, recipients, and attachments carrying typed property
//! dictionaries — for consumption by scanning tools.
//!
//! [MS-PST]: https://learn.microsoft.com/en-us/openspecs/office_file_formats/ms-pst/141923d5-15ab-4ef1-a524-6dce75aae546
//! [MS-CFB]: https://learn.microsoft.com/en-us/openspecs/windows_protocols/ms-cfb/53989ce4-7b05-4f8d-829b-d08d6148375b

use std::{
    fs::{self, File},
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{error, warn};

pub mod cfb;
pub mod ltp;
pub mod messaging;
pub mod msg;
pub mod ndb;
pub mod props;

mod crc;
mod encode;

use ltp::LtpError;
use messaging::{
    folder::{Folder, SubFolder, SubMessage},
    message::Message,
    named_prop::NameToIdMap,
    store::MessageStore,
    MessagingError,
};
use ndb::{header::*, node_id::NodeId, NdbError, NodeDatabase};

pub use msg::MsgFile;

#[derive(Error, Debug)]
pub enum PstError {
    #[error("I/O error: {0:?}")]
    Io(#[from] io::Error),
    #[error("File is read-locked by another process: {0}")]
    FileLocked(String),
    #[error("Node Database error: {0}")]
    NodeDatabase(#[from] NdbError),
    #[error("LTP error: {0}")]
    Ltp(#[from] LtpError),
    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),
}

impl PstError {
    /// Whether the file is simply not a usable PST (bad magic, unknown
    /// version, unsupported crypt method) as opposed to structurally
    /// corrupted. Scanners skip such files.
    pub fn is_invalid_container(&self) -> bool {
        matches!(
            self,
            PstError::NodeDatabase(
                NdbError::InvalidMagic
                    | NdbError::InvalidVersion(_)
                    | NdbError::UnsupportedCryptMethod(_)
            )
        )
    }
}

impl From<PstError> for io::Error {
    fn from(err: PstError) -> io::Error {
        match err {
            PstError::Io(err) => err,
            err => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}

pub type PstResult<T> = Result<T, PstError>;

/// Any positionally seekable byte source. The reader is owned by its
/// container for the container's whole lifetime; seeks are order-sensitive,
/// so access is serialized through a mutex.
pub trait ContainerReader: Read + Seek {}

impl<T> ContainerReader for T where T: Read + Seek {}

/// An open PST file: the node database plus the messaging-layer singletons.
pub struct PstFile {
    database: NodeDatabase,
    store: MessageStore,
    name_to_id: NameToIdMap,
}

impl std::fmt::Debug for PstFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PstFile").finish_non_exhaustive()
    }
}

impl PstFile {
    pub fn open(path: impl AsRef<Path>) -> PstResult<Self> {
        Self::open_with_options(path, false)
    }

    /// Open with page/block CRC validation switched on or off. Validation is
    /// off by default; when on, a CRC mismatch surfaces as structural
    /// corruption.
    pub fn open_with_options(path: impl AsRef<Path>, verify_crc: bool) -> PstResult<Self> {
        let path = path.as_ref();
        let locked = |err: io::Error| {
            if err.kind() == io::ErrorKind::PermissionDenied {
                PstError::FileLocked(path.display().to_string())
            } else {
                PstError::Io(err)
            }
        };

        let mut file = File::open(path).map_err(locked)?;

        // an Outlook client holding the mailbox open read-locks it on some
        // systems; probe before parsing so the failure is distinct
        let mut probe = [0_u8; 1];
        file.read_exact(&mut probe).map_err(locked)?;

        Self::read_from(Box::new(file), verify_crc)
    }

    pub fn read_from(
        mut reader: Box<dyn ContainerReader>,
        verify_crc: bool,
    ) -> PstResult<Self> {
        reader.seek(SeekFrom::Start(0)).map_err(NdbError::Io)?;
        let header = Header::read(&mut reader)?;
        let database = NodeDatabase::read(reader, header, verify_crc)?;

        let store = MessageStore::read(&database)?;
        let name_to_id = NameToIdMap::read(&database).unwrap_or_else(|err| {
            warn!(
                name: "NamedPropertyMapUnreadable",
                %err,
                "Continuing without the named-property map"
            );
            NameToIdMap::default()
        });

        Ok(Self {
            database,
            store,
            name_to_id,
        })
    }

    pub fn database(&self) -> &NodeDatabase {
        &self.database
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn name_to_id(&self) -> &NameToIdMap {
        &self.name_to_id
    }

    /// Depth-first folder traversal starting at the store's root folder.
    /// Folders that fail to parse are logged and skipped.
    pub fn folders(&self) -> Folders<'_> {
        Folders {
            pst: self,
            stack: Vec::new(),
            started: false,
        }
    }

    /// The messages of one folder, in content-table row order. Messages that
    /// fail to parse are logged and skipped.
    pub fn messages<'a>(&'a self, folder: &'a Folder) -> Messages<'a> {
        Messages {
            pst: self,
            submessages: folder.submessages().iter(),
        }
    }

    pub fn total_folder_count(&self) -> usize {
        self.folders().count()
    }

    pub fn total_message_count(&self) -> usize {
        self.folders()
            .map(|folder| folder.submessages().len())
            .sum()
    }

    pub fn total_attachment_count(&self) -> usize {
        self.folders()
            .map(|folder| {
                self.messages(&folder)
                    .filter(Message::has_attachments)
                    .map(|message| message.attachments().len())
                    .sum::<usize>()
            })
            .sum()
    }

    /// A one-line summary of the open container.
    pub fn status(&self) -> String {
        let header = self.database.header();
        format!(
            "Valid PST: true, Unicode: {}, CryptMethod: {:?}, Name: {}, Password: {:?}",
            !header.version().is_ansi(),
            header.crypt_method(),
            self.store.display_name().unwrap_or_default(),
            self.store.password_hash(),
        )
    }

    /// Write every by-value attachment in the store into `path`. With
    /// `overwrite` unset, name collisions get a `-N` suffix before the
    /// extension. Returns the number of attachments visited.
    pub fn export_all_attachments(&self, path: &Path, overwrite: bool) -> io::Result<usize> {
        let mut completed = 0;
        for folder in self.folders() {
            for message in self.messages(&folder) {
                if !message.has_attachments() {
                    continue;
                }
                for summary in message.attachments() {
                    let attachment = match message.fetch_attachment(&self.database, summary) {
                        Ok(attachment) => attachment,
                        Err(err) => {
                            warn!(
                                name: "AttachmentUnreadable",
                                filename = %summary.filename(),
                                %err,
                                "Skipping unreadable attachment"
                            );
                            continue;
                        }
                    };

                    if let Some(data) = attachment.data() {
                        if !data.is_empty() {
                            let filepath = path.join(attachment.filename());
                            let filepath = if overwrite {
                                if filepath.exists() {
                                    fs::remove_file(&filepath)?;
                                }
                                filepath
                            } else {
                                unused_filename(filepath)
                            };
                            fs::write(&filepath, data)?;
                        }
                    }
                    completed += 1;
                }
            }
        }
        Ok(completed)
    }

    /// Write each folder's messages into a flat text file named after the
    /// folder path, with path separators escaped to underscores. Returns the
    /// number of files written.
    pub fn export_all_messages(&self, path: &Path) -> io::Result<usize> {
        let mut completed = 0;
        for folder in self.folders() {
            let name = format!("{}.txt", folder.path().replace(['\\', '/'], "_"));
            let filepath = unused_filename(path.join(name));

            let mut text = String::new();
            for message in self.messages(&folder) {
                text.push_str(&format!(
                    "Subject: {}\nFrom: {} ({})\n",
                    message.subject().unwrap_or_default(),
                    message.sender_name().unwrap_or_default(),
                    message.sender_smtp_address().unwrap_or_default(),
                ));
                let to = message
                    .recipients()
                    .iter()
                    .map(|recipient| {
                        format!(
                            "{} ({})",
                            recipient.display_name().unwrap_or_default(),
                            recipient.email_address().unwrap_or_default()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("; ");
                text.push_str(&format!("To: {to}\n"));
                text.push_str(&format!(
                    "Sent: {}\nDelivered: {}\n",
                    format_time(message.client_submit_time()),
                    format_time(message.message_delivery_time()),
                ));
                text.push_str(&format!(
                    "MessageClass: {}\n",
                    message.message_class().unwrap_or_default()
                ));
                if message.has_attachments() {
                    let attachments = message
                        .attachments()
                        .iter()
                        .map(|summary| summary.filename())
                        .collect::<Vec<_>>()
                        .join(", ");
                    text.push_str(&format!("Attachments: {attachments}\n"));
                }
                text.push_str(&format!("\n{}\n\n\n", message.body().unwrap_or_default()));
            }

            if !text.is_empty() {
                fs::write(&filepath, text)?;
                completed += 1;
            }
        }
        Ok(completed)
    }

    /// Drop the container, releasing the file descriptor.
    pub fn close(self) {}
}

fn format_time(value: Option<props::time::FileTime>) -> String {
    value
        .and_then(|time| time.to_datetime())
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| String::from("None"))
}

/// Add a `-N` suffix before the extension until the name is unused.
fn unused_filename(filepath: PathBuf) -> PathBuf {
    if !filepath.exists() {
        return filepath;
    }

    let stem = filepath
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = filepath
        .extension()
        .map(|extension| extension.to_string_lossy().into_owned());
    let parent = filepath.parent().map(Path::to_path_buf).unwrap_or_default();

    for suffix in 1.. {
        let name = match &extension {
            Some(extension) => format!("{stem}-{suffix}.{extension}"),
            None => format!("{stem}-{suffix}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

/// Lazy depth-first folder enumeration; see [`PstFile::folders`].
pub struct Folders<'a> {
    pst: &'a PstFile,
    stack: Vec<SubFolder>,
    started: bool,
}

impl Iterator for Folders<'_> {
    type Item = Folder;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;

            let Some(root) = self.pst.store.root_entry_id() else {
                error!(
                    name: "RootFolderEntryIdMissing",
                    "The message store has no root folder EntryID"
                );
                return None;
            };

            match Folder::read(
                &self.pst.database,
                NodeId::from(root.node()),
                "",
                Some(&self.pst.store),
            ) {
                Ok(folder) => {
                    self.stack.extend(folder.subfolders().iter().cloned());
                    return Some(folder);
                }
                Err(err) => {
                    error!(
                        name: "RootFolderUnreadable",
                        %err,
                        "The root folder could not be read"
                    );
                    return None;
                }
            }
        }

        while let Some(sub_folder) = self.stack.pop() {
            match Folder::read(
                &self.pst.database,
                sub_folder.node(),
                sub_folder.parent_path(),
                Some(&self.pst.store),
            ) {
                Ok(folder) => {
                    self.stack.extend(folder.subfolders().iter().cloned());
                    return Some(folder);
                }
                Err(err) => {
                    warn!(
                        name: "FolderUnreadable",
                        folder = %sub_folder.name(),
                        %err,
                        "Skipping unreadable folder"
                    );
                }
            }
        }

        None
    }
}

/// Lazy message enumeration within one folder; see [`PstFile::messages`].
pub struct Messages<'a> {
    pst: &'a PstFile,
    submessages: std::slice::Iter<'a, SubMessage>,
}

impl Iterator for Messages<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Self::Item> {
        for sub_message in self.submessages.by_ref() {
            match Message::read(&self.pst.database, sub_message.node(), Some(&self.pst.store)) {
                Ok(message) => return Some(message),
                Err(err) => {
                    warn!(
                        name: "MessageUnreadable",
                        node = ?sub_message.node(),
                        %err,
                        "Skipping unreadable message"
                    );
                }
            }
        }
        None
    }
}

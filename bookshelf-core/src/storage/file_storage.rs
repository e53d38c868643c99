// bookshelf-core/src/storage/file_storage.rs
//! Single-file storage backend
//!
//! # File layout
//!
//! ```text
//! [0..64)   Header (bincode, zero padded)
//! [64..)    JSON payload: database name, creation time, collections
//! ```
//!
//! The header carries the payload length and its CRC32, so a torn or
//! foreign file is reported as corruption instead of being half-loaded.
//! Flushes write a sibling temp file, fsync it and rename it over the
//! database file.

use chrono::{DateTime, Utc};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{BookshelfError, Result};
use crate::storage::{CollectionData, CollectionSet, Storage};

pub const MAGIC: [u8; 8] = *b"BKSHELF\0";
pub const FORMAT_VERSION: u32 = 1;
/// Reserved header bytes; bincode needs 32 of them
pub const HEADER_SIZE: usize = 64;

/// Database file header
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Header {
    pub magic: [u8; 8],
    pub version: u32,
    pub payload_len: u64,
    pub checksum: u32,
    /// Unix timestamp (ms) of the flush that wrote the file
    pub written_at: i64,
}

impl Header {
    fn for_payload(payload: &[u8]) -> Self {
        Header {
            magic: MAGIC,
            version: FORMAT_VERSION,
            payload_len: payload.len() as u64,
            checksum: crc32fast::hash(payload),
            written_at: Utc::now().timestamp_millis(),
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = bincode::serialize(self)
            .map_err(|e| BookshelfError::Serialization(e.to_string()))?;
        if bytes.len() > HEADER_SIZE {
            return Err(BookshelfError::Serialization(format!(
                "Header is {} bytes, limit is {}",
                bytes.len(),
                HEADER_SIZE
            )));
        }
        bytes.resize(HEADER_SIZE, 0);
        Ok(bytes)
    }
}

/// Serialized database content
#[derive(Serialize, Deserialize)]
struct StoreImage {
    database: String,
    created_at: DateTime<Utc>,
    collections: Vec<CollectionData>,
}

/// File-based storage backend
///
/// The whole database is loaded on open and written back on [`flush`].
/// A path that does not exist yet opens as an empty database; the file
/// appears on the first flush.
///
/// [`flush`]: Storage::flush
pub struct FileStorage {
    path: PathBuf,
    database: String,
    created_at: DateTime<Utc>,
    collections: CollectionSet,
    dirty: bool,
}

impl FileStorage {
    /// Open an existing database file or start a new one at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let database = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let exists = path.exists();
        let image = if exists && fs::metadata(&path)?.len() > 0 {
            Some(Self::load(&path)?)
        } else {
            None
        };

        let storage = match image {
            Some(image) => {
                let mut collections = CollectionSet::new();
                for data in image.collections {
                    collections.insert(data);
                }
                FileStorage {
                    path,
                    database: image.database,
                    created_at: image.created_at,
                    collections,
                    dirty: false,
                }
            }
            None => FileStorage {
                path,
                database,
                created_at: Utc::now(),
                collections: CollectionSet::new(),
                dirty: false,
            },
        };

        tracing::debug!(
            path = %storage.path.display(),
            existing = exists,
            collections = storage.collections.names().len(),
            "opened database file"
        );
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Logical database name stored in the file; the file stem until set
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn set_database(&mut self, name: &str) {
        if self.database != name {
            self.database = name.to_string();
            self.dirty = true;
        }
    }

    fn load(path: &Path) -> Result<StoreImage> {
        let file = File::open(path)?;
        // SAFETY: the file is opened read-only and the map is dropped before
        // this function returns; writers replace the file by rename.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < HEADER_SIZE {
            return Err(BookshelfError::Corruption(format!(
                "File too short for header: {} bytes",
                mmap.len()
            )));
        }

        let header: Header = bincode::deserialize(&mmap[..HEADER_SIZE])?;
        if header.magic != MAGIC {
            return Err(BookshelfError::Corruption("Invalid magic number".into()));
        }
        if header.version != FORMAT_VERSION {
            return Err(BookshelfError::Corruption(format!(
                "Unsupported format version {}",
                header.version
            )));
        }

        let end = HEADER_SIZE as u64 + header.payload_len;
        if end > mmap.len() as u64 {
            return Err(BookshelfError::Corruption(format!(
                "Payload truncated: expected {} bytes, file has {}",
                end,
                mmap.len()
            )));
        }

        let payload = &mmap[HEADER_SIZE..end as usize];
        let actual = crc32fast::hash(payload);
        if actual != header.checksum {
            return Err(BookshelfError::Corruption(format!(
                "Checksum mismatch: stored {:08x}, computed {:08x}",
                header.checksum, actual
            )));
        }

        serde_json::from_slice(payload)
            .map_err(|e| BookshelfError::Corruption(format!("Invalid payload: {}", e)))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_image(&self) -> Result<()> {
        let image = StoreImage {
            database: self.database.clone(),
            created_at: self.created_at,
            collections: self
                .collections
                .names()
                .iter()
                .filter_map(|name| self.collections.get(name).cloned())
                .collect(),
        };
        let payload = serde_json::to_vec(&image)?;
        let header = Header::for_payload(&payload).encode()?;

        let tmp = self.temp_path();
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&header)?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            bytes = HEADER_SIZE + payload.len(),
            "flushed database file"
        );
        Ok(())
    }
}

impl Storage for FileStorage {
    fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    fn collections_mut(&mut self) -> &mut CollectionSet {
        self.dirty = true;
        &mut self.collections
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty && self.path.exists() {
            return Ok(());
        }
        self.write_image()?;
        self.dirty = false;
        Ok(())
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }
}

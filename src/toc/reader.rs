//! TOC sidecar decoding.
//!
//! Produces a read-only byte-offset → metadata map consumed during header
//! cleanup. A missing or unreadable sidecar is not an error: the mailbox
//! is converted without read/priority metadata.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use tracing::{debug, info, warn};

use crate::error::{ConvertError, Result};
use crate::toc::format::{MessageState, TocLayout};

/// Metadata for one message, keyed by its byte offset in the mailbox.
#[derive(Debug, Clone, Copy)]
pub struct TocRecord {
    /// Byte offset of the message start in the mailbox file.
    pub offset: u32,
    /// Message length in bytes. Unused downstream, kept for bounds checks.
    pub length: u32,
    /// Decoded status byte, if the bit pattern was recognized.
    pub status: Option<MessageState>,
    /// Priority on the 0–5 scale (0 = unset).
    pub priority: u8,
}

/// The decoded TOC index: offset → record.
#[derive(Debug, Default)]
pub struct TocIndex {
    records: HashMap<u32, TocRecord>,
    layout: Option<TocLayout>,
}

impl TocIndex {
    /// Load the TOC sidecar for a mailbox.
    ///
    /// Returns `Ok(None)` when the sidecar is absent or unreadable; the
    /// caller proceeds without metadata. Fails only on an unrecognized
    /// version word.
    ///
    /// `mailbox_len` is used to sanity-check record offsets; entries
    /// pointing past the end of the mailbox are kept but flagged, since
    /// the TOC is often stale relative to the mailbox.
    pub fn load(toc_path: &Path, mailbox_len: u64) -> Result<Option<Self>> {
        let data = match std::fs::read(toc_path) {
            Ok(d) => d,
            Err(e) => {
                info!(
                    path = %toc_path.display(),
                    error = %e,
                    "No TOC index available; converting without read/priority metadata"
                );
                return Ok(None);
            }
        };
        Self::decode(&data, mailbox_len)
            .map(Some)
            .map_err(|version| ConvertError::UnsupportedIndexFormat {
                path: toc_path.to_path_buf(),
                version,
            })
    }

    /// Decode a complete TOC byte image.
    ///
    /// On unknown version the raw version word is returned as the error.
    pub fn decode(data: &[u8], mailbox_len: u64) -> std::result::Result<Self, u16> {
        if data.len() < 2 {
            warn!("TOC file shorter than its version word");
            return Ok(Self::default());
        }
        let version = u16::from(data[0]) << 8 | u16::from(data[1]);
        let layout = TocLayout::from_version(version).ok_or(version)?;

        let folder_size = layout.folder_header_size();
        if data.len() < folder_size {
            warn!(version = format!("0x{version:04x}"), "TOC folder header truncated");
            return Ok(Self {
                records: HashMap::new(),
                layout: Some(layout),
            });
        }

        let mut records = HashMap::new();
        let entry_size = layout.entry_size();
        let mut pos = folder_size;

        // A short trailing record ends the scan cleanly; Eudora truncates
        // TOC files mid-entry on crash.
        while pos + entry_size <= data.len() {
            let entry = &data[pos..pos + entry_size];
            let record = decode_entry(layout, entry);

            if u64::from(record.offset) + u64::from(record.length) > mailbox_len {
                debug!(
                    offset = record.offset,
                    length = record.length,
                    "TOC entry extends past end of mailbox"
                );
            }
            records.insert(record.offset, record);
            pos += entry_size;
        }

        Ok(Self {
            records,
            layout: Some(layout),
        })
    }

    /// Look up the record for a message at the given mailbox byte offset.
    pub fn record_at(&self, offset: u64) -> Option<&TocRecord> {
        u32::try_from(offset).ok().and_then(|o| self.records.get(&o))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn layout(&self) -> Option<TocLayout> {
        self.layout
    }
}

/// Decode one fixed-size entry record.
fn decode_entry(layout: TocLayout, entry: &[u8]) -> TocRecord {
    let mut cur = Cursor::new(entry);
    let (offset, length) = match layout {
        TocLayout::Mac => (
            cur.read_u32::<BigEndian>().unwrap_or(0),
            cur.read_u32::<BigEndian>().unwrap_or(0),
        ),
        TocLayout::Windows => (
            cur.read_u32::<LittleEndian>().unwrap_or(0),
            cur.read_u32::<LittleEndian>().unwrap_or(0),
        ),
    };
    let status_raw = entry[12];
    let priority_raw = entry[layout.priority_pos()];

    TocRecord {
        offset,
        length,
        status: layout.decode_status(status_raw),
        priority: layout.decode_priority(priority_raw),
    }
}

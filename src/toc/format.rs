//! Fixed binary layouts of the legacy Eudora TOC file.
//!
//! The first two bytes of the file are a version word, read big-endian.
//! Two incompatible layouts exist:
//!
//! ```text
//! Mac (version & 0x00FF != 0, or version == 0):
//! ┌──────────────────────────────────────┐
//! │ FOLDER HEADER (278 bytes, skipped)   │
//! ├──────────────────────────────────────┤
//! │ ENTRY (220 bytes each)               │
//! │   0..4    offset   u32 big-endian    │
//! │   4..8    length   u32 big-endian    │
//! │   12      status   u8 bitfield       │
//! │   62      priority u8, stored ×40    │
//! ├──────────────────────────────────────┤
//! │ … more entries until EOF             │
//! └──────────────────────────────────────┘
//!
//! Windows (version & 0xFF00 != 0):
//! ┌──────────────────────────────────────┐
//! │ FOLDER HEADER (104 bytes, skipped)   │
//! ├──────────────────────────────────────┤
//! │ ENTRY (218 bytes each)               │
//! │   0..4    offset   u32 little-endian │
//! │   4..8    length   u32 little-endian │
//! │   12      status   u8                │
//! │   16      priority u8, stored as-is  │
//! └──────────────────────────────────────┘
//! ```
//!
//! Remaining entry bytes hold window geometry, truncated To/Subject
//! strings and other client-side state we do not need. Large regions of
//! the structure are rewritten with uninitialized memory on every save,
//! so nothing outside the documented fields can be trusted.

/// Which of the two on-disk layouts a TOC file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocLayout {
    /// Mac Eudora (Lite 3.x = 0x0001, 1.3.1 = 0x0000). Big-endian fields.
    Mac,
    /// Windows Eudora (Lite 1.x = 0x2a00, Pro 5 = 0x3000). Little-endian fields.
    Windows,
}

impl TocLayout {
    /// Probe the layout from the version word.
    ///
    /// The version looks meaningful in hex but not as an integer; the only
    /// reliable signal is which byte is populated. Version 0 is Mac by
    /// convention (Mac Eudora Lite 1.3.1 wrote all-zero versions).
    pub fn from_version(version: u16) -> Option<Self> {
        if version & 0x00FF != 0 || version == 0 {
            Some(Self::Mac)
        } else if version & 0xFF00 != 0 {
            Some(Self::Windows)
        } else {
            None
        }
    }

    /// Size of the folder header record, skipped before the entries.
    pub fn folder_header_size(self) -> usize {
        match self {
            Self::Mac => 278,
            Self::Windows => 104,
        }
    }

    /// Size of one message entry record.
    pub fn entry_size(self) -> usize {
        match self {
            Self::Mac => 220,
            Self::Windows => 218,
        }
    }

    /// Byte position of the priority field within an entry.
    pub fn priority_pos(self) -> usize {
        match self {
            Self::Mac => 62,
            Self::Windows => 16,
        }
    }

    /// Decode the raw priority byte into the 0–5 scale.
    ///
    /// Mac stores `0, 40, 80, 120, 160, 200` (unset, Hi, MedHi, Norm,
    /// MedLo, Lo); Windows stores the small integer directly.
    pub fn decode_priority(self, raw: u8) -> u8 {
        match self {
            Self::Mac => raw / 40,
            Self::Windows => raw,
        }
    }

    /// Decode the status byte into the message state it records.
    pub fn decode_status(self, raw: u8) -> Option<MessageState> {
        match self {
            Self::Mac => match raw {
                0x1 => Some(MessageState::Unread),
                0x2 => Some(MessageState::Read),
                0x3 => Some(MessageState::Replied),
                0x4 => Some(MessageState::Redirected),
                0x8 => Some(MessageState::Forwarded),
                0x9 => Some(MessageState::Sent),
                0xa => Some(MessageState::Unsent),
                _ => None,
            },
            Self::Windows => match raw {
                0x1 => Some(MessageState::Unread),
                0x2 => Some(MessageState::Replied),
                0x3 => Some(MessageState::Forwarded),
                0x4 => Some(MessageState::Redirected),
                0x5 => Some(MessageState::Rebuilt),
                0x6 => Some(MessageState::Saved),
                0x7 => Some(MessageState::Queued),
                0x8 => Some(MessageState::Sent),
                0x9 => Some(MessageState::Unsent),
                0xa => Some(MessageState::TimeQueued),
                _ => None,
            },
        }
    }

    /// The `Status:` header characters a state contributes under this
    /// layout.
    ///
    /// `O` = downloaded from server, `R` = read. Unread messages were
    /// popped but never opened, so they only get `O`. The two clients
    /// disagree on sent mail: Mac marks it read, Windows records nothing.
    /// States that say nothing about read status contribute no characters.
    pub fn status_chars(self, state: MessageState) -> &'static str {
        match state {
            MessageState::Unread => "O",
            MessageState::Read
            | MessageState::Replied
            | MessageState::Redirected
            | MessageState::Forwarded => "OR",
            MessageState::Sent => match self {
                Self::Mac => "OR",
                Self::Windows => "",
            },
            MessageState::Unsent
            | MessageState::Rebuilt
            | MessageState::Saved
            | MessageState::Queued
            | MessageState::TimeQueued => "",
        }
    }
}

/// Per-message state recorded in the TOC status byte.
///
/// The first column of the Eudora mailbox window: `*` unread/unsent,
/// blank read/sent, `D` redirected, `F` forwarded (or `S` outgoing).
/// See RFC 2076 for the `Status:` header these map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Unread,
    Read,
    Replied,
    Redirected,
    Forwarded,
    Sent,
    Unsent,
    Rebuilt,
    Saved,
    Queued,
    TimeQueued,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_probe() {
        assert_eq!(TocLayout::from_version(0x0001), Some(TocLayout::Mac));
        assert_eq!(TocLayout::from_version(0x0000), Some(TocLayout::Mac));
        assert_eq!(TocLayout::from_version(0x2a00), Some(TocLayout::Windows));
        assert_eq!(TocLayout::from_version(0x3000), Some(TocLayout::Windows));
    }

    #[test]
    fn test_mac_priority_scale() {
        assert_eq!(TocLayout::Mac.decode_priority(0), 0);
        assert_eq!(TocLayout::Mac.decode_priority(40), 1);
        assert_eq!(TocLayout::Mac.decode_priority(200), 5);
        assert_eq!(TocLayout::Windows.decode_priority(2), 2);
    }

    #[test]
    fn test_status_chars() {
        assert_eq!(TocLayout::Mac.status_chars(MessageState::Unread), "O");
        assert_eq!(TocLayout::Mac.status_chars(MessageState::Read), "OR");
        assert_eq!(TocLayout::Mac.status_chars(MessageState::Sent), "OR");
        assert_eq!(TocLayout::Windows.status_chars(MessageState::Queued), "");
    }

    #[test]
    fn test_windows_outgoing_states_contribute_no_status() {
        for raw in 0x5..=0xa {
            let state = TocLayout::Windows.decode_status(raw).unwrap();
            assert_eq!(
                TocLayout::Windows.status_chars(state),
                "",
                "windows status 0x{raw:x} must contribute no Status chars"
            );
        }
    }
}

//! Reply detection: first pass over the mailbox stream.
//!
//! The destination client marks a message as answered via `X-Status: A`,
//! but Eudora records the relationship on the *reply* side only
//! (`In-Reply-To:`). So before any message is converted, one forward scan
//! collects every referenced message identifier; cleanup later checks each
//! message's `Message-ID:` against this set.
//!
//! Replies living in a different mailbox are invisible to this scan.

use std::collections::HashSet;
use std::io::{BufRead, Seek};

use crate::error::{ConvertError, Result};
use crate::parser::mbx::{decode_line, is_message_start, strip_line_ending};

/// Message identifiers referenced by some `In-Reply-To:` header anywhere
/// in the mailbox. Built once, read-only afterward.
#[derive(Debug, Default)]
pub struct ReplySet {
    replies: HashSet<String>,
}

impl ReplySet {
    /// Scan the whole stream, then rewind it to offset 0 so the
    /// segmentation pass can consume the same reader.
    pub fn scan<R: BufRead + Seek>(reader: &mut R) -> Result<Self> {
        let mut set = Self::default();
        let mut in_headers = false;
        let mut buf = Vec::with_capacity(4096);

        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            let line = decode_line(&buf);
            if is_message_start(&line) {
                in_headers = true;
            } else if in_headers {
                let line = strip_line_ending(&line);
                if line.is_empty() {
                    in_headers = false;
                } else if let Some(rest) = line.strip_prefix("In-Reply-To:") {
                    set.insert(rest.trim());
                }
            }
        }

        reader.rewind().map_err(ConvertError::from)?;
        Ok(set)
    }

    pub fn insert(&mut self, message_id: &str) {
        self.replies.insert(message_id.to_string());
    }

    /// True iff the trimmed, non-empty id was referenced by some reply.
    pub fn message_was_answered(&self, message_id: &str) -> bool {
        let id = message_id.trim();
        !id.is_empty() && self.replies.contains(id)
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MBX: &str = "\
From ???@??? Thu Jan 03 11:42:42 2002\n\
Message-ID: <first@example.com>\n\
Subject: original\n\
\n\
body one\n\
From ???@??? Fri Jan 04 09:00:00 2002\n\
In-Reply-To: <first@example.com>\n\
Subject: the reply\n\
\n\
body two\n";

    #[test]
    fn test_collects_in_reply_to_and_rewinds() {
        let mut cur = Cursor::new(MBX.as_bytes());
        let set = ReplySet::scan(&mut cur).unwrap();
        assert!(set.message_was_answered("<first@example.com>"));
        assert!(!set.message_was_answered("<other@example.com>"));
        assert_eq!(cur.position(), 0);
    }

    #[test]
    fn test_in_reply_to_in_body_ignored() {
        let mbx = "\
From ???@??? Thu Jan 03 11:42:42 2002\n\
Subject: s\n\
\n\
In-Reply-To: <body@example.com>\n";
        let mut cur = Cursor::new(mbx.as_bytes());
        let set = ReplySet::scan(&mut cur).unwrap();
        assert!(!set.message_was_answered("<body@example.com>"));
    }

    #[test]
    fn test_empty_id_never_answered() {
        let mut set = ReplySet::default();
        set.insert("");
        assert!(!set.message_was_answered(""));
        assert!(!set.message_was_answered("   "));
    }
}

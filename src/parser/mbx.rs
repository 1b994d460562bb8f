//! Streaming Eudora mailbox segmentation.
//!
//! Walks the raw byte stream line by line, recognizes message-start
//! separator lines, accumulates the header block into a [`HeaderModel`],
//! runs header cleanup at the header/body boundary, and hands off one
//! [`ParsedMessage`] per message. Tolerant of malformed input: a new
//! separator inside an unterminated header block force-finalizes the
//! previous message instead of aborting.

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;

use crate::context::ConversionContext;
use crate::error::Result;
use crate::parser::header::{HeaderModel, LineOutcome, FROM_PSEUDO_KEY};
use crate::parser::replies::ReplySet;
use crate::toc::TocIndex;

/// Message-start grammar: `From` plus Eudora's date/time payload.
///
/// Anchored on the date pattern rather than `From ` alone, so ordinary
/// body lines starting with "From" don't split messages.
static MESSAGE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^From\s*\S+?\s*\S{3}\s+\S{3}\s+\d{1,2}\s*\d{2}:\d{2}:\d{2}\s+\d{4}\s*([+-]\d{4})?",
    )
    .expect("message start pattern")
});

/// Attachment descriptor line. Mac Eudora writes "Attachment converted",
/// Windows "Attachment Converted".
static ATTACHMENT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Attachment converted:\s*(.*?)\s*$").expect("attachment pattern"));

/// Embedded-content declaration line (inline images referenced by cid).
static EMBEDDED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Embedded content:\s*(.*?)\s*$").expect("embedded pattern"));

/// Check whether a line opens a new message.
///
/// Lines beginning with the 5-character sequence `Find ` are excluded,
/// a quirk of the source format kept to avoid false positives on body
/// text resembling the marker.
pub fn is_message_start(line: &str) -> bool {
    !line.starts_with("Find ") && MESSAGE_START.is_match(line)
}

/// Decode a raw mailbox line: UTF-8 when valid, Windows-1252 otherwise
/// (which accepts every byte, so decoding never fails).
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Strip every trailing CR and LF, so DOS line endings become Unix.
pub fn strip_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// One fully segmented message, ready for attachment resolution and
/// assembly. Consumed exactly once.
#[derive(Debug)]
pub struct ParsedMessage {
    /// Byte offset of the separator line in the mailbox (TOC lookup key).
    pub offset: u64,
    /// Cleaned header set (cleanup ran at the header/body boundary).
    pub headers: HeaderModel,
    /// Body lines, end-of-line normalized.
    pub body: Vec<String>,
    /// Raw attachment descriptor lines diverted from the body.
    pub attachment_lines: Vec<String>,
    /// Declared embedded-file references diverted from the body.
    pub embedded_files: Vec<String>,
    /// Body (or original markup) contained HTML-marker tags.
    pub is_html: bool,
}

impl ParsedMessage {
    fn new(offset: u64) -> Self {
        Self {
            offset,
            headers: HeaderModel::new(),
            body: Vec::new(),
            attachment_lines: Vec::new(),
            embedded_files: Vec::new(),
            is_html: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    InHeaders,
    InBody,
}

/// The segmentation state machine.
///
/// Holds read-only references to the TOC index and reply set so header
/// cleanup can run as soon as a header block closes.
pub struct Segmenter<'a> {
    toc: Option<&'a TocIndex>,
    replies: &'a ReplySet,
    /// Divert attachment descriptor lines out of the body. Off when no
    /// attachments root was configured; the lines then stay body text.
    divert_attachments: bool,
}

impl<'a> Segmenter<'a> {
    pub fn new(toc: Option<&'a TocIndex>, replies: &'a ReplySet) -> Self {
        Self {
            toc,
            replies,
            divert_attachments: false,
        }
    }

    pub fn divert_attachments(mut self, divert: bool) -> Self {
        self.divert_attachments = divert;
        self
    }

    /// Drive the full segmentation pass, invoking `on_message` for every
    /// message found. Returns the number of messages.
    pub fn run<R: BufRead>(
        &self,
        mut reader: R,
        ctx: &mut ConversionContext,
        mut on_message: impl FnMut(ParsedMessage, &mut ConversionContext),
    ) -> Result<u64> {
        let mut count: u64 = 0;
        let mut current_offset: u64 = 0;
        let mut current: Option<(ParsedMessage, State)> = None;
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let n = reader.read_until(b'\n', &mut line_buf)?;
            if n == 0 {
                break;
            }
            ctx.line_no += 1;
            let raw = decode_line(&line_buf);

            if is_message_start(&raw) {
                if let Some((mut msg, state)) = current.take() {
                    if state == State::InHeaders {
                        // Previous message had no blank line after its
                        // headers; finalize it anyway.
                        ctx.error("Message start found inside message");
                        msg.headers.clean(self.toc, msg.offset, self.replies, ctx);
                    }
                    on_message(msg, ctx);
                    count += 1;
                }

                ctx.msg_no += 1;
                let mut msg = ParsedMessage::new(current_offset);
                let rest = strip_line_ending(&raw);
                msg.headers
                    .add(FROM_PSEUDO_KEY, rest.get(5..).unwrap_or("").trim());
                current = Some((msg, State::InHeaders));
            } else if let Some((msg, state)) = current.as_mut() {
                match state {
                    State::InHeaders => {
                        let stripped = strip_line_ending(&raw);
                        if raw.starts_with(' ') || raw.starts_with('\t') {
                            // Header folding (RFC 5322 §2.2.3).
                            msg.headers.append_to_last(stripped);
                        } else if stripped.trim().is_empty() {
                            // Blank line closes the header block.
                            msg.headers.clean(self.toc, msg.offset, self.replies, ctx);
                            *state = State::InBody;
                        } else if msg.headers.add_line(stripped, ctx) == LineOutcome::NotHeader {
                            // Not header-shaped: the header block was never
                            // properly terminated. Treat the rest as body.
                            msg.headers.clean(self.toc, msg.offset, self.replies, ctx);
                            *state = State::InBody;
                            self.body_line(msg, stripped, ctx);
                        }
                    }
                    State::InBody => {
                        self.body_line(msg, strip_line_ending(&raw), ctx);
                    }
                }
            }
            // Lines before the first separator are preamble; skipped.

            current_offset += n as u64;
        }

        // Flush the still-open message at end of stream.
        if let Some((mut msg, state)) = current.take() {
            if state == State::InHeaders {
                ctx.error("end of file inside message headers");
                msg.headers.clean(self.toc, msg.offset, self.replies, ctx);
            }
            on_message(msg, ctx);
            count += 1;
        }

        if ctx.line_no == 0 {
            ctx.warn("empty file");
        } else if count == 0 {
            ctx.error("no messages (not a Eudora mailbox file?)");
        }

        Ok(count)
    }

    /// Classify one body line: attachment descriptor, embedded-content
    /// declaration, or plain body text.
    fn body_line(&self, msg: &mut ParsedMessage, line: &str, ctx: &mut ConversionContext) {
        if self.divert_attachments {
            if let Some(c) = ATTACHMENT_LINE.captures(line) {
                ctx.attachments_listed += 1;
                msg.attachment_lines.push(c[1].to_string());
                return;
            }
            if let Some(c) = EMBEDDED_LINE.captures(line) {
                msg.embedded_files.push(c[1].to_string());
                return;
            }
        }
        let lower = line.to_lowercase();
        if lower.contains("<html") || lower.contains("<x-html") {
            msg.is_html = true;
        }
        msg.body.push(line.to_string());
    }
}

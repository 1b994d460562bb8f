//! Mailbox container writing.
//!
//! The conversion core hands each [`AssembledMessage`] to a
//! [`MailboxSink`] in message order and never touches the container
//! format itself. One concrete sink exists: a plain mbox file writer.
//! Other container families (maildir, MH, MMDF, Babyl) would implement
//! the same trait.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::assemble::{AssembledMessage, MessagePart};
use crate::error::{ConvertError, Result};

/// Base64 body lines wrap at the MIME-conventional width.
const BASE64_LINE_WIDTH: usize = 76;

/// Where assembled messages go, one `add` per message, in order.
pub trait MailboxSink {
    fn add(&mut self, message: &AssembledMessage) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Writes messages to a single mbox file with LF line endings.
pub struct MboxFileSink {
    path: PathBuf,
    out: BufWriter<File>,
    /// Monotonic counter keeping multipart boundaries unique per file.
    boundary_seq: u64,
}

impl MboxFileSink {
    /// Create (truncating) the output file. Failure here is fatal for the
    /// whole mailbox conversion.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
        debug!(path = %path.display(), "opened mbox sink");
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
            boundary_seq: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_boundary(&mut self) -> String {
        self.boundary_seq += 1;
        format!("=-eudoraconv-{:08}", self.boundary_seq)
    }

    fn write_part(&mut self, part: &MessagePart) -> std::io::Result<()> {
        match part {
            MessagePart::Text { content_type, body } => {
                writeln!(self.out, "Content-Type: {content_type}")?;
                writeln!(self.out)?;
                writeln!(self.out, "{body}")?;
            }
            MessagePart::Multipart { subtype, parts } => {
                let boundary = self.next_boundary();
                writeln!(self.out, "MIME-Version: 1.0")?;
                writeln!(
                    self.out,
                    "Content-Type: multipart/{subtype}; boundary=\"{boundary}\""
                )?;
                writeln!(self.out)?;
                for inner in parts {
                    writeln!(self.out, "--{boundary}")?;
                    self.write_part(inner)?;
                }
                writeln!(self.out, "--{boundary}--")?;
            }
            MessagePart::Attachment(att) => {
                writeln!(
                    self.out,
                    "Content-Type: {}/{}; name=\"{}\"",
                    att.mime_type, att.mime_subtype, att.display_name
                )?;
                writeln!(self.out, "Content-Transfer-Encoding: base64")?;
                match &att.content_id {
                    Some(cid) => {
                        writeln!(self.out, "Content-Disposition: inline")?;
                        writeln!(self.out, "Content-ID: <{cid}>")?;
                    }
                    None => writeln!(
                        self.out,
                        "Content-Disposition: attachment; filename=\"{}\"",
                        att.display_name
                    )?,
                }
                writeln!(self.out)?;
                let encoded = STANDARD.encode(&att.content);
                for chunk in encoded.as_bytes().chunks(BASE64_LINE_WIDTH) {
                    self.out.write_all(chunk)?;
                    writeln!(self.out)?;
                }
            }
            MessagePart::Enclosed(inner) => {
                writeln!(self.out, "Content-Type: message/rfc822")?;
                writeln!(self.out)?;
                for (name, value) in &inner.headers {
                    writeln!(self.out, "{name} {value}")?;
                }
                self.write_part(&inner.part)?;
            }
        }
        Ok(())
    }
}

impl MailboxSink for MboxFileSink {
    fn add(&mut self, message: &AssembledMessage) -> Result<()> {
        let write = |sink: &mut Self| -> std::io::Result<()> {
            writeln!(sink.out, "From {}", message.from_line)?;
            for (name, value) in &message.headers {
                writeln!(sink.out, "{name} {value}")?;
            }
            sink.write_part(&message.part)?;
            // Blank separator before the next message.
            writeln!(sink.out)?;
            Ok(())
        };
        write(self).map_err(|e| ConvertError::io(&self.path, e))
    }

    fn close(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| ConvertError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attach::ResolvedAttachment;

    fn read_back(sink: MboxFileSink) -> String {
        let path = sink.path().to_path_buf();
        drop(sink);
        std::fs::read_to_string(path).unwrap()
    }

    fn text_message(body: &str) -> AssembledMessage {
        AssembledMessage {
            from_line: "alice@example.com Thu, 03 Jan 2002 11:42:42".to_string(),
            headers: vec![("Subject:".to_string(), "test".to_string())],
            part: MessagePart::Text {
                content_type: "text/plain".to_string(),
                body: body.to_string(),
            },
        }
    }

    #[test]
    fn test_plain_message_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.mbox");
        let mut sink = MboxFileSink::create(&path).unwrap();
        sink.add(&text_message("hello")).unwrap();
        sink.close().unwrap();
        let written = read_back(sink);
        assert!(written.starts_with("From alice@example.com Thu, 03 Jan 2002 11:42:42\n"));
        assert!(written.contains("Subject: test\n"));
        assert!(written.contains("\n\nhello\n"));
    }

    #[test]
    fn test_multipart_boundaries_balanced() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.mbox");
        let mut sink = MboxFileSink::create(&path).unwrap();
        let msg = AssembledMessage {
            from_line: "a@b.c Thu, 03 Jan 2002 11:42:42".to_string(),
            headers: Vec::new(),
            part: MessagePart::Multipart {
                subtype: "mixed".to_string(),
                parts: vec![
                    MessagePart::Text {
                        content_type: "text/plain".to_string(),
                        body: "body".to_string(),
                    },
                    MessagePart::Attachment(ResolvedAttachment {
                        display_name: "a.pdf".to_string(),
                        path: PathBuf::from("a.pdf"),
                        mime_type: "application".to_string(),
                        mime_subtype: "pdf".to_string(),
                        content: b"12345".to_vec(),
                        content_id: None,
                    }),
                ],
            },
        };
        sink.add(&msg).unwrap();
        sink.close().unwrap();
        let written = read_back(sink);
        assert_eq!(written.matches("--=-eudoraconv-00000001").count(), 3);
        assert!(written.ends_with("--=-eudoraconv-00000001--\n\n"));
        assert!(written.contains("Content-Disposition: attachment; filename=\"a.pdf\""));
        assert!(written.contains("MTIzNDU="));
    }

    #[test]
    fn test_inline_attachment_gets_content_id() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.mbox");
        let mut sink = MboxFileSink::create(&path).unwrap();
        let msg = AssembledMessage {
            from_line: "a@b.c Thu, 03 Jan 2002 11:42:42".to_string(),
            headers: Vec::new(),
            part: MessagePart::Multipart {
                subtype: "mixed".to_string(),
                parts: vec![MessagePart::Attachment(ResolvedAttachment {
                    display_name: "logo.png".to_string(),
                    path: PathBuf::from("logo.png"),
                    mime_type: "image".to_string(),
                    mime_subtype: "png".to_string(),
                    content: b"img".to_vec(),
                    content_id: Some("logo@host".to_string()),
                })],
            },
        };
        sink.add(&msg).unwrap();
        sink.close().unwrap();
        let written = read_back(sink);
        assert!(written.contains("Content-Disposition: inline"));
        assert!(written.contains("Content-ID: <logo@host>"));
    }
}

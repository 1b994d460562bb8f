//! Message assembly: cleaned headers + body + resolved parts into the
//! structured object handed to the mailbox sink.
//!
//! Structure is a tagged variant rather than disposition sniffing, and
//! promotion (a leaf gaining attachments becomes a multipart envelope) is
//! a pure function over that variant.

use crate::attach::ResolvedAttachment;
use crate::context::ConversionContext;
use crate::parser::header::{HeaderModel, LineOutcome, FROM_PSEUDO_KEY};
use crate::parser::mbx::ParsedMessage;

/// The MIME structure of an outgoing message.
#[derive(Debug)]
pub enum MessagePart {
    /// A single text payload with its content type.
    Text { content_type: String, body: String },
    /// A multipart envelope.
    Multipart { subtype: String, parts: Vec<MessagePart> },
    /// A resolved attachment (inline when it carries a content id).
    Attachment(ResolvedAttachment),
    /// An enclosed message/rfc822 part.
    Enclosed(Box<AssembledMessage>),
}

impl MessagePart {
    /// Fold extra parts into the structure: a leaf is promoted to a
    /// `multipart/mixed` envelope, an existing envelope just grows.
    pub fn promote_with(self, extra: Vec<MessagePart>) -> MessagePart {
        if extra.is_empty() {
            return self;
        }
        match self {
            MessagePart::Multipart { subtype, mut parts } => {
                parts.extend(extra);
                MessagePart::Multipart { subtype, parts }
            }
            leaf => {
                let mut parts = vec![leaf];
                parts.extend(extra);
                MessagePart::Multipart {
                    subtype: "mixed".to_string(),
                    parts,
                }
            }
        }
    }
}

/// A message ready for [`crate::sink::MailboxSink::add`]: the separator
/// line, the emitted headers in original order and case, and the MIME
/// structure.
#[derive(Debug)]
pub struct AssembledMessage {
    pub from_line: String,
    pub headers: Vec<(String, String)>,
    pub part: MessagePart,
}

/// Combine one segmented message with its resolved attachments and
/// embedded parts.
pub fn assemble(
    msg: ParsedMessage,
    attachments: Vec<ResolvedAttachment>,
    ctx: &mut ConversionContext,
) -> AssembledMessage {
    let content_type = msg
        .headers
        .get_value("Content-Type:")
        .map(str::to_string);
    let has_attachment_list = msg.headers.get_value("X-Attachments:").is_some();

    let from_line = msg
        .headers
        .get_value(FROM_PSEUDO_KEY)
        .unwrap_or_default()
        .to_string();
    let headers = copied_headers(&msg.headers);

    let body_text = msg.body.join("\n");
    let body_type = if msg.is_html { "text/html" } else { "text/plain" };

    let part = match structure_class(content_type.as_deref(), has_attachment_list) {
        StructureClass::Enclosed => {
            let inner = assemble_enclosed(&msg.body, ctx);
            MessagePart::Multipart {
                subtype: "mixed".to_string(),
                parts: vec![MessagePart::Enclosed(Box::new(inner))],
            }
        }
        StructureClass::Plain(declared) => MessagePart::Text {
            content_type: declared.unwrap_or_else(|| body_type.to_string()),
            body: body_text,
        },
        StructureClass::Multipart(subtype) => MessagePart::Multipart {
            subtype,
            parts: vec![MessagePart::Text {
                content_type: body_type.to_string(),
                body: body_text,
            }],
        },
    };

    // Attachments always force a multipart envelope, whatever the
    // declared type said.
    let extra: Vec<MessagePart> = attachments.into_iter().map(MessagePart::Attachment).collect();
    AssembledMessage {
        from_line,
        headers,
        part: part.promote_with(extra),
    }
}

enum StructureClass {
    /// Single text payload; carries the declared content type if any.
    Plain(Option<String>),
    /// Multipart envelope with the given subtype.
    Multipart(String),
    /// The body is itself a message (message/rfc822).
    Enclosed,
}

fn structure_class(content_type: Option<&str>, has_attachment_list: bool) -> StructureClass {
    match content_type {
        None if has_attachment_list => StructureClass::Multipart("mixed".to_string()),
        None => StructureClass::Plain(None),
        Some(ct) => {
            let main = ct.split(';').next().unwrap_or(ct).trim();
            if main.eq_ignore_ascii_case("message/rfc822") {
                StructureClass::Enclosed
            } else if let Some(rest) = strip_type_prefix(main, "multipart/") {
                let subtype = if rest.is_empty() {
                    "mixed".to_string()
                } else {
                    rest.to_lowercase()
                };
                StructureClass::Multipart(subtype)
            } else {
                StructureClass::Plain(Some(ct.to_string()))
            }
        }
    }
}

fn strip_type_prefix<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    match value.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&value[prefix.len()..]),
        _ => None,
    }
}

/// Re-run header/body extraction over the enclosed text of a
/// message/rfc822 body and assemble it as an inner message, classifying
/// the inner content type the same way as a top-level body (an enclosed
/// message can itself be multipart or carry another enclosure). The
/// enclosed headers are taken as-is; the full cleanup pipeline only
/// applies to top-level messages, which own a separator line.
fn assemble_enclosed(body: &[String], ctx: &mut ConversionContext) -> AssembledMessage {
    let mut headers = HeaderModel::new();
    let mut inner_body: Vec<String> = Vec::new();
    let mut in_headers = true;

    for line in body {
        if in_headers {
            if line.trim().is_empty() {
                in_headers = false;
            } else if line.starts_with(' ') || line.starts_with('\t') {
                headers.append_to_last(line);
            } else if headers.add_line(line, ctx) == LineOutcome::NotHeader {
                in_headers = false;
                inner_body.push(line.clone());
            }
        } else {
            inner_body.push(line.clone());
        }
    }

    let content_type = headers.get_value("Content-Type:").map(str::to_string);
    let body_text = inner_body.join("\n");
    let part = match structure_class(content_type.as_deref(), false) {
        StructureClass::Enclosed => {
            let inner = assemble_enclosed(&inner_body, ctx);
            MessagePart::Enclosed(Box::new(inner))
        }
        StructureClass::Plain(declared) => MessagePart::Text {
            content_type: declared.unwrap_or_else(|| "text/plain".to_string()),
            body: body_text,
        },
        StructureClass::Multipart(subtype) => MessagePart::Multipart {
            subtype,
            parts: vec![MessagePart::Text {
                content_type: "text/plain".to_string(),
                body: body_text,
            }],
        },
    };
    AssembledMessage {
        from_line: String::new(),
        headers: copied_headers(&headers),
        part,
    }
}

/// Copy every header except the separator pseudo-key and `Content-Type:`
/// (whose value travels through the MIME structure). Commented-duplicate
/// `>` prefixes pass through verbatim.
fn copied_headers(headers: &HeaderModel) -> Vec<(String, String)> {
    headers
        .fields()
        .filter(|(name, _)| {
            let lower = name.to_lowercase();
            lower != FROM_PSEUDO_KEY.to_lowercase() && lower != "content-type:"
        })
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> (tempfile::TempDir, ConversionContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ConversionContext::new(&dir.path().join("Test.mbx"));
        (dir, ctx)
    }

    fn parsed(headers: &[(&str, &str)], body: &[&str], is_html: bool) -> ParsedMessage {
        let mut msg = ParsedMessage {
            offset: 0,
            headers: HeaderModel::new(),
            body: body.iter().map(|s| s.to_string()).collect(),
            attachment_lines: Vec::new(),
            embedded_files: Vec::new(),
            is_html,
        };
        for (k, v) in headers {
            msg.headers.add(k, v);
        }
        msg
    }

    fn fake_attachment(name: &str) -> ResolvedAttachment {
        ResolvedAttachment {
            display_name: name.to_string(),
            path: std::path::PathBuf::from(name),
            mime_type: "application".to_string(),
            mime_subtype: "pdf".to_string(),
            content: b"data".to_vec(),
            content_id: None,
        }
    }

    #[test]
    fn test_plain_text_class() {
        let (_tmp, mut ctx) = ctx();
        let msg = parsed(&[("Subject:", "hi")], &["hello"], false);
        let out = assemble(msg, Vec::new(), &mut ctx);
        match out.part {
            MessagePart::Text { content_type, body } => {
                assert_eq!(content_type, "text/plain");
                assert_eq!(body, "hello");
            }
            other => panic!("expected text part, got {other:?}"),
        }
    }

    #[test]
    fn test_attachment_list_header_anticipates_multipart() {
        let (_tmp, mut ctx) = ctx();
        let msg = parsed(&[("X-Attachments:", "report.pdf;")], &["see attached"], false);
        let out = assemble(msg, Vec::new(), &mut ctx);
        assert!(matches!(
            out.part,
            MessagePart::Multipart { ref subtype, .. } if subtype == "mixed"
        ));
    }

    #[test]
    fn test_attachments_force_multipart_over_declared_type() {
        let (_tmp, mut ctx) = ctx();
        let msg = parsed(&[("Content-Type:", "text/plain; charset=us-ascii")], &["x"], false);
        let out = assemble(msg, vec![fake_attachment("a.pdf")], &mut ctx);
        match out.part {
            MessagePart::Multipart { subtype, parts } => {
                assert_eq!(subtype, "mixed");
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[1], MessagePart::Attachment(_)));
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn test_declared_multipart_subtype_kept() {
        let (_tmp, mut ctx) = ctx();
        let msg = parsed(
            &[("Content-Type:", "multipart/Alternative; boundary=\"b\"")],
            &["body"],
            true,
        );
        let out = assemble(msg, Vec::new(), &mut ctx);
        match out.part {
            MessagePart::Multipart { subtype, parts } => {
                assert_eq!(subtype, "alternative");
                assert!(matches!(
                    parts[0],
                    MessagePart::Text { ref content_type, .. } if content_type == "text/html"
                ));
            }
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn test_enclosed_message() {
        let (_tmp, mut ctx) = ctx();
        let msg = parsed(
            &[("Content-Type:", "message/rfc822")],
            &["Subject: inner", "", "inner body"],
            false,
        );
        let out = assemble(msg, Vec::new(), &mut ctx);
        match out.part {
            MessagePart::Multipart { parts, .. } => match &parts[0] {
                MessagePart::Enclosed(inner) => {
                    assert_eq!(inner.headers, vec![("Subject:".to_string(), "inner".to_string())]);
                    assert!(matches!(
                        inner.part,
                        MessagePart::Text { ref body, .. } if body == "inner body"
                    ));
                }
                other => panic!("expected enclosed part, got {other:?}"),
            },
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn test_non_ascii_content_type_is_plain() {
        // A mangled type whose char straddles the prefix-length byte
        // boundary must classify, not panic.
        match structure_class(Some("multipart¢"), false) {
            StructureClass::Plain(Some(ct)) => assert_eq!(ct, "multipart¢"),
            _ => panic!("expected plain class"),
        }
    }

    #[test]
    fn test_enclosed_multipart_inner_classified() {
        let (_tmp, mut ctx) = ctx();
        let msg = parsed(
            &[("Content-Type:", "message/rfc822")],
            &[
                "Subject: inner",
                "Content-Type: multipart/alternative; boundary=\"x\"",
                "",
                "inner body",
            ],
            false,
        );
        let out = assemble(msg, Vec::new(), &mut ctx);
        match out.part {
            MessagePart::Multipart { parts, .. } => match &parts[0] {
                MessagePart::Enclosed(inner) => {
                    assert!(matches!(
                        inner.part,
                        MessagePart::Multipart { ref subtype, .. } if subtype == "alternative"
                    ));
                }
                other => panic!("expected enclosed part, got {other:?}"),
            },
            other => panic!("expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn test_content_type_not_copied_verbatim() {
        let (_tmp, mut ctx) = ctx();
        let msg = parsed(
            &[("Content-Type:", "text/plain"), ("Subject:", "s")],
            &[],
            false,
        );
        let out = assemble(msg, Vec::new(), &mut ctx);
        assert!(out.headers.iter().all(|(k, _)| k != "Content-Type:"));
        assert!(out.headers.iter().any(|(k, _)| k == "Subject:"));
    }
}

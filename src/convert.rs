//! Per-mailbox conversion driver.
//!
//! ```text
//!   ┌─────────┐   pass 1   ┌──────────┐
//!   │ .mbx    │──────────▶│ ReplySet │
//!   │ (seek 0)│   pass 2   └────┬─────┘
//!   │         │────────┐        │
//!   └─────────┘        ▼        ▼
//!   ┌─────────┐   ┌───────────────────┐   ┌──────────┐
//!   │ .toc    │──▶│ Segmenter + clean │──▶│ assemble │──▶ sink
//!   └─────────┘   └───────────────────┘   └──────────┘
//! ```
//!
//! Only two failures abort a run: the source cannot be opened, or the
//! destination cannot be created. Everything else is logged through the
//! [`ConversionContext`] and the run continues.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::attach::{embedded, AttachmentResolver, ResolvedAttachment};
use crate::assemble::assemble;
use crate::context::ConversionContext;
use crate::error::{ConvertError, Result};
use crate::parser::mbx::{ParsedMessage, Segmenter};
use crate::parser::replies::ReplySet;
use crate::sink::{MailboxSink, MboxFileSink};
use crate::toc::TocIndex;

/// Suffix appended to the mailbox name for the produced mbox file.
/// Moving it into place is the caller's business.
pub const OUT_SUFFIX: &str = ".converted";

#[derive(Debug, Default)]
pub struct ConvertOptions {
    /// Root directory searched for attachment files. Without it,
    /// attachment descriptor lines stay in the body untouched.
    pub attachments_root: Option<PathBuf>,
    /// Output path override; defaults to `<mailbox>.converted`.
    pub output: Option<PathBuf>,
}

/// End-of-run accounting, also rendered as the one-line summary.
#[derive(Debug)]
pub struct ConversionSummary {
    pub output: PathBuf,
    pub messages: u64,
    pub attachments_listed: u64,
    pub attachments_found: u64,
    pub attachments_missing: u64,
    pub warnings: u64,
    pub errors: u64,
    pub report: String,
}

/// Convert one Eudora mailbox file into a standards mbox file.
pub fn convert_mailbox(mailbox: &Path, options: &ConvertOptions) -> Result<ConversionSummary> {
    if !mailbox.is_file() {
        return Err(ConvertError::FileNotFound(mailbox.to_path_buf()));
    }
    let mut ctx = ConversionContext::new(mailbox);
    let mailbox_len = std::fs::metadata(mailbox)
        .map_err(|e| ConvertError::io(mailbox, e))?
        .len();

    // TOC sidecar: absent or undecodable both degrade to "no metadata".
    let toc_path = toc_path_for(mailbox);
    let toc = match TocIndex::load(&toc_path, mailbox_len) {
        Ok(t) => t,
        Err(e) => {
            ctx.warn(&format!("unusable TOC index: {e}"));
            None
        }
    };

    let file = File::open(mailbox).map_err(|e| ConvertError::io(mailbox, e))?;
    let mut reader = BufReader::new(file);

    // Pass 1: collect In-Reply-To references; rewinds the reader.
    let replies = ReplySet::scan(&mut reader)?;
    info!(replies = replies.len(), mailbox = %mailbox.display(), "reply scan complete");

    let out_path = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(mailbox));
    let mut sink = MboxFileSink::create(&out_path)?;

    let resolver = options
        .attachments_root
        .as_deref()
        .map(AttachmentResolver::new);

    // Pass 2: segment, clean, resolve, assemble, write.
    let segmenter =
        Segmenter::new(toc.as_ref(), &replies).divert_attachments(resolver.is_some());
    let mut sink_err: Option<ConvertError> = None;
    let count = segmenter.run(&mut reader, &mut ctx, |msg, ctx| {
        if sink_err.is_some() {
            return;
        }
        let parts = resolve_parts(&msg, resolver.as_ref(), ctx);
        let assembled = assemble(msg, parts, ctx);
        if let Err(e) = sink.add(&assembled) {
            sink_err = Some(e);
        }
    })?;
    if let Some(e) = sink_err {
        return Err(e);
    }
    sink.close()?;

    ctx.messages = count;
    let report = ctx.summary();
    info!(mailbox = %mailbox.display(), "{report}");
    Ok(ConversionSummary {
        output: out_path,
        messages: count,
        attachments_listed: ctx.attachments_listed,
        attachments_found: ctx.attachments_found,
        attachments_missing: ctx.attachments_missing,
        warnings: ctx.warn_count(),
        errors: ctx.error_count(),
        report,
    })
}

/// Resolve a message's diverted attachment and embedded-content lines
/// into loaded parts, preserving order: attachments first, then embedded
/// files (inline-tagged when a body reference matched).
fn resolve_parts(
    msg: &ParsedMessage,
    resolver: Option<&AttachmentResolver>,
    ctx: &mut ConversionContext,
) -> Vec<ResolvedAttachment> {
    let Some(resolver) = resolver else {
        return Vec::new();
    };
    let mut parts = Vec::new();
    for line in &msg.attachment_lines {
        if let Some(att) = resolver.resolve(line, ctx) {
            parts.push(att);
        }
    }
    for matched in embedded::match_embedded(&msg.body, &msg.embedded_files, ctx) {
        if let Some(mut att) = resolver.resolve_name(&matched.name, ctx) {
            att.content_id = matched.content_id;
            parts.push(att);
        }
    }
    parts
}

/// Sidecar index path: same base name, `.toc` extension.
fn toc_path_for(mailbox: &Path) -> PathBuf {
    mailbox.with_extension("toc")
}

fn default_output_path(mailbox: &Path) -> PathBuf {
    let mut name = mailbox.as_os_str().to_os_string();
    name.push(OUT_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toc_path() {
        assert_eq!(toc_path_for(Path::new("/m/In.mbx")), Path::new("/m/In.toc"));
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/m/In.mbx")),
            Path::new("/m/In.mbx.converted")
        );
    }

    #[test]
    fn test_missing_mailbox_is_fatal() {
        let e = convert_mailbox(Path::new("/nonexistent/In.mbx"), &ConvertOptions::default());
        assert!(matches!(e, Err(ConvertError::FileNotFound(_))));
    }

    #[test]
    fn test_missing_attachments_lines_kept_in_body_without_root() {
        let tmp = tempfile::tempdir().unwrap();
        let mbx = tmp.path().join("In.mbx");
        std::fs::write(
            &mbx,
            "From ???@??? Thu Jan 03 11:42:42 2002\n\
             From: a@b.c\n\
             \n\
             Attachment Converted: \"C:\\attach\\gone.pdf\"\n",
        )
        .unwrap();
        let summary = convert_mailbox(&mbx, &ConvertOptions::default()).unwrap();
        assert_eq!(summary.messages, 1);
        let out = std::fs::read_to_string(summary.output).unwrap();
        assert!(out.contains("Attachment Converted"));
        assert_eq!(summary.attachments_missing, 0);
    }
}

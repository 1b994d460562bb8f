//! Attachment descriptor parsing and filesystem resolution.
//!
//! Eudora rewrites a received attachment into a body line naming where it
//! saved the file. Mac builds write colon-delimited paths with a trailing
//! type/creator annotation, Windows builds a full DOS path:
//!
//!   Attachment converted: Macintosh HD:Eudora Folder:Attachments Folder:report.pdf (PDF /CARO) (00000645)
//!   Attachment Converted: "C:\eudora\attach\report.pdf"
//!
//! Years of moves and re-saves mean the named file rarely exists verbatim,
//! so resolution walks candidate directories with an ordered chain of name
//! transformations and gives up loudly rather than silently.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::context::ConversionContext;

/// Path prefix artifact left by Mac Eudora in descriptor lines.
const VENDOR_PREFIX: &str = "Eudora Folder:Attachments Folder:";

/// DOS path probe: a drive-colon-backslash anywhere in the descriptor.
static DOS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\\").expect("dos path pattern"));

/// Mac trailing type/creator annotation, e.g. `(PDF /CARO) (00000645)`.
static MAC_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*(\(.*\))\s*$").expect("mac info pattern"));

/// Duplicate-save suffix: ` N` after the extension, e.g. `report.pdf 1`.
static DUP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?\.[^.\s]+)\s+\d+$").expect("dup suffix pattern"));

/// A parsed descriptor: the bare filename plus the original text kept for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub name: String,
    pub original: String,
}

/// Parse one attachment descriptor (the text after the prefix phrase).
///
/// Returns `None` when no filename can be extracted at all.
pub fn parse_descriptor(descriptor: &str) -> Option<FileReference> {
    let original = descriptor.trim().to_string();
    let unquoted = original.trim_matches('"').trim();

    let name = if DOS_PATH.is_match(unquoted) {
        // Windows dialect: last backslash segment.
        unquoted
            .rsplit('\\')
            .next()
            .map(|s| s.trim().trim_matches('"').to_string())
    } else if let Some(c) = MAC_INFO.captures(unquoted) {
        // Mac dialect: strip the annotation, last colon segment.
        c[1].rsplit(':').next().map(|s| s.trim().to_string())
    } else if unquoted.contains(':') {
        unquoted.rsplit(':').next().map(|s| s.trim().to_string())
    } else {
        Some(unquoted.to_string())
    };

    match name {
        Some(n) if !n.is_empty() => Some(FileReference { name: n, original }),
        _ => None,
    }
}

/// Classify a filename into (type, subtype) by extension. Anything
/// unrecognized is `application/octet-stream`.
pub fn mime_for_name(name: &str) -> (&'static str, &'static str) {
    let ext = name.rsplit('.').next().unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => ("image", "jpeg"),
        "png" => ("image", "png"),
        "gif" => ("image", "gif"),
        "bmp" => ("image", "bmp"),
        "tif" | "tiff" => ("image", "tiff"),
        "txt" => ("text", "plain"),
        "htm" | "html" => ("text", "html"),
        "csv" => ("text", "csv"),
        "pdf" => ("application", "pdf"),
        "doc" => ("application", "msword"),
        "xls" => ("application", "vnd.ms-excel"),
        "zip" => ("application", "zip"),
        "gz" => ("application", "gzip"),
        "ps" => ("application", "postscript"),
        "rtf" => ("application", "rtf"),
        "mp3" => ("audio", "mpeg"),
        "wav" => ("audio", "wav"),
        "mov" => ("video", "quicktime"),
        "avi" => ("video", "x-msvideo"),
        "mpg" | "mpeg" => ("video", "mpeg"),
        _ => ("application", "octet-stream"),
    }
}

/// One attachment after resolution: the file was located and read, and is
/// ready to become a MIME part.
#[derive(Debug)]
pub struct ResolvedAttachment {
    pub display_name: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub mime_subtype: String,
    pub content: Vec<u8>,
    /// Content identifier, set when the part was matched to an inline
    /// reference by the embedded-content pairing.
    pub content_id: Option<String>,
}

/// Locates attachment files under a root across candidate subdirectories.
pub struct AttachmentResolver {
    root: PathBuf,
    subdirs: Vec<String>,
}

impl AttachmentResolver {
    /// Subdirectories probed under the root, in order. Covers the layouts
    /// of Windows ("attach"), Mac ("Attachments Folder"), and inline
    /// content ("Embedded"), plus the root itself.
    pub const DEFAULT_SUBDIRS: [&'static str; 4] =
        ["", "attach", "Attachments Folder", "Embedded"];

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            subdirs: Self::DEFAULT_SUBDIRS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_subdirs(mut self, subdirs: Vec<String>) -> Self {
        self.subdirs = subdirs;
        self
    }

    /// Resolve one descriptor line to a loaded attachment.
    ///
    /// `None` means the attachment is omitted from the assembled message;
    /// the miss has already been counted and logged.
    pub fn resolve(
        &self,
        descriptor: &str,
        ctx: &mut ConversionContext,
    ) -> Option<ResolvedAttachment> {
        let Some(reference) = parse_descriptor(descriptor) else {
            ctx.warn(&format!("FAILED to parse attachment: '{descriptor}'"));
            ctx.attachments_missing += 1;
            return None;
        };
        self.resolve_name(&reference.name, ctx)
    }

    /// Resolve an already-extracted filename (used for embedded content,
    /// whose declarations are parsed separately).
    pub fn resolve_name(
        &self,
        name: &str,
        ctx: &mut ConversionContext,
    ) -> Option<ResolvedAttachment> {
        let Some(path) = self.locate(name) else {
            ctx.warn(&format!("attachment missing: '{name}'"));
            ctx.attachments_missing += 1;
            return None;
        };

        let content = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Found but unreadable: a local failure for this one
                // attachment, the message itself still converts.
                ctx.warn(&format!("cannot read attachment '{}': {e}", path.display()));
                ctx.attachments_missing += 1;
                return None;
            }
        };

        ctx.attachments_found += 1;
        ctx.log(&format!("attachment found: '{}'", path.display()));
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let (mime_type, mime_subtype) = mime_for_name(&display_name);
        Some(ResolvedAttachment {
            display_name,
            path,
            mime_type: mime_type.to_string(),
            mime_subtype: mime_subtype.to_string(),
            content,
            content_id: None,
        })
    }

    /// Probe every candidate directory with every name variant, in order,
    /// returning the first existing file.
    fn locate(&self, name: &str) -> Option<PathBuf> {
        let variants = name_variants(name);
        for dir in &self.subdirs {
            let base = if dir.is_empty() {
                self.root.clone()
            } else {
                self.root.join(dir)
            };
            for variant in &variants {
                let candidate = base.join(variant);
                if candidate.is_file() {
                    return Some(candidate);
                }
                debug!(candidate = %candidate.display(), "attachment probe miss");
            }
        }
        None
    }
}

/// The ordered fallback chain of filename transformations. The verbatim
/// name always comes first; duplicates are pruned without reordering.
fn name_variants(name: &str) -> Vec<String> {
    let mut variants: Vec<String> = vec![name.to_string()];
    let mut push = |v: String| {
        if !v.is_empty() && !variants.contains(&v) {
            variants.push(v);
        }
    };

    if let Some(stripped) = strip_vendor_prefix(name) {
        push(stripped.to_string());
    }
    push(name.replace('/', ""));
    push(name.replace('_', " "));
    push(name.replace(' ', "_"));
    push(cleaned_name(name));
    variants
}

fn strip_vendor_prefix(name: &str) -> Option<&str> {
    match name.get(..VENDOR_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(VENDOR_PREFIX) => {
            Some(&name[VENDOR_PREFIX.len()..])
        }
        _ => None,
    }
}

/// Trim a ` N` duplicate-save suffix after the extension.
fn cleaned_name(name: &str) -> String {
    match DUP_SUFFIX.captures(name) {
        Some(c) => c[1].to_string(),
        None => name.to_string(),
    }
}

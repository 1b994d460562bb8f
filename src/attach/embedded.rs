//! Inline ("embedded") content pairing.
//!
//! HTML bodies reference inline images by content identifier
//! (`<img src="cid:...">`) while the mailbox separately declares the
//! files on `Embedded Content:` lines. The two lists carry no shared key,
//! so pairing is positional: n-th surviving reference goes with the n-th
//! declared file.

use std::sync::LazyLock;

use regex::Regex;

use crate::attach::resolver::parse_descriptor;
use crate::context::ConversionContext;

/// Structured reference: a source attribute carrying the cid scheme.
static CID_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)src\s*=\s*"?cid:([^"'\s>]+)"#).expect("cid src pattern")
});

/// Permissive recovery: any source attribute at all; http(s) values are
/// filtered out afterwards since those are remote, not embedded.
static ANY_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)src\s*=\s*"([^"]+)""#).expect("any src pattern")
});

/// One declared embedded file paired (or not) with a body reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedMatch {
    /// Bare filename extracted from the declaration line.
    pub name: String,
    /// Content identifier from the body, absent when the declaration list
    /// outran the reference list. An unmatched file still attaches, just
    /// not inline.
    pub content_id: Option<String>,
}

/// Pull inline-content references out of the body, in order of appearance.
///
/// Repeated references to the same identifier collapse into one entry, so
/// an image used twice still consumes a single declared file.
pub fn extract_references(body: &[String]) -> Vec<String> {
    fn push_unique(refs: &mut Vec<String>, r: String) {
        if !refs.contains(&r) {
            refs.push(r);
        }
    }

    let mut refs: Vec<String> = Vec::new();
    for line in body {
        for c in CID_SRC.captures_iter(line) {
            push_unique(&mut refs, c[1].to_string());
        }
    }
    if refs.is_empty() {
        for line in body {
            for c in ANY_SRC.captures_iter(line) {
                let src = c[1].trim();
                let lower = src.to_lowercase();
                if lower.starts_with("http:") || lower.starts_with("https:") {
                    continue;
                }
                push_unique(&mut refs, src.trim_start_matches("cid:").to_string());
            }
        }
    }
    refs
}

/// Pair extracted references with declared embedded files, positionally.
///
/// A count mismatch is logged with message context but never blocks
/// assembly.
pub fn match_embedded(
    body: &[String],
    declared: &[String],
    ctx: &mut ConversionContext,
) -> Vec<EmbeddedMatch> {
    if declared.is_empty() {
        return Vec::new();
    }
    let references = extract_references(body);
    if references.len() != declared.len() {
        ctx.warn(&format!(
            "embedded content mismatch: {} reference(s), {} declared file(s)",
            references.len(),
            declared.len()
        ));
    }

    let mut matches = Vec::with_capacity(declared.len());
    for (i, declaration) in declared.iter().enumerate() {
        let Some(reference) = parse_descriptor(declaration) else {
            ctx.warn(&format!("unparsable embedded declaration: '{declaration}'"));
            continue;
        };
        matches.push(EmbeddedMatch {
            name: reference.name,
            content_id: references.get(i).cloned(),
        });
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn ctx() -> (tempfile::TempDir, ConversionContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ConversionContext::new(&dir.path().join("Test.mbx"));
        (dir, ctx)
    }

    #[test]
    fn test_extract_cid_references_in_order() {
        let body = lines(&[
            "<html><body>",
            "<img src=\"cid:one@host\"> and <img src=\"cid:two@host\">",
            "</body></html>",
        ]);
        assert_eq!(extract_references(&body), vec!["one@host", "two@host"]);
    }

    #[test]
    fn test_repeated_reference_folds() {
        let body = lines(&[
            "<img src=\"cid:logo@host\">",
            "<img src=\"cid:logo@host\">",
        ]);
        assert_eq!(extract_references(&body), vec!["logo@host"]);
    }

    #[test]
    fn test_permissive_fallback_skips_remote() {
        let body = lines(&[
            "<img src=\"https://example.com/banner.png\">",
            "<img src=\"logo.png\">",
        ]);
        assert_eq!(extract_references(&body), vec!["logo.png"]);
    }

    #[test]
    fn test_positional_pairing() {
        let (_tmp, mut ctx) = ctx();
        let body = lines(&["<img src=\"cid:a@h\">"]);
        let declared = lines(&["logo.png (ABCD1234)", "photo.jpg (00FF00FF)"]);
        let matched = match_embedded(&body, &declared, &mut ctx);
        assert_eq!(
            matched,
            vec![
                EmbeddedMatch {
                    name: "logo.png".into(),
                    content_id: Some("a@h".into()),
                },
                EmbeddedMatch {
                    name: "photo.jpg".into(),
                    content_id: None,
                },
            ]
        );
        // One mismatch warning for 1 reference vs 2 declarations.
        assert_eq!(ctx.warn_count(), 1);
    }

    #[test]
    fn test_no_declarations_no_work() {
        let (_tmp, mut ctx) = ctx();
        let body = lines(&["<img src=\"cid:a@h\">"]);
        assert!(match_embedded(&body, &[], &mut ctx).is_empty());
        assert_eq!(ctx.warn_count(), 0);
    }
}

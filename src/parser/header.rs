//! Eudora header model: an ordered, duplicate-permitting, case-insensitive
//! collection of header fields, plus the multi-rule cleanup pass that
//! rewrites them for standard mail clients.
//!
//! A map keyed by name does not work here: several header lines can share
//! the same key (`Received:` most prominently), and both order and original
//! casing must survive to emission (RFC 5322 leaves header case undefined,
//! but readers care about what they wrote).

use std::sync::LazyLock;

use regex::Regex;

use crate::context::ConversionContext;
use crate::parser::replies::ReplySet;
use crate::toc::TocIndex;

/// The placeholder Eudora writes into `From ` lines instead of an address.
pub const ADDRESS_PLACEHOLDER: &str = "???@???";

/// Sentinel used when no sender address can be recovered; easy to grep for.
pub const UNKNOWN_SENDER: &str = "unknown@unknown.unknown";

/// Pseudo-key for the mbox separator line. Space-terminated, no colon:
/// distinct from a `From:` header.
pub const FROM_PSEUDO_KEY: &str = "From ";

/// Headers that legitimately repeat; anything else repeating gets its key
/// commented out with a `>` prefix.
const OK_TO_DUP: &[&str] = &[
    "received:",
    "x400-received:",
    "delivered-to:",
    "x-mailer:",
    "return-path:",
    "sender:",
    "mime-version:",
    "precedence:",
    "x-uidl:",
    "content-transfer-encoding:",
];

/// Eudora's out-of-order date payload on the separator line:
/// `<ignored> <weekday> <month> <day> <time> <year> [<tz>]`.
pub static FROM_DATE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*\S+?\s*(\S{3})\s+(\S{3})\s+(\d{1,2})\s*(\d{2}:\d{2}:\d{2})\s+(\d{4})\s*([+-]\d{4})?",
    )
    .expect("from-line date pattern")
});

/// Timeout-scanner noise injected by AV gateways; dropped outright.
static TIMEOUT_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^X-(NortonAV|Symantec)-TimeoutProtection").expect("timeout noise pattern")
});

/// Greedy up to the last `<` with a closing `>`: Return-Paths can carry
/// several addresses and the last one wins.
static BETWEEN_ANGLES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^<>]*)>").expect("angle pattern"));

static BEFORE_PARENTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)\(.*?\)").expect("before-parenthetical pattern"));

static AFTER_PARENTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*?\)(.*)").expect("after-parenthetical pattern"));

const WEEKDAYS: &[&str] = &["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// One header field. Keys are not unique; input order is preserved.
#[derive(Debug, Clone)]
struct HeaderField {
    /// Lowercased key, for case-insensitive lookup.
    lower: String,
    /// Key as it appeared in the input, for emission.
    name: String,
    value: String,
}

/// Ordered header collection for one message.
#[derive(Debug, Default)]
pub struct HeaderModel {
    fields: Vec<HeaderField>,
    cleaned: bool,
}

/// What `add_line` did with a raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Stored (possibly with a commented-out `>` key).
    Added,
    /// Recognized noise, dropped entirely.
    Dropped,
    /// Not header-shaped; the caller should treat it as body text.
    NotHeader,
}

impl HeaderModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. No-op on an empty key. If `value` literally begins
    /// with the key text (case-insensitively) the prefix is stripped, so
    /// un-pre-split lines are tolerated.
    pub fn add(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        let value = strip_off_key(key, value);
        self.fields.push(HeaderField {
            lower: key.to_lowercase(),
            name: key.to_string(),
            value,
        });
    }

    /// First value for a key, case-insensitive.
    pub fn get_value(&self, key: &str) -> Option<&str> {
        let lower = key.to_lowercase();
        self.fields
            .iter()
            .find(|f| f.lower == lower)
            .map(|f| f.value.as_str())
    }

    /// Replace the first match in place, or append if absent.
    pub fn set_value(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        let lower = key.to_lowercase();
        if let Some(f) = self.fields.iter_mut().find(|f| f.lower == lower) {
            f.value = strip_off_key(key, value);
        } else {
            self.add(key, value);
        }
    }

    /// Remove every field with this key.
    pub fn remove_value(&mut self, key: &str) {
        let lower = key.to_lowercase();
        self.fields.retain(|f| f.lower != lower);
    }

    /// Full removal then append: used when a header's position must move
    /// to the end of the list.
    pub fn replace_value(&mut self, key: &str, value: &str) {
        self.remove_value(key);
        self.add(key, value);
    }

    /// Fold a continuation line onto the last-added field (RFC 5322 §2.2.3).
    /// No-op if no fields exist yet.
    pub fn append_to_last(&mut self, additional: &str) {
        let Some(last) = self.fields.last_mut() else {
            return;
        };
        last.value.push_str("\n\t");
        last.value.push_str(additional.trim());
    }

    /// Parse a raw line into a field.
    ///
    /// A line is a header only if a colon appears before the first space
    /// (or there is no space at all); the separator `From ` line is seeded
    /// separately and never passes through here. Repeated keys not on the
    /// allow-list are commented out with a `>` prefix rather than dropped,
    /// so the original message stays as intact as possible.
    pub fn add_line(&mut self, line: &str, ctx: &mut ConversionContext) -> LineOutcome {
        // Noise check runs before the duplicate check.
        if TIMEOUT_NOISE.is_match(line) {
            return LineOutcome::Dropped;
        }

        let colon = line.find(':');
        let space = line.find(' ');
        let colon = match (colon, space) {
            (Some(c), None) => c,
            (Some(c), Some(s)) if s > c => c,
            _ => return LineOutcome::NotHeader,
        };

        let mut key = line[..=colon].to_string();
        let value = line[colon + 1..].trim();

        if !OK_TO_DUP.contains(&key.to_lowercase().as_str()) && self.get_value(&key).is_some() {
            ctx.warn(&format!("extra '{key}' header encountered - commented out"));
            key.insert(0, '>');
        }

        self.add(&key, value);
        LineOutcome::Added
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, value)` pairs in input order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.value.as_str()))
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Write each field as `<name><sp><value>\n`, except the separator
    /// pseudo-key which takes no space before its value. Keys in
    /// `exceptions` (lowercased) are skipped: `content-type:` is normally
    /// excluded because its value travels through the MIME structure, not
    /// as a raw text line.
    pub fn emit(&self, out: &mut impl std::io::Write, exceptions: &[&str]) -> std::io::Result<()> {
        for f in &self.fields {
            if exceptions.contains(&f.lower.as_str()) {
                continue;
            }
            out.write_all(f.name.as_bytes())?;
            if f.lower != "from " {
                out.write_all(b" ")?;
            }
            out.write_all(f.value.as_bytes())?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// The header-rewrite pipeline, run exactly once per message.
    ///
    /// Synthesizes a `Date:` from the separator line when missing,
    /// normalizes the weekday comma, scrubs `Status:` down to `R`/`O`
    /// (picky readers ignore the whole field on anything else), marks
    /// answered messages in `X-Status:`, recovers the sender address into
    /// the separator line, stamps the conversion time, and merges TOC
    /// status/priority metadata for this message's byte offset.
    pub fn clean(
        &mut self,
        toc: Option<&TocIndex>,
        msg_offset: u64,
        replies: &ReplySet,
        ctx: &mut ConversionContext,
    ) {
        if self.cleaned {
            ctx.warn("header cleanup invoked twice; ignoring");
            return;
        }

        let from_line = self
            .get_value(FROM_PSEUDO_KEY)
            .unwrap_or_default()
            .to_string();

        // Synthesize Date: from the separator line. Eudora stores the
        // components out of RFC order (weekday month day time year), so
        // the groups are reordered on the way out.
        if self.get_value("Date:").is_none() {
            match FROM_DATE_TIME.captures(&from_line) {
                None => {
                    let msg = format!("Bad date in From '{from_line}'");
                    ctx.log(&msg);
                    ctx.error(&msg);
                }
                Some(c) => {
                    let mut new_date =
                        format!("Date: {} {} {} {} {}", &c[1], &c[3], &c[2], &c[5], &c[4]);
                    if let Some(tz) = c.get(6) {
                        new_date.push(' ');
                        new_date.push_str(tz.as_str());
                    }
                    // By far the most common condition in Eudora boxes,
                    // so a log entry rather than a warning.
                    ctx.log(&format!("No  Date field, added    [{new_date}]"));
                    self.add("Date:", &new_date);
                }
            }
        }

        if let Some(date) = self.get_value("Date:").map(str::to_string) {
            let fixed = fix_date(&date);
            if fixed != date {
                self.set_value("Date:", &fixed);
            }
        }

        // Keep only R (read) and O (downloaded): anything else makes the
        // destination reader discard the entire Status field.
        if let Some(status) = self.get_value("Status:").map(str::to_string) {
            let mut scrubbed = String::new();
            if status.contains('R') {
                scrubbed.push('R');
            }
            if status.contains('O') {
                scrubbed.push('O');
            }
            self.set_value("Status:", &scrubbed);
        }

        // X-Status: A marks "answered" for the destination client.
        if let Some(mid) = self.get_value("Message-ID:").map(str::to_string) {
            if replies.message_was_answered(&mid) {
                self.append_x_status('A');
            }
        }

        // Recover the sender address into the separator line, replacing
        // Eudora's placeholder. Prefer From:, then a previously
        // commented-out duplicate, then Send:, Return-Path:, and finally
        // a greppable sentinel.
        let mut new_from = self
            .get_value("From:")
            .or_else(|| self.get_value(">From:"))
            .map(str::to_string);

        if from_line.contains(ADDRESS_PLACEHOLDER) {
            if new_from.is_none() {
                new_from = self
                    .get_value("Send:")
                    .or_else(|| self.get_value("Return-Path:"))
                    .map(str::to_string);
                match &new_from {
                    Some(v) => ctx.log(&format!("Had From field, used   [{v}]")),
                    None => {
                        let msg = format!("No  From field, used   [{UNKNOWN_SENDER}]");
                        ctx.log(&msg);
                        ctx.error(&msg);
                        new_from = Some(UNKNOWN_SENDER.to_string());
                    }
                }
            }
            let address = extract_address(new_from.as_deref().unwrap_or(UNKNOWN_SENDER));
            let new_line = from_line.replacen(ADDRESS_PLACEHOLDER, &address, 1);
            self.replace_value(FROM_PSEUDO_KEY, &new_line);
        }

        // Conversion stamp, always appended after the rewrites above, so
        // converted messages stay distinguishable from native ones.
        self.add(
            "X-Eudoraconv:",
            &format!("{} converted", iso_8601_zulu()),
        );

        // Merge TOC metadata for this message's byte offset. Absence is
        // expected for messages that were never indexed.
        if let Some(toc) = toc {
            match toc.record_at(msg_offset) {
                Some(rec) => {
                    let rec = *rec;
                    if let (Some(state), Some(layout)) = (rec.status, toc.layout()) {
                        let chars = layout.status_chars(state);
                        if !chars.is_empty() {
                            let merged = match self.get_value("Status:") {
                                Some(s) => format!("{chars}{s}"),
                                None => chars.to_string(),
                            };
                            self.set_value("Status:", &merged);
                        }
                    }
                    if rec.priority != 0 {
                        self.set_value("X-Priority:", &rec.priority.to_string());
                        // Half-open range kept verbatim from the legacy
                        // converter; whether priority exactly 3 should be
                        // flagged is unverified upstream behavior.
                        if rec.priority > 0 && rec.priority < 3 {
                            self.append_x_status('F');
                        }
                    }
                }
                None => {
                    ctx.warn(&format!("No toc entry for message at offset {msg_offset}"));
                }
            }
        }

        self.cleaned = true;
    }

    fn append_x_status(&mut self, flag: char) {
        let value = match self.get_value("X-Status:") {
            Some(v) => format!("{v}{flag}"),
            None => flag.to_string(),
        };
        self.set_value("X-Status:", &value);
    }
}

/// Strip the key text off the front of a value, if present.
fn strip_off_key(key: &str, value: &str) -> String {
    match value.get(..key.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(key) => {
            value[key.len()..].trim().to_string()
        }
        _ => value.to_string(),
    }
}

/// Give a recognized 3-letter weekday its trailing comma if missing.
fn fix_date(date: &str) -> String {
    let parts: Vec<&str> = date.split(' ').collect();
    if parts.len() < 5 {
        return date.to_string(); // don't know what to do with this
    }
    let first = parts[0];
    if !first.ends_with(',') && WEEKDAYS.contains(&first) {
        let mut out = format!("{first},");
        for p in &parts[1..] {
            out.push(' ');
            out.push_str(p);
        }
        return out;
    }
    date.to_string()
}

/// Extract an email address from a header value: the content of the last
/// angle-bracket pair, else the text before the first parenthetical, else
/// the text after it, else the raw value.
fn extract_address(value: &str) -> String {
    if let Some(c) = BETWEEN_ANGLES.captures_iter(value).last() {
        return c[1].trim().to_string();
    }
    if let Some(c) = BEFORE_PARENTH.captures(value) {
        let before = c[1].trim();
        if !before.is_empty() {
            return before.to_string();
        }
    }
    if let Some(c) = AFTER_PARENTH.captures(value) {
        let after = c[1].trim();
        if !after.is_empty() {
            return after.to_string();
        }
    }
    value.trim().to_string()
}

/// Current UTC time in extended ISO 8601 with the `Z` designator.
fn iso_8601_zulu() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

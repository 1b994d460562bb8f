//! Per-mailbox conversion state: log sinks, counters, and the end-of-run
//! summary.
//!
//! The original converter kept its log channels and totals in module-level
//! globals shared across calls. Here all of that lives in one
//! [`ConversionContext`] owned by a single mailbox run and dropped when the
//! run completes, so two conversions never share mutable state.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

/// Suffixes for the per-mailbox sidecar log files.
const LOG_SFX: &str = ".log";
const WARN_SFX: &str = ".warn";
const ERR_SFX: &str = ".err";

/// One sidecar log channel (`<mailbox>.log`, `.warn` or `.err`).
///
/// The file is only created on the first record, so a clean conversion
/// leaves no sidecar files behind.
struct LogChannel {
    path: PathBuf,
    out: Option<File>,
    count: u64,
}

impl LogChannel {
    fn new(mailbox: &Path, suffix: &str) -> Self {
        let mut name = mailbox.as_os_str().to_os_string();
        name.push(suffix);
        Self {
            path: PathBuf::from(name),
            out: None,
            count: 0,
        }
    }

    fn record(&mut self, mailbox: &str, msg_no: u64, line_no: u64, msg: &str) {
        self.count += 1;
        if self.out.is_none() {
            match OpenOptions::new().create(true).append(true).open(&self.path) {
                Ok(f) => self.out = Some(f),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Cannot open sidecar log");
                    return;
                }
            }
        }
        if let Some(f) = self.out.as_mut() {
            let _ = writeln!(f, "{mailbox} (msg #{msg_no}, line #{line_no}):\n{msg}\n");
        }
    }
}

/// State for one mailbox conversion run.
///
/// Holds the three log channels, the current message/line position (used to
/// annotate every record), and the counters reported in the final summary.
pub struct ConversionContext {
    mailbox: String,
    log: LogChannel,
    warn: LogChannel,
    err: LogChannel,

    /// Number of the message currently being processed (1-based, 0 before
    /// the first message start).
    pub msg_no: u64,
    /// Line number of the current input line (1-based).
    pub line_no: u64,

    /// Messages handed to the sink.
    pub messages: u64,
    /// Attachment descriptor lines seen.
    pub attachments_listed: u64,
    /// Attachments resolved to a real file.
    pub attachments_found: u64,
    /// Attachments that stayed unresolved after every fallback.
    pub attachments_missing: u64,
}

impl ConversionContext {
    pub fn new(mailbox: &Path) -> Self {
        Self {
            mailbox: mailbox.display().to_string(),
            log: LogChannel::new(mailbox, LOG_SFX),
            warn: LogChannel::new(mailbox, WARN_SFX),
            err: LogChannel::new(mailbox, ERR_SFX),
            msg_no: 0,
            line_no: 0,
            messages: 0,
            attachments_listed: 0,
            attachments_found: 0,
            attachments_missing: 0,
        }
    }

    /// Informational record: no effect on the exit status.
    pub fn log(&mut self, msg: &str) {
        info!(mailbox = %self.mailbox, msg_no = self.msg_no, "{msg}");
        self.log
            .record(&self.mailbox, self.msg_no, self.line_no, msg);
    }

    /// Recoverable anomaly worth flagging to the user.
    pub fn warn(&mut self, msg: &str) {
        warn!(mailbox = %self.mailbox, msg_no = self.msg_no, "{msg}");
        self.warn
            .record(&self.mailbox, self.msg_no, self.line_no, msg);
    }

    /// Per-message or structural error; the run still continues.
    pub fn error(&mut self, msg: &str) {
        error!(mailbox = %self.mailbox, msg_no = self.msg_no, "{msg}");
        self.err
            .record(&self.mailbox, self.msg_no, self.line_no, msg);
    }

    pub fn log_count(&self) -> u64 {
        self.log.count
    }

    pub fn warn_count(&self) -> u64 {
        self.warn.count
    }

    pub fn error_count(&self) -> u64 {
        self.err.count
    }

    /// End-of-run summary line in the original converter's format.
    pub fn summary(&self) -> String {
        let msg_str = match self.messages {
            0 => "no messages".to_string(),
            1 => "total:     1 message".to_string(),
            n => format!("total: {n:5} messages"),
        };
        format!(
            "{msg_str} ( {}, {} )",
            count_str(self.warn.count, "warning"),
            count_str(self.err.count, "error")
        )
    }
}

fn count_str(n: u64, kind: &str) -> String {
    match n {
        0 => format!("no {kind}s"),
        1 => format!("1 {kind}"),
        n => format!("{n} {kind}s"),
    }
}

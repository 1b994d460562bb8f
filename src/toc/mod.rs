//! Legacy binary TOC index: decodes the per-mailbox sidecar file that
//! records read/priority state by message byte offset.

pub mod format;
pub mod reader;

pub use format::{MessageState, TocLayout};
pub use reader::{TocIndex, TocRecord};

//! Attachment and embedded-content handling.

pub mod embedded;
pub mod resolver;

pub use embedded::EmbeddedMatch;
pub use resolver::{AttachmentResolver, ResolvedAttachment};

//! Mailbox parsing: message segmentation, the header model, and the
//! reply-detection pass.

pub mod header;
pub mod mbx;
pub mod replies;

pub use header::HeaderModel;
pub use mbx::{ParsedMessage, Segmenter};
pub use replies::ReplySet;

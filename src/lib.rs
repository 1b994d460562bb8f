//! `eudoraconv`: convert legacy Eudora mailboxes to standards mbox files.
//!
//! This crate provides the conversion core: the streaming message
//! segmenter, the header-rewrite pipeline, the binary TOC index decoder,
//! attachment/embedded-content resolution, and MIME reassembly.

pub mod assemble;
pub mod attach;
pub mod context;
pub mod convert;
pub mod error;
pub mod parser;
pub mod sink;
pub mod toc;

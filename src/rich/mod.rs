//! Editing rich documents: a tagged text buffer that documents are applied
//! to and extracted from, and the selection formatting built on it.

pub mod buffer;

pub use buffer::{FormatError, FormatOp, StyledBuffer, format_document};

//! Audit-trail output: step-wise Markdown files and the reader that
//! serves `show`/`history`/`copy`.

pub mod reader;
pub mod writer;

pub use writer::OutputWriter;

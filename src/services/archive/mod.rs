//! Archive extraction: format detection, ordered backend fallback and recursive
//! unwrapping of nested archives.

mod analyze;
mod capabilities;
mod extract;
mod strategy;
mod types;

pub use analyze::{analyze_archive, ensure_disk_space};
pub use capabilities::BackendRegistry;
pub use extract::ArchiveExtractor;
pub use strategy::{
    ExtractionStrategy, ExternalTool, RarLibrary, RawCopy, SevenZLibrary, ToolFlavor, ZipLibrary,
};
pub use types::{
    is_nested_archive_candidate, ArchiveAnalysis, ArchiveFormat, BackendKind, ExtractionReport,
    NestedArchive, MAX_NESTING_DEPTH,
};

#[cfg(test)]
#[path = "tests/archive_tests.rs"]
mod tests;

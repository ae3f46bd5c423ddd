use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Archives nested deeper than this are left undecoded. The top-level archive is depth 0.
pub const MAX_NESTING_DEPTH: usize = 10;

const ZIP_SIGNATURES: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const SEVENZ_SIGNATURE: &[u8] = b"7z\xBC\xAF\x27\x1C";
const RAR_SIGNATURE: &[u8] = b"Rar!\x1A\x07";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    SevenZ,
    Rar,
}

impl ArchiveFormat {
    /// Detect format from file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "zip" => Some(Self::Zip),
            "7z" => Some(Self::SevenZ),
            "rar" => Some(Self::Rar),
            _ => None,
        }
    }

    /// Detect format from the leading magic bytes.
    pub fn from_signature(header: &[u8]) -> Option<Self> {
        if ZIP_SIGNATURES.iter().any(|sig| header.starts_with(sig)) {
            Some(Self::Zip)
        } else if header.starts_with(SEVENZ_SIGNATURE) {
            Some(Self::SevenZ)
        } else if header.starts_with(RAR_SIGNATURE) {
            Some(Self::Rar)
        } else {
            None
        }
    }

    /// Reads the file header and matches it against known signatures.
    pub fn sniff(path: &Path) -> Option<Self> {
        let mut header = [0_u8; 8];
        let mut file = File::open(path).ok()?;
        let read = file.read(&mut header).ok()?;
        Self::from_signature(&header[..read])
    }

    /// Signature first, extension as fallback.
    pub fn detect(path: &Path) -> Option<Self> {
        Self::sniff(path).or_else(|| Self::from_extension(path))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::SevenZ => "7z",
            Self::Rar => "rar",
        }
    }
}

/// Whether a file found inside an extracted tree should be treated as a nested archive.
/// Files with an archive extension always are; extension-less files are sniffed.
pub fn is_nested_archive_candidate(path: &Path) -> bool {
    if ArchiveFormat::from_extension(path).is_some() {
        return true;
    }
    path.extension().is_none() && ArchiveFormat::sniff(path).is_some()
}

/// Result of analyzing an archive before extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveAnalysis {
    pub format: ArchiveFormat,
    pub file_count: usize,
    pub uncompressed_size: u64,
    pub single_root_folder: Option<String>,
}

/// Which family of backend a strategy belongs to. Also the order they are tried in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum BackendKind {
    Library,
    ExternalTool,
    RawCopy,
}

/// A nested archive that was decoded during extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NestedArchive {
    pub archive_name: String,
    pub extracted_to: PathBuf,
    pub depth: usize,
}

/// Outcome of a recursive extraction. Per-archive problems are counted here instead of failing the call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// BLAKE3 of the top-level archive.
    pub source_hash: Option<String>,
    pub archives_seen: usize,
    pub decoded: usize,
    pub raw_copied: usize,
    pub backend_failures: usize,
    pub cycles_skipped: usize,
    pub depth_limited: usize,
    pub nested: Vec<NestedArchive>,
    pub warnings: Vec<String>,
}

impl ExtractionReport {
    pub(crate) fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(message);
    }

    /// The nested archive whose extraction directory contains `path`, deepest match first.
    pub fn nested_origin(&self, path: &Path) -> Option<&NestedArchive> {
        self.nested
            .iter()
            .filter(|n| path.starts_with(&n.extracted_to))
            .max_by_key(|n| n.extracted_to.components().count())
    }
}

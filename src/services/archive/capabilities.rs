use super::strategy::{
    ExtractionStrategy, ExternalTool, RarLibrary, RawCopy, SevenZLibrary, ToolFlavor, ZipLibrary,
};
use super::types::{ArchiveFormat, BackendKind};
use std::path::PathBuf;
use std::sync::Arc;

const SEVEN_ZIP_NAMES: [&str; 3] = ["7z", "7zz", "7za"];
const SEVEN_ZIP_WINDOWS_PATHS: [&str; 2] = [
    r"C:\Program Files\7-Zip\7z.exe",
    r"C:\Program Files (x86)\7-Zip\7z.exe",
];
const UNRAR_WINDOWS_PATHS: [&str; 2] = [
    r"C:\Program Files\WinRAR\UnRAR.exe",
    r"C:\Program Files (x86)\WinRAR\UnRAR.exe",
];

/// Immutable, ordered list of usable extraction backends.
///
/// Built once at startup. Libraries come first, then external tools, and raw copy is
/// always the final entry.
#[derive(Clone)]
pub struct BackendRegistry {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
}

impl BackendRegistry {
    /// Looks for external tools once and builds the full list.
    pub fn discover() -> Self {
        let mut strategies: Vec<Arc<dyn ExtractionStrategy>> = vec![
            Arc::new(ZipLibrary),
            Arc::new(SevenZLibrary),
            Arc::new(RarLibrary),
        ];

        if let Some(program) = find_tool(&SEVEN_ZIP_NAMES, &SEVEN_ZIP_WINDOWS_PATHS) {
            log::info!("External extractor available: {}", program.display());
            strategies.push(Arc::new(ExternalTool::new(program, ToolFlavor::SevenZip)));
        }
        if let Some(program) = find_tool(&["unrar"], &UNRAR_WINDOWS_PATHS) {
            log::info!("External extractor available: {}", program.display());
            strategies.push(Arc::new(ExternalTool::new(program, ToolFlavor::Unrar)));
        }

        Self::from_strategies(strategies)
    }

    /// Explicit backend list. A raw-copy fallback is appended if the list lacks one.
    pub fn from_strategies(strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        let mut strategies: Vec<_> = strategies
            .into_iter()
            .filter(|s| s.kind() != BackendKind::RawCopy)
            .collect();
        // Stable: keeps caller order within a kind.
        strategies.sort_by_key(|s| s.kind());
        strategies.push(Arc::new(RawCopy));
        Self { strategies }
    }

    pub fn strategies_for(
        &self,
        format: ArchiveFormat,
    ) -> impl Iterator<Item = &Arc<dyn ExtractionStrategy>> + '_ {
        self.strategies.iter().filter(move |s| s.supports(format))
    }

    /// The raw-copy backend that closes every chain.
    pub fn fallback(&self) -> &Arc<dyn ExtractionStrategy> {
        &self.strategies[self.strategies.len() - 1]
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }
}

fn find_tool(names: &[&str], windows_paths: &[&str]) -> Option<PathBuf> {
    for name in names {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }
    if cfg!(windows) {
        return windows_paths
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file());
    }
    None
}

//! Interchangeable extraction backends.
//!
//! Each strategy either decodes an archive into a destination directory and reports how
//! many files it wrote, or fails with `ExtractionBackendFailure` so the caller can move
//! on to the next one.

use super::types::{ArchiveFormat, BackendKind};
use crate::services::fs_utils::file_utils::list_files;
use crate::types::{VaultError, VaultResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> BackendKind;
    fn supports(&self, format: ArchiveFormat) -> bool;
    fn extract(&self, archive: &Path, dest: &Path) -> VaultResult<usize>;
}

// ── Library decoders ─────────────────────────────────

pub struct ZipLibrary;

impl ExtractionStrategy for ZipLibrary {
    fn name(&self) -> &str {
        "zip-library"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Library
    }

    fn supports(&self, format: ArchiveFormat) -> bool {
        format == ArchiveFormat::Zip
    }

    fn extract(&self, archive: &Path, dest: &Path) -> VaultResult<usize> {
        let fail = |msg: String| VaultError::backend(self.name(), msg);

        let file = fs::File::open(archive).map_err(|e| fail(format!("Failed to open archive: {e}")))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| fail(format!("Invalid or corrupt ZIP: {e}")))?;

        let mut count = 0;
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| fail(format!("Failed to read entry {i}: {e}")))?;

            let entry_path = match entry.enclosed_name() {
                Some(p) => p.to_path_buf(),
                None => {
                    log::warn!("Skipping unsafe zip entry '{}'", entry.name());
                    continue;
                }
            };
            let output_path = dest.join(entry_path);

            if entry.is_dir() {
                fs::create_dir_all(&output_path).map_err(|e| fail(format!("Failed to create dir: {e}")))?;
            } else {
                if let Some(parent) = output_path.parent() {
                    fs::create_dir_all(parent).map_err(|e| fail(format!("Failed to create parent: {e}")))?;
                }
                let mut outfile =
                    fs::File::create(&output_path).map_err(|e| fail(format!("Failed to create file: {e}")))?;
                io::copy(&mut entry, &mut outfile).map_err(|e| fail(format!("Failed to write file: {e}")))?;
                count += 1;
            }
        }
        Ok(count)
    }
}

pub struct SevenZLibrary;

impl ExtractionStrategy for SevenZLibrary {
    fn name(&self) -> &str {
        "7z-library"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Library
    }

    fn supports(&self, format: ArchiveFormat) -> bool {
        format == ArchiveFormat::SevenZ
    }

    fn extract(&self, archive: &Path, dest: &Path) -> VaultResult<usize> {
        sevenz_rust::decompress_file(archive, dest)
            .map_err(|e| VaultError::backend(self.name(), format!("Failed to extract 7z: {e}")))?;
        count_files(dest)
    }
}

pub struct RarLibrary;

impl ExtractionStrategy for RarLibrary {
    fn name(&self) -> &str {
        "rar-library"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Library
    }

    fn supports(&self, format: ArchiveFormat) -> bool {
        format == ArchiveFormat::Rar
    }

    fn extract(&self, archive: &Path, dest: &Path) -> VaultResult<usize> {
        let path_str = archive
            .to_str()
            .ok_or_else(|| VaultError::backend(self.name(), "RAR path contains invalid UTF-8"))?;
        let dest_str = dest
            .to_str()
            .ok_or_else(|| VaultError::backend(self.name(), "Dest path contains invalid UTF-8"))?;

        rar::Archive::extract_all(path_str, dest_str, "")
            .map_err(|e| VaultError::backend(self.name(), format!("Failed to extract RAR: {e:?}")))?;
        count_files(dest)
    }
}

// ── External tools ───────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFlavor {
    /// `7z`, `7zz`, `7za`: handles zip, 7z and rar.
    SevenZip,
    Unrar,
}

/// A command-line extractor found on this machine.
pub struct ExternalTool {
    name: String,
    program: PathBuf,
    flavor: ToolFlavor,
}

impl ExternalTool {
    pub fn new(program: PathBuf, flavor: ToolFlavor) -> Self {
        let stem = program
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "tool".to_string());
        Self {
            name: format!("external:{stem}"),
            program,
            flavor,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, archive: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.flavor {
            ToolFlavor::SevenZip => {
                let mut out_arg = std::ffi::OsString::from("-o");
                out_arg.push(dest.as_os_str());
                cmd.arg("x").arg("-y").arg("-bd").arg(out_arg).arg(archive);
            }
            ToolFlavor::Unrar => {
                // unrar treats the destination as a directory only with a trailing separator.
                let mut dest_arg = dest.as_os_str().to_os_string();
                dest_arg.push(std::path::MAIN_SEPARATOR_STR);
                cmd.arg("x").arg("-o+").arg("-y").arg(archive).arg(dest_arg);
            }
        }
        cmd
    }
}

impl ExtractionStrategy for ExternalTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::ExternalTool
    }

    fn supports(&self, format: ArchiveFormat) -> bool {
        match self.flavor {
            ToolFlavor::SevenZip => true,
            ToolFlavor::Unrar => format == ArchiveFormat::Rar,
        }
    }

    fn extract(&self, archive: &Path, dest: &Path) -> VaultResult<usize> {
        fs::create_dir_all(dest).map_err(|e| VaultError::backend(self.name(), e))?;
        let output = self
            .command(archive, dest)
            .output()
            .map_err(|e| VaultError::backend(self.name(), format!("Failed to start: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VaultError::backend(
                self.name(),
                format!("Exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        count_files(dest)
    }
}

// ── Raw copy ─────────────────────────────────────────

/// Last resort: the untouched archive is copied into the destination as-is.
pub struct RawCopy;

impl ExtractionStrategy for RawCopy {
    fn name(&self) -> &str {
        "raw-copy"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::RawCopy
    }

    fn supports(&self, _format: ArchiveFormat) -> bool {
        true
    }

    fn extract(&self, archive: &Path, dest: &Path) -> VaultResult<usize> {
        let file_name = archive
            .file_name()
            .ok_or_else(|| VaultError::InvalidInput(format!("No file name: {}", archive.display())))?;
        fs::create_dir_all(dest).map_err(|e| VaultError::io_at("create", dest, e))?;
        let target = dest.join(file_name);
        if target != archive {
            fs::copy(archive, &target).map_err(|e| VaultError::io_at("copy", archive, e))?;
        }
        Ok(1)
    }
}

fn count_files(dest: &Path) -> VaultResult<usize> {
    Ok(list_files(dest)?.len())
}

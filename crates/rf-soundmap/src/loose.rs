//! Loose Payload Files
//!
//! Payloads shipped as standalone `<hash>.<ext>` files instead of inside
//! a container or bank.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::SoundMapResult;

/// Extension of loose payload files
pub const LOOSE_EXTENSION: &str = "wem";

/// hash → path relative to the scanned directory
#[derive(Debug, Clone, Default)]
pub struct LooseFiles {
    files: HashMap<u64, PathBuf>,
}

impl LooseFiles {
    /// Recursively collect files named `<hash>.<extension>` under `dir`
    pub fn scan(dir: &Path, extension: &str) -> SoundMapResult<Self> {
        let mut files = HashMap::new();

        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let matches_ext = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if !matches_ext {
                continue;
            }

            let Some(hash) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok())
            else {
                log::trace!("Skipping non-hash file {}", path.display());
                continue;
            };

            let relative = path.strip_prefix(dir).unwrap_or(path).to_path_buf();
            files.insert(hash, relative);
        }

        log::info!("Found {} loose files under {}", files.len(), dir.display());
        Ok(Self { files })
    }

    pub fn get(&self, hash: u64) -> Option<&Path> {
        self.files.get(&hash).map(PathBuf::as_path)
    }

    /// Path as stored in the index, with `/` separators
    pub fn file_name(&self, hash: u64) -> Option<String> {
        self.get(hash)
            .map(|path| path.to_string_lossy().replace('\\', "/"))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FromIterator<(u64, PathBuf)> for LooseFiles {
    fn from_iter<I: IntoIterator<Item = (u64, PathBuf)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

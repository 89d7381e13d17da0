//! Container Index
//!
//! Streaming containers hold many payloads addressed by hash. The upstream
//! container info is a set of parallel arrays; this module turns it into a
//! hash → record lookup in one pass.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SoundMapResult;
use crate::sound::Location;

/// Default container file name pattern
pub const DEFAULT_CONTAINER_PATTERN: &str = "sfx_container_{index}.opuspak";

/// Placeholder replaced by the container number
pub const INDEX_PLACEHOLDER: &str = "{index}";

/// Container table errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("{field} has {found} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTAINER TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Parallel arrays as exported upstream. Entry `i` of every array
/// describes the same payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTable {
    #[serde(rename = "OpusHashes")]
    pub hashes: Vec<u64>,
    #[serde(rename = "PackIndices")]
    pub containers: Vec<u32>,
    #[serde(rename = "OpusOffsets")]
    pub offsets: Vec<u64>,
    #[serde(rename = "OpusStreamLengths")]
    pub lengths: Vec<u64>,
    #[serde(rename = "RiffOpusOffsets", default, skip_serializing_if = "Option::is_none")]
    pub riff_offsets: Option<Vec<u64>>,
    #[serde(rename = "WavStreamLengths", default, skip_serializing_if = "Option::is_none")]
    pub wav_lengths: Option<Vec<u64>>,
}

impl ContainerTable {
    pub fn from_json_str(json: &str) -> SoundMapResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> SoundMapResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Every array must have one entry per hash
    pub fn validate(&self) -> Result<(), ContainerError> {
        let expected = self.hashes.len();
        let check = |field: &'static str, found: usize| {
            if found == expected {
                Ok(())
            } else {
                Err(ContainerError::LengthMismatch {
                    field,
                    expected,
                    found,
                })
            }
        };

        check("PackIndices", self.containers.len())?;
        check("OpusOffsets", self.offsets.len())?;
        check("OpusStreamLengths", self.lengths.len())?;
        if let Some(riff) = &self.riff_offsets {
            check("RiffOpusOffsets", riff.len())?;
        }
        if let Some(wav) = &self.wav_lengths {
            check("WavStreamLengths", wav.len())?;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTAINER INDEX
// ═══════════════════════════════════════════════════════════════════════════════

/// Physical location of one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub hash: u64,
    /// Container file name
    pub container: String,
    /// Ordinal within the container's contiguous run
    pub index: u32,
    pub offset: u64,
    pub length: u64,
    pub riff_offset: Option<u64>,
    pub wav_length: Option<u64>,
}

impl ContainerRecord {
    pub fn location(&self) -> Location {
        Location::Container {
            container: self.container.clone(),
            index: self.index,
            offset: self.offset,
            length: self.length,
            riff_offset: self.riff_offset,
            wav_length: self.wav_length,
        }
    }
}

/// hash → record, read-only once built
#[derive(Debug, Clone, Default)]
pub struct ContainerIndex {
    records: HashMap<u64, ContainerRecord>,
}

impl ContainerIndex {
    /// Build in one linear pass.
    ///
    /// The ordinal restarts whenever the owning container changes between
    /// consecutive entries, so a container that appears in two separate runs
    /// restarts at 0 for the second run. A duplicate hash keeps its last
    /// record.
    pub fn build(table: &ContainerTable, pattern: &str) -> Result<Self, ContainerError> {
        table.validate()?;

        let mut records = HashMap::with_capacity(table.len());
        let mut names: HashMap<u32, String> = HashMap::new();
        let mut current: Option<u32> = None;
        let mut ordinal = 0u32;

        for (i, &hash) in table.hashes.iter().enumerate() {
            let container = table.containers[i];
            if current != Some(container) {
                current = Some(container);
                ordinal = 0;
            }

            let name = names
                .entry(container)
                .or_insert_with(|| container_file_name(pattern, container))
                .clone();

            let record = ContainerRecord {
                hash,
                container: name,
                index: ordinal,
                offset: table.offsets[i],
                length: table.lengths[i],
                riff_offset: table.riff_offsets.as_ref().map(|v| v[i]),
                wav_length: table.wav_lengths.as_ref().map(|v| v[i]),
            };
            if let Some(previous) = records.insert(hash, record) {
                log::debug!(
                    "Duplicate container hash {hash}: replacing entry in {}",
                    previous.container
                );
            }
            ordinal += 1;
        }

        log::info!(
            "Container index: {} entries across {} containers",
            records.len(),
            names.len()
        );
        Ok(Self { records })
    }

    pub fn get(&self, hash: u64) -> Option<&ContainerRecord> {
        self.records.get(&hash)
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.records.contains_key(&hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Expand the `{index}` placeholder
pub fn container_file_name(pattern: &str, container: u32) -> String {
    pattern.replace(INDEX_PLACEHOLDER, &container.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

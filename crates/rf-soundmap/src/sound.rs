//! Sound Entries
//!
//! One entry per source hash discovered under an event. Reaching the same
//! hash along several paths merges the entries: condition sets are unioned,
//! scalar fields must agree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::params::ParameterContext;

/// Where a payload physically lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    /// Inside a streaming container
    Container {
        container: String,
        index: u32,
        offset: u64,
        length: u64,
        #[serde(rename = "riffOffset", default, skip_serializing_if = "Option::is_none")]
        riff_offset: Option<u64>,
        #[serde(rename = "wavLength", default, skip_serializing_if = "Option::is_none")]
        wav_length: Option<u64>,
    },
    /// Embedded in one or more banks
    Embedded { banks: Vec<String> },
    /// A loose file next to the game data
    Loose { file: String },
}

impl Location {
    pub fn container(&self) -> Option<&str> {
        match self {
            Location::Container { container, .. } => Some(container),
            _ => None,
        }
    }
}

/// A scalar field that differed between two discoveries of one hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict {
    pub hash: u64,
    pub field: &'static str,
}

impl fmt::Display for FieldConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sound {} has conflicting {}", self.hash, self.field)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOUND ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// A playable payload and the conditions that lead to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundEntry {
    pub hash: u64,
    pub is_music: bool,
    pub is_embedded: bool,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(flatten)]
    pub params: ParameterContext,
}

impl SoundEntry {
    pub fn new(hash: u64) -> Self {
        Self {
            hash,
            is_music: false,
            is_embedded: false,
            location: None,
            params: ParameterContext::new(),
        }
    }

    pub fn with_music(mut self, is_music: bool) -> Self {
        self.is_music = is_music;
        self
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.is_embedded = matches!(location, Some(Location::Embedded { .. }));
        self.location = location;
        self
    }

    pub fn with_params(mut self, params: ParameterContext) -> Self {
        self.params = params;
        self
    }

    /// True when the payload can be found on disk
    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }

    /// Merge another discovery of the same hash.
    ///
    /// Nothing is modified when a conflict is reported.
    pub fn merge(&mut self, other: &SoundEntry) -> Result<(), FieldConflict> {
        let conflict = |field| FieldConflict {
            hash: self.hash,
            field,
        };

        if self.hash != other.hash {
            return Err(conflict("hash"));
        }
        if self.is_music != other.is_music {
            return Err(conflict("isMusic"));
        }
        if self.is_embedded != other.is_embedded {
            return Err(conflict("isEmbedded"));
        }

        let location = match (&self.location, &other.location) {
            (
                Some(Location::Embedded { banks: ours }),
                Some(Location::Embedded { banks: theirs }),
            ) => {
                let mut banks = ours.clone();
                for bank in theirs {
                    if !banks.contains(bank) {
                        banks.push(bank.clone());
                    }
                }
                banks.sort();
                Some(Location::Embedded { banks })
            }
            (ours, theirs) if ours == theirs => ours.clone(),
            _ => return Err(conflict("location")),
        };

        self.location = location;
        self.params.union(&other.params);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

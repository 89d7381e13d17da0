//! Event Index and Writer
//!
//! The final artifact: event name → sounds the event can play, plus the
//! event's tags. Written with keys in case-insensitive order (exact order
//! breaks ties) and sounds ordered by hash.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;

use crate::error::SoundMapResult;
use crate::params::ParamClass;
use crate::sound::{FieldConflict, SoundEntry};

/// Indentation of pretty output
const PRETTY_INDENT: &[u8] = b"    ";

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Sounds reachable from one event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntry {
    /// Ordered by hash, one entry per hash
    pub sounds: Vec<SoundEntry>,
    pub tags: Vec<String>,
}

impl EventEntry {
    /// Merge another entry for the same event name.
    ///
    /// Nothing is modified when a conflict is reported.
    pub fn merge(&mut self, other: &EventEntry) -> Result<(), FieldConflict> {
        let mut sounds: BTreeMap<u64, SoundEntry> = self
            .sounds
            .iter()
            .map(|sound| (sound.hash, sound.clone()))
            .collect();

        for sound in &other.sounds {
            match sounds.entry(sound.hash) {
                Entry::Vacant(slot) => {
                    slot.insert(sound.clone());
                }
                Entry::Occupied(mut slot) => slot.get_mut().merge(sound)?,
            }
        }

        self.sounds = sounds.into_values().collect();
        for tag in &other.tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
        Ok(())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT INDEX
// ═══════════════════════════════════════════════════════════════════════════════

/// event name → entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct EventIndex {
    events: BTreeMap<String, EventEntry>,
}

impl EventIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event, merging with an existing entry of the same name.
    ///
    /// On conflict the existing entry is left untouched.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        entry: EventEntry,
    ) -> Result<(), FieldConflict> {
        match self.events.entry(name.into()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
            Entry::Occupied(mut slot) => slot.get_mut().merge(&entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&EventEntry> {
        self.events.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<EventEntry> {
        self.events.remove(name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entries in output order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EventEntry)> {
        let mut entries: Vec<(&str, &EventEntry)> = self
            .events
            .iter()
            .map(|(name, entry)| (name.as_str(), entry))
            .collect();
        // Stable sort over byte-ordered input keeps exact order for ties
        entries.sort_by_cached_key(|(name, _)| name.to_lowercase());
        entries.into_iter()
    }

    /// Every sound across all events, once per hash
    pub fn distinct_sounds(&self) -> BTreeMap<u64, &SoundEntry> {
        let mut sounds = BTreeMap::new();
        for entry in self.events.values() {
            for sound in &entry.sounds {
                sounds.entry(sound.hash).or_insert(sound);
            }
        }
        sounds
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writer
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize as JSON, minified or with 4-space indentation
    pub fn write_json<W: Write>(&self, writer: W, minify: bool) -> SoundMapResult<()> {
        write_json(self, writer, minify)
    }

    pub fn to_json_string(&self, minify: bool) -> SoundMapResult<String> {
        let mut buffer = Vec::new();
        self.write_json(&mut buffer, minify)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn save_json(&self, path: &Path, minify: bool) -> SoundMapResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_json(&mut writer, minify)?;
        writer.flush()?;
        log::info!("Wrote {} events to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load_json(path: &Path) -> SoundMapResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────────

    /// Invert into hash → sound with the events that reach it
    pub fn by_sound(&self) -> SoundIndex {
        let mut index = SoundIndex::default();

        for (name, entry) in self.iter() {
            for sound in &entry.sounds {
                match index.sounds.entry(sound.hash) {
                    Entry::Vacant(slot) => {
                        slot.insert(SoundRecord {
                            sound: sound.clone(),
                            events: vec![name.to_string()],
                            tags: entry.tags.clone(),
                        });
                    }
                    Entry::Occupied(mut slot) => {
                        let record = slot.get_mut();
                        if let Err(conflict) = record.sound.merge(sound) {
                            log::warn!("Event {name}: {conflict}, keeping first discovery");
                            index.conflicts += 1;
                        }
                        record.events.push(name.to_string());
                        for tag in &entry.tags {
                            if !record.tags.contains(tag) {
                                record.tags.push(tag.clone());
                            }
                        }
                    }
                }
            }
        }

        index
    }

    /// Sounds matching a query, once per hash, ordered by hash
    pub fn select(&self, query: &SoundQuery) -> Vec<SoundEntry> {
        let mut selected: BTreeMap<u64, SoundEntry> = BTreeMap::new();

        for (name, entry) in self.iter() {
            if !query.matches_event(entry) {
                continue;
            }
            for sound in entry.sounds.iter().filter(|sound| query.matches_sound(sound)) {
                match selected.entry(sound.hash) {
                    Entry::Vacant(slot) => {
                        slot.insert(sound.clone());
                    }
                    Entry::Occupied(mut slot) => {
                        if let Err(conflict) = slot.get_mut().merge(sound) {
                            log::debug!("Event {name}: {conflict}, keeping first discovery");
                        }
                    }
                }
            }
        }

        selected.into_values().collect()
    }
}

impl Serialize for EventIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.events.len()))?;
        for (name, entry) in self.iter() {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

fn write_json<T: Serialize, W: Write>(value: &T, writer: W, minify: bool) -> SoundMapResult<()> {
    if minify {
        serde_json::to_writer(writer, value)?;
    } else {
        let formatter = PrettyFormatter::with_indent(PRETTY_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
        value.serialize(&mut serializer)?;
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// SOUND INDEX
// ═══════════════════════════════════════════════════════════════════════════════

/// A sound and every event reaching it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundRecord {
    #[serde(flatten)]
    pub sound: SoundEntry,
    pub events: Vec<String>,
    pub tags: Vec<String>,
}

/// hash → sound record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundIndex {
    sounds: BTreeMap<u64, SoundRecord>,
    #[serde(skip)]
    conflicts: usize,
}

impl SoundIndex {
    pub fn get(&self, hash: u64) -> Option<&SoundRecord> {
        self.sounds.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SoundRecord> {
        self.sounds.values()
    }

    /// Hashes whose discoveries disagreed between events
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    pub fn write_json<W: Write>(&self, writer: W, minify: bool) -> SoundMapResult<()> {
        write_json(self, writer, minify)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Filter for [`EventIndex::select`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoundQuery {
    /// Event must carry this tag
    pub tag: Option<String>,
    /// Sound must carry this condition
    pub param: Option<(ParamClass, String)>,
    /// Sound must have a physical location
    pub located_only: bool,
}

impl SoundQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_param(mut self, class: ParamClass, value: impl Into<String>) -> Self {
        self.param = Some((class, value.into()));
        self
    }

    pub fn located_only(mut self) -> Self {
        self.located_only = true;
        self
    }

    pub fn matches_event(&self, entry: &EventEntry) -> bool {
        self.tag.as_deref().is_none_or(|tag| entry.has_tag(tag))
    }

    pub fn matches_sound(&self, sound: &SoundEntry) -> bool {
        if self.located_only && !sound.is_located() {
            return false;
        }
        match &self.param {
            Some((class, value)) => sound.params.contains(*class, value),
            None => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

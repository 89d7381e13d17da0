//! Event Metadata
//!
//! Event roots with their readable names and tags, plus the parameter
//! name side table. Accepts the upstream export wrapped in
//! `Data.RootChunk.root.Data`, or that inner object on its own.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{SoundMapError, SoundMapResult};
use crate::params::{ParamClass, ParameterNames};

/// Pointer to the class table inside the upstream export
const DATA_POINTER: &str = "/Data/RootChunk/root/Data";

/// Class key listing events
const EVENTS_KEY: &str = "events";

/// One event to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Graph id of the event node
    pub root_id: u64,
    /// Readable identifier, used as the index key
    pub name: String,
    pub tags: Vec<String>,
}

impl EventRecord {
    pub fn new(root_id: u64, name: impl Into<String>) -> Self {
        Self {
            root_id,
            name: name.into(),
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "wwiseId")]
    id: u64,
    #[serde(rename = "redId")]
    name: RawValue,
    #[serde(default)]
    tags: Vec<RawValue>,
}

#[derive(Deserialize)]
struct RawValue {
    #[serde(rename = "$value")]
    value: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT METADATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Events plus parameter names
#[derive(Debug, Clone, Default)]
pub struct EventMetadata {
    pub events: Vec<EventRecord>,
    pub names: ParameterNames,
}

impl EventMetadata {
    pub fn new(events: Vec<EventRecord>, names: ParameterNames) -> Self {
        Self { events, names }
    }

    pub fn load(path: &Path) -> SoundMapResult<Self> {
        let json = fs::read_to_string(path)?;
        let metadata = Self::from_json_str(&json)?;
        log::info!(
            "Loaded {} events and {} parameter names from {}",
            metadata.events.len(),
            metadata.names.len(),
            path.display()
        );
        Ok(metadata)
    }

    pub fn from_json_str(json: &str) -> SoundMapResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> SoundMapResult<Self> {
        let data = value
            .pointer(DATA_POINTER)
            .unwrap_or(value)
            .as_object()
            .ok_or_else(|| SoundMapError::Metadata("expected an object of classes".into()))?;

        let mut metadata = EventMetadata::default();
        for (key, list) in data {
            if !list.is_array() {
                continue;
            }

            if key == EVENTS_KEY {
                for item in parse_items(key, list)? {
                    metadata.events.push(EventRecord {
                        root_id: item.id,
                        name: item.name.value,
                        tags: item.tags.into_iter().map(|tag| tag.value).collect(),
                    });
                }
            } else if let Some(class) = ParamClass::from_key(key) {
                for item in parse_items(key, list)? {
                    metadata.names.insert(class, item.id, item.name.value);
                }
            } else {
                log::debug!("Ignoring metadata class {key}");
            }
        }

        if metadata.events.is_empty() {
            log::warn!("Event metadata lists no events");
        }
        Ok(metadata)
    }
}

fn parse_items(key: &str, list: &Value) -> SoundMapResult<Vec<RawItem>> {
    Vec::<RawItem>::deserialize(list).map_err(|e| SoundMapError::Metadata(format!("{key}: {e}")))
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classes() -> Value {
        json!({
            "events": [
                {
                    "wwiseId": 100,
                    "redId": { "$value": "E1" },
                    "tags": [{ "$value": "v" }, { "$value": "grunt" }]
                },
                { "wwiseId": 101, "redId": { "$value": "E2" } }
            ],
            "switch": [{ "wwiseId": 21, "redId": { "$value": "male" } }],
            "gameParameter": [{ "wwiseId": 77, "redId": { "$value": "health" } }],
            "unrelated": [{ "anything": 1 }],
            "version": 3
        })
    }

    #[test]
    fn test_unwrapped_classes() {
        let metadata = EventMetadata::from_value(&classes()).unwrap();
        assert_eq!(metadata.events.len(), 2);
        assert_eq!(
            metadata.events[0],
            EventRecord::new(100, "E1").with_tag("v").with_tag("grunt")
        );
        assert!(metadata.events[1].tags.is_empty());
        assert_eq!(metadata.names.name(ParamClass::Switch, 21), Some("male"));
        assert_eq!(metadata.names.name(ParamClass::GameParameter, 77), Some("health"));
        assert_eq!(metadata.names.len(), 2);
    }

    #[test]
    fn test_upstream_wrapper() {
        let wrapped = json!({ "Data": { "RootChunk": { "root": { "Data": classes() } } } });
        let metadata = EventMetadata::from_json_str(&wrapped.to_string()).unwrap();
        assert_eq!(metadata.events.len(), 2);
    }

    #[test]
    fn test_bad_items_are_metadata_errors() {
        let err =
            EventMetadata::from_value(&json!({ "events": [{ "wwiseId": "x" }] })).unwrap_err();
        assert!(matches!(err, SoundMapError::Metadata(msg) if msg.starts_with("events")));

        assert!(matches!(
            EventMetadata::from_value(&json!([1, 2])),
            Err(SoundMapError::Metadata(_))
        ));
    }
}

//! Parameter Context
//!
//! Gameplay conditions collected while walking from an event towards its
//! sounds. Raw numeric ids on graph nodes are translated to readable names
//! through [`ParameterNames`]; ids without a name are skipped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use rf_bank::{DataField, GraphNode};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER CLASS
// ═══════════════════════════════════════════════════════════════════════════════

/// Kind of gameplay condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamClass {
    Switch,
    SwitchGroup,
    State,
    StateGroup,
    GameParameter,
    Bus,
}

impl ParamClass {
    pub const ALL: [ParamClass; 6] = [
        ParamClass::Switch,
        ParamClass::SwitchGroup,
        ParamClass::State,
        ParamClass::StateGroup,
        ParamClass::GameParameter,
        ParamClass::Bus,
    ];

    /// Key used in metadata and output JSON
    pub fn key(&self) -> &'static str {
        match self {
            ParamClass::Switch => "switch",
            ParamClass::SwitchGroup => "switchGroup",
            ParamClass::State => "state",
            ParamClass::StateGroup => "stateGroup",
            ParamClass::GameParameter => "gameParameter",
            ParamClass::Bus => "bus",
        }
    }

    pub fn from_key(key: &str) -> Option<ParamClass> {
        ParamClass::ALL.into_iter().find(|class| class.key() == key)
    }

    /// Node data field carrying ids of this class. Buses come from the
    /// routing node's own id instead.
    pub fn source_field(&self) -> Option<DataField> {
        match self {
            ParamClass::GameParameter => Some(DataField::RtpcId),
            ParamClass::State => Some(DataField::StateId),
            ParamClass::StateGroup => Some(DataField::SwitchStateId),
            ParamClass::Switch => Some(DataField::SwitchId),
            ParamClass::SwitchGroup => Some(DataField::SwitchGroupId),
            ParamClass::Bus => None,
        }
    }
}

impl fmt::Display for ParamClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Side table: (class, numeric id) → readable name
#[derive(Debug, Clone, Default)]
pub struct ParameterNames {
    names: HashMap<ParamClass, HashMap<u64, String>>,
}

impl ParameterNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: ParamClass, id: u64, name: impl Into<String>) {
        self.names.entry(class).or_default().insert(id, name.into());
    }

    /// Builder form of [`ParameterNames::insert`]
    pub fn with(mut self, class: ParamClass, id: u64, name: impl Into<String>) -> Self {
        self.insert(class, id, name);
        self
    }

    pub fn name(&self, class: ParamClass, id: u64) -> Option<&str> {
        self.names
            .get(&class)
            .and_then(|ids| ids.get(&id))
            .map(String::as_str)
    }

    /// Total names across all classes
    pub fn len(&self) -> usize {
        self.names.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Path-local set of named conditions per class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterContext {
    classes: BTreeMap<ParamClass, BTreeSet<String>>,
}

impl ParameterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: ParamClass, value: impl Into<String>) {
        self.classes.entry(class).or_default().insert(value.into());
    }

    /// Builder form of [`ParameterContext::insert`]
    pub fn with(mut self, class: ParamClass, value: impl Into<String>) -> Self {
        self.insert(class, value);
        self
    }

    pub fn get(&self, class: ParamClass) -> Option<&BTreeSet<String>> {
        self.classes.get(&class)
    }

    pub fn contains(&self, class: ParamClass, value: &str) -> bool {
        self.classes
            .get(&class)
            .is_some_and(|values| values.contains(value))
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamClass, &BTreeSet<String>)> {
        self.classes.iter().map(|(class, values)| (*class, values))
    }

    /// Add every value of `other`
    pub fn union(&mut self, other: &ParameterContext) {
        for (class, values) in &other.classes {
            self.classes
                .entry(*class)
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// Copy of this context extended with the conditions `node` carries
    pub fn fold(&self, node: &GraphNode, names: &ParameterNames) -> ParameterContext {
        let mut folded = self.clone();

        for class in ParamClass::ALL {
            let Some(field) = class.source_field() else {
                continue;
            };
            for raw in node.values(field) {
                let Ok(id) = raw.parse::<u64>() else {
                    continue;
                };
                if let Some(name) = names.name(class, id) {
                    folded.insert(class, name);
                }
            }
        }

        if node.kind.is_bus() {
            if let Some(name) = names.name(ParamClass::Bus, node.id) {
                folded.insert(ParamClass::Bus, name);
            }
        }

        folded
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

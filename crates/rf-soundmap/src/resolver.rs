//! Event Resolver
//!
//! Walks the merged graph from an event's root id down to terminal sounds.
//!
//! Per visited id:
//! 1. stop if the id is already on the current branch (cycle)
//! 2. stop if no node carries the id (unresolved reference)
//! 3. stop if the branch is at the depth bound
//! 4. for every instance of the id: fold its conditions into a copy of
//!    the incoming context, then either emit its source hashes (terminal)
//!    or descend into its children and inline children
//!
//! The snapshot is immutable and shared by every worker; all per-event
//! state lives in the walk for that event.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::AddAssign;

use rf_bank::{GraphNode, NodeKind, NodeTable};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_DEPTH;
use crate::container::ContainerIndex;
use crate::error::SoundMapError;
use crate::index::EventEntry;
use crate::loose::LooseFiles;
use crate::metadata::EventRecord;
use crate::params::{ParameterContext, ParameterNames};
use crate::sound::{FieldConflict, Location, SoundEntry};

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Read-only state shared by all resolver workers
#[derive(Debug, Default)]
pub struct ResolverSnapshot {
    table: NodeTable,
    containers: ContainerIndex,
    names: ParameterNames,
    loose: LooseFiles,
    /// hash → banks declaring it as embedded media
    embedded: HashMap<u64, Vec<String>>,
    max_depth: usize,
}

impl ResolverSnapshot {
    pub fn new(table: NodeTable, containers: ContainerIndex, names: ParameterNames) -> Self {
        let mut embedded: HashMap<u64, Vec<String>> = HashMap::new();
        for header in table.nodes_of_kind(&NodeKind::MediaHeader) {
            let banks = embedded.entry(header.id).or_default();
            banks.extend(header.bank().map(str::to_string));
        }
        for banks in embedded.values_mut() {
            banks.sort();
            banks.dedup();
        }

        Self {
            table,
            containers,
            names,
            loose: LooseFiles::default(),
            embedded,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_loose_files(mut self, loose: LooseFiles) -> Self {
        self.loose = loose;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn table(&self) -> &NodeTable {
        &self.table
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Hashes declared as embedded by some bank
    pub fn embedded_count(&self) -> usize {
        self.embedded.len()
    }

    /// Physical location of a payload: embedded banks first, then the
    /// container index, then loose files
    pub fn locate(&self, hash: u64) -> Option<Location> {
        if let Some(banks) = self.embedded.get(&hash) {
            return Some(Location::Embedded {
                banks: banks.clone(),
            });
        }
        if let Some(record) = self.containers.get(hash) {
            return Some(record.location());
        }
        self.loose
            .file_name(hash)
            .map(|file| Location::Loose { file })
    }

    /// Resolve one event
    pub fn resolve(&self, event: &EventRecord) -> Result<Resolution, ResolveFailure> {
        let mut walk = Walk::new(self, &event.name);
        let mut path = Vec::new();

        match walk.visit(event.root_id, &ParameterContext::new(), &mut path) {
            Ok(()) => {
                log::debug!(
                    "Event {}: {} sounds ({} depth-limited, {} unresolved, {} cycles)",
                    event.name,
                    walk.sounds.len(),
                    walk.stats.depth_limited,
                    walk.stats.unresolved,
                    walk.stats.cycles
                );
                Ok(Resolution {
                    event: event.name.clone(),
                    tags: event.tags.clone(),
                    sounds: walk.sounds,
                    stats: walk.stats,
                })
            }
            Err(conflict) => Err(ResolveFailure {
                event: event.name.clone(),
                discovered: walk.sounds.len(),
                conflict,
                stats: walk.stats,
            }),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Branches cut short during a resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveStats {
    /// Branches abandoned at the depth bound
    pub depth_limited: usize,
    /// Child references with no node
    pub unresolved: usize,
    /// Branches stopped because the id was already on the path
    pub cycles: usize,
}

impl AddAssign for ResolveStats {
    fn add_assign(&mut self, other: Self) {
        self.depth_limited += other.depth_limited;
        self.unresolved += other.unresolved;
        self.cycles += other.cycles;
    }
}

/// Sounds found under one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub event: String,
    pub tags: Vec<String>,
    /// Keyed and ordered by hash
    pub sounds: BTreeMap<u64, SoundEntry>,
    pub stats: ResolveStats,
}

impl Resolution {
    pub fn into_entry(self) -> EventEntry {
        EventEntry {
            sounds: self.sounds.into_values().collect(),
            tags: self.tags,
        }
    }
}

/// An event abandoned because two paths disagreed about a sound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveFailure {
    pub event: String,
    pub conflict: FieldConflict,
    /// Sounds discovered before the conflict
    pub discovered: usize,
    pub stats: ResolveStats,
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event {}: {} after {} sounds",
            self.event, self.conflict, self.discovered
        )
    }
}

impl From<ResolveFailure> for SoundMapError {
    fn from(failure: ResolveFailure) -> Self {
        SoundMapError::MergeConflict {
            event: failure.event,
            hash: failure.conflict.hash,
            field: failure.conflict.field.to_string(),
            discovered: failure.discovered,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALK
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-event traversal state
struct Walk<'s> {
    snapshot: &'s ResolverSnapshot,
    event: &'s str,
    sounds: BTreeMap<u64, SoundEntry>,
    stats: ResolveStats,
}

impl<'s> Walk<'s> {
    fn new(snapshot: &'s ResolverSnapshot, event: &'s str) -> Self {
        Self {
            snapshot,
            event,
            sounds: BTreeMap::new(),
            stats: ResolveStats::default(),
        }
    }

    /// Visit every instance of `id`. `path` holds the ids on the current
    /// branch and is restored before returning.
    fn visit(
        &mut self,
        id: u64,
        context: &ParameterContext,
        path: &mut Vec<u64>,
    ) -> Result<(), FieldConflict> {
        if path.contains(&id) {
            log::trace!("Event {}: cycle at {id}", self.event);
            self.stats.cycles += 1;
            return Ok(());
        }

        let snapshot = self.snapshot;
        let nodes = snapshot.table.get(id);
        if nodes.is_empty() {
            log::trace!("Event {}: unresolved reference {id}", self.event);
            self.stats.unresolved += 1;
            return Ok(());
        }

        if path.len() >= snapshot.max_depth {
            log::warn!(
                "Event {}: depth limit {} reached at {id}, abandoning branch",
                self.event,
                snapshot.max_depth
            );
            self.stats.depth_limited += 1;
            return Ok(());
        }

        path.push(id);
        let result = nodes
            .iter()
            .try_for_each(|node| self.visit_node(node, context, path));
        path.pop();
        result
    }

    fn visit_node(
        &mut self,
        node: &GraphNode,
        context: &ParameterContext,
        path: &mut Vec<u64>,
    ) -> Result<(), FieldConflict> {
        let context = context.fold(node, &self.snapshot.names);

        if node.kind.is_terminal() {
            for hash in node.source_hashes() {
                self.discover(hash, node.kind.is_music(), &context)?;
            }
            return Ok(());
        }

        for &child in &node.children {
            self.visit(child, &context, path)?;
        }
        for nested in &node.nested {
            self.visit_node(nested, &context, path)?;
        }
        Ok(())
    }

    fn discover(
        &mut self,
        hash: u64,
        is_music: bool,
        context: &ParameterContext,
    ) -> Result<(), FieldConflict> {
        let entry = SoundEntry::new(hash)
            .with_music(is_music)
            .with_location(self.snapshot.locate(hash))
            .with_params(context.clone());

        match self.sounds.entry(hash) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
            Entry::Occupied(mut slot) => slot.get_mut().merge(&entry),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerTable;
    use crate::params::ParamClass;
    use rf_bank::DataField;

    fn sound(id: u64, hash: u64) -> GraphNode {
        GraphNode::new(NodeKind::Sound, id).with_data(DataField::SourceId, hash.to_string())
    }

    fn snapshot(nodes: Vec<GraphNode>) -> ResolverSnapshot {
        ResolverSnapshot::new(
            nodes.into_iter().collect(),
            ContainerIndex::default(),
            ParameterNames::default(),
        )
    }

    #[test]
    fn test_cycle_without_terminal_terminates() {
        let snap = snapshot(vec![
            GraphNode::new(NodeKind::ActorMixer, 1).with_child(2),
            GraphNode::new(NodeKind::ActorMixer, 2).with_child(3),
            GraphNode::new(NodeKind::ActorMixer, 3).with_child(1),
        ]);
        let resolution = snap.resolve(&EventRecord::new(1, "loop")).unwrap();
        assert!(resolution.sounds.is_empty());
        assert_eq!(resolution.stats.cycles, 1);
    }

    #[test]
    fn test_shared_substructure_is_not_a_cycle() {
        // 1 → {2, 3}, both → 4: diamond, 4 is visited twice
        let snap = snapshot(vec![
            GraphNode::new(NodeKind::Event, 1).with_child(2).with_child(3),
            GraphNode::new(NodeKind::Action, 2).with_child(4),
            GraphNode::new(NodeKind::Action, 3).with_child(4),
            sound(4, 40),
        ]);
        let resolution = snap.resolve(&EventRecord::new(1, "diamond")).unwrap();
        assert_eq!(resolution.sounds.len(), 1);
        assert_eq!(resolution.stats.cycles, 0);
    }

    #[test]
    fn test_unresolved_children_are_counted() {
        let snap = snapshot(vec![
            GraphNode::new(NodeKind::Event, 1).with_child(2).with_child(99),
            sound(2, 20),
        ]);
        let resolution = snap.resolve(&EventRecord::new(1, "partial")).unwrap();
        assert_eq!(resolution.sounds.len(), 1);
        assert_eq!(resolution.stats.unresolved, 1);

        let missing = snap.resolve(&EventRecord::new(12345, "missing")).unwrap();
        assert!(missing.sounds.is_empty());
        assert_eq!(missing.stats.unresolved, 1);
    }

    #[test]
    fn test_depth_guard_abandons_branch() {
        // Chain 1 → 2 → ... → 10 → sound 11, plus a shallow sound under 1
        let mut nodes: Vec<GraphNode> = (1..=10)
            .map(|id| GraphNode::new(NodeKind::ActorMixer, id).with_child(id + 1))
            .collect();
        nodes[0].children.insert(50);
        nodes.push(sound(11, 110));
        nodes.push(sound(50, 500));

        let snap = snapshot(nodes).with_max_depth(5);
        let resolution = snap.resolve(&EventRecord::new(1, "deep")).unwrap();
        assert_eq!(resolution.sounds.keys().copied().collect::<Vec<_>>(), vec![500]);
        assert_eq!(resolution.stats.depth_limited, 1);

        let unbounded = snap.with_max_depth(64);
        assert_eq!(unbounded.resolve(&EventRecord::new(1, "deep")).unwrap().sounds.len(), 2);
    }

    #[test]
    fn test_every_source_hash_is_emitted() {
        let snap = snapshot(vec![
            GraphNode::new(NodeKind::Event, 1).with_child(2),
            sound(2, 20).with_data(DataField::SourceId, "21"),
        ]);
        let resolution = snap.resolve(&EventRecord::new(1, "multi")).unwrap();
        assert_eq!(resolution.sounds.keys().copied().collect::<Vec<_>>(), vec![20, 21]);
    }

    #[test]
    fn test_every_instance_is_visited() {
        let snap = snapshot(vec![
            GraphNode::new(NodeKind::Event, 1).with_child(2),
            sound(2, 20),
            sound(2, 30),
        ]);
        let resolution = snap.resolve(&EventRecord::new(1, "twins")).unwrap();
        assert_eq!(resolution.sounds.len(), 2);
    }

    #[test]
    fn test_nested_children_inherit_context() {
        let names = ParameterNames::new()
            .with(ParamClass::SwitchGroup, 11, "gender")
            .with(ParamClass::Switch, 21, "male");
        let table: NodeTable = [
            GraphNode::new(NodeKind::SwitchContainer, 1)
                .with_data(DataField::SwitchGroupId, "11")
                .with_nested(
                    GraphNode::new(NodeKind::SwitchPackage, 21)
                        .with_data(DataField::SwitchId, "21")
                        .with_child(2),
                ),
            sound(2, 20),
        ]
        .into_iter()
        .collect();

        let snap = ResolverSnapshot::new(table, ContainerIndex::default(), names);
        let resolution = snap.resolve(&EventRecord::new(1, "switch")).unwrap();
        let entry = &resolution.sounds[&20];
        assert!(entry.params.contains(ParamClass::SwitchGroup, "gender"));
        assert!(entry.params.contains(ParamClass::Switch, "male"));
    }

    #[test]
    fn test_locate_prefers_embedded() {
        let table: NodeTable = [
            GraphNode::new(NodeKind::MediaHeader, 7).with_data(DataField::Bank, "b.bnk"),
            GraphNode::new(NodeKind::MediaHeader, 7).with_data(DataField::Bank, "a.bnk"),
            GraphNode::new(NodeKind::MediaHeader, 7).with_data(DataField::Bank, "a.bnk"),
        ]
        .into_iter()
        .collect();
        let containers = ContainerIndex::build(
            &ContainerTable {
                hashes: vec![7, 8],
                containers: vec![0, 0],
                offsets: vec![0, 10],
                lengths: vec![10, 10],
                ..Default::default()
            },
            "p{index}",
        )
        .unwrap();
        let loose: LooseFiles = [(9u64, "sfx/9.wem".into())].into_iter().collect();
        let snap = ResolverSnapshot::new(table, containers, ParameterNames::default())
            .with_loose_files(loose);

        assert_eq!(
            snap.locate(7),
            Some(Location::Embedded {
                banks: vec!["a.bnk".into(), "b.bnk".into()]
            })
        );
        assert_eq!(snap.locate(8).unwrap().container(), Some("p0"));
        assert_eq!(snap.locate(9), Some(Location::Loose { file: "sfx/9.wem".into() }));
        assert_eq!(snap.locate(10), None);
    }

    #[test]
    fn test_music_conflict_fails_event() {
        let snap = snapshot(vec![
            GraphNode::new(NodeKind::Event, 1).with_child(2).with_child(3),
            sound(2, 99),
            GraphNode::new(NodeKind::MusicTrack, 3).with_data(DataField::SourceId, "99"),
        ]);
        let failure = snap.resolve(&EventRecord::new(1, "clash")).unwrap_err();
        assert_eq!(failure.conflict.field, "isMusic");
        assert_eq!(failure.conflict.hash, 99);
        assert_eq!(failure.discovered, 1);

        let err: SoundMapError = failure.into();
        assert!(matches!(err, SoundMapError::MergeConflict { hash: 99, .. }));
    }
}

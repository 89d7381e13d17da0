//! Graph Nodes and Node Tables
//!
//! A node table maps an object id to every instance declared under that
//! id. Instances are never merged: two banks may each carry their own
//! copy of a shared object and both are kept.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BankResult;
use crate::kind::{DataField, NodeKind};

// ═══════════════════════════════════════════════════════════════════════════════
// GRAPH NODE
// ═══════════════════════════════════════════════════════════════════════════════

/// One parsed object instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub kind: NodeKind,
    pub id: u64,
    /// Child ids, meaning depends on `kind`
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub children: BTreeSet<u64>,
    /// Allow-listed raw field values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<DataField, BTreeSet<String>>,
    /// Inline children, resolved in place
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<GraphNode>,
}

impl GraphNode {
    pub fn new(kind: NodeKind, id: u64) -> Self {
        Self {
            kind,
            id,
            children: BTreeSet::new(),
            data: BTreeMap::new(),
            nested: Vec::new(),
        }
    }

    /// Builder: add a child id
    pub fn with_child(mut self, child: u64) -> Self {
        self.children.insert(child);
        self
    }

    /// Builder: add a data value
    pub fn with_data(mut self, field: DataField, value: impl Into<String>) -> Self {
        self.push_data(field, value);
        self
    }

    /// Builder: attach an inline child
    pub fn with_nested(mut self, node: GraphNode) -> Self {
        self.nested.push(node);
        self
    }

    pub fn push_data(&mut self, field: DataField, value: impl Into<String>) {
        self.data.entry(field).or_default().insert(value.into());
    }

    /// Raw values recorded for a field
    pub fn values(&self, field: DataField) -> impl Iterator<Item = &str> {
        self.data
            .get(&field)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Source hashes named by a terminal node. Values that are not
    /// numeric are skipped.
    pub fn source_hashes(&self) -> impl Iterator<Item = u64> + '_ {
        self.values(DataField::SourceId).filter_map(|v| v.parse().ok())
    }

    /// Bank this node was declared in (`MediaHeader` only)
    pub fn bank(&self) -> Option<&str> {
        self.values(DataField::Bank).next()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// id → every instance declared under that id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeTable {
    nodes: HashMap<u64, Vec<GraphNode>>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance under its id
    pub fn insert(&mut self, node: GraphNode) {
        self.nodes.entry(node.id).or_default().push(node);
    }

    /// All instances of an id (empty when unknown)
    pub fn get(&self, id: u64) -> &[GraphNode] {
        self.nodes.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of distinct ids
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of instances across all ids
    pub fn instance_count(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &[GraphNode])> {
        self.nodes.iter().map(|(id, nodes)| (*id, nodes.as_slice()))
    }

    /// Every instance of a given kind
    pub fn nodes_of_kind<'a>(&'a self, kind: &'a NodeKind) -> impl Iterator<Item = &'a GraphNode> {
        self.nodes
            .values()
            .flatten()
            .filter(move |node| &node.kind == kind)
    }

    /// Append every instance of `other`
    pub fn extend(&mut self, other: NodeTable) {
        for (id, mut nodes) in other.nodes {
            self.nodes.entry(id).or_default().append(&mut nodes);
        }
    }

    /// Concatenate per-chunk tables into one. Ids are not deduplicated.
    pub fn merge(tables: impl IntoIterator<Item = NodeTable>) -> NodeTable {
        let mut merged = NodeTable::new();
        for table in tables {
            if merged.is_empty() {
                merged = table;
            } else {
                merged.extend(table);
            }
        }
        merged
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cache
    // ─────────────────────────────────────────────────────────────────────────

    /// Write the table as a JSON cache file
    pub fn save_json(&self, path: &Path) -> BankResult<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        log::info!(
            "Saved node table cache: {} ids, {} instances → {}",
            self.len(),
            self.instance_count(),
            path.display()
        );
        Ok(())
    }

    /// Read a table written by [`NodeTable::save_json`]
    pub fn load_json(path: &Path) -> BankResult<Self> {
        let file = File::open(path)?;
        let table: NodeTable = serde_json::from_reader(BufReader::new(file))?;
        log::info!(
            "Loaded node table cache: {} ids, {} instances from {}",
            table.len(),
            table.instance_count(),
            path.display()
        );
        Ok(table)
    }
}

impl FromIterator<GraphNode> for NodeTable {
    fn from_iter<I: IntoIterator<Item = GraphNode>>(iter: I) -> Self {
        let mut table = NodeTable::new();
        for node in iter {
            table.insert(node);
        }
        table
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

//! Chunk Parsing Test Suite
//!
//! Tests cover:
//! - Failure isolation between chunks
//! - Merge order independence
//! - Inline children across the full pipeline
//! - Cache round trip of a parsed dump

use std::collections::BTreeMap;

use rf_bank::{
    ChunkGraphBuilder, DataField, DumpParseOptions, GraphNode, NodeKind, NodeTable, parse_chunks,
    parse_dump, split_chunks,
};

// ═══════════════════════════════════════════════════════════════════════════════
// TEST FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

const DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<base>
<root path="/data/sound/soundbanks" filename="init.bnk">
  <object name="CAkEvent">
    <field name="ulID" value="100"/>
    <list name="actions">
      <field name="ulActionID" value="200"/>
    </list>
  </object>
  <object name="CAkActionPlay">
    <field name="ulID" value="200"/>
    <field name="idExt" value="400"/>
  </object>
</root>
<root path="/data/sound/soundbanks" filename="weapons.bnk">
  <object name="CAkSwitchCntr">
    <field name="ulID" value="400"/>
    <field name="ulSwitchGroupID" value="11"/>
    <list name="children">
      <field name="ulChildID" value="300"/>
      <field name="ulChildID" value="301"/>
    </list>
    <list name="SwitchList">
      <object name="CAkSwitchPackage">
        <field name="ulSwitchID" value="21"/>
        <list name="NodeList">
          <field name="NodeID" value="300"/>
        </list>
      </object>
      <object name="CAkSwitchPackage">
        <field name="ulSwitchID" value="22"/>
        <list name="NodeList">
          <field name="NodeID" value="301"/>
        </list>
      </object>
    </list>
  </object>
  <object name="CAkSound">
    <field name="ulID" value="300"/>
    <field name="sourceID" value="9001"/>
  </object>
  <object name="CAkSound">
    <field name="ulID" value="301"/>
    <field name="sourceID" value="9002"/>
  </object>
  <object name="MediaHeader">
    <field name="id" value="9002"/>
    <field name="uInMemoryMediaSize" value="2048"/>
  </object>
</root>
<root path="/data/sound/soundbanks" filename="broken.bnk">
  <object name="CAkSound">
    <field name="ulID" value="500"
</root>
</base>
"#;

fn options() -> DumpParseOptions {
    DumpParseOptions::default()
        .with_threads(3)
        .with_bank_root("/data/sound/soundbanks")
}

/// Order-insensitive view of a table
fn canonical(table: &NodeTable) -> BTreeMap<u64, Vec<String>> {
    table
        .iter()
        .map(|(id, nodes)| {
            let mut rendered: Vec<String> = nodes
                .iter()
                .map(|node| serde_json::to_string(node).unwrap())
                .collect();
            rendered.sort();
            (id, rendered)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// FAILURE ISOLATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_malformed_chunk_does_not_abort_siblings() {
    let report = parse_dump(DUMP, &options()).unwrap();

    assert_eq!(report.chunks, 3);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.chunk, 2);
    assert_eq!(failure.bank, "broken.bnk");
    // Dump line of the truncated field tag
    assert_eq!(failure.line, 53);

    assert!(report.table.contains(100));
    assert!(report.table.contains(400));
    assert!(!report.table.contains(500));
}

#[test]
fn test_line_total_covers_every_chunk() {
    let report = parse_dump(DUMP, &options()).unwrap();
    let expected: u64 = split_chunks(DUMP)
        .iter()
        .map(|chunk| chunk.line_count() as u64)
        .sum();
    assert_eq!(report.lines, expected);
}

// ═══════════════════════════════════════════════════════════════════════════════
// MERGE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_merge_is_order_independent() {
    let chunks = split_chunks(DUMP);
    let reversed: Vec<_> = chunks.iter().rev().copied().collect();

    let forward = parse_chunks(&chunks, &options()).unwrap();
    let backward = parse_chunks(&reversed, &options()).unwrap();

    assert_eq!(canonical(&forward.table), canonical(&backward.table));
}

#[test]
fn test_disjoint_merge_is_commutative_and_lossless() {
    let a: NodeTable = [
        GraphNode::new(NodeKind::Event, 1).with_child(2),
        GraphNode::new(NodeKind::Action, 2).with_child(3),
    ]
    .into_iter()
    .collect();
    let b: NodeTable = [
        GraphNode::new(NodeKind::Sound, 3).with_data(DataField::SourceId, "77"),
        GraphNode::new(NodeKind::MediaHeader, 77).with_data(DataField::Bank, "x.bnk"),
    ]
    .into_iter()
    .collect();

    let ab = NodeTable::merge([a.clone(), b.clone()]);
    let ba = NodeTable::merge([b, a]);
    assert_eq!(ab, ba);
    assert_eq!(ab.len(), 4);
    assert_eq!(ab.instance_count(), 4);
}

// ═══════════════════════════════════════════════════════════════════════════════
// GRAPH SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_switch_packages_are_inline() {
    let report = parse_dump(DUMP, &options()).unwrap();
    let switch = &report.table.get(400)[0];

    assert_eq!(switch.kind, NodeKind::SwitchContainer);
    assert_eq!(switch.children.len(), 2);
    assert_eq!(switch.nested.len(), 2);
    assert!(!report.table.contains(21));
    assert!(!report.table.contains(22));

    let first = &switch.nested[0];
    assert_eq!(first.kind, NodeKind::SwitchPackage);
    assert_eq!(first.id, 21);
    assert!(first.children.contains(&300));
    assert_eq!(first.values(DataField::SwitchId).collect::<Vec<_>>(), vec!["21"]);

    // Container keeps its own group, not the packages' switch ids
    assert_eq!(switch.values(DataField::SwitchGroupId).collect::<Vec<_>>(), vec!["11"]);
    assert!(switch.values(DataField::SwitchId).next().is_none());
}

#[test]
fn test_media_header_bank_is_relative() {
    let report = parse_dump(DUMP, &options()).unwrap();
    let header = &report.table.get(9002)[0];
    assert_eq!(header.bank(), Some("weapons.bnk"));
    assert_eq!(
        header.values(DataField::InMemoryMediaSize).collect::<Vec<_>>(),
        vec!["2048"]
    );
}

#[test]
fn test_builder_is_reusable_across_chunks() {
    let builder = ChunkGraphBuilder::new();
    let chunks = split_chunks(DUMP);
    let first = builder.build_quiet(&chunks[0]).unwrap();
    let second = builder.build_quiet(&chunks[1]).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 4);
}

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_parsed_table_survives_cache() {
    let report = parse_dump(DUMP, &options()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nodes.json");

    report.table.save_json(&path).unwrap();
    let loaded = NodeTable::load_json(&path).unwrap();
    assert_eq!(loaded, report.table);
}

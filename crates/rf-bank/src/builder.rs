//! Chunk Graph Builder
//!
//! Turns one bank chunk into a node table in a single streaming pass.
//!
//! Element vocabulary:
//! - `<root path filename>`: bank marker, names the bank for `MediaHeader`s
//! - `<object name>`: starts a graph node when the type name is a node type,
//!   otherwise transparent (its fields belong to the enclosing node)
//! - `<list name>`: inline children when it is the enclosing node's
//!   designated inline list
//! - `<field name value>`: feeds the innermost open node

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunk::Chunk;
use crate::error::{BankError, BankResult};
use crate::kind::{DataField, NodeKind};
use crate::node::{GraphNode, NodeTable};
use crate::progress::{DEFAULT_PROGRESS_INTERVAL, ProgressThrottle};
use crate::tokenizer::{Attributes, SyntaxError, Token, Tokenizer};

/// Bank label used before the root marker has been read
const UNKNOWN_BANK: &str = "<unknown bank>";

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Pure chunk → node table transform, shareable across workers
#[derive(Debug, Clone)]
pub struct ChunkGraphBuilder {
    /// Bank paths are made relative to this directory when possible
    bank_root: Option<PathBuf>,
    /// Minimum interval between progress callbacks
    progress_interval: Duration,
}

impl Default for ChunkGraphBuilder {
    fn default() -> Self {
        Self {
            bank_root: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ChunkGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the bank root
    pub fn with_bank_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.bank_root = Some(root.into());
        self
    }

    /// Builder: set the progress interval
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Parse one chunk.
    ///
    /// `on_progress` receives line deltas at most once per progress
    /// interval; the deltas always sum to the chunk's line count, even
    /// when the chunk fails.
    pub fn build(
        &self,
        chunk: &Chunk<'_>,
        on_progress: &mut dyn FnMut(u64),
    ) -> BankResult<NodeTable> {
        let mut throttle =
            ProgressThrottle::new(self.progress_interval, |lines| on_progress(lines));
        let mut state = ChunkState::new(self);

        let result = state.run(chunk.text, &mut throttle);

        let total = chunk.line_count() as u64;
        throttle.advance(total.saturating_sub(throttle.seen()));
        throttle.finish();

        match result {
            Ok(()) => {
                log::debug!(
                    "Chunk {} ({}): {} ids, {} instances, {} dropped without id",
                    chunk.index,
                    state.bank_label(),
                    state.table.len(),
                    state.table.instance_count(),
                    state.dropped
                );
                Ok(state.table)
            }
            Err(err) => Err(BankError::ChunkParse {
                chunk: chunk.index,
                bank: state.bank_label().to_string(),
                line: chunk.dump_line(err.line),
                reason: err.reason,
            }),
        }
    }

    /// Parse one chunk without progress reporting
    pub fn build_quiet(&self, chunk: &Chunk<'_>) -> BankResult<NodeTable> {
        self.build(chunk, &mut |_| {})
    }

    fn bank_path(&self, attrs: &Attributes<'_>) -> String {
        let dir = attrs.get("path").unwrap_or_default().replace('\\', "/");
        let joined = Path::new(&dir).join(attrs.get("filename").unwrap_or_default());
        let relative = match self
            .bank_root
            .as_deref()
            .and_then(|root| joined.strip_prefix(root).ok())
        {
            Some(rel) => rel.to_path_buf(),
            None => joined.clone(),
        };
        relative.to_string_lossy().into_owned()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// What an open element contributed, undone when it closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Node,
    InlineList,
    Plain,
}

/// A node whose object element is still open
struct OpenNode {
    node: GraphNode,
    has_id: bool,
    /// Open inline lists directly owned by this node
    inline_lists: usize,
    /// Declared inside the parent's inline list
    inline: bool,
}

struct ChunkState<'b, 'c> {
    builder: &'b ChunkGraphBuilder,
    bank: Option<String>,
    elements: Vec<(&'c str, Scope)>,
    nodes: Vec<OpenNode>,
    table: NodeTable,
    dropped: usize,
}

impl<'b, 'c> ChunkState<'b, 'c> {
    fn new(builder: &'b ChunkGraphBuilder) -> Self {
        Self {
            builder,
            bank: None,
            elements: Vec::new(),
            nodes: Vec::new(),
            table: NodeTable::new(),
            dropped: 0,
        }
    }

    fn bank_label(&self) -> &str {
        self.bank.as_deref().unwrap_or(UNKNOWN_BANK)
    }

    fn run<F: FnMut(u64)>(
        &mut self,
        text: &'c str,
        throttle: &mut ProgressThrottle<F>,
    ) -> Result<(), SyntaxError> {
        let mut tokenizer = Tokenizer::new(text);
        let mut lines = 0usize;

        while let Some(token) = tokenizer.next_token()? {
            let consumed = tokenizer.lines_consumed();
            throttle.advance((consumed - lines) as u64);
            lines = consumed;

            match token {
                Token::Start {
                    name,
                    attrs,
                    self_closing,
                } => {
                    let scope = self
                        .open(name, &attrs)
                        .map_err(|reason| SyntaxError {
                            line: tokenizer.line(),
                            reason,
                        })?;
                    if self_closing {
                        self.close(scope);
                    } else {
                        self.elements.push((name, scope));
                    }
                }
                Token::End { name } => match self.elements.pop() {
                    None => {
                        log::trace!("Ignoring </{name}> with no open element");
                    }
                    Some((open, scope)) if open == name => self.close(scope),
                    Some((open, _)) => {
                        return Err(SyntaxError {
                            line: tokenizer.line(),
                            reason: format!("expected </{open}>, found </{name}>"),
                        });
                    }
                },
            }
        }

        if let Some((open, _)) = self.elements.last() {
            return Err(SyntaxError {
                line: tokenizer.line(),
                reason: format!("chunk ends inside <{open}>"),
            });
        }
        Ok(())
    }

    fn open(&mut self, element: &str, attrs: &Attributes<'_>) -> Result<Scope, String> {
        match element {
            "root" => {
                self.bank = Some(self.builder.bank_path(attrs));
                Ok(Scope::Plain)
            }
            "object" => Ok(self.open_object(attrs)),
            "list" => {
                let name = attrs.get("name");
                match self.nodes.last_mut() {
                    Some(top) if name.is_some() && top.node.kind.inline_list() == name => {
                        top.inline_lists += 1;
                        Ok(Scope::InlineList)
                    }
                    _ => Ok(Scope::Plain),
                }
            }
            "field" => {
                self.apply_field(attrs)?;
                Ok(Scope::Plain)
            }
            _ => Ok(Scope::Plain),
        }
    }

    fn open_object(&mut self, attrs: &Attributes<'_>) -> Scope {
        let Some(kind) = attrs.get("name").and_then(NodeKind::from_type_name) else {
            return Scope::Plain;
        };

        let inline = self.nodes.last().is_some_and(|parent| parent.inline_lists > 0);
        let mut node = GraphNode::new(kind, 0);
        if node.kind == NodeKind::MediaHeader {
            node.push_data(DataField::Bank, self.bank_label());
        }

        self.nodes.push(OpenNode {
            node,
            has_id: false,
            inline_lists: 0,
            inline,
        });
        Scope::Node
    }

    fn apply_field(&mut self, attrs: &Attributes<'_>) -> Result<(), String> {
        let Some(open) = self.nodes.last_mut() else {
            return Ok(());
        };
        let (Some(name), Some(value)) = (attrs.get("name"), attrs.get("value")) else {
            return Ok(());
        };
        let node = &mut open.node;

        if node.kind.child_field() == Some(name) {
            if let Some(child) = parse_id(&node.kind, name, value)? {
                node.children.insert(child);
            }
        }

        if node.kind.id_field() == name {
            if let Some(id) = parse_id(&node.kind, name, value)? {
                node.id = id;
                open.has_id = true;
            }
        }

        if let Some(field) = DataField::from_field_name(name) {
            node.push_data(field, value);
        }
        Ok(())
    }

    fn close(&mut self, scope: Scope) {
        match scope {
            Scope::Plain => {}
            Scope::InlineList => {
                if let Some(top) = self.nodes.last_mut() {
                    top.inline_lists = top.inline_lists.saturating_sub(1);
                }
            }
            Scope::Node => {
                let Some(open) = self.nodes.pop() else {
                    return;
                };
                if !open.has_id {
                    log::debug!(
                        "Dropping {} without id in {}",
                        open.node.kind.display_name(),
                        self.bank_label()
                    );
                    self.dropped += 1;
                    return;
                }
                match self.nodes.last_mut() {
                    Some(parent) if open.inline => parent.node.nested.push(open.node),
                    _ => self.table.insert(open.node),
                }
            }
        }
    }
}

/// Parse a numeric id. Unknown kinds tolerate garbage.
fn parse_id(kind: &NodeKind, field: &str, value: &str) -> Result<Option<u64>, String> {
    match value.trim().parse::<u64>() {
        Ok(id) => Ok(Some(id)),
        Err(_) if matches!(kind, NodeKind::Unknown(_)) => {
            log::trace!("Skipping non-numeric {field}={value:?} on {}", kind.display_name());
            Ok(None)
        }
        Err(_) => Err(format!(
            "invalid {field} value {value:?} on {}",
            kind.display_name()
        )),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::split_chunks;

    const BANK: &str = r#"<root path="/game/sound" filename="sfx.bnk">
  <object name="BankHeader">
    <field name="ulID" value="1"/>
  </object>
  <object name="CAkEvent">
    <field name="ulID" value="100"/>
    <list name="actions">
      <field name="ulActionID" value="200"/>
    </list>
  </object>
  <object name="CAkActionPlay">
    <field name="ulID" value="200"/>
    <object name="ActionParams">
      <field name="idExt" value="300"/>
    </object>
  </object>
  <object name="CAkSound">
    <field name="ulID" value="300"/>
    <object name="AkBankSourceData">
      <field name="sourceID" value="9999"/>
      <field name="uInMemoryMediaSize" value="512"/>
    </object>
  </object>
  <object name="MediaHeader">
    <field name="id" value="9999"/>
  </object>
</root>
"#;

    fn build_one(text: &str) -> BankResult<NodeTable> {
        let chunks = split_chunks(text);
        assert_eq!(chunks.len(), 1);
        ChunkGraphBuilder::new().build_quiet(&chunks[0])
    }

    #[test]
    fn test_event_action_sound() {
        let table = build_one(BANK).unwrap();
        assert_eq!(table.len(), 4);

        let event = &table.get(100)[0];
        assert_eq!(event.kind, NodeKind::Event);
        assert_eq!(event.children.iter().copied().collect::<Vec<_>>(), vec![200]);

        // Transparent object fields belong to the enclosing node
        let action = &table.get(200)[0];
        assert!(action.children.contains(&300));

        let sound = &table.get(300)[0];
        assert_eq!(sound.source_hashes().collect::<Vec<_>>(), vec![9999]);
        assert_eq!(sound.values(DataField::InMemoryMediaSize).collect::<Vec<_>>(), vec!["512"]);

        // Non-node objects are never registered
        assert!(table.get(1).is_empty());
    }

    #[test]
    fn test_media_header_records_bank() {
        let table = build_one(BANK).unwrap();
        let header = &table.get(9999)[0];
        assert_eq!(header.kind, NodeKind::MediaHeader);
        assert_eq!(header.bank(), Some("/game/sound/sfx.bnk"));

        let chunks = split_chunks(BANK);
        let table = ChunkGraphBuilder::new()
            .with_bank_root("/game")
            .build_quiet(&chunks[0])
            .unwrap();
        assert_eq!(table.get(9999)[0].bank(), Some("sound/sfx.bnk"));
    }

    #[test]
    fn test_inline_children_are_nested() {
        let text = r#"<root path="" filename="a.bnk">
<object name="CAkLayerCntr">
  <field name="ulID" value="10"/>
  <list name="children"><field name="ulChildID" value="11"/></list>
  <list name="pLayers">
    <object name="CAkLayer">
      <field name="ulLayerID" value="500"/>
      <field name="ulAssociatedChildID" value="11"/>
      <field name="RTPCID" value="77"/>
    </object>
  </list>
</object>
</root>"#;
        let table = build_one(text).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.get(500).is_empty());

        let container = &table.get(10)[0];
        assert_eq!(container.nested.len(), 1);
        let layer = &container.nested[0];
        assert_eq!(layer.kind, NodeKind::Layer);
        assert_eq!(layer.id, 500);
        assert!(layer.children.contains(&11));
        // Layer fields stay on the layer
        assert!(container.values(DataField::RtpcId).next().is_none());
        assert_eq!(layer.values(DataField::RtpcId).collect::<Vec<_>>(), vec!["77"]);
    }

    #[test]
    fn test_non_designated_list_registers_globally() {
        let text = r#"<root path="" filename="a.bnk">
<object name="CAkSwitchCntr">
  <field name="ulID" value="10"/>
  <list name="pLayers">
    <object name="CAkSwitchPackage"><field name="ulSwitchID" value="3"/></object>
  </list>
</object>
</root>"#;
        let table = build_one(text).unwrap();
        assert!(table.get(10)[0].nested.is_empty());
        assert_eq!(table.get(3)[0].kind, NodeKind::SwitchPackage);
    }

    #[test]
    fn test_node_without_id_is_dropped() {
        let text = "<root path=\"\" filename=\"a.bnk\"><object name=\"CAkSound\"><field name=\"sourceID\" value=\"1\"/></object></root>";
        assert!(build_one(text).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_kind_keeps_id_only() {
        let text = "<root path=\"\" filename=\"a.bnk\"><object name=\"CAkBus\"><field name=\"ulID\" value=\"8\"/><field name=\"ulChildID\" value=\"9\"/></object></root>";
        let table = build_one(text).unwrap();
        let bus = &table.get(8)[0];
        assert_eq!(bus.kind, NodeKind::Unknown("CAkBus".into()));
        assert!(bus.children.is_empty());
    }

    #[test]
    fn test_stray_wrapper_close_is_ignored() {
        let text = "<root path=\"\" filename=\"a.bnk\"><object name=\"CAkEvent\"><field name=\"ulID\" value=\"1\"/></object></root>\n</base>\n";
        assert_eq!(build_one(text).unwrap().len(), 1);
    }

    #[test]
    fn test_mismatched_close_is_chunk_error() {
        let text = "<root path=\"\" filename=\"a.bnk\">\n<object name=\"CAkEvent\">\n</list>\n</root>";
        match build_one(text).unwrap_err() {
            BankError::ChunkParse { chunk, bank, line, reason } => {
                assert_eq!(chunk, 0);
                assert_eq!(bank, "a.bnk");
                assert_eq!(line, 3);
                assert!(reason.contains("</object>"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_truncated_chunk_is_error() {
        let text = "<root path=\"\" filename=\"a.bnk\">\n<object name=\"CAkEvent\">\n<field name=\"ulID\" value=\"1\"/>\n";
        assert!(matches!(build_one(text), Err(BankError::ChunkParse { .. })));
    }

    #[test]
    fn test_invalid_id_on_known_kind_is_error() {
        let text = "<root path=\"\" filename=\"a.bnk\"><object name=\"CAkEvent\"><field name=\"ulID\" value=\"x\"/></object></root>";
        assert!(matches!(build_one(text), Err(BankError::ChunkParse { .. })));
    }

    #[test]
    fn test_progress_sums_to_line_count() {
        let chunks = split_chunks(BANK);
        let mut total = 0u64;
        let builder = ChunkGraphBuilder::new().with_progress_interval(Duration::ZERO);
        builder.build(&chunks[0], &mut |lines| total += lines).unwrap();
        assert_eq!(total, chunks[0].line_count() as u64);
    }
}

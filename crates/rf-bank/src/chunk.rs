//! Dump Chunking
//!
//! A dump is a sequence of `<root path=".." filename="..">` elements,
//! one per bank. Chunks are independent: each carries every node its
//! bank declares, so they can be parsed on separate workers.

use crate::tokenizer::count_newlines;

/// Opening marker of a bank element
const ROOT_MARKER: &str = "<root";

/// One bank's slice of the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Position in the dump, starting at 0
    pub index: usize,
    /// 1-based dump line the chunk starts on
    pub first_line: usize,
    pub text: &'a str,
}

impl<'a> Chunk<'a> {
    pub fn new(index: usize, first_line: usize, text: &'a str) -> Self {
        Self {
            index,
            first_line,
            text,
        }
    }

    /// Lines spanned by this chunk
    pub fn line_count(&self) -> usize {
        count_newlines(self.text) + usize::from(!self.text.is_empty() && !self.text.ends_with('\n'))
    }

    /// Translate a chunk-relative line (1-based) into a dump line
    #[inline]
    pub fn dump_line(&self, local_line: usize) -> usize {
        self.first_line + local_line.saturating_sub(1)
    }
}

/// Split a dump into per-bank chunks.
///
/// Text before the first marker (prolog, wrapper element) is dropped.
/// A trailing wrapper close tag stays in the last chunk; the builder
/// ignores close tags with nothing open.
pub fn split_chunks(dump: &str) -> Vec<Chunk<'_>> {
    let starts = marker_offsets(dump);
    let mut chunks = Vec::with_capacity(starts.len());

    let mut line = 1;
    let mut cursor = 0;
    for (index, &start) in starts.iter().enumerate() {
        line += count_newlines(&dump[cursor..start]);
        cursor = start;

        let end = starts.get(index + 1).copied().unwrap_or(dump.len());
        chunks.push(Chunk::new(index, line, &dump[start..end]));
    }

    log::debug!("Split dump into {} chunks", chunks.len());
    chunks
}

fn marker_offsets(dump: &str) -> Vec<usize> {
    let bytes = dump.as_bytes();
    dump.match_indices(ROOT_MARKER)
        .map(|(offset, _)| offset)
        .filter(|&offset| {
            // `<rootFoo` is a different element
            match bytes.get(offset + ROOT_MARKER.len()) {
                Some(&b) => b.is_ascii_whitespace() || b == b'>' || b == b'/',
                None => false,
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

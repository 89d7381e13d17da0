//! Parallel Dump Parsing
//!
//! One chunk per rayon task. Workers share nothing but the read-only dump
//! and a progress channel; per-chunk tables are merged in chunk order
//! once every worker has finished.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::builder::ChunkGraphBuilder;
use crate::chunk::{Chunk, split_chunks};
use crate::error::{BankError, BankResult};
use crate::node::NodeTable;
use crate::progress::{DEFAULT_PROGRESS_INTERVAL, watch_progress};

/// Options for a dump parse
#[derive(Debug, Clone)]
pub struct DumpParseOptions {
    /// Worker count, 0 = one per core
    pub threads: usize,
    /// Bank paths are made relative to this directory when possible
    pub bank_root: Option<PathBuf>,
    /// Minimum interval between progress reports
    pub progress_interval: Duration,
}

impl Default for DumpParseOptions {
    fn default() -> Self {
        Self {
            threads: 0,
            bank_root: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl DumpParseOptions {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_bank_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.bank_root = Some(root.into());
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    fn builder(&self) -> ChunkGraphBuilder {
        let builder = ChunkGraphBuilder::new().with_progress_interval(self.progress_interval);
        match &self.bank_root {
            Some(root) => builder.with_bank_root(root),
            None => builder,
        }
    }
}

/// A chunk that did not contribute to the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub bank: String,
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {} ({}) line {}: {}",
            self.chunk, self.bank, self.line, self.reason
        )
    }
}

/// Outcome of a dump parse
#[derive(Debug, Clone, Default)]
pub struct DumpParseReport {
    /// Merged table of every chunk that parsed
    pub table: NodeTable,
    /// Chunks found in the dump
    pub chunks: usize,
    /// Chunks that failed, in chunk order
    pub failures: Vec<ChunkFailure>,
    /// Lines processed
    pub lines: u64,
}

impl DumpParseReport {
    /// Report for a table that was not parsed (e.g. loaded from cache)
    pub fn from_table(table: NodeTable) -> Self {
        Self {
            table,
            ..Default::default()
        }
    }

    /// True when no chunk failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DRIVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Read and parse a dump file
pub fn parse_dump_file(path: &Path, options: &DumpParseOptions) -> BankResult<DumpParseReport> {
    log::info!("Reading dump {}", path.display());
    let dump = std::fs::read_to_string(path)?;
    parse_dump(&dump, options)
}

/// Split a dump into chunks and parse them in parallel
pub fn parse_dump(dump: &str, options: &DumpParseOptions) -> BankResult<DumpParseReport> {
    let chunks = split_chunks(dump);
    parse_chunks(&chunks, options)
}

/// Parse chunks in parallel, isolating failures per chunk
pub fn parse_chunks(
    chunks: &[Chunk<'_>],
    options: &DumpParseOptions,
) -> BankResult<DumpParseReport> {
    let total_lines: u64 = chunks.iter().map(|chunk| chunk.line_count() as u64).sum();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .thread_name(|i| format!("rf-bank-{i}"))
        .build()
        .map_err(|e| BankError::ThreadPool(e.to_string()))?;

    log::info!(
        "Parsing {} chunks ({} lines) on {} threads",
        chunks.len(),
        total_lines,
        pool.current_num_threads()
    );

    let builder = options.builder();
    let interval = options.progress_interval;
    let (tx, rx) = crossbeam_channel::unbounded::<u64>();

    let (results, lines) = std::thread::scope(|scope| {
        let watcher =
            scope.spawn(move || watch_progress("Parsing dump", rx, total_lines, interval));

        // Every sender clone lives inside the pool job, so the watcher
        // sees a disconnect as soon as the last chunk finishes
        let results: Vec<BankResult<NodeTable>> = pool.install(|| {
            chunks
                .par_iter()
                .map_with(tx, |tx, chunk| {
                    builder.build(chunk, &mut |lines| {
                        let _ = tx.send(lines);
                    })
                })
                .collect()
        });

        let lines = watcher.join().unwrap_or(total_lines);
        (results, lines)
    });

    let mut tables = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(table) => tables.push(table),
            Err(BankError::ChunkParse {
                chunk,
                bank,
                line,
                reason,
            }) => {
                let failure = ChunkFailure {
                    chunk,
                    bank,
                    line,
                    reason,
                };
                log::warn!("Skipping malformed {failure}");
                failures.push(failure);
            }
            Err(other) => return Err(other),
        }
    }

    let table = NodeTable::merge(tables);
    log::info!(
        "Parsed {} chunks: {} ids, {} instances, {} failed",
        chunks.len(),
        table.len(),
        table.instance_count(),
        failures.len()
    );

    Ok(DumpParseReport {
        table,
        chunks: chunks.len(),
        failures,
        lines,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

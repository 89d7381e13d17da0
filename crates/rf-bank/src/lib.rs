//! # rf-bank: Soundbank Dump Parser
//!
//! Streams a soundbank object dump into an id-addressable node graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          parse_dump                              │
//! │                                                                  │
//! │  dump text ─→ split_chunks ─→ [chunk 0] [chunk 1] ... [chunk N]  │
//! │                                   │         │             │      │
//! │                    rayon pool     ▼         ▼             ▼      │
//! │                        ChunkGraphBuilder (tokenizer, one pass)   │
//! │                                   │         │             │      │
//! │                                   ▼         ▼             ▼      │
//! │                               NodeTable NodeTable ... NodeTable  │
//! │                                   └─────────┼─────────────┘      │
//! │                                             ▼                    │
//! │                                    NodeTable::merge              │
//! │                                                                  │
//! │  progress: workers ──(crossbeam channel)──→ watcher thread       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_bank::{DumpParseOptions, parse_dump_file};
//!
//! let report = parse_dump_file(Path::new("banks.xml"), &DumpParseOptions::default())?;
//! for failure in &report.failures {
//!     eprintln!("{failure}");
//! }
//! let event = report.table.get(100);
//! ```

pub mod builder;
pub mod chunk;
pub mod error;
pub mod kind;
pub mod node;
pub mod parallel;
pub mod progress;
pub mod tokenizer;

pub use builder::ChunkGraphBuilder;
pub use chunk::{Chunk, split_chunks};
pub use error::{BankError, BankResult};
pub use kind::{DataField, NodeKind};
pub use node::{GraphNode, NodeTable};
pub use parallel::{
    ChunkFailure, DumpParseOptions, DumpParseReport, parse_chunks, parse_dump, parse_dump_file,
};
pub use progress::{
    DEFAULT_PROGRESS_INTERVAL, MIN_WATCH_INTERVAL, ProgressThrottle, watch_progress,
};
pub use tokenizer::{SyntaxError, Token, Tokenizer};

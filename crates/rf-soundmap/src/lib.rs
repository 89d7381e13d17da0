//! # rf-soundmap: Event to Sound Index
//!
//! Resolves every event of a parsed soundbank graph down to the sounds it
//! can play, with the runtime conditions gating each sound and where the
//! payload lives on disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        SoundMapPipeline                           │
//! │                                                                   │
//! │  dump ──→ rf_bank::parse_dump ──→ NodeTable ─┐                    │
//! │  container info ──→ ContainerIndex ──────────┼─→ ResolverSnapshot │
//! │  event metadata ──→ ParameterNames ──────────┘          │         │
//! │                 └─→ [EventRecord]                       │         │
//! │                           │            rayon pool       ▼         │
//! │                           └──────────────→ resolve(event) x N     │
//! │                                                   │               │
//! │                                                   ▼               │
//! │                              EventIndex (folded in event order)   │
//! │                                                   │               │
//! │                                                   ▼               │
//! │                                         JSON, pretty or minified  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rf_soundmap::{SoundMapConfig, SoundMapInputs, SoundMapPipeline};
//!
//! let pipeline = SoundMapPipeline::new(SoundMapConfig::default())?;
//! let run = pipeline.run(&SoundMapInputs {
//!     dump: "banks.xml".into(),
//!     containers: "containers.json".into(),
//!     metadata: "events.json".into(),
//!     cache: None,
//! })?;
//! run.summary.log();
//! run.write(Path::new("sfx_map.json"), false)?;
//! ```

pub mod config;
pub mod container;
pub mod error;
pub mod index;
pub mod loose;
pub mod metadata;
pub mod params;
pub mod pipeline;
pub mod resolver;
pub mod sound;

pub use config::{
    DEFAULT_MAX_DEPTH, DEFAULT_PROGRESS_INTERVAL_MS, MAX_DEPTH_LIMIT, SoundMapConfig,
};
pub use container::{
    ContainerError, ContainerIndex, ContainerRecord, ContainerTable, DEFAULT_CONTAINER_PATTERN,
    container_file_name,
};
pub use error::{SoundMapError, SoundMapResult};
pub use index::{EventEntry, EventIndex, SoundIndex, SoundQuery, SoundRecord};
pub use loose::{LOOSE_EXTENSION, LooseFiles};
pub use metadata::{EventMetadata, EventRecord};
pub use params::{ParamClass, ParameterContext, ParameterNames};
pub use pipeline::{EventFailure, RunSummary, SoundMapInputs, SoundMapPipeline, SoundMapRun};
pub use resolver::{Resolution, ResolveFailure, ResolveStats, ResolverSnapshot};
pub use sound::{FieldConflict, Location, SoundEntry};

//! Sound Map Pipeline
//!
//! Drives a full run: parse the dump (or load the cached node table),
//! build the read-only resolver snapshot, resolve every event on a worker
//! pool, then fold results into the index in event order.

use std::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rf_bank::{
    ChunkFailure, DumpParseReport, NodeTable, parse_dump, parse_dump_file, watch_progress,
};
use serde::{Deserialize, Serialize};

use crate::config::SoundMapConfig;
use crate::container::{ContainerIndex, ContainerTable};
use crate::error::{SoundMapError, SoundMapResult};
use crate::index::EventIndex;
use crate::loose::{LOOSE_EXTENSION, LooseFiles};
use crate::metadata::{EventMetadata, EventRecord};
use crate::params::ParameterNames;
use crate::resolver::{ResolveFailure, ResolveStats, Resolution, ResolverSnapshot};

/// Input files of a run
#[derive(Debug, Clone)]
pub struct SoundMapInputs {
    pub dump: PathBuf,
    pub containers: PathBuf,
    pub metadata: PathBuf,
    /// Node table cache, read when present and written otherwise
    pub cache: Option<PathBuf>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUMMARY
// ═══════════════════════════════════════════════════════════════════════════════

/// An event left out of the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFailure {
    pub event: String,
    pub hash: u64,
    pub field: String,
    /// Sounds discovered before the conflict
    pub discovered: usize,
}

impl From<ResolveFailure> for EventFailure {
    fn from(failure: ResolveFailure) -> Self {
        Self {
            event: failure.event,
            hash: failure.conflict.hash,
            field: failure.conflict.field.to_string(),
            discovered: failure.discovered,
        }
    }
}

impl fmt::Display for EventFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: sound {} has conflicting {} ({} sounds discovered)",
            self.event, self.hash, self.field, self.discovered
        )
    }
}

/// What a run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Chunks in the dump, 0 when the table came from cache
    pub chunks: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    /// Events listed in the metadata
    pub events: usize,
    /// Events written to the index
    pub resolved_events: usize,
    /// Written events without any sound
    pub empty_events: Vec<String>,
    pub failed_events: Vec<EventFailure>,
    pub distinct_sounds: usize,
    /// Distinct sounds with a physical location
    pub located_sounds: usize,
    pub stats: ResolveStats,
}

impl RunSummary {
    /// True when no chunk or event failed
    pub fn is_clean(&self) -> bool {
        self.failed_chunks.is_empty() && self.failed_events.is_empty()
    }

    /// Log the summary, failures at warn level
    pub fn log(&self) {
        for failure in &self.failed_chunks {
            log::warn!("Failed chunk {failure}");
        }
        for failure in &self.failed_events {
            log::warn!("Failed event {failure}");
        }
        for line in self.to_string().lines() {
            log::info!("{line}");
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Chunks: {} parsed, {} failed",
            self.chunks.saturating_sub(self.failed_chunks.len()),
            self.failed_chunks.len()
        )?;
        writeln!(
            f,
            "Events: {} listed, {} written, {} without sounds, {} failed",
            self.events,
            self.resolved_events,
            self.empty_events.len(),
            self.failed_events.len()
        )?;
        writeln!(
            f,
            "Sounds: {} distinct, {} located",
            self.distinct_sounds, self.located_sounds
        )?;
        write!(
            f,
            "Branches cut: {} at depth limit, {} unresolved, {} cycles",
            self.stats.depth_limited, self.stats.unresolved, self.stats.cycles
        )
    }
}

/// Index plus summary
#[derive(Debug, Clone, Default)]
pub struct SoundMapRun {
    pub index: EventIndex,
    pub summary: RunSummary,
}

impl SoundMapRun {
    pub fn write(&self, path: &Path, minify: bool) -> SoundMapResult<()> {
        self.index.save_json(path, minify)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs both phases with one configuration
#[derive(Debug, Clone)]
pub struct SoundMapPipeline {
    config: SoundMapConfig,
}

impl SoundMapPipeline {
    pub fn new(config: SoundMapConfig) -> SoundMapResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SoundMapConfig {
        &self.config
    }

    /// Full run from files
    pub fn run(&self, inputs: &SoundMapInputs) -> SoundMapResult<SoundMapRun> {
        let report = self.parse_graph(&inputs.dump, inputs.cache.as_deref())?;
        let containers = ContainerTable::load(&inputs.containers)?;
        let metadata = EventMetadata::load(&inputs.metadata)?;
        self.finish(report, &containers, metadata)
    }

    /// Full run from in-memory inputs
    pub fn resolve_dump(
        &self,
        dump: &str,
        containers: &ContainerTable,
        metadata: EventMetadata,
    ) -> SoundMapResult<SoundMapRun> {
        let report = parse_dump(dump, &self.config.parse_options())?;
        self.finish(report, containers, metadata)
    }

    /// Phase 1, or the cached table when the cache file exists.
    ///
    /// An unreadable cache falls back to parsing; failing to write the
    /// cache is logged and does not fail the run.
    pub fn parse_graph(
        &self,
        dump: &Path,
        cache: Option<&Path>,
    ) -> SoundMapResult<DumpParseReport> {
        if let Some(cache) = cache.filter(|path| path.exists()) {
            log::info!("Loading node table cache {}", cache.display());
            match NodeTable::load_json(cache) {
                Ok(table) => return Ok(DumpParseReport::from_table(table)),
                Err(e) => log::warn!(
                    "Ignoring unreadable cache {}: {e}, parsing dump",
                    cache.display()
                ),
            }
        }

        let report = parse_dump_file(dump, &self.config.parse_options())?;
        if let Some(cache) = cache {
            if let Err(e) = report.table.save_json(cache) {
                log::warn!("Could not write cache {}: {e}", cache.display());
            }
        }
        Ok(report)
    }

    /// Freeze the graph and lookup tables for phase 2
    pub fn build_snapshot(
        &self,
        table: NodeTable,
        containers: &ContainerTable,
        names: ParameterNames,
    ) -> SoundMapResult<ResolverSnapshot> {
        let index = ContainerIndex::build(containers, &self.config.container_pattern)?;
        let loose = match &self.config.loose_dir {
            Some(dir) => LooseFiles::scan(dir, LOOSE_EXTENSION)?,
            None => LooseFiles::default(),
        };

        let snapshot = ResolverSnapshot::new(table, index, names)
            .with_loose_files(loose)
            .with_max_depth(self.config.max_depth);
        log::info!(
            "Snapshot: {} ids, {} embedded hashes, depth limit {}",
            snapshot.table().len(),
            snapshot.embedded_count(),
            snapshot.max_depth()
        );
        Ok(snapshot)
    }

    /// Phase 2: resolve every event, then fold results in event order
    pub fn resolve_events(
        &self,
        snapshot: &ResolverSnapshot,
        events: &[EventRecord],
    ) -> SoundMapResult<SoundMapRun> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads())
            .thread_name(|i| format!("rf-soundmap-{i}"))
            .build()
            .map_err(|e| SoundMapError::ThreadPool(e.to_string()))?;

        log::info!(
            "Resolving {} events on {} threads",
            events.len(),
            pool.current_num_threads()
        );

        let total = events.len() as u64;
        let interval = self.config.progress_interval();
        let (tx, rx) = crossbeam_channel::unbounded::<u64>();

        let results = std::thread::scope(|scope| {
            let watcher =
                scope.spawn(move || watch_progress("Resolving events", rx, total, interval));

            let results: Vec<Result<Resolution, ResolveFailure>> = pool.install(|| {
                events
                    .par_iter()
                    .map_with(tx, |tx, event| {
                        let result = snapshot.resolve(event);
                        let _ = tx.send(1);
                        result
                    })
                    .collect()
            });

            let _ = watcher.join();
            results
        });

        let mut run = SoundMapRun::default();
        run.summary.events = events.len();

        for result in results {
            let resolution = match result {
                Ok(resolution) => resolution,
                Err(failure) => {
                    log::warn!("Omitting {failure}");
                    run.summary.stats += failure.stats;
                    run.summary.failed_events.push(failure.into());
                    continue;
                }
            };

            run.summary.stats += resolution.stats;
            let name = resolution.event.clone();
            let entry = resolution.into_entry();
            let discovered = entry.sounds.len();
            let is_empty = entry.sounds.is_empty();

            // Events sharing a name merge; a conflict drops the later one
            if let Err(conflict) = run.index.insert(name.clone(), entry) {
                log::warn!("Omitting duplicate event {name}: {conflict}");
                run.summary.failed_events.push(EventFailure {
                    event: name,
                    hash: conflict.hash,
                    field: conflict.field.to_string(),
                    discovered,
                });
                continue;
            }
            if is_empty && !run.summary.empty_events.contains(&name) {
                run.summary.empty_events.push(name);
            }
        }

        // A name first seen empty may have gained sounds from a later record
        let index = &run.index;
        run.summary
            .empty_events
            .retain(|name| index.get(name).is_some_and(|entry| entry.sounds.is_empty()));

        let sounds = run.index.distinct_sounds();
        run.summary.resolved_events = run.index.len();
        run.summary.distinct_sounds = sounds.len();
        run.summary.located_sounds = sounds.values().filter(|sound| sound.is_located()).count();
        Ok(run)
    }

    fn finish(
        &self,
        report: DumpParseReport,
        containers: &ContainerTable,
        metadata: EventMetadata,
    ) -> SoundMapResult<SoundMapRun> {
        let DumpParseReport {
            table,
            chunks,
            failures,
            ..
        } = report;

        let snapshot = self.build_snapshot(table, containers, metadata.names)?;
        let mut run = self.resolve_events(&snapshot, &metadata.events)?;
        run.summary.chunks = chunks;
        run.summary.failed_chunks = failures;
        Ok(run)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

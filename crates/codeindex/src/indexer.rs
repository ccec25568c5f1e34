//! Incremental indexer
//!
//! Keeps a [`GraphStore`] in step with a corpus of source files. Each unit
//! goes through load, parse, extract, reference collection and local
//! resolution on a worker; the results are then applied one unit at a time
//! under the graph's write lock (external resolution, upsert, reconcile).
//!
//! Per unit: `Unindexed -> Indexed -> Stale -> Indexed -> Removed`. A unit
//! whose content hash did not change is not touched. A unit that fails
//! after having been indexed keeps its previous graph content and stays
//! `Stale`, so the next scan retries it.

use crate::cancel::CancellationToken;
use crate::config::IndexerConfig;
use crate::error::{IndexError, Result};
use crate::loader::{self, LoadedSource};
use crate::registry::ParserRegistry;
use crate::report::ReindexReport;
use crate::resolver::{resolve_external, LocalResolver};
use chrono::Utc;
use codeindex_graph::{
    Edge, Entity, EntityKind, GraphSnapshot, GraphStore, SourceUnit, UnitId, UnitState,
};
use codeindex_parser_api::{LanguageParser, ParserError, ParserResult};
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use walkdir::WalkDir;

/// A file to index, with an optional language hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    /// Absolute, or relative to the corpus root
    pub path: PathBuf,
    /// Language tag overriding extension-based detection
    pub language: Option<String>,
}

impl CorpusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            language: None,
        }
    }

    /// Force the adapter for this file
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

impl From<PathBuf> for CorpusFile {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for CorpusFile {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for CorpusFile {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// A corpus file placed in the index: where it is and which unit it is.
struct Target<'f> {
    path: PathBuf,
    unit: UnitId,
    language: Option<&'f str>,
}

/// What the graph already knows about a unit when a run starts.
struct KnownUnit {
    content_hash: String,
    state: UnitState,
    language: String,
}

/// Everything a worker produced for one unit, ready to be applied.
struct PreparedUnit {
    unit: SourceUnit,
    entities: Vec<Entity>,
    edges: Vec<Edge>,
    diagnostics: usize,
}

enum Prepared {
    Ready(Box<PreparedUnit>),
    Unchanged(UnitId),
    Skipped { path: PathBuf, reason: String },
    Failed { unit: UnitId, path: PathBuf, error: ParserError },
    Cancelled,
}

/// Incremental structural indexer over one corpus root.
#[derive(Debug)]
pub struct Indexer {
    root: PathBuf,
    config: IndexerConfig,
    registry: ParserRegistry,
    graph: Arc<RwLock<GraphStore>>,
    cancel: CancellationToken,
    pool: Option<ThreadPool>,
}

impl Indexer {
    /// Create an indexer with an empty graph.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`] if the configuration is invalid or the
    /// worker pool cannot be created.
    pub fn new(
        root: impl Into<PathBuf>,
        config: IndexerConfig,
        registry: ParserRegistry,
    ) -> Result<Self> {
        Self::with_store(root, config, registry, GraphStore::new())
    }

    /// Create an indexer with the built-in adapters, configured from
    /// `config.parser`.
    ///
    /// # Errors
    ///
    /// Same as [`Indexer::new`].
    pub fn for_root(root: impl Into<PathBuf>, config: IndexerConfig) -> Result<Self> {
        let registry = ParserRegistry::with_builtin(&config.parser);
        Self::new(root, config, registry)
    }

    /// Create an indexer over an existing graph, for example one restored
    /// from a [`GraphSnapshot`]. Units whose content hash still matches are
    /// skipped by the next scan.
    ///
    /// # Errors
    ///
    /// Same as [`Indexer::new`].
    pub fn with_store(
        root: impl Into<PathBuf>,
        config: IndexerConfig,
        registry: ParserRegistry,
        store: GraphStore,
    ) -> Result<Self> {
        config.validate()?;
        let pool = if config.parallel {
            Some(build_pool(config.parallel_workers)?)
        } else {
            None
        };
        Ok(Self {
            root: root.into(),
            config,
            registry,
            graph: Arc::new(RwLock::new(store)),
            cancel: CancellationToken::new(),
            pool,
        })
    }

    /// The corpus root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The active configuration
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// The registered adapters
    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    /// Shared handle to the graph. Readers may query it while a scan runs;
    /// the indexer takes the write lock once per applied unit.
    pub fn graph(&self) -> Arc<RwLock<GraphStore>> {
        Arc::clone(&self.graph)
    }

    /// Read access to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Poisoned`] if a writer panicked.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, GraphStore>> {
        self.graph.read().map_err(|_| IndexError::Poisoned)
    }

    /// Token that cancels running and future scans until reset.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Serializable copy of the graph.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Poisoned`] if a writer panicked.
    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        Ok(self.read()?.snapshot())
    }

    /// Index exactly `files`: new and changed units are (re)indexed,
    /// unchanged ones skipped, and indexed units missing from `files` are
    /// removed.
    ///
    /// # Errors
    ///
    /// Only run-wide failures are errors ([`IndexError::Poisoned`]); every
    /// per-unit failure is listed in the report.
    pub fn scan<I>(&self, files: I) -> Result<ReindexReport>
    where
        I: IntoIterator,
        I::Item: Into<CorpusFile>,
    {
        let start = Instant::now();
        let files: Vec<CorpusFile> = files.into_iter().map(Into::into).collect();
        info!(
            "Scanning {} files under {}",
            files.len(),
            self.root.display()
        );

        let mut seen = HashSet::new();
        let targets: Vec<Target> = files
            .iter()
            .map(|file| self.target(file))
            .filter(|target| seen.insert(target.unit.clone()))
            .collect();

        let mut report = self.index_targets(&targets)?;

        if !report.cancelled {
            let missing: Vec<UnitId> = self
                .read()?
                .units()
                .map(|unit| unit.id.clone())
                .filter(|id| !seen.contains(id))
                .collect();
            for unit in missing {
                if self.cancel.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                self.remove(&unit, &mut report)?;
            }
        }

        report.elapsed = start.elapsed();
        info!(
            "Scan finished: {report} (success rate {:.1}%)",
            report.success_rate()
        );
        Ok(report)
    }

    /// Discover every file under the root whose extension has an adapter,
    /// skipping ignored directories, and [`scan`](Self::scan) them.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] if the root is not a directory.
    pub fn scan_root(&self) -> Result<ReindexReport> {
        if !self.root.is_dir() {
            return Err(IndexError::io(
                &self.root,
                io::Error::new(io::ErrorKind::NotFound, "corpus root is not a directory"),
            ));
        }

        let mut walk_failures = ReindexReport::new();
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || !self
                        .config
                        .should_ignore_dir(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.registry.supports(entry.path()) {
                        files.push(CorpusFile::new(entry.into_path()));
                    }
                }
                Err(e) => {
                    warn!("Walk error under {}: {e}", self.root.display());
                    if let Some(path) = e.path() {
                        walk_failures.add_failure(path.to_path_buf(), e.to_string());
                    }
                }
            }
        }
        debug!("Discovered {} source files", files.len());

        let mut report = self.scan(files)?;
        report.merge(walk_failures);
        Ok(report)
    }

    /// Re-index one file. A file that no longer exists is removed.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Poisoned`] if a writer panicked.
    pub fn on_file_changed(&self, path: impl AsRef<Path>) -> Result<ReindexReport> {
        let start = Instant::now();
        let file = CorpusFile::new(path.as_ref());
        let target = self.target(&file);
        if !target.path.exists() {
            return self.on_file_removed(path);
        }

        let mut report = self.index_targets(&[target])?;
        report.elapsed = start.elapsed();
        Ok(report)
    }

    /// Drop one file's unit from the graph. Unknown files are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Poisoned`] if a writer panicked.
    pub fn on_file_removed(&self, path: impl AsRef<Path>) -> Result<ReindexReport> {
        let start = Instant::now();
        let (_, unit) = self.locate(path.as_ref());
        let mut report = ReindexReport::new();
        if self.cancel.is_cancelled() {
            report.cancelled = true;
        } else {
            self.remove(&unit, &mut report)?;
        }
        report.elapsed = start.elapsed();
        Ok(report)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, GraphStore>> {
        self.graph.write().map_err(|_| IndexError::Poisoned)
    }

    /// Absolute path and unit id of `path`.
    fn locate(&self, path: &Path) -> (PathBuf, UnitId) {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let relative = absolute.strip_prefix(&self.root).unwrap_or(&absolute);
        let parts: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                Component::ParentDir => Some("..".to_string()),
                _ => None,
            })
            .collect();
        let unit = UnitId::new(parts.join("/"));
        (absolute, unit)
    }

    fn target<'f>(&self, file: &'f CorpusFile) -> Target<'f> {
        let (path, unit) = self.locate(&file.path);
        Target {
            path,
            unit,
            language: file.language.as_deref(),
        }
    }

    fn known_units(&self) -> Result<HashMap<UnitId, KnownUnit>> {
        let graph = self.read()?;
        Ok(graph
            .units()
            .map(|unit| {
                let known = KnownUnit {
                    content_hash: unit.content_hash.clone(),
                    state: unit.state,
                    language: unit.language.clone(),
                };
                (unit.id.clone(), known)
            })
            .collect())
    }

    fn index_targets(&self, targets: &[Target]) -> Result<ReindexReport> {
        let known = self.known_units()?;
        let prepared: Vec<Prepared> = match &self.pool {
            Some(pool) => pool.install(|| {
                targets
                    .par_iter()
                    .map(|target| self.prepare(target, &known))
                    .collect()
            }),
            None => targets
                .iter()
                .map(|target| self.prepare(target, &known))
                .collect(),
        };

        let mut report = ReindexReport::new();
        for item in prepared {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            self.apply(item, &mut report)?;
        }
        Ok(report)
    }

    /// Worker side: everything up to and including local resolution.
    fn prepare(&self, target: &Target, known: &HashMap<UnitId, KnownUnit>) -> Prepared {
        if self.cancel.is_cancelled() {
            return Prepared::Cancelled;
        }

        let previous = known.get(&target.unit);
        let hint = target
            .language
            .or_else(|| previous.map(|k| k.language.as_str()));
        let max_file_size = self.config.parser.max_file_size;

        let (parser, preloaded) = match self.registry.resolve(&target.path, hint, None) {
            Ok(parser) => (parser, None),
            Err(ParserError::UnsupportedLanguage(..)) if hint.is_none() => {
                match self.sniff(&target.path, max_file_size) {
                    Ok((parser, source)) => (parser, Some(source)),
                    Err(e) => return skipped(target, e),
                }
            }
            Err(e) => return skipped(target, e),
        };

        let source = match preloaded {
            Some(source) => source,
            None => match loader::load(&target.path, max_file_size) {
                Ok(source) => source,
                Err(error) => return failed(target, error),
            },
        };

        if let Some(previous) = previous {
            if previous.state == UnitState::Indexed && previous.content_hash == source.content_hash
            {
                return Prepared::Unchanged(target.unit.clone());
            }
        }

        let unit = SourceUnit::new(target.unit.clone(), &target.path, parser.language())
            .with_hash(source.content_hash.clone());
        match build_unit(parser.as_ref(), unit, &source.text, &target.path) {
            Ok(prepared) => Prepared::Ready(Box::new(prepared)),
            Err(error) => failed(target, error),
        }
    }

    /// Modeline fallback for files whose extension has no adapter.
    fn sniff(
        &self,
        path: &Path,
        max_file_size: usize,
    ) -> ParserResult<(Arc<dyn LanguageParser>, LoadedSource)> {
        let source = loader::load(path, max_file_size)?;
        let parser = self.registry.resolve(path, None, Some(source.first_line()))?;
        Ok((parser, source))
    }

    /// Serial side: one unit under the write lock.
    fn apply(&self, item: Prepared, report: &mut ReindexReport) -> Result<()> {
        match item {
            Prepared::Ready(prepared) => self.apply_unit(*prepared, report)?,
            Prepared::Unchanged(unit) => {
                trace!("{unit}: unchanged");
                report.unchanged += 1;
            }
            Prepared::Skipped { path, reason } => {
                debug!("Skipping {}: {reason}", path.display());
                if self.config.report_unsupported {
                    report.add_skipped(path, reason);
                }
            }
            Prepared::Failed { unit, path, error } => {
                warn!("Failed to index {}: {error}", path.display());
                let mut graph = self.write()?;
                if graph.unit(&unit).is_some() {
                    graph.mark_stale(&unit)?;
                }
                report.add_failure(path, error.to_string());
            }
            Prepared::Cancelled => report.cancelled = true,
        }
        Ok(())
    }

    fn apply_unit(&self, prepared: PreparedUnit, report: &mut ReindexReport) -> Result<()> {
        let PreparedUnit {
            unit,
            entities,
            mut edges,
            diagnostics,
        } = prepared;
        let id = unit.id.clone();
        let path = unit.path.clone();

        let mut graph = self.write()?;
        if graph.unit(&id).is_some() {
            graph.mark_stale(&id)?;
        }
        let external = resolve_external(&mut edges, &graph, &id);
        trace!("{id}: {external} references bound to other units");

        match graph.upsert(unit, entities, edges) {
            Ok(delta) => {
                let reconciled = graph.reconcile(&id)?;
                debug!(
                    "Indexed {id}: +{} -{} ~{} entities, {reconciled} edges reconciled",
                    delta.entities_added, delta.entities_removed, delta.entities_modified
                );
                report.indexed += 1;
                report.record_delta(&delta);
                report.edges_reconciled += reconciled;
                if diagnostics > 0 {
                    report.partial.push((path, diagnostics));
                }
            }
            Err(e) => {
                warn!("Rejected batch for {id}: {e}");
                report.add_failure(path, e.to_string());
            }
        }
        Ok(())
    }

    fn remove(&self, unit: &UnitId, report: &mut ReindexReport) -> Result<()> {
        let mut graph = self.write()?;
        if graph.unit(unit).is_none() {
            debug!("{unit} is not indexed, nothing to remove");
            return Ok(());
        }
        let delta = graph.remove_unit(unit)?;
        report.removed += 1;
        report.record_delta(&delta);
        Ok(())
    }
}

/// Parse, extract, collect references and resolve them inside the unit.
fn build_unit(
    parser: &dyn LanguageParser,
    mut unit: SourceUnit,
    text: &str,
    path: &Path,
) -> ParserResult<PreparedUnit> {
    let tree = parser.parse(text, path)?;
    let entities = parser.extract(&tree, &unit);
    let diagnostics = tree.diagnostics().len();
    if diagnostics > 0 && entities.iter().all(|e| e.kind == EntityKind::File) {
        return Err(ParserError::NoEntities(path.to_path_buf(), diagnostics));
    }

    let references = parser.collect_references(&tree, &unit, &entities);
    let edges = LocalResolver::new(&entities).resolve(references);
    trace!(
        "{}: {} entities, {} edges prepared",
        unit.id,
        entities.len(),
        edges.len()
    );

    unit.last_indexed = Some(Utc::now());
    Ok(PreparedUnit {
        unit,
        entities,
        edges,
        diagnostics,
    })
}

fn skipped(target: &Target, error: ParserError) -> Prepared {
    Prepared::Skipped {
        path: target.path.clone(),
        reason: error.to_string(),
    }
}

fn failed(target: &Target, error: ParserError) -> Prepared {
    Prepared::Failed {
        unit: target.unit.clone(),
        path: target.path.clone(),
        error,
    }
}

fn build_pool(workers: Option<usize>) -> Result<ThreadPool> {
    let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("codeindex-worker-{i}"));
    if let Some(workers) = workers {
        builder = builder.num_threads(workers);
    }
    builder
        .build()
        .map_err(|e| IndexError::config(format!("Failed to create thread pool: {e}")))
}

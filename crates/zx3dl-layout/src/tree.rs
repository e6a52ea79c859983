//! Destination tree materialization
//!
//! `TreeBuilder::materialize` turns the selected items into files below the
//! destination root:
//!
//! 1. clean policy: erase the root's contents
//! 2. plan destination paths for the grouping mode
//! 3. replace policy: clear each managed top-level directory once
//! 4. resolve items through the cache (bounded concurrency) and copy them to
//!    every planned path through a temporary sibling
//! 5. build arcade ARC files from the resolved MRA and ROM inputs
//! 6. copy the extras tree and create `TMP/`
//!
//! Per-item problems land in the returned `RunReport`; only an unusable root
//! aborts the run.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zx3dl_core::types::{
    Failure, FailureKind, GroupingMode, Item, ItemRole, KeepPolicy, RetryEvent, RunReport, Selection,
};
use zx3dl_fetch::{CacheManager, FetchError, Resolved};

use crate::arc::{plan_arc_jobs, ArcConverter, MraInput, ARC_DIR};
use crate::error::{LayoutError, Result};
use crate::plan::{plan, PlannedItem};

/// esxdos scratch directory, always present on a finished card
pub const SCRATCH_DIR: &str = "TMP";

/// Name of the extras subdirectory holding autoboot overrides
pub const AUTOBOOT_OVERRIDES: &str = "autoboot";

/// Anything that can produce a verified local copy of an item
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn resolve(&self, item: &Item) -> std::result::Result<Resolved, FetchError>;
}

#[async_trait]
impl ArtifactResolver for CacheManager {
    async fn resolve(&self, item: &Item) -> std::result::Result<Resolved, FetchError> {
        CacheManager::resolve(self, item).await
    }
}

/// Result of installing one item
struct ItemOutcome {
    retries: Vec<RetryEvent>,
    failure: Option<Failure>,
}

pub struct TreeBuilder {
    root: PathBuf,
    grouping: GroupingMode,
    policy: KeepPolicy,
    concurrency: usize,
    extras: Option<PathBuf>,
    converter: Option<Arc<dyn ArcConverter>>,
}

impl TreeBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            grouping: GroupingMode::Flat,
            policy: KeepPolicy::Replace,
            concurrency: 4,
            extras: None,
            converter: None,
        }
    }

    pub fn with_grouping(mut self, grouping: GroupingMode) -> Self {
        self.grouping = grouping;
        self
    }

    pub fn with_policy(mut self, policy: KeepPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Directory copied verbatim into the root after the items
    pub fn with_extras(mut self, extras: Option<PathBuf>) -> Self {
        self.extras = extras;
        self
    }

    pub fn with_converter(mut self, converter: Option<Arc<dyn ArcConverter>>) -> Self {
        self.converter = converter;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn materialize<R>(&self, resolver: &R, selected: &[Item], selection: &Selection) -> Result<RunReport>
    where
        R: ArtifactResolver + ?Sized,
    {
        let mut report = RunReport::new();
        self.prepare_root()?;

        let planned = plan(selected, selection, self.grouping);
        for conflict in &planned.conflicts {
            report.warn(format!(
                "{} claimed by both {} and {}; keeping {}",
                conflict.path, conflict.kept, conflict.rejected, conflict.kept
            ));
        }

        if self.policy == KeepPolicy::Replace {
            let mut dirs: Vec<PathBuf> = planned
                .managed_dirs()
                .iter()
                .map(|dir| self.root.join(dir))
                .collect();
            if !planned.inputs.is_empty() && self.converter.is_some() {
                dirs.push(self.root.join(ARC_DIR));
            }
            for dir in dirs {
                if dir.is_dir() {
                    debug!("Clearing {}", dir.display());
                    fs::remove_dir_all(&dir).map_err(|e| LayoutError::io(&dir, e))?;
                }
            }
        }

        let mut pending = Vec::new();
        for entry in &planned.placed {
            if self.policy == KeepPolicy::Keep && self.already_present(entry) {
                debug!("Keeping existing copy of {}", entry.item.key);
                report.skipped += 1;
            } else {
                pending.push(entry);
            }
        }

        info!("Installing {} items into {}", pending.len(), self.root.display());
        let outcomes: Vec<ItemOutcome> = stream::iter(pending)
            .map(|entry| self.install(resolver, entry))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        for outcome in outcomes {
            for event in outcome.retries {
                report.record_retry(event);
            }
            match outcome.failure {
                Some(failure) => {
                    warn!("{}", failure);
                    report.record_failure(failure);
                }
                None => report.installed += 1,
            }
        }

        self.build_arcade(resolver, &planned.inputs, &mut report).await;

        if let Some(extras) = &self.extras {
            self.copy_extras(extras, &mut report);
        }

        let scratch = self.root.join(SCRATCH_DIR);
        fs::create_dir_all(&scratch).map_err(|e| LayoutError::io(&scratch, e))?;

        Ok(report)
    }

    /// Create the root if needed and apply the clean policy
    fn prepare_root(&self) -> Result<()> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(LayoutError::invalid_root(&self.root, "not a directory"));
        }
        fs::create_dir_all(&self.root).map_err(|e| LayoutError::io(&self.root, e))?;

        if self.policy == KeepPolicy::Clean {
            info!("Erasing {}", self.root.display());
            let entries = fs::read_dir(&self.root).map_err(|e| LayoutError::io(&self.root, e))?;
            for entry in entries {
                let path = entry.map_err(|e| LayoutError::io(&self.root, e))?.path();
                let removed = if path.is_dir() {
                    fs::remove_dir_all(&path)
                } else {
                    fs::remove_file(&path)
                };
                removed.map_err(|e| LayoutError::io(&path, e))?;
            }
        }
        Ok(())
    }

    /// Every target exists with the expected size (any size when none is declared)
    fn already_present(&self, entry: &PlannedItem) -> bool {
        entry.targets.iter().all(|target| {
            match fs::metadata(self.root.join(target)) {
                Ok(meta) => meta.is_file() && entry.item.size.map_or(true, |size| meta.len() == size),
                Err(_) => false,
            }
        })
    }

    async fn install<R>(&self, resolver: &R, entry: &PlannedItem) -> ItemOutcome
    where
        R: ArtifactResolver + ?Sized,
    {
        let key = entry.item.key.to_string();
        let resolved = match resolver.resolve(&entry.item).await {
            Ok(resolved) => resolved,
            Err(err) => {
                return ItemOutcome {
                    retries: Vec::new(),
                    failure: Some(Failure::new(key, err.failure_kind(), err.to_string())),
                }
            }
        };

        let retries = retry_events(&resolved);
        let mut failure = None;
        for target in &entry.targets {
            let dest = self.root.join(target);
            if let Err(err) = place_file(&resolved.path, &dest).await {
                failure = Some(Failure::new(key.clone(), FailureKind::Filesystem, err.to_string()));
                break;
            }
            debug!("Wrote {}", target);
        }
        ItemOutcome { retries, failure }
    }

    /// Resolve arcade inputs and run the converter over them
    async fn build_arcade<R>(&self, resolver: &R, inputs: &[Item], report: &mut RunReport)
    where
        R: ArtifactResolver + ?Sized,
    {
        if inputs.is_empty() {
            return;
        }
        let Some(converter) = &self.converter else {
            report.warn(format!(
                "No ARC converter available; {} arcade items were not converted",
                inputs.len()
            ));
            return;
        };

        let results: Vec<(&Item, std::result::Result<Resolved, FetchError>)> = stream::iter(inputs)
            .map(|item| async move { (item, resolver.resolve(item).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let roms_dir = match tempfile::TempDir::new() {
            Ok(dir) => dir,
            Err(err) => {
                report.record_failure(Failure::new(ARC_DIR, FailureKind::Filesystem, err.to_string()));
                return;
            }
        };

        let mut mras = Vec::new();
        for (item, result) in results {
            let resolved = match result {
                Ok(resolved) => resolved,
                Err(err) => {
                    report.record_failure(Failure::new(
                        item.key.to_string(),
                        err.failure_kind(),
                        err.to_string(),
                    ));
                    continue;
                }
            };
            for event in retry_events(&resolved) {
                report.record_retry(event);
            }
            match &item.role {
                ItemRole::ArcadeRom => {
                    let staged = roms_dir.path().join(&item.dest.file_name);
                    if let Err(err) = stage(&resolved.path, &staged) {
                        report.record_failure(Failure::new(
                            item.key.to_string(),
                            FailureKind::Filesystem,
                            err.to_string(),
                        ));
                    }
                }
                ItemRole::ArcadeMra(core) => mras.push(MraInput {
                    core: core.clone(),
                    name: item.dest.file_name.clone(),
                    path: resolved.path,
                }),
                ItemRole::File => {}
            }
        }
        mras.sort_by(|a, b| a.name.cmp(&b.name));

        let jobs = plan_arc_jobs(&mras, &self.root.join(ARC_DIR));
        info!("Building {} ARC files", jobs.len());
        for job in jobs {
            match converter.convert(&job, roms_dir.path()).await {
                Ok(()) => report.installed += 1,
                Err(err) => {
                    warn!("{}", err);
                    report.record_failure(Failure::new(job.label, FailureKind::Conversion, err.to_string()));
                }
            }
        }
    }

    /// Copy the extras tree into the root, leaving out autoboot overrides
    fn copy_extras(&self, extras: &Path, report: &mut RunReport) {
        if !extras.is_dir() {
            report.warn(format!("Extras directory {} not found", extras.display()));
            return;
        }

        let walker = WalkDir::new(extras)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !(e.depth() == 1 && e.file_name() == AUTOBOOT_OVERRIDES));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    report.record_failure(Failure::new(
                        extras.display().to_string(),
                        FailureKind::Filesystem,
                        err.to_string(),
                    ));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(extras) else {
                continue;
            };
            let dest = self.root.join(relative);

            if self.policy == KeepPolicy::Keep && same_length(entry.path(), &dest) {
                report.skipped += 1;
                continue;
            }
            match copy_atomic(entry.path(), &dest) {
                Ok(()) => report.installed += 1,
                Err(err) => report.record_failure(Failure::new(
                    relative.display().to_string(),
                    FailureKind::Filesystem,
                    err.to_string(),
                )),
            }
        }
    }
}

fn retry_events(resolved: &Resolved) -> Vec<RetryEvent> {
    resolved
        .source_failures
        .iter()
        .map(|failure| RetryEvent {
            subject: resolved.key.to_string(),
            url: failure.url.clone(),
            reason: failure.error.to_string(),
        })
        .collect()
}

fn same_length(a: &Path, b: &Path) -> bool {
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => b.is_file() && a.len() == b.len(),
        _ => false,
    }
}

async fn place_file(src: &Path, dest: &Path) -> Result<()> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || copy_atomic(&src, &dest))
        .await
        .map_err(|e| LayoutError::io(PathBuf::new(), std::io::Error::other(e)))?
}

/// Copy through a temporary file in the destination directory, then rename
pub fn copy_atomic(src: &Path, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| LayoutError::invalid_root(dest, "no parent directory"))?;
    fs::create_dir_all(parent).map_err(|e| LayoutError::io(parent, e))?;

    let tmp = tempfile::Builder::new()
        .prefix(".zx3dl")
        .tempfile_in(parent)
        .map_err(|e| LayoutError::io(parent, e))?;
    fs::copy(src, tmp.path()).map_err(|e| LayoutError::io(src, e))?;
    tmp.persist(dest).map_err(|e| LayoutError::io(dest, e.error))?;
    Ok(())
}

/// Link a cached ROM into the staging directory, copying across filesystems
fn stage(src: &Path, dest: &Path) -> Result<()> {
    if fs::hard_link(src, dest).is_ok() {
        return Ok(());
    }
    fs::copy(src, dest).map_err(|e| LayoutError::io(dest, e))?;
    Ok(())
}

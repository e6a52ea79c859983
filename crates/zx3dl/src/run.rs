//! One complete card build
//!
//! Configuration, catalog, selection, cache and tree are wired together here.
//! Per-item problems end up in the returned `RunReport`; only configuration
//! problems and a missing main catalog stop the run.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use zx3dl_catalog::{build_sources, filter, Catalog, FetchMode, MainCatalog, MetadataStore, SourceOptions};
use zx3dl_core::types::{Failure, FailureKind, Item, RunReport};
use zx3dl_core::HierarchicalConfigLoader;
use zx3dl_fetch::{CacheManager, DownloadEngine, TransferRequest};
use zx3dl_layout::arc::{mra_binary_name, mra_platform_dir, ArcConverter, MraTool};
use zx3dl_layout::{AutobootInstaller, AutobootOutcome, TreeBuilder, AUTOBOOT_FILE};

use crate::cli::Cli;
use crate::output;

/// Why a run stopped before producing a report
#[derive(Debug)]
pub enum Abort {
    /// Bad arguments, configuration or destination
    Config(anyhow::Error),
    /// The main catalog could not be fetched and no cached copy exists
    Catalog(anyhow::Error),
}

impl Abort {
    pub fn exit_code(&self) -> u8 {
        match self {
            Abort::Catalog(_) => 2,
            Abort::Config(_) => 3,
        }
    }

    pub fn error(&self) -> &anyhow::Error {
        match self {
            Abort::Config(err) | Abort::Catalog(err) => err,
        }
    }
}

pub async fn run(cli: &Cli) -> std::result::Result<RunReport, Abort> {
    let selection = cli
        .selection()
        .context("Invalid selection")
        .map_err(Abort::Config)?;
    let config = HierarchicalConfigLoader::new()
        .and_then(|loader| loader.load_runtime_config())
        .context("Failed to load runtime configuration")
        .map_err(Abort::Config)?;

    let cache_root = cli.cache_dir.as_std_path();
    fs::create_dir_all(cache_root)
        .with_context(|| format!("Failed to create cache directory {}", cli.cache_dir))
        .map_err(Abort::Config)?;

    let engine = DownloadEngine::new(&config)
        .context("Failed to build HTTP client")
        .map_err(Abort::Config)?
        .with_progress(output::transfers(cli.quiet));
    let metadata_engine = engine.clone().with_retry_policy(config.retry_policy("metadata"));
    let store = Arc::new(MetadataStore::new(cache_root, metadata_engine));

    info!("Checking main catalog");
    let mode = if cli.keep {
        FetchMode::UseCache
    } else {
        FetchMode::RefreshWithFallback
    };
    let main = MainCatalog::load(&store, &config.catalog, mode)
        .await
        .context("Unable to obtain the main catalog")
        .map_err(Abort::Catalog)?;

    let options = SourceOptions {
        tags: selection.tags.clone(),
        refresh_arcade: cli.refresh,
    };
    let sources = build_sources(&main, store.clone(), &options);
    let (catalog, mut report) = Catalog::build(&sources).await;
    let selected = filter(&catalog, &selection);
    info!("Selected {} of {} catalog items", selected.len(), catalog.len());

    let converter = if needs_converter(&selected) {
        let bin_dir = cache_root.join("bin");
        match ensure_mra_tool(&engine, &bin_dir, &config.catalog.mra_tool_url).await {
            Ok(path) => Some(Arc::new(MraTool::new(path)) as Arc<dyn ArcConverter>),
            Err(err) => {
                warn!("{:#}", err);
                None
            }
        }
    } else {
        None
    };

    let out_dir = cli.out_dir.as_std_path();
    let extras = cli.extra_dir.as_ref().map(|dir| dir.as_std_path().to_path_buf());
    let cache = CacheManager::new(cache_root, engine);
    let builder = TreeBuilder::new(out_dir)
        .with_grouping(cli.grouping())
        .with_policy(cli.policy())
        .with_concurrency(config.network.max_concurrent_downloads)
        .with_extras(extras.clone())
        .with_converter(converter);

    let tree_report = builder
        .materialize(&cache, &selected, &selection)
        .await
        .with_context(|| format!("Cannot build the SD layout in {}", cli.out_dir))
        .map_err(Abort::Config)?;
    report.merge(tree_report);

    let autoboot = AutobootInstaller::new().with_extras(extras.as_deref()).install(
        out_dir,
        cli.grouping(),
        &selection,
        cli.autoboot_dir.as_deref(),
        cli.no_autoboot,
    );
    match autoboot {
        Ok(AutobootOutcome::Installed { variant, .. }) => info!("Autoboot: {}", variant),
        Ok(AutobootOutcome::Skipped(reason)) => report.warn(format!("Autoboot not installed: {}", reason)),
        Ok(AutobootOutcome::Disabled) => {}
        Err(err) => report.record_failure(Failure::new(
            AUTOBOOT_FILE,
            FailureKind::Filesystem,
            err.to_string(),
        )),
    }

    Ok(report)
}

fn needs_converter(selected: &[Item]) -> bool {
    selected.iter().any(|item| !item.is_placed())
}

/// Path of the platform's `mra` binary below `bin_dir`, downloading it once
async fn ensure_mra_tool(engine: &DownloadEngine, bin_dir: &Path, base_url: &str) -> Result<PathBuf> {
    let name = mra_binary_name();
    let path = bin_dir.join(name);
    if path.is_file() {
        return Ok(path);
    }

    fs::create_dir_all(bin_dir).with_context(|| format!("Failed to create {}", bin_dir.display()))?;
    let url = format!("{}/{}/{}", base_url.trim_end_matches('/'), mra_platform_dir(), name);
    engine
        .fetch(&TransferRequest::new(&url, "mra tool"), &path)
        .await
        .context("Failed to download the mra tool; arcade ARC files will not be built")?;
    make_executable(&path).with_context(|| format!("Failed to mark {} executable", path.display()))?;
    Ok(path)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

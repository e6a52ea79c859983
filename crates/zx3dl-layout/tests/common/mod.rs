//! Common test infrastructure for zx3dl-layout tests
//!
//! - `FakeResolver`: serves item bytes from memory and counts resolutions
//! - `RecordingConverter`: records ARC jobs and writes placeholder output
//! - item builders for cores, support files and arcade inputs

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use zx3dl_core::types::{
    ArcadeCore, CoreType, DestTemplate, Item, ItemKey, ItemRole, Kind, Source, Tag,
};
use zx3dl_fetch::{FetchError, Resolved, SourceFailure};
use zx3dl_layout::arc::{ArcConverter, ArcJob};
use zx3dl_layout::ArtifactResolver;

pub struct FakeResolver {
    dir: TempDir,
    files: HashMap<String, Vec<u8>>,
    broken: HashSet<String>,
    flaky: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            files: HashMap::new(),
            broken: HashSet::new(),
            flaky: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serve `bytes` for the item with `key`
    pub fn serve(mut self, item: &Item, bytes: &[u8]) -> Self {
        self.files.insert(item.key.to_string(), bytes.to_vec());
        self
    }

    /// Every source of the item fails
    pub fn broken(mut self, item: &Item) -> Self {
        self.broken.insert(item.key.to_string());
        self
    }

    /// The first source fails before the bytes are served
    pub fn flaky(mut self, item: &Item) -> Self {
        self.flaky.insert(item.key.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactResolver for FakeResolver {
    async fn resolve(&self, item: &Item) -> Result<Resolved, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = item.key.to_string();
        if self.broken.contains(&key) {
            return Err(FetchError::network(&item.sources[0].url, "connection refused"));
        }
        let bytes = self
            .files
            .get(&key)
            .cloned()
            .unwrap_or_else(|| item.name.clone().into_bytes());
        let path = self.dir.path().join(item.key.slug());
        fs::write(&path, bytes).unwrap();

        let source_failures = if self.flaky.contains(&key) {
            vec![SourceFailure {
                url: "https://mirror.example/down".to_string(),
                error: FetchError::network("https://mirror.example/down", "HTTP 500"),
            }]
        } else {
            Vec::new()
        };
        Ok(Resolved {
            key: item.key.clone(),
            path,
            from_cache: false,
            source_failures,
        })
    }
}

#[derive(Default)]
pub struct RecordingConverter {
    pub jobs: Mutex<Vec<ArcJob>>,
    pub roms: Mutex<Vec<String>>,
}

#[async_trait]
impl ArcConverter for RecordingConverter {
    async fn convert(&self, job: &ArcJob, roms_dir: &Path) -> zx3dl_layout::Result<()> {
        let mut staged: Vec<String> = fs::read_dir(roms_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        staged.sort();
        self.roms.lock().unwrap().extend(staged);

        fs::create_dir_all(&job.out_dir).unwrap();
        let name = job
            .arc_name
            .clone()
            .unwrap_or_else(|| job.label.replace(".mra", ".arc"));
        fs::write(job.out_dir.join(name), b"ARC").unwrap();
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}

pub fn core(name: &str, core_type: CoreType, tags: Vec<Tag>) -> Item {
    Item::new(
        ItemKey::new("cores", name),
        name,
        DestTemplate::new("ZX3", name).groupable(true).managed(true),
        Source::new(format!("https://cores.example/{}", name)).with_size(Some(name.len() as u64)),
    )
    .with_kind(Some(Kind::A35t))
    .with_core_type(Some(core_type))
    .with_tags(tags)
}

pub fn support(dir: &str, name: &str) -> Item {
    Item::new(
        ItemKey::new("sys", &format!("{}/{}", dir, name)),
        name,
        DestTemplate::new(dir, name),
        Source::new(format!("https://sys.example/{}", name)),
    )
}

pub fn arcade_rom(name: &str) -> Item {
    Item::new(
        ItemKey::new("arcade/roms", name),
        name,
        DestTemplate::new("JOTEGO", name),
        Source::new(format!("https://roms.example/{}", name)),
    )
    .with_tags(vec![Tag::Arcade])
    .with_role(ItemRole::ArcadeRom)
}

pub fn arcade_mra(core: &str, name: &str) -> Item {
    Item::new(
        ItemKey::new("arcade/mra", name),
        name,
        DestTemplate::new("JOTEGO", name),
        Source::new(format!("https://mra.example/{}", name)),
    )
    .with_tags(vec![Tag::Arcade])
    .with_role(ItemRole::ArcadeMra(ArcadeCore {
        core: core.to_string(),
        default_mra: None,
        default_arc: None,
    }))
}

/// Relative paths of every file below `root`, sorted
pub fn tree(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

pub fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
    tree(root)
        .into_iter()
        .map(|rel| {
            let bytes = fs::read(root.join(&rel)).unwrap();
            (rel, bytes)
        })
        .collect()
}

pub fn write(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, bytes).unwrap();
    path
}

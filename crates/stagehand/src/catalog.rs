//! Browser catalog cache.
//!
//! Keeps the DAW's browser tree out of the hot path: a flat list, a
//! by-category index, and a normalized-name resolver, all rebuilt
//! together and swapped atomically under one mutex. A gzip snapshot on
//! disk survives restarts; a background walk against the DAW refreshes
//! it on demand. The cache never rescans mid-session on its own.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use livewire::command::DawCommand;
use livewire::error::BridgeError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::pipeline::Pipeline;
use crate::readiness::ReadyFlag;

/// Snapshot format revision; bumped on incompatible changes.
const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_FILE: &str = "catalog.json.gz";
/// Snapshots older than this are ignored at startup.
const SNAPSHOT_MAX_AGE_DAYS: i64 = 7;

/// Walk limits against the DAW.
const WALK_DEPTH_CAP: u32 = 4;
const WALK_ITEM_CAP: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub uri: String,
    pub name: String,
    pub category: String,
    pub is_loadable: bool,
    pub depth: u32,
    pub path: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    items: Vec<CatalogItem>,
}

#[derive(Debug, Default)]
struct Indices {
    items: Vec<CatalogItem>,
    by_category: HashMap<String, Vec<usize>>,
    by_name: HashMap<String, String>,
    loaded_at: Option<DateTime<Utc>>,
    populating: bool,
}

#[derive(Debug)]
pub struct CatalogCache {
    inner: Mutex<Indices>,
    populated: ReadyFlag,
    dir: PathBuf,
}

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_space = true;
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Tie-break order when several items share a normalized name.
fn category_rank(category: &str) -> u8 {
    match category {
        "instruments" => 0,
        "drums" => 1,
        "sounds" => 2,
        "audio_effects" => 3,
        "midi_effects" => 4,
        _ => 5,
    }
}

/// Whether the input already is a catalog URI rather than a human name.
pub fn looks_like_uri(input: &str) -> bool {
    input.starts_with("query:") || input.starts_with("device:") || input.contains("://")
}

fn build_indices(items: &[CatalogItem]) -> (HashMap<String, Vec<usize>>, HashMap<String, String>) {
    let mut by_category: HashMap<String, Vec<usize>> = HashMap::new();
    // Winner per normalized name: (depth, category rank, arrival order).
    let mut winners: HashMap<String, (u32, u8, usize)> = HashMap::new();

    for (i, item) in items.iter().enumerate() {
        by_category
            .entry(item.category.clone())
            .or_default()
            .push(i);

        let key = normalize_name(&item.name);
        if key.is_empty() {
            continue;
        }
        let candidate = (item.depth, category_rank(&item.category), i);
        match winners.get(&key) {
            Some(existing) if *existing <= candidate => {}
            _ => {
                winners.insert(key, candidate);
            }
        }
    }

    let by_name = winners
        .into_iter()
        .map(|(key, (_, _, i))| (key, items[i].uri.clone()))
        .collect();
    (by_category, by_name)
}

impl CatalogCache {
    pub fn new(dir: PathBuf, populated: ReadyFlag) -> Self {
        Self {
            inner: Mutex::new(Indices::default()),
            populated,
            dir,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("catalog mutex").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_populated(&self) -> bool {
        self.populated.is_set()
    }

    /// Swap in a fresh set of indices. Readers see either the old set
    /// or the new set, never a mix.
    fn commit(&self, items: Vec<CatalogItem>) {
        let (by_category, by_name) = build_indices(&items);
        let count = items.len();
        {
            let mut inner = self.inner.lock().expect("catalog mutex");
            inner.items = items;
            inner.by_category = by_category;
            inner.by_name = by_name;
            inner.loaded_at = Some(Utc::now());
        }
        if count > 0 {
            self.populated.set();
        }
    }

    /// Resolve a human device name to a catalog URI.
    ///
    /// URIs pass through untouched. A cold cache gets a bounded wait;
    /// if it is still cold, or the name is unknown, the input passes
    /// through unchanged and the DAW gets the final word.
    pub async fn resolve(&self, name_or_uri: &str, timeout: Duration) -> String {
        if looks_like_uri(name_or_uri) {
            return name_or_uri.to_string();
        }
        if !self.populated.wait_timeout(timeout).await {
            warn!(
                "catalog not populated within {:?}, passing '{}' through",
                timeout, name_or_uri
            );
            return name_or_uri.to_string();
        }
        let inner = self.inner.lock().expect("catalog mutex");
        match inner.by_name.get(&normalize_name(name_or_uri)) {
            Some(uri) => uri.clone(),
            None => name_or_uri.to_string(),
        }
    }

    /// Case-insensitive substring search over item names.
    pub fn search(&self, query: &str, limit: usize) -> Vec<CatalogItem> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().expect("catalog mutex");
        inner
            .items
            .iter()
            .filter(|item| item.name.to_lowercase().contains(&needle))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn list_category(&self, category: &str, limit: usize) -> Vec<CatalogItem> {
        let inner = self.inner.lock().expect("catalog mutex");
        match inner.by_category.get(category) {
            Some(indices) => indices
                .iter()
                .take(limit)
                .map(|&i| inner.items[i].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn categories(&self) -> Vec<String> {
        let inner = self.inner.lock().expect("catalog mutex");
        let mut cats: Vec<String> = inner.by_category.keys().cloned().collect();
        cats.sort();
        cats
    }

    pub fn status(&self) -> Value {
        let inner = self.inner.lock().expect("catalog mutex");
        let state = if inner.populating {
            "refreshing"
        } else if !inner.items.is_empty() {
            "populated"
        } else {
            "cold"
        };
        json!({
            "state": state,
            "items": inner.items.len(),
            "categories": inner.by_category.len(),
            "loaded_at": inner.loaded_at,
        })
    }

    /// Load the on-disk snapshot if present, young enough, and the
    /// right revision. Returns whether anything was loaded.
    pub fn load_from_disk(&self) -> bool {
        let path = self.dir.join(SNAPSHOT_FILE);
        let snapshot = match read_snapshot(&path) {
            Ok(Some(s)) => s,
            Ok(None) => return false,
            Err(e) => {
                warn!("ignoring catalog snapshot {}: {}", path.display(), e);
                return false;
            }
        };
        let age = Utc::now() - snapshot.saved_at;
        if age.num_days() >= SNAPSHOT_MAX_AGE_DAYS {
            info!(
                "catalog snapshot is {} days old, waiting for a fresh populate",
                age.num_days()
            );
            return false;
        }
        let count = snapshot.items.len();
        self.commit(snapshot.items);
        info!("catalog loaded from disk: {} items", count);
        count > 0
    }

    fn save_to_disk(&self, items: &[CatalogItem]) {
        if let Err(e) = write_snapshot(&self.dir, items) {
            warn!("failed to persist catalog: {}", e);
        }
    }

    /// Walk the DAW browser breadth-first through the pipeline and
    /// commit fresh indices. At most one populate runs at a time; a
    /// concurrent request is a no-op.
    pub async fn populate(&self, pipeline: &Pipeline) -> Result<usize, BridgeError> {
        {
            let mut inner = self.inner.lock().expect("catalog mutex");
            if inner.populating {
                debug!("populate already running, skipping");
                return Ok(0);
            }
            inner.populating = true;
        }

        let walked = self.walk(pipeline).await;

        {
            let mut inner = self.inner.lock().expect("catalog mutex");
            inner.populating = false;
        }

        let items = walked?;
        let count = items.len();
        self.save_to_disk(&items);
        self.commit(items);
        info!("catalog populated: {} items", count);
        Ok(count)
    }

    async fn walk(&self, pipeline: &Pipeline) -> Result<Vec<CatalogItem>, BridgeError> {
        let root = pipeline
            .run_daw(DawCommand::new("get_browser_root"), None)
            .await?;
        let mut queue: VecDeque<(BrowseEntry, u32, Vec<String>)> = parse_entries(&root)?
            .into_iter()
            .map(|e| (e, 0, Vec::new()))
            .collect();

        let mut items = Vec::new();
        let mut truncated = false;

        while let Some((entry, depth, path)) = queue.pop_front() {
            if items.len() >= WALK_ITEM_CAP {
                truncated = true;
                break;
            }

            let category = entry.category.clone().unwrap_or_else(|| "sounds".to_string());
            items.push(CatalogItem {
                uri: entry.uri.clone(),
                name: entry.name.clone(),
                category: category.clone(),
                is_loadable: entry.is_loadable,
                depth,
                path: path.clone(),
            });

            if entry.has_children && depth < WALK_DEPTH_CAP {
                let children = pipeline
                    .run_daw(
                        DawCommand::new("browse_children").with("uri", entry.uri.clone()),
                        None,
                    )
                    .await?;
                let mut child_path = path;
                child_path.push(entry.name);
                for mut child in parse_entries(&children)? {
                    if child.category.is_none() {
                        child.category = Some(category.clone());
                    }
                    queue.push_back((child, depth + 1, child_path.clone()));
                }
            }
        }

        if truncated {
            warn!(
                "catalog walk truncated at {} items; deeper entries are not indexed",
                WALK_ITEM_CAP
            );
        }
        Ok(items)
    }
}

/// One entry as the DAW reports it while browsing.
#[derive(Debug, Deserialize)]
struct BrowseEntry {
    uri: String,
    name: String,
    category: Option<String>,
    #[serde(default)]
    is_loadable: bool,
    #[serde(default)]
    has_children: bool,
}

fn parse_entries(result: &Value) -> Result<Vec<BrowseEntry>, BridgeError> {
    let items = result
        .get("items")
        .cloned()
        .unwrap_or_else(|| json!([]));
    serde_json::from_value(items)
        .map_err(|e| BridgeError::Protocol(format!("malformed browser listing: {}", e)))
}

fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let file = std::fs::File::open(path)
        .map_err(|e| BridgeError::internal(format!("open snapshot: {}", e)))?;
    let mut decoder = GzDecoder::new(file);
    let mut contents = String::new();
    decoder
        .read_to_string(&mut contents)
        .map_err(|e| BridgeError::internal(format!("gunzip snapshot: {}", e)))?;
    let snapshot: Snapshot = serde_json::from_str(&contents)
        .map_err(|e| BridgeError::internal(format!("parse snapshot: {}", e)))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(BridgeError::internal(format!(
            "snapshot revision {} (want {})",
            snapshot.version, SNAPSHOT_VERSION
        )));
    }
    Ok(Some(snapshot))
}

fn write_snapshot(dir: &Path, items: &[CatalogItem]) -> Result<(), BridgeError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| BridgeError::internal(format!("create catalog dir: {}", e)))?;
    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        items: items.to_vec(),
    };
    let json = serde_json::to_vec(&snapshot)
        .map_err(|e| BridgeError::internal(format!("encode snapshot: {}", e)))?;

    // Write-then-rename so readers never see a torn file.
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| BridgeError::internal(format!("temp snapshot: {}", e)))?;
    let mut encoder = GzEncoder::new(tmp, Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| BridgeError::internal(format!("gzip snapshot: {}", e)))?;
    let tmp = encoder
        .finish()
        .map_err(|e| BridgeError::internal(format!("finish snapshot: {}", e)))?;
    tmp.persist(dir.join(SNAPSHOT_FILE))
        .map_err(|e| BridgeError::internal(format!("persist snapshot: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(uri: &str, name: &str, category: &str, depth: u32) -> CatalogItem {
        CatalogItem {
            uri: uri.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            is_loadable: true,
            depth,
            path: Vec::new(),
        }
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_name("Wavetable"), "wavetable");
        assert_eq!(normalize_name("EQ Eight"), "eq eight");
        assert_eq!(normalize_name("Drum-Rack (64)"), "drum rack 64");
        assert_eq!(normalize_name("  spaced   out  "), "spaced out");
    }

    #[test]
    fn resolver_prefers_shallow_then_category() {
        let items = vec![
            item("query:deep", "Wavetable", "sounds", 3),
            item("query:shallow", "Wavetable", "sounds", 1),
            item("query:drums", "Kit-Core", "drums", 2),
            item("query:inst", "Kit-Core", "instruments", 2),
        ];
        let (_, by_name) = build_indices(&items);
        // Shallower depth wins.
        assert_eq!(by_name["wavetable"], "query:shallow");
        // Same depth: instruments outrank drums.
        assert_eq!(by_name["kit core"], "query:inst");
    }

    #[test]
    fn resolver_first_encountered_breaks_full_ties() {
        let items = vec![
            item("query:first", "Echo", "audio_effects", 2),
            item("query:second", "Echo", "audio_effects", 2),
        ];
        let (_, by_name) = build_indices(&items);
        assert_eq!(by_name["echo"], "query:first");
    }

    #[test]
    fn indices_are_mutually_consistent() {
        let items = vec![
            item("query:a", "Alpha", "instruments", 1),
            item("query:b", "Beta", "drums", 1),
            item("query:c", "Gamma", "instruments", 2),
        ];
        let (by_category, by_name) = build_indices(&items);
        assert_eq!(by_category["instruments"].len(), 2);
        assert_eq!(by_category["drums"].len(), 1);
        for idx in &by_category["instruments"] {
            assert_eq!(items[*idx].category, "instruments");
        }
        // Every uniquely-named item resolves to its own uri.
        for i in &items {
            assert_eq!(by_name[&normalize_name(&i.name)], i.uri);
        }
    }

    #[tokio::test]
    async fn cold_resolve_passes_through_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path().to_path_buf(), ReadyFlag::new());
        let resolved = cache
            .resolve("Wavetable", Duration::from_millis(30))
            .await;
        assert_eq!(resolved, "Wavetable");
    }

    #[tokio::test]
    async fn uris_pass_through_without_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path().to_path_buf(), ReadyFlag::new());
        let uri = "query:Synths#Wavetable";
        assert_eq!(cache.resolve(uri, Duration::from_secs(5)).await, uri);
    }

    #[tokio::test]
    async fn commit_sets_populated_and_serves_lookups() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path().to_path_buf(), ReadyFlag::new());
        cache.commit(vec![item("query:wt", "Wavetable", "instruments", 1)]);
        assert!(cache.is_populated());
        assert_eq!(
            cache.resolve("wavetable", Duration::from_millis(10)).await,
            "query:wt"
        );
        assert_eq!(cache.search("wave", 10).len(), 1);
        assert_eq!(cache.list_category("instruments", 10).len(), 1);
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let items = vec![item("query:wt", "Wavetable", "instruments", 1)];
        write_snapshot(dir.path(), &items).unwrap();

        let cache = CatalogCache::new(dir.path().to_path_buf(), ReadyFlag::new());
        assert!(cache.load_from_disk());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn empty_commit_does_not_set_populated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CatalogCache::new(dir.path().to_path_buf(), ReadyFlag::new());
        cache.commit(Vec::new());
        assert!(!cache.is_populated());
    }
}

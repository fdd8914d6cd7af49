//! Support for compiling only the sources that changed
use crate::{
    artifacts::{artifact_path, CompilationResult},
    error::{CompileError, Result},
    resolver::SourceGraph,
    utils,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

/// Format tag of the cache file, a cache with a different tag is discarded
const CACHE_FORMAT_VERSION: &str = "tronbox-compile-cache-1";

/// Remembers what every source file looked like when it was last compiled
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourcesCache {
    #[serde(rename = "_format")]
    pub format: String,
    pub files: BTreeMap<PathBuf, CacheEntry>,
}

/// A `CacheEntry` in the cache file represents a solidity file
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// hash of the file's content
    pub content_hash: String,
    /// hash of the compiler settings the file was compiled with
    pub settings_hash: String,
    /// the files this file imports directly
    pub imports: BTreeSet<PathBuf>,
    /// the names of the contracts compiled from this file
    pub artifacts: BTreeSet<String>,
    /// id of the build info the file was last compiled into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_info: Option<String>,
}

/// The output directories a cached file must have left its outputs in
#[derive(Clone, Copy, Debug)]
pub struct OutputDirs<'a> {
    pub artifacts: &'a Path,
    pub build_info: &'a Path,
}

impl Default for SourcesCache {
    fn default() -> Self {
        SourcesCache { format: CACHE_FORMAT_VERSION.to_string(), files: Default::default() }
    }
}

impl SourcesCache {
    /// Reads the cache json file from the given path
    #[tracing::instrument(skip_all, name = "sources-cache::read")]
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::trace!("reading sources cache at {}", path.display());
        let cache: SourcesCache = utils::read_json_file(path)?;
        tracing::trace!("read cache \"{}\" with {} entries", cache.format, cache.files.len());
        Ok(cache)
    }

    /// Reads the cache, a missing, unreadable or outdated cache yields an empty one
    pub fn read_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default()
        }
        match Self::read(path) {
            Ok(cache) if cache.format == CACHE_FORMAT_VERSION => cache,
            Ok(cache) => {
                tracing::debug!("discarding cache with format \"{}\"", cache.format);
                Self::default()
            }
            Err(err) => {
                tracing::debug!("discarding unreadable cache: {}", err);
                Self::default()
            }
        }
    }

    /// Write the cache to json file
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            utils::create_dir_all(dir)?;
        }
        tracing::trace!("writing cache to json file: \"{}\"", path.display());
        utils::write_atomic(path, &serde_json::to_vec_pretty(self).map_err(CompileError::from)?)
    }

    /// Returns the corresponding `CacheEntry` for the file if it exists
    pub fn entry(&self, file: impl AsRef<Path>) -> Option<&CacheEntry> {
        self.files.get(file.as_ref())
    }

    /// Returns `false` if the file is unchanged since it was cached and all of its outputs exist
    fn is_dirty(
        &self,
        file: &Path,
        content_hash: &str,
        settings_hash: &str,
        dirs: OutputDirs<'_>,
    ) -> bool {
        let Some(entry) = self.entry(file) else {
            tracing::trace!("new source \"{}\"", file.display());
            return true
        };
        if entry.content_hash != content_hash {
            tracing::trace!("changed content hash for \"{}\"", file.display());
            return true
        }
        if entry.settings_hash != settings_hash {
            tracing::trace!("changed compiler settings for \"{}\"", file.display());
            return true
        }
        if entry.artifacts.iter().any(|name| !artifact_path(dirs.artifacts, name).exists()) {
            tracing::trace!("missing artifacts for \"{}\"", file.display());
            return true
        }
        match &entry.build_info {
            Some(id) if dirs.build_info.join(format!("{id}.json")).is_file() => false,
            _ => {
                tracing::trace!("missing build info for \"{}\"", file.display());
                true
            }
        }
    }

    /// Returns all files of the graph that need to be compiled
    ///
    /// A file is dirty if it is dirty itself or if any file it imports, directly or not, is dirty.
    pub fn dirty_files(
        &self,
        graph: &SourceGraph,
        settings_hash: &str,
        dirs: OutputDirs<'_>,
    ) -> BTreeSet<PathBuf> {
        let dirty: BTreeSet<&PathBuf> = graph
            .sources
            .iter()
            .filter(|(file, source)| {
                self.is_dirty(file, &source.content_hash(), settings_hash, dirs)
            })
            .map(|(file, _)| file)
            .collect();

        graph
            .sources
            .keys()
            .filter(|file| {
                dirty.contains(file) ||
                    graph.transitive_imports(file).iter().any(|import| dirty.contains(import))
            })
            .cloned()
            .collect()
    }

    /// Records the compiled sources of the graph and the build info they were compiled into
    pub fn update(
        &mut self,
        graph: &SourceGraph,
        settings_hash: &str,
        build_info_id: &str,
        contracts: &CompilationResult,
    ) {
        for (file, source) in &graph.sources {
            let artifacts = contracts
                .values()
                .filter(|contract| &contract.source_path == file)
                .map(|contract| contract.contract_name.clone())
                .collect();
            let entry = CacheEntry {
                content_hash: source.content_hash(),
                settings_hash: settings_hash.to_string(),
                imports: graph.imports.get(file).cloned().unwrap_or_default(),
                artifacts,
                build_info: Some(build_info_id.to_string()),
            };
            self.files.insert(file.clone(), entry);
        }
    }

    /// Removes all `CacheEntry` which source files are missing
    pub fn remove_missing_files(&mut self) {
        tracing::trace!("remove non existing files from cache");
        self.files.retain(|file, _| file.exists())
    }
}

//! Resolution of sources and their imports

use crate::{
    config::CompileConfig,
    error::{CompileError, Result},
    input::Source,
    utils,
};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    io,
    path::{Path, PathBuf},
};

/// Turns import statements into files
pub trait Resolver: Send + Sync {
    /// Returns the file the `import` found in `from` refers to
    fn resolve_import(&self, import: &str, from: &Path) -> Result<PathBuf>;

    /// Reads the file
    fn resolve(&self, file: &Path) -> Result<Source> {
        Source::read(file)
    }
}

/// Resolves imports against the project layout on disk
///
/// Relative imports (`./`, `../`) are resolved against the importing file, all other imports are
/// looked up in the contracts directory, the working directory and `node_modules`, in that order.
#[derive(Debug, Clone)]
pub struct FsResolver {
    search_paths: Vec<PathBuf>,
}

impl FsResolver {
    pub fn new(config: &CompileConfig) -> Self {
        Self {
            search_paths: vec![
                config.contracts_directory.clone(),
                config.working_directory.clone(),
                config.working_directory.join("node_modules"),
            ],
        }
    }
}

impl Resolver for FsResolver {
    fn resolve_import(&self, import: &str, from: &Path) -> Result<PathBuf> {
        if import.starts_with("./") || import.starts_with("../") {
            let dir = from.parent().unwrap_or_else(|| Path::new(""));
            let file = utils::resolve_against(dir, import);
            if file.is_file() {
                return Ok(file)
            }
            return Err(not_found(file, from))
        }
        self.search_paths
            .iter()
            .map(|dir| utils::resolve_against(dir, import))
            .find(|file| file.is_file())
            .ok_or_else(|| not_found(PathBuf::from(import), from))
    }
}

fn not_found(file: PathBuf, from: &Path) -> CompileError {
    CompileError::resolve(
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("imported from \"{}\" but not found", from.display()),
        ),
        file,
    )
}

/// A set of source files and their import relationships
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceGraph {
    /// all files reachable from the roots
    pub sources: BTreeMap<PathBuf, Source>,
    /// file -> files it imports
    pub imports: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl SourceGraph {
    /// Reads all `roots` and everything they import, transitively
    pub fn resolve(resolver: &dyn Resolver, roots: &[PathBuf]) -> Result<Self> {
        let mut graph = SourceGraph::default();
        let mut queue: VecDeque<PathBuf> = roots.iter().cloned().collect();
        while let Some(file) = queue.pop_front() {
            if graph.sources.contains_key(&file) {
                continue
            }
            let source = resolver.resolve(&file)?;
            let mut imports = BTreeSet::new();
            for import in utils::find_import_paths(source.as_ref()) {
                let resolved = resolver.resolve_import(import, &file)?;
                if !graph.sources.contains_key(&resolved) {
                    queue.push_back(resolved.clone());
                }
                imports.insert(resolved);
            }
            tracing::trace!("resolved \"{}\" with {} imports", file.display(), imports.len());
            graph.imports.insert(file.clone(), imports);
            graph.sources.insert(file, source);
        }
        Ok(graph)
    }

    /// Returns all files `file` imports, directly or indirectly
    pub fn transitive_imports(&self, file: &Path) -> BTreeSet<PathBuf> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&PathBuf> =
            self.imports.get(file).into_iter().flat_map(|i| i.iter()).collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                queue.extend(self.imports.get(next).into_iter().flat_map(|i| i.iter()));
            }
        }
        seen
    }

    /// Returns a graph with the given files and everything they import
    pub fn subset<'a>(&self, files: impl IntoIterator<Item = &'a PathBuf>) -> SourceGraph {
        let mut keep = BTreeSet::new();
        for file in files {
            keep.insert(file.clone());
            keep.extend(self.transitive_imports(file));
        }
        SourceGraph {
            sources: self
                .sources
                .iter()
                .filter(|(file, _)| keep.contains(*file))
                .map(|(file, source)| (file.clone(), source.clone()))
                .collect(),
            imports: self
                .imports
                .iter()
                .filter(|(file, _)| keep.contains(*file))
                .map(|(file, imports)| (file.clone(), imports.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

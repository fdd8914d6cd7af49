//! Compiles the sources of a project on disk
//!
//! The [`ProjectCompiler`] resolves the sources a [`CompileMode`] selects, hands them to a
//! [`StandardJsonCompiler`] in a single standard json input and records what was compiled in the
//! [`SourcesCache`], so that a later [`CompileMode::Necessary`] run only recompiles what changed.

use crate::{
    artifacts::CompilerInfo,
    cache::{OutputDirs, SourcesCache},
    compile::{CompilerInvoker, CompilerOutcome, Solc, StandardJsonCompiler},
    config::CompileConfig,
    error::{CompileError, Result},
    input::{identity_of, Settings, Sources, StandardCompilerInput},
    mode::CompileMode,
    resolver::{FsResolver, Resolver, SourceGraph},
    utils,
};
use async_trait::async_trait;
use std::{collections::BTreeMap, fmt, path::PathBuf, sync::Arc};

/// Compiles a project with a [`StandardJsonCompiler`], `solc` by default
pub struct ProjectCompiler<C = Solc> {
    compiler: C,
    resolver: Option<Arc<dyn Resolver>>,
}

impl<C> ProjectCompiler<C> {
    pub fn new(compiler: C) -> Self {
        Self { compiler, resolver: None }
    }

    /// Replaces the [`FsResolver`] that is used by default
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }
}

impl ProjectCompiler<Solc> {
    /// Uses the `solc` binary of the project config
    pub fn solc(config: &CompileConfig) -> Self {
        Self::new(Solc::from_config(&config.compilers.solc))
    }
}

impl<C: fmt::Debug> fmt::Debug for ProjectCompiler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectCompiler")
            .field("compiler", &self.compiler)
            .field("custom_resolver", &self.resolver.is_some())
            .finish()
    }
}

/// The sources one invocation compiles
struct Preprocessed {
    graph: SourceGraph,
    cache: SourcesCache,
}

/// Resolves the sources the mode selects, this reads from disk
fn preprocess(
    config: &CompileConfig,
    mode: &CompileMode,
    resolver: &dyn Resolver,
    settings_hash: &str,
) -> Result<Preprocessed> {
    let cache = SourcesCache::read_or_default(&config.cache_path);
    let graph = match mode {
        CompileMode::Specific(targets) => SourceGraph::resolve(resolver, targets)?,
        CompileMode::All => SourceGraph::resolve(resolver, &project_sources(config))?,
        CompileMode::Necessary => {
            let all = SourceGraph::resolve(resolver, &project_sources(config))?;
            let dirs = OutputDirs {
                artifacts: &config.contracts_build_directory,
                build_info: &config.build_info_directory,
            };
            let dirty = cache.dirty_files(&all, settings_hash, dirs);
            tracing::debug!("{} of {} sources changed", dirty.len(), all.len());
            all.subset(&dirty)
        }
    };
    Ok(Preprocessed { graph, cache })
}

/// The explicit file list or every source under the contracts directory
fn project_sources(config: &CompileConfig) -> Vec<PathBuf> {
    match &config.files {
        Some(files) => files.clone(),
        None => utils::source_files(&config.contracts_directory),
    }
}

#[async_trait]
impl<C: StandardJsonCompiler> CompilerInvoker for ProjectCompiler<C> {
    #[tracing::instrument(skip_all, fields(mode = %mode))]
    async fn invoke(&self, config: &CompileConfig, mode: &CompileMode) -> Result<CompilerOutcome> {
        let settings = Settings::from_user_settings(&config.compilers.solc.settings)?;
        let settings_hash = identity_of(&serde_json::to_vec(&settings)?);

        let resolver = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(FsResolver::new(config)),
        };
        let (task_config, task_mode, task_hash) = (config.clone(), mode.clone(), settings_hash.clone());
        let Preprocessed { graph, mut cache } = tokio::task::spawn_blocking(move || {
            preprocess(&task_config, &task_mode, resolver.as_ref(), &task_hash)
        })
        .await
        .map_err(|err| CompileError::solc(format!("source resolution aborted: {err}")))??;

        if graph.is_empty() {
            tracing::debug!("no sources to compile");
            return Ok(CompilerOutcome::default())
        }

        let mut sources = Sources::new();
        let mut source_paths = BTreeMap::new();
        for (file, source) in &graph.sources {
            let name = utils::source_name(file, &config.working_directory);
            source_paths.insert(name.clone(), (file.clone(), source.content.clone()));
            sources.insert(name, source.clone());
        }
        let input = StandardCompilerInput::new(sources, settings);

        let version = self.compiler.version().await?;
        tracing::trace!("compiling {} sources with solc {}", graph.len(), version);
        let output = self.compiler.compile(&input).await?;

        if output.has_error() {
            let errors: Vec<_> = output.errors().map(ToString::to_string).collect();
            return Err(CompileError::solc(errors.join("\n")))
        }
        let warnings: Vec<_> = output.warnings().map(ToString::to_string).collect();
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let compiler = CompilerInfo { name: "solc".to_string(), version: version.to_string() };
        let contracts = output.into_compilation_result(&source_paths, &compiler);

        // sources stay dirty until `<build_info_directory>/<id>.json` exists
        cache.update(&graph, &settings_hash, &input.identity()?, &contracts);
        cache.remove_missing_files();
        let cache_path = config.cache_path.clone();
        match tokio::task::spawn_blocking(move || cache.write(cache_path)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!("failed to write sources cache: {}", err),
            Err(err) => tracing::warn!("failed to write sources cache: {}", err),
        }

        Ok(CompilerOutcome {
            contracts,
            paths: graph.sources.into_keys().collect(),
            input: Some(input),
            compiler_version: Some(version.to_string()),
            warnings,
        })
    }
}

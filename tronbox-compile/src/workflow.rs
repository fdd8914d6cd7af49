//! The compile command: selects what to compile, runs the compiler and persists the outputs

use crate::{
    artifacts::{ArtifactScope, Artifactor, CompilationResult, JsonArtifactor},
    buildinfo::{BuildInfoWriter, RawBuildInfo},
    compile::{CompilerInvoker, CompilerOutcome, ProjectCompiler},
    config::{CompileConfig, CompileOptions},
    error::{CompileError, Result},
    input::StandardCompilerInput,
    mode::CompileMode,
    network::{self, NetworkInfo},
    report::{Logger, NoopLogger, StdoutLogger},
    utils,
};
use std::{fmt, path::PathBuf, sync::Arc};

/// Whether a run handed anything to the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStatus {
    /// Contracts were compiled and persisted
    Compiled,
    /// Nothing needed to be compiled, nothing was written
    NothingToCompile,
}

/// The result of a successful [`CompileWorkflow::compile()`]
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub contracts: CompilationResult,
    /// The source files that were compiled
    pub paths: Vec<PathBuf>,
    /// The input the compiler received, `None` if nothing was compiled
    pub input: Option<StandardCompilerInput>,
    /// Identity of the persisted build info
    pub build_info_id: Option<String>,
    /// The compiler version that was effectively used
    pub compiler_version: Option<String>,
    pub network_info: NetworkInfo,
    pub status: CompileStatus,
}

impl CompileOutput {
    pub fn is_unchanged(&self) -> bool {
        self.status == CompileStatus::NothingToCompile
    }
}

/// Orchestrates a compilation
///
/// All collaborators are injected, missing ones are replaced with the defaults derived from the
/// merged configuration of each run:
///   - invoker: [`ProjectCompiler`] with the configured `solc`
///   - artifactor: [`JsonArtifactor`] writing into `contracts_build_directory`
///   - logger: [`StdoutLogger`], or [`NoopLogger`] if `quiet` is set
#[derive(Clone, Default)]
pub struct CompileWorkflow {
    invoker: Option<Arc<dyn CompilerInvoker>>,
    artifactor: Option<Arc<dyn Artifactor>>,
    logger: Option<Arc<dyn Logger>>,
}

impl CompileWorkflow {
    pub fn builder() -> CompileWorkflowBuilder {
        CompileWorkflowBuilder::default()
    }

    /// Compiles the sources the options select, see [`CompileMode::select()`]
    pub async fn compile(&self, options: CompileOptions) -> Result<CompileOutput> {
        self.compile_with_mode(options, None).await
    }

    /// Compiles with the given mode instead of the one the options select
    #[tracing::instrument(skip_all, name = "compile")]
    pub async fn compile_with_mode(
        &self,
        options: CompileOptions,
        mode: Option<CompileMode>,
    ) -> Result<CompileOutput> {
        let config = CompileConfig::from_options(options)?;
        let logger: Arc<dyn Logger> = match &self.logger {
            _ if config.quiet => Arc::new(NoopLogger),
            Some(logger) => logger.clone(),
            None => Arc::new(StdoutLogger),
        };

        let network_info = network::probe(&config).await;
        tracing::debug!(?network_info, "probed network");

        let mode = mode.unwrap_or_else(|| CompileMode::select(&config));
        tracing::debug!("compiling in {} mode", mode);
        logger.log("Compiling your contracts...");
        logger.log("===========================");

        let invoker: Arc<dyn CompilerInvoker> = match &self.invoker {
            Some(invoker) => invoker.clone(),
            None => Arc::new(ProjectCompiler::solc(&config)),
        };
        let CompilerOutcome { contracts, paths, input, compiler_version, warnings } =
            invoker.invoke(&config, &mode).await?;

        if !warnings.is_empty() {
            logger.log("> Compilation warnings encountered:");
            for warning in &warnings {
                logger.log(warning);
            }
        }

        if contracts.is_empty() {
            logger.log("> Everything is up to date, there is nothing to compile.");
            return Ok(CompileOutput {
                contracts,
                paths,
                input,
                build_info_id: None,
                compiler_version,
                network_info,
                status: CompileStatus::NothingToCompile,
            })
        }

        let input =
            input.ok_or_else(|| CompileError::solc("compiler returned contracts without an input"))?;
        let build_info = RawBuildInfo::new(&input)?;

        let artifactor: Arc<dyn Artifactor> = match &self.artifactor {
            Some(artifactor) => artifactor.clone(),
            None => Arc::new(JsonArtifactor::new(&config.contracts_build_directory)),
        };
        let scope = ArtifactScope { network_id: config.artifact_network_id() };
        let build_info_writer = BuildInfoWriter::new(&config.build_info_directory);

        let write_artifacts = async {
            let dir = &config.contracts_build_directory;
            tokio::fs::create_dir_all(dir).await.map_err(|err| CompileError::io(err, dir))?;
            if !config.quiet_write {
                logger.log(&format!(
                    "Writing artifacts to {}",
                    utils::display_relative(&config.working_directory, dir)
                ));
            }
            artifactor.save_all(&contracts, &scope).await
        };
        let write_build_info = async {
            if !config.quiet_write {
                logger.log(&format!(
                    "Writing build info to {}",
                    utils::display_relative(&config.working_directory, build_info_writer.dir())
                ));
            }
            build_info_writer.write(&build_info).await
        };
        // both writes settle before either result is inspected
        let (artifacts, build_info_file) = tokio::join!(write_artifacts, write_build_info);
        artifacts?;
        let build_info_file = build_info_file?;
        tracing::debug!("wrote build info \"{}\"", build_info_file.display());

        let compiler_version = compiler_version.or_else(|| config.compilers.solc.version.clone());
        logger.log("");
        logger.log("> Compiled successfully using:");
        logger.log(&format!(
            "  - solc{}: {}",
            if config.evm { "(EVM)" } else { "" },
            compiler_version.as_deref().unwrap_or("unknown")
        ));
        if let Some(node) = &network_info.node_version {
            logger.log(&format!("  - node: {node}"));
        }

        Ok(CompileOutput {
            contracts,
            paths,
            input: Some(input),
            build_info_id: Some(build_info.id),
            compiler_version,
            network_info,
            status: CompileStatus::Compiled,
        })
    }
}

impl fmt::Debug for CompileWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileWorkflow")
            .field("custom_invoker", &self.invoker.is_some())
            .field("custom_artifactor", &self.artifactor.is_some())
            .field("custom_logger", &self.logger.is_some())
            .finish()
    }
}

#[derive(Default)]
#[must_use]
pub struct CompileWorkflowBuilder {
    invoker: Option<Arc<dyn CompilerInvoker>>,
    artifactor: Option<Arc<dyn Artifactor>>,
    logger: Option<Arc<dyn Logger>>,
}

impl CompileWorkflowBuilder {
    /// Sets the compiler invoker
    pub fn invoker(mut self, invoker: impl CompilerInvoker + 'static) -> Self {
        self.invoker = Some(Arc::new(invoker));
        self
    }

    /// Sets the collaborator that persists the compiled contracts
    pub fn artifactor(mut self, artifactor: impl Artifactor + 'static) -> Self {
        self.artifactor = Some(Arc::new(artifactor));
        self
    }

    /// Sets the sink for status lines, ignored if the options are `quiet`
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn build(self) -> CompileWorkflow {
        let CompileWorkflowBuilder { invoker, artifactor, logger } = self;
        CompileWorkflow { invoker, artifactor, logger }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        artifacts::ContractOutput, error::ErrorKind, input::Source,
        report::MemoryLogger,
    };
    use async_trait::async_trait;
    use std::{fs, path::Path};

    /// Compiles a fixed contract for any mode
    struct StaticInvoker;

    #[async_trait]
    impl CompilerInvoker for StaticInvoker {
        async fn invoke(
            &self,
            config: &CompileConfig,
            mode: &CompileMode,
        ) -> Result<CompilerOutcome> {
            if matches!(mode, CompileMode::Necessary) {
                return Ok(CompilerOutcome::default())
            }
            let file = config.contracts_directory.join("Greeter.sol");
            let contract = ContractOutput {
                contract_name: "Greeter".to_string(),
                source_path: file.clone(),
                bytecode: "6080".to_string(),
                ..Default::default()
            };
            let input = StandardCompilerInput::with_sources(
                [("contracts/Greeter.sol".to_string(), Source::new("contract Greeter {}"))].into(),
            );
            Ok(CompilerOutcome {
                contracts: [("Greeter".to_string(), contract)].into(),
                paths: vec![file],
                input: Some(input),
                compiler_version: Some("0.8.20".to_string()),
                warnings: Vec::new(),
            })
        }
    }

    struct FailingArtifactor;

    #[async_trait]
    impl Artifactor for FailingArtifactor {
        async fn save_all(&self, _: &CompilationResult, _: &ArtifactScope) -> Result<()> {
            Err(CompileError::io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"), "x"))
        }
    }

    fn options(root: &Path) -> CompileOptions {
        CompileOptions {
            working_directory: Some(root.to_path_buf()),
            contracts_directory: Some(root.join("contracts")),
            contracts_build_directory: Some(root.join("build").join("contracts")),
            build_info_directory: Some(root.join("build-info")),
            all: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn logs_status_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let root = utils::canonicalized(tmp.path());
        let logger = Arc::new(MemoryLogger::new());
        let workflow = CompileWorkflow::builder().invoker(StaticInvoker).logger(logger.clone()).build();

        let output = workflow.compile(options(&root)).await.unwrap();
        assert_eq!(output.status, CompileStatus::Compiled);
        let sep = std::path::MAIN_SEPARATOR;
        assert_eq!(
            logger.lines(),
            vec![
                "Compiling your contracts...".to_string(),
                "===========================".to_string(),
                format!("Writing artifacts to .{sep}build{sep}contracts"),
                format!("Writing build info to .{sep}build-info"),
                String::new(),
                "> Compiled successfully using:".to_string(),
                "  - solc: 0.8.20".to_string(),
            ]
        );
        let id = output.build_info_id.unwrap();
        assert!(root.join("build-info").join(format!("{id}.json")).is_file());
        assert!(root.join("build/contracts/Greeter.json").is_file());
    }

    #[tokio::test]
    async fn reports_nothing_to_compile() {
        let tmp = tempfile::tempdir().unwrap();
        let root = utils::canonicalized(tmp.path());
        let logger = Arc::new(MemoryLogger::new());
        let workflow = CompileWorkflow::builder().invoker(StaticInvoker).logger(logger.clone()).build();

        let mut opts = options(&root);
        opts.all = false;
        let output = workflow.compile(opts).await.unwrap();
        assert!(output.is_unchanged());
        assert_eq!(
            logger.lines().last().map(String::as_str),
            Some("> Everything is up to date, there is nothing to compile.")
        );
        assert!(!root.join("build-info").exists());
        assert!(!root.join("build").exists());
    }

    #[tokio::test]
    async fn artifact_failure_still_writes_build_info() {
        let tmp = tempfile::tempdir().unwrap();
        let root = utils::canonicalized(tmp.path());
        let workflow = CompileWorkflow::builder()
            .invoker(StaticInvoker)
            .artifactor(FailingArtifactor)
            .logger(NoopLogger)
            .build();

        let err = workflow.compile(options(&root)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(fs::read_dir(root.join("build-info")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn evm_flag_marks_solc_line() {
        let tmp = tempfile::tempdir().unwrap();
        let root = utils::canonicalized(tmp.path());
        let logger = Arc::new(MemoryLogger::new());
        let workflow = CompileWorkflow::builder().invoker(StaticInvoker).logger(logger.clone()).build();

        let mut opts = options(&root);
        opts.evm = true;
        opts.quiet_write = true;
        workflow.compile(opts).await.unwrap();
        let lines = logger.lines();
        assert!(lines.iter().all(|line| !line.starts_with("Writing")));
        assert_eq!(lines.last().map(String::as_str), Some("  - solc(EVM): 0.8.20"));
    }
}

//! `tronbox compile`

use clap::Parser;
use eyre::WrapErr;
use std::path::PathBuf;
use tronbox_compile::{
    CompileOptions, CompileOutput, CompileWorkflow, ProjectCompiler, ProjectConfig, Solc,
};

/// Compile contract source files
#[derive(Debug, Clone, Default, Parser)]
pub struct CompileArgs {
    /// Contract files to compile, only changed sources are compiled if omitted
    #[arg(value_name = "CONTRACTS")]
    pub contracts: Vec<PathBuf>,

    /// Compile all contracts instead of only the changed ones
    #[arg(long)]
    pub all: bool,

    /// Use the EVM configuration of the selected network
    #[arg(long)]
    pub evm: bool,

    /// Suppress all status output
    #[arg(long)]
    pub quiet: bool,

    /// The network to compile for
    #[arg(long)]
    pub network: Option<String>,

    /// The directory to search the `tronbox.toml` from
    #[arg(long, value_name = "DIR")]
    pub working_directory: Option<PathBuf>,
}

impl CompileArgs {
    /// Loads the project config and applies the flags on top of it
    pub fn options(&self) -> eyre::Result<CompileOptions> {
        let start = match &self.working_directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().wrap_err("failed to read the current directory")?,
        };
        let (root, config) = ProjectConfig::detect(&start)?;
        tracing::debug!("project root \"{}\"", root.display());
        let mut options = config.into_options(&root);
        self.apply(&mut options);
        Ok(options)
    }

    fn apply(&self, options: &mut CompileOptions) {
        options.compile_targets = self.contracts.clone();
        options.all |= self.all;
        options.evm |= self.evm;
        options.quiet |= self.quiet;
        if let Some(network) = &self.network {
            options.network = Some(network.clone());
        }
    }

    pub async fn run(self) -> eyre::Result<CompileOutput> {
        let options = self.options()?;
        let compiler = ProjectCompiler::new(Solc::from_config(&options.compilers.solc));
        let workflow = CompileWorkflow::builder().invoker(compiler).build();
        Ok(workflow.compile(options).await?)
    }
}

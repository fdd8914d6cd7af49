#![doc = include_str!("../README.md")]

pub mod artifacts;
pub use artifacts::{ArtifactRecord, ArtifactScope, Artifactor, CompilationResult, JsonArtifactor};

pub mod buildinfo;
pub use buildinfo::{BuildInfoWriter, RawBuildInfo};

pub mod cache;

pub mod compile;
pub use compile::{
    CompilerInvoker, CompilerOutcome, CompilerOutput, ProjectCompiler, Solc, StandardJsonCompiler,
};

mod config;
pub use config::{
    CompileConfig, CompileOptions, CompilersConfig, EvmNetworkConfig, NetworkConfig,
    ProjectConfig, SolcConfig, CONFIG_FILE_NAME, DEFAULT_NETWORK,
};

pub mod error;
pub use error::{CompileError, ErrorKind};

pub mod input;
pub use input::{Settings, Source, Sources, StandardCompilerInput};

mod mode;
pub use mode::CompileMode;

pub mod network;
pub use network::NetworkInfo;

pub mod report;
pub use report::{Logger, MemoryLogger, NoopLogger, StdoutLogger};

pub mod resolver;

pub mod utils;

mod workflow;
pub use workflow::{CompileOutput, CompileStatus, CompileWorkflow, CompileWorkflowBuilder};

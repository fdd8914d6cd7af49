//! Invoking the compiler backend

use crate::{
    artifacts::CompilationResult,
    config::{CompileConfig, SolcConfig},
    error::{CompileError, Result},
    input::StandardCompilerInput,
    mode::CompileMode,
};
use async_trait::async_trait;
use semver::Version;
use std::{
    fmt,
    path::{Path, PathBuf},
    process::{Output, Stdio},
    str::FromStr,
    sync::Arc,
};

pub mod output;
pub use output::CompilerOutput;

pub mod project;
pub use project::ProjectCompiler;

/// The name of the `solc` binary on the system
pub const SOLC: &str = "solc";

/// What a compiler invocation produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerOutcome {
    /// contract name -> compiled contract, empty if nothing needed to be compiled
    pub contracts: CompilationResult,
    /// The source files that were handed to the compiler
    pub paths: Vec<PathBuf>,
    /// The exact input the compiler received, `None` if it was not invoked
    pub input: Option<StandardCompilerInput>,
    /// The version of the compiler that was invoked
    pub compiler_version: Option<String>,
    /// Rendered compiler warnings
    pub warnings: Vec<String>,
}

impl CompilerOutcome {
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Compiles the sources a [`CompileMode`] selects
#[async_trait]
pub trait CompilerInvoker: Send + Sync {
    async fn invoke(&self, config: &CompileConfig, mode: &CompileMode) -> Result<CompilerOutcome>;
}

#[async_trait]
impl<T: CompilerInvoker + ?Sized> CompilerInvoker for Arc<T> {
    async fn invoke(&self, config: &CompileConfig, mode: &CompileMode) -> Result<CompilerOutcome> {
        (**self).invoke(config, mode).await
    }
}

/// A compiler that understands the standard json interface
#[async_trait]
pub trait StandardJsonCompiler: Send + Sync {
    /// Compiles the input, compiler diagnostics are part of the output
    async fn compile(&self, input: &StandardCompilerInput) -> Result<CompilerOutput>;

    /// The version of this compiler
    async fn version(&self) -> Result<Version>;
}

/// The `solc` executable
///
/// By default the binary is looked up in the following order:
///   1. `SOLC_PATH` environment variable
///   2. `solc` otherwise
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Solc {
    /// Path to the `solc` executable
    pub solc: PathBuf,
    /// Additional arguments passed to the `solc` executable
    pub args: Vec<String>,
}

impl Default for Solc {
    fn default() -> Self {
        if let Ok(solc) = std::env::var("SOLC_PATH") {
            return Solc::new(solc)
        }
        Solc::new(SOLC)
    }
}

impl fmt::Display for Solc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.solc.display())?;
        if !self.args.is_empty() {
            write!(f, " {}", self.args.join(" "))?;
        }
        Ok(())
    }
}

impl Solc {
    /// A new instance which points to `solc`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Solc { solc: path.into(), args: Vec::new() }
    }

    /// The binary configured in `compilers.solc.path`, or the default one
    pub fn from_config(config: &SolcConfig) -> Self {
        config.path.clone().map(Solc::new).unwrap_or_default()
    }

    /// Runs `solc --standard-json` and returns the raw stdout
    pub async fn compile_output(&self, input: &StandardCompilerInput) -> Result<Vec<u8>> {
        use tokio::io::AsyncWriteExt;
        let content = serde_json::to_vec(input).map_err(|err| CompileError::solc(err.to_string()))?;
        let mut child = tokio::process::Command::new(&self.solc)
            .args(&self.args)
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CompileError::solc(format!("no stdin for \"{self}\"")))?;
        stdin.write_all(&content).await.map_err(|err| self.spawn_error(err))?;
        stdin.flush().await.map_err(|err| self.spawn_error(err))?;
        drop(stdin);
        compile_output(child.wait_with_output().await.map_err(|err| self.spawn_error(err))?)
    }

    fn spawn_error(&self, err: std::io::Error) -> CompileError {
        CompileError::solc(format!("failed to run \"{}\": {err}", self.solc.display()))
    }
}

#[async_trait]
impl StandardJsonCompiler for Solc {
    #[tracing::instrument(skip_all, fields(solc = %self, sources = input.sources.len()))]
    async fn compile(&self, input: &StandardCompilerInput) -> Result<CompilerOutput> {
        let output = self.compile_output(input).await?;
        serde_json::from_slice(&output)
            .map_err(|err| CompileError::solc(format!("invalid standard json output: {err}")))
    }

    async fn version(&self) -> Result<Version> {
        version_from_output(
            tokio::process::Command::new(&self.solc)
                .arg("--version")
                .stdin(Stdio::piped())
                .stderr(Stdio::piped())
                .stdout(Stdio::piped())
                .spawn()
                .map_err(|err| self.spawn_error(err))?
                .wait_with_output()
                .await
                .map_err(|err| self.spawn_error(err))?,
        )
    }
}

impl AsRef<Path> for Solc {
    fn as_ref(&self) -> &Path {
        &self.solc
    }
}

fn compile_output(output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(CompileError::solc(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

fn version_from_output(output: Output) -> Result<Version> {
    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout
            .lines()
            .filter(|l| !l.trim().is_empty())
            .last()
            .ok_or_else(|| CompileError::solc("version not found in solc output"))?;
        // NOTE: semver doesn't like `+` in g++ in build metadata which is invalid semver
        Version::from_str(&version.trim().trim_start_matches("Version: ").replace(".g++", ".gcc"))
            .map_err(|err| CompileError::solc(format!("invalid solc version \"{version}\": {err}")))
    } else {
        Err(CompileError::solc(String::from_utf8_lossy(&output.stderr).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SolcConfig, error::ErrorKind};

    #[cfg(unix)]
    fn output(status: i32, stdout: &str, stderr: &str) -> Output {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(status << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn parses_solc_version() {
        let out = output(
            0,
            "solc, the solidity compiler commandline interface\nVersion: 0.8.20+commit.a1b79de6.Linux.g++\n",
            "",
        );
        let version = version_from_output(out).unwrap();
        assert_eq!((version.major, version.minor, version.patch), (0, 8, 20));
    }

    #[cfg(unix)]
    #[test]
    fn failed_run_is_compilation_error() {
        let err = compile_output(output(1, "", "Invalid option")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Compilation);
        assert!(err.to_string().contains("Invalid option"));
    }

    #[test]
    fn prefers_configured_path() {
        let config = SolcConfig { path: Some("/opt/solc-0.8.20".into()), ..Default::default() };
        assert_eq!(Solc::from_config(&config).solc, PathBuf::from("/opt/solc-0.8.20"));
    }

    #[tokio::test]
    async fn missing_binary_is_compilation_error() {
        let solc = Solc::new("/nonexistent/solc-binary");
        assert_eq!(solc.version().await.unwrap_err().kind(), ErrorKind::Compilation);
    }
}

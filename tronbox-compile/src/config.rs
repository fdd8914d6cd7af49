use crate::{
    error::{CompileError, Result},
    utils,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// The name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "tronbox.toml";

/// The network that is used when none was selected explicitly but one with this name is configured
pub const DEFAULT_NETWORK: &str = "development";

/// The file name of the default sources cache file
pub const COMPILE_CACHE_FILENAME: &str = "compile-cache.json";

/// How long the network probe may take by default
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings of a single network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NetworkConfig {
    /// Base url of the node's HTTP api, `http://127.0.0.1:9090`
    #[serde(default, alias = "fullHost", skip_serializing_if = "Option::is_none")]
    pub full_host: Option<String>,
    /// The id artifacts are scoped by, `"*"` matches any network
    #[serde(
        default,
        deserialize_with = "deserialize_network_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_id: Option<String>,
    /// Alternate settings used when the EVM execution environment is selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm: Option<EvmNetworkConfig>,
}

/// Connection settings of a network's EVM compatible JSON-RPC endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmNetworkConfig {
    /// JSON-RPC url, `http://127.0.0.1:8545`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_network_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_id: Option<String>,
}

/// How `solc` should be located and configured
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolcConfig {
    /// The version the project expects, only used for reporting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Path to the `solc` binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Additional standard json settings, `optimizer`, `evmVersion`, ...
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilersConfig {
    #[serde(default)]
    pub solc: SolcConfig,
}

/// Options supplied by the caller of a compilation
///
/// Every field is optional, missing values are filled in from [`CompileConfig::new()`] once the
/// options were validated.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub working_directory: Option<PathBuf>,
    /// Directory where `.sol` files can be found
    pub contracts_directory: Option<PathBuf>,
    /// Directory the contract artifacts are written to
    pub contracts_build_directory: Option<PathBuf>,
    /// Directory the standard json inputs are written to
    pub build_info_directory: Option<PathBuf>,
    /// Explicit list of source files, replaces discovery under `contracts_directory`
    pub files: Option<Vec<PathBuf>>,
    /// Specific sources to compile, relative paths are resolved against the working directory
    pub compile_targets: Vec<PathBuf>,
    pub all: bool,
    pub compile_all: bool,
    pub network: Option<String>,
    pub network_id: Option<String>,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub compilers: CompilersConfig,
    pub quiet: bool,
    /// Suppress the `Writing ... to` status lines only
    pub quiet_write: bool,
    /// Use the EVM execution environment of the selected network
    pub evm: bool,
    pub probe_timeout: Option<Duration>,
    pub cache_path: Option<PathBuf>,
}

impl CompileOptions {
    /// Checks the options every compilation requires
    pub fn validate(&self) -> Result<()> {
        if self.contracts_build_directory.is_none() {
            return Err(CompileError::config("Expected \"contracts_build_directory\" to be set"))
        }
        if self.build_info_directory.is_none() {
            return Err(CompileError::config("Expected \"build_info_directory\" to be set"))
        }
        if self.contracts_directory.is_none() && self.files.is_none() {
            return Err(CompileError::config(
                "Expected one of \"contracts_directory\" or \"files\" to be set",
            ))
        }
        Ok(())
    }
}

/// The fully merged configuration of a single compilation
#[derive(Debug, Clone, PartialEq)]
pub struct CompileConfig {
    pub working_directory: PathBuf,
    pub contracts_directory: PathBuf,
    pub contracts_build_directory: PathBuf,
    pub build_info_directory: PathBuf,
    pub files: Option<Vec<PathBuf>>,
    pub compile_targets: Vec<PathBuf>,
    pub all: bool,
    pub compile_all: bool,
    pub network: Option<String>,
    pub network_id: Option<String>,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub compilers: CompilersConfig,
    pub quiet: bool,
    pub quiet_write: bool,
    pub evm: bool,
    pub probe_timeout: Duration,
    pub cache_path: PathBuf,
}

impl CompileConfig {
    /// The default configuration of a project rooted at `working_directory`
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        let root = working_directory.into();
        Self {
            contracts_directory: root.join("contracts"),
            contracts_build_directory: root.join("build").join("contracts"),
            build_info_directory: root.join("build-info"),
            cache_path: root.join("cache").join(COMPILE_CACHE_FILENAME),
            files: None,
            compile_targets: Vec::new(),
            all: false,
            compile_all: false,
            network: None,
            network_id: None,
            networks: BTreeMap::new(),
            compilers: CompilersConfig::default(),
            quiet: false,
            quiet_write: false,
            evm: false,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            working_directory: root,
        }
    }

    /// Validates the options and merges them on top of the defaults
    pub fn from_options(options: CompileOptions) -> Result<Self> {
        options.validate()?;
        let root = match options.working_directory.clone() {
            Some(root) => root,
            None => std::env::current_dir().map_err(|err| {
                CompileError::config(format!("Failed to determine working directory: {err}"))
            })?,
        };
        Ok(Self::new(utils::canonicalized(root)).merge(options))
    }

    /// Overrides all values set in `options`, relative directories are resolved against the
    /// working directory
    pub fn merge(mut self, options: CompileOptions) -> Self {
        let CompileOptions {
            working_directory: _,
            contracts_directory,
            contracts_build_directory,
            build_info_directory,
            files,
            compile_targets,
            all,
            compile_all,
            network,
            network_id,
            networks,
            compilers,
            quiet,
            quiet_write,
            evm,
            probe_timeout,
            cache_path,
        } = options;
        let root = self.working_directory.clone();
        let resolve = |p: PathBuf| utils::resolve_against(&root, p);

        if let Some(dir) = contracts_directory {
            self.contracts_directory = resolve(dir);
        }
        if let Some(dir) = contracts_build_directory {
            self.contracts_build_directory = resolve(dir);
        }
        if let Some(dir) = build_info_directory {
            self.build_info_directory = resolve(dir);
        }
        if let Some(path) = cache_path {
            self.cache_path = resolve(path);
        }
        if let Some(files) = files {
            self.files = Some(files.into_iter().map(resolve).collect());
        }
        if !compile_targets.is_empty() {
            self.compile_targets = compile_targets;
        }
        self.all |= all;
        self.compile_all |= compile_all;
        self.network = network.or(self.network);
        self.network_id = network_id.or(self.network_id);
        self.networks.extend(networks);
        if compilers != CompilersConfig::default() {
            self.compilers = compilers;
        }
        self.quiet |= quiet;
        self.quiet_write |= quiet_write;
        self.evm |= evm;
        if let Some(timeout) = probe_timeout {
            self.probe_timeout = timeout;
        }
        self
    }

    /// Returns the network the compilation runs against
    ///
    /// This is the explicitly selected network or [`DEFAULT_NETWORK`] if it is configured.
    pub fn active_network(&self) -> Option<(&str, &NetworkConfig)> {
        match self.network.as_deref() {
            Some(name) => self.networks.get_key_value(name),
            None => self.networks.get_key_value(DEFAULT_NETWORK),
        }
        .map(|(name, network)| (name.as_str(), network))
    }

    /// The network id saved artifacts are scoped by
    pub fn artifact_network_id(&self) -> Option<String> {
        if let Some(id) = &self.network_id {
            return Some(id.clone())
        }
        let (_, network) = self.active_network()?;
        if self.evm {
            if let Some(id) = network.evm.as_ref().and_then(|evm| evm.network_id.clone()) {
                return Some(id)
            }
        }
        network.network_id.clone()
    }

    /// Returns `true` if everything should be compiled regardless of the cache
    pub fn compile_everything(&self) -> bool {
        self.all || self.compile_all
    }
}

/// The contents of a `tronbox.toml` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contracts_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contracts_build_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_info_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, NetworkConfig>,
    #[serde(default)]
    pub compilers: CompilersConfig,
}

impl ProjectConfig {
    /// Reads the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| {
            CompileError::config(format!("Failed to read \"{}\": {err}", path.display()))
        })?;
        toml::from_str(&content).map_err(|err| {
            CompileError::config(format!("Failed to parse \"{}\": {err}", path.display()))
        })
    }

    /// Searches `start` and all of its ancestors for a [`CONFIG_FILE_NAME`] and returns the
    /// project root together with the loaded config
    #[tracing::instrument(skip_all, fields(start = %start.as_ref().display()))]
    pub fn detect(start: impl AsRef<Path>) -> Result<(PathBuf, Self)> {
        let start = utils::canonicalized(start.as_ref());
        for dir in start.ancestors() {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                tracing::trace!("found project config at \"{}\"", candidate.display());
                return Ok((dir.to_path_buf(), Self::load(candidate)?))
            }
        }
        Err(CompileError::config(format!(
            "Could not find {CONFIG_FILE_NAME} in \"{}\" or any parent directory",
            start.display()
        )))
    }

    /// Converts the file contents into fully populated options for a project at `root`
    pub fn into_options(self, root: impl AsRef<Path>) -> CompileOptions {
        let root = root.as_ref();
        let defaults = CompileConfig::new(root);
        let resolve = |dir: Option<PathBuf>, default: PathBuf| {
            Some(dir.map(|dir| utils::resolve_against(root, dir)).unwrap_or(default))
        };
        CompileOptions {
            working_directory: Some(root.to_path_buf()),
            contracts_directory: resolve(self.contracts_directory, defaults.contracts_directory),
            contracts_build_directory: resolve(
                self.contracts_build_directory,
                defaults.contracts_build_directory,
            ),
            build_info_directory: resolve(self.build_info_directory, defaults.build_info_directory),
            network: self.network,
            networks: self.networks,
            compilers: self.compilers,
            ..Default::default()
        }
    }
}

/// Accepts `network_id = 9` as well as `network_id = "9"`
fn deserialize_network_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NetworkId {
        Num(u64),
        Str(String),
    }

    impl fmt::Display for NetworkId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                NetworkId::Num(n) => n.fmt(f),
                NetworkId::Str(s) => s.fmt(f),
            }
        }
    }

    Ok(Option::<NetworkId>::deserialize(deserializer)?.map(|id| id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn options(root: &Path) -> CompileOptions {
        CompileOptions {
            working_directory: Some(root.to_path_buf()),
            contracts_directory: Some("contracts".into()),
            contracts_build_directory: Some("build/contracts".into()),
            build_info_directory: Some("build-info".into()),
            ..Default::default()
        }
    }

    #[test]
    fn requires_build_directories() {
        let root = Path::new("/project");
        let mut opts = options(root);
        opts.contracts_build_directory = None;
        assert_eq!(opts.validate().unwrap_err().kind(), ErrorKind::Configuration);

        let mut opts = options(root);
        opts.build_info_directory = None;
        assert_eq!(opts.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn requires_sources_or_files() {
        let root = Path::new("/project");
        let mut opts = options(root);
        opts.contracts_directory = None;
        assert!(opts.validate().is_err());
        opts.files = Some(vec!["A.sol".into()]);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn merges_relative_directories() {
        let config = CompileConfig::new("/project").merge(options(Path::new("/project")));
        assert_eq!(config.contracts_directory, PathBuf::from("/project/contracts"));
        assert_eq!(config.contracts_build_directory, PathBuf::from("/project/build/contracts"));
        assert_eq!(config.build_info_directory, PathBuf::from("/project/build-info"));
        assert_eq!(config.probe_timeout, DEFAULT_PROBE_TIMEOUT);
    }

    #[test]
    fn selects_development_network_by_default() {
        let mut config = CompileConfig::new("/project");
        assert!(config.active_network().is_none());
        config.networks.insert(
            DEFAULT_NETWORK.to_string(),
            NetworkConfig { network_id: Some("9".into()), ..Default::default() },
        );
        config.networks.insert(
            "nile".to_string(),
            NetworkConfig { network_id: Some("3".into()), ..Default::default() },
        );
        assert_eq!(config.active_network().unwrap().0, DEFAULT_NETWORK);
        assert_eq!(config.artifact_network_id().as_deref(), Some("9"));

        config.network = Some("nile".into());
        assert_eq!(config.artifact_network_id().as_deref(), Some("3"));

        config.network_id = Some("42".into());
        assert_eq!(config.artifact_network_id().as_deref(), Some("42"));
    }

    #[test]
    fn parses_project_config() {
        let content = r#"
contracts_build_directory = "out"

[networks.development]
full_host = "http://127.0.0.1:9090"
network_id = 9

[networks.development.evm]
url = "http://127.0.0.1:8545"
network_id = "*"

[compilers.solc]
version = "0.8.20"
settings = { optimizer = { enabled = true, runs = 200 }, evmVersion = "istanbul" }
"#;
        let config: ProjectConfig = toml::from_str(content).unwrap();
        let development = &config.networks[DEFAULT_NETWORK];
        assert_eq!(development.network_id.as_deref(), Some("9"));
        assert_eq!(development.evm.as_ref().unwrap().network_id.as_deref(), Some("*"));
        assert_eq!(config.compilers.solc.version.as_deref(), Some("0.8.20"));
        assert_eq!(config.compilers.solc.settings["optimizer"]["runs"], 200);

        let options = config.into_options("/project");
        assert_eq!(options.contracts_build_directory, Some(PathBuf::from("/project/out")));
        assert_eq!(options.contracts_directory, Some(PathBuf::from("/project/contracts")));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn detects_config_in_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = utils::canonicalized(tmp.path());
        fs::write(root.join(CONFIG_FILE_NAME), "network = \"nile\"\n").unwrap();
        let nested = root.join("contracts").join("tokens");
        fs::create_dir_all(&nested).unwrap();

        let (found, config) = ProjectConfig::detect(&nested).unwrap();
        assert_eq!(found, root);
        assert_eq!(config.network.as_deref(), Some("nile"));
    }
}

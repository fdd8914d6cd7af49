//! Compiled contracts and how they are persisted

use crate::{
    error::{CompileError, Result},
    utils,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

/// The version of the artifact schema [`JsonArtifactor`] writes
pub const ARTIFACT_SCHEMA_VERSION: &str = "3.4.16";

/// contract name -> compiled contract
pub type CompilationResult = BTreeMap<String, ContractOutput>;

/// Name and version of the compiler that produced a contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    pub name: String,
    pub version: String,
}

/// Everything the compiler emitted for a single contract
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractOutput {
    pub contract_name: String,
    /// Path of the file the contract was declared in
    pub source_path: PathBuf,
    /// Source unit name of that file in the compiler input
    pub source_name: String,
    pub source: String,
    pub abi: Vec<serde_json::Value>,
    pub bytecode: String,
    pub deployed_bytecode: String,
    pub source_map: String,
    pub deployed_source_map: String,
    #[serde(default)]
    pub link_references: serde_json::Value,
    pub metadata: String,
    #[serde(default)]
    pub devdoc: serde_json::Value,
    #[serde(default)]
    pub userdoc: serde_json::Value,
    #[serde(default)]
    pub storage_layout: serde_json::Value,
    #[serde(default)]
    pub method_identifiers: BTreeMap<String, String>,
    pub compiler: CompilerInfo,
}

/// Network specific deployment data of an artifact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// library name -> linked address
    #[serde(default)]
    pub links: BTreeMap<String, String>,
    /// anything else a deployment recorded
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// The persisted artifact of a contract
///
/// Compiler derived fields default when missing so artifacts of older schema versions still read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactRecord {
    pub contract_name: String,
    pub abi: Vec<serde_json::Value>,
    pub metadata: String,
    pub bytecode: String,
    pub deployed_bytecode: String,
    pub source_map: String,
    pub deployed_source_map: String,
    pub link_references: serde_json::Value,
    pub source: String,
    pub source_path: PathBuf,
    pub devdoc: serde_json::Value,
    pub userdoc: serde_json::Value,
    pub storage_layout: serde_json::Value,
    pub method_identifiers: BTreeMap<String, String>,
    pub compiler: CompilerInfo,
    /// network id -> deployment data
    pub networks: BTreeMap<String, NetworkRecord>,
    pub schema_version: String,
    pub updated_at: String,
}

/// The part of an existing artifact that survives a recompilation
#[derive(Debug, Default, Deserialize)]
struct ExistingArtifact {
    #[serde(default)]
    networks: BTreeMap<String, NetworkRecord>,
}

/// Reads the network records of the artifact at `path`
///
/// A missing file yields no records. A file that is not an artifact is replaced, so its content is
/// dropped with a warning.
fn existing_networks(path: &Path) -> Result<BTreeMap<String, NetworkRecord>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(CompileError::io(err, path)),
    };
    match serde_json::from_str::<ExistingArtifact>(&content) {
        Ok(existing) => Ok(existing.networks),
        Err(err) => {
            tracing::warn!("replacing unreadable artifact \"{}\": {}", path.display(), err);
            Ok(BTreeMap::new())
        }
    }
}

impl ArtifactRecord {
    /// Creates the record for a freshly compiled contract on top of the existing network records
    pub fn new(
        contract: &ContractOutput,
        mut networks: BTreeMap<String, NetworkRecord>,
        scope: &ArtifactScope,
    ) -> Self {
        if let Some(id) = &scope.network_id {
            networks.entry(id.clone()).or_default();
        }
        ArtifactRecord {
            contract_name: contract.contract_name.clone(),
            abi: contract.abi.clone(),
            metadata: contract.metadata.clone(),
            bytecode: contract.bytecode.clone(),
            deployed_bytecode: contract.deployed_bytecode.clone(),
            source_map: contract.source_map.clone(),
            deployed_source_map: contract.deployed_source_map.clone(),
            link_references: contract.link_references.clone(),
            source: contract.source.clone(),
            source_path: contract.source_path.clone(),
            devdoc: contract.devdoc.clone(),
            userdoc: contract.userdoc.clone(),
            storage_layout: contract.storage_layout.clone(),
            method_identifiers: contract.method_identifiers.clone(),
            compiler: contract.compiler.clone(),
            networks,
            schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
            updated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    /// Deserializes the artifact at the given path, `None` if it does not exist
    pub fn read(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CompileError::io(err, path)),
        }
    }
}

/// The network scope artifacts are saved with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactScope {
    pub network_id: Option<String>,
}

/// Persists compiled contracts
///
/// Implementers own the artifact schema. They must keep network scoped data of different network
/// ids apart and may only return once everything was written.
#[async_trait]
pub trait Artifactor: Send + Sync {
    async fn save_all(&self, contracts: &CompilationResult, scope: &ArtifactScope) -> Result<()>;
}

#[async_trait]
impl<T: Artifactor + ?Sized> Artifactor for Arc<T> {
    async fn save_all(&self, contracts: &CompilationResult, scope: &ArtifactScope) -> Result<()> {
        (**self).save_all(contracts, scope).await
    }
}

/// Writes one `<ContractName>.json` [`ArtifactRecord`] per contract into an existing directory
#[derive(Clone)]
pub struct JsonArtifactor {
    dir: PathBuf,
}

impl JsonArtifactor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the path of the artifact for the given contract
    pub fn artifact_path(&self, contract_name: &str) -> PathBuf {
        artifact_path(&self.dir, contract_name)
    }
}

impl fmt::Debug for JsonArtifactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonArtifactor {{ dir: {} }}", self.dir.display())
    }
}

/// The path of the artifact file of `contract_name` inside `dir`
pub fn artifact_path(dir: &Path, contract_name: &str) -> PathBuf {
    dir.join(format!("{contract_name}.json"))
}

#[async_trait]
impl Artifactor for JsonArtifactor {
    #[tracing::instrument(skip_all, fields(contracts = contracts.len()))]
    async fn save_all(&self, contracts: &CompilationResult, scope: &ArtifactScope) -> Result<()> {
        let dir = self.dir.clone();
        let contracts = contracts.clone();
        let scope = scope.clone();
        tokio::task::spawn_blocking(move || {
            for (name, contract) in &contracts {
                let file = artifact_path(&dir, name);
                let networks = existing_networks(&file)?;
                let record = ArtifactRecord::new(contract, networks, &scope);
                tracing::trace!("writing artifact \"{}\"", file.display());
                utils::write_atomic(&file, &serde_json::to_vec_pretty(&record)?)?;
            }
            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(name: &str) -> ContractOutput {
        ContractOutput {
            contract_name: name.to_string(),
            source_name: format!("contracts/{name}.sol"),
            abi: vec![serde_json::json!({"type": "function", "name": "greet"})],
            bytecode: "6080".to_string(),
            deployed_bytecode: "6080".to_string(),
            compiler: CompilerInfo { name: "solc".to_string(), version: "0.8.20".to_string() },
            ..Default::default()
        }
    }

    fn scope(id: &str) -> ArtifactScope {
        ArtifactScope { network_id: Some(id.to_string()) }
    }

    #[tokio::test]
    async fn keeps_distinct_network_records() {
        let tmp = tempfile::tempdir().unwrap();
        let artifactor = JsonArtifactor::new(tmp.path());
        let contracts = CompilationResult::from([("Greeter".to_string(), contract("Greeter"))]);

        artifactor.save_all(&contracts, &scope("1")).await.unwrap();
        artifactor.save_all(&contracts, &scope("2")).await.unwrap();

        let record = ArtifactRecord::read(artifactor.artifact_path("Greeter")).unwrap().unwrap();
        assert_eq!(record.networks.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(record.schema_version, ARTIFACT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn preserves_deployment_data() {
        let tmp = tempfile::tempdir().unwrap();
        let artifactor = JsonArtifactor::new(tmp.path());
        let contracts = CompilationResult::from([("Greeter".to_string(), contract("Greeter"))]);
        artifactor.save_all(&contracts, &scope("9")).await.unwrap();

        let path = artifactor.artifact_path("Greeter");
        let mut record = ArtifactRecord::read(&path).unwrap().unwrap();
        record.networks.get_mut("9").unwrap().address = Some("41abc".to_string());
        std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

        let mut recompiled = contract("Greeter");
        recompiled.bytecode = "6081".to_string();
        let contracts = CompilationResult::from([("Greeter".to_string(), recompiled)]);
        artifactor.save_all(&contracts, &ArtifactScope::default()).await.unwrap();

        let record = ArtifactRecord::read(&path).unwrap().unwrap();
        assert_eq!(record.bytecode, "6081");
        assert_eq!(record.networks["9"].address.as_deref(), Some("41abc"));
    }

    #[tokio::test]
    async fn keeps_networks_of_legacy_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let artifactor = JsonArtifactor::new(tmp.path());
        let path = artifactor.artifact_path("Greeter");
        std::fs::write(
            &path,
            r#"{
                "contractName": "Greeter",
                "abi": [],
                "bytecode": "6080",
                "deployedBytecode": "6080",
                "sourceMap": "",
                "deployedSourceMap": "",
                "source": "contract Greeter {}",
                "sourcePath": "/project/contracts/Greeter.sol",
                "compiler": {"name": "solc", "version": "0.5.4"},
                "networks": {"1": {"address": "41d1e7a6bc354106cb410e65ff8b181c600ff14292", "links": {}, "events": {}}},
                "schemaVersion": "2.0.1",
                "updatedAt": "2019-05-01T10:00:00.000Z"
            }"#,
        )
        .unwrap();
        let legacy = ArtifactRecord::read(&path).unwrap().unwrap();
        assert!(legacy.metadata.is_empty());

        let contracts = CompilationResult::from([("Greeter".to_string(), contract("Greeter"))]);
        artifactor.save_all(&contracts, &ArtifactScope::default()).await.unwrap();

        let record = ArtifactRecord::read(&path).unwrap().unwrap();
        assert_eq!(record.schema_version, ARTIFACT_SCHEMA_VERSION);
        assert_eq!(
            record.networks["1"].address.as_deref(),
            Some("41d1e7a6bc354106cb410e65ff8b181c600ff14292")
        );
        assert!(record.networks["1"].other.contains_key("events"));
    }

    #[tokio::test]
    async fn replaces_foreign_json() {
        let tmp = tempfile::tempdir().unwrap();
        let artifactor = JsonArtifactor::new(tmp.path());
        let path = artifactor.artifact_path("Greeter");
        std::fs::write(&path, r#"{"networks": 7}"#).unwrap();

        let contracts = CompilationResult::from([("Greeter".to_string(), contract("Greeter"))]);
        artifactor.save_all(&contracts, &scope("1")).await.unwrap();

        let record = ArtifactRecord::read(&path).unwrap().unwrap();
        assert_eq!(record.contract_name, "Greeter");
        assert_eq!(record.networks.keys().collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn missing_artifact_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ArtifactRecord::read(tmp.path().join("Missing.json")).unwrap().is_none());
    }
}

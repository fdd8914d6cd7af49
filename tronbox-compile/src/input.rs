//! The standard json input handed to the compiler backend

use crate::error::{CompileError, Result};
use md5::Digest;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};

/// The language literal of every input this crate produces
pub const SOLIDITY: &str = "Solidity";

/// The outputs every compilation requests, artifact consumers depend on all of them
pub const DEFAULT_OUTPUTS: [&str; 11] = [
    "abi",
    "devdoc",
    "userdoc",
    "metadata",
    "evm.bytecode.object",
    "evm.bytecode.sourceMap",
    "evm.bytecode.linkReferences",
    "evm.deployedBytecode.object",
    "evm.deployedBytecode.sourceMap",
    "storageLayout",
    "evm.methodIdentifiers",
];

/// Content of a source file
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub content: String,
}

impl Source {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }

    /// Reads the file content
    pub fn read(file: impl AsRef<Path>) -> Result<Self> {
        let file = file.as_ref();
        Ok(Self { content: fs::read_to_string(file).map_err(|err| CompileError::resolve(err, file))? })
    }

    /// Generate a non-cryptographically secure checksum of the file's content
    pub fn content_hash(&self) -> String {
        let mut hasher = md5::Md5::new();
        hasher.update(&self.content);
        hex::encode(hasher.finalize())
    }
}

impl AsRef<str> for Source {
    fn as_ref(&self) -> &str {
        &self.content
    }
}

/// Source unit name -> content, sorted by name
pub type Sources = BTreeMap<String, Source>;

/// `file pattern -> (contract pattern -> outputs)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputSelection(pub BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl OutputSelection {
    /// Selects [`DEFAULT_OUTPUTS`] for every contract of every file
    ///
    /// ```json
    /// { "*": { "*": ["abi", "devdoc", ...] } }
    /// ```
    pub fn default_outputs() -> Self {
        let outputs = DEFAULT_OUTPUTS.iter().map(|s| s.to_string()).collect();
        OutputSelection(BTreeMap::from([(
            "*".to_string(),
            BTreeMap::from([("*".to_string(), outputs)]),
        )]))
    }

    /// Adds all [`DEFAULT_OUTPUTS`] that are not already part of the wildcard selection
    pub fn ensure_default_outputs(&mut self) {
        let selected = self.0.entry("*".to_string()).or_default().entry("*".to_string()).or_default();
        for output in DEFAULT_OUTPUTS {
            if !selected.iter().any(|s| s == output) {
                selected.push(output.to_string());
            }
        }
    }

    /// The outputs selected for all contracts of all files
    pub fn wildcard_outputs(&self) -> &[String] {
        self.0.get("*").and_then(|contracts| contracts.get("*")).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for OutputSelection {
    fn default() -> Self {
        Self::default_outputs()
    }
}

/// Compiler settings of the standard json input
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "outputSelection", default)]
    pub output_selection: OutputSelection,
    /// All other settings, `optimizer`, `evmVersion`, `remappings`, ...
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl Settings {
    /// Creates settings from user supplied values
    ///
    /// A user supplied `outputSelection` is kept but always extended to cover the default outputs.
    pub fn from_user_settings(settings: &BTreeMap<String, serde_json::Value>) -> Result<Self> {
        let mut other: BTreeMap<_, _> =
            settings.iter().map(|(k, v)| (k.clone(), canonical_value(v))).collect();
        let output_selection = match other.remove("outputSelection") {
            Some(value) => {
                let mut selection: OutputSelection = serde_json::from_value(value).map_err(|err| {
                    CompileError::config(format!("Invalid \"outputSelection\" setting: {err}"))
                })?;
                selection.ensure_default_outputs();
                selection
            }
            None => OutputSelection::default_outputs(),
        };
        Ok(Self { output_selection, other })
    }
}

/// Input type `solc` expects
///
/// The serialized form is canonical: sources are keyed by name in sorted order and every settings
/// object is a sorted map, so the same logical input always yields the same bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardCompilerInput {
    pub language: String,
    pub sources: Sources,
    pub settings: Settings,
}

impl StandardCompilerInput {
    pub fn new(sources: Sources, settings: Settings) -> Self {
        Self { language: SOLIDITY.to_string(), sources, settings }
    }

    /// Creates a new input with default settings and the given sources
    pub fn with_sources(sources: Sources) -> Self {
        Self::new(sources, Settings::default())
    }

    /// The canonical serialization of this input
    pub fn canonical_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// The identity token of this input: the hex encoded md5 of [`Self::canonical_json()`]
    pub fn identity(&self) -> Result<String> {
        Ok(identity_of(&self.canonical_json()?))
    }
}

/// Rebuilds all nested objects with sorted keys
fn canonical_value(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<_, _> = map.iter().collect();
            serde_json::Value::Object(
                sorted.into_iter().map(|(k, v)| (k.clone(), canonical_value(v))).collect(),
            )
        }
        serde_json::Value::Array(values) => {
            serde_json::Value::Array(values.iter().map(canonical_value).collect())
        }
        other => other.clone(),
    }
}

/// Hex encoded md5 digest of the canonical bytes
pub(crate) fn identity_of(canonical: &[u8]) -> String {
    let mut hasher = md5::Md5::new();
    hasher.update(canonical);
    hex::encode(hasher.finalize())
}

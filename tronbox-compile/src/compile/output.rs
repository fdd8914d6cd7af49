//! Output type `solc` produces

use crate::artifacts::{CompilationResult, CompilerInfo, ContractOutput};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, path::PathBuf};

/// The standard json output of the compiler
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Diagnostic>,
    #[serde(default)]
    pub sources: BTreeMap<String, serde_json::Value>,
    /// source unit name -> (contract name -> contract)
    #[serde(default)]
    pub contracts: BTreeMap<String, BTreeMap<String, Contract>>,
}

impl CompilerOutput {
    /// Whether the output contains a compiler error
    pub fn has_error(&self) -> bool {
        self.errors.iter().any(|err| err.severity.is_error())
    }

    /// All diagnostics with `error` severity
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().filter(|err| err.severity.is_error())
    }

    /// All diagnostics that are not errors
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().filter(|err| !err.severity.is_error())
    }

    /// Converts the output into the contract name keyed result
    ///
    /// `sources` maps the source unit names of the input back to the file and its content. If the
    /// same contract name is declared in multiple files the one from the last source unit wins.
    pub fn into_compilation_result(
        self,
        sources: &BTreeMap<String, (PathBuf, String)>,
        compiler: &CompilerInfo,
    ) -> CompilationResult {
        let mut result = CompilationResult::new();
        for (source_name, contracts) in self.contracts {
            let (source_path, source) = sources
                .get(&source_name)
                .cloned()
                .unwrap_or_else(|| (PathBuf::from(&source_name), String::new()));
            for (contract_name, contract) in contracts {
                if let Some(previous) = result.get(&contract_name) {
                    tracing::warn!(
                        "duplicate contract name \"{}\" in \"{}\" and \"{}\"",
                        contract_name,
                        previous.source_name,
                        source_name
                    );
                }
                let evm = contract.evm.unwrap_or_default();
                let bytecode = evm.bytecode.unwrap_or_default();
                let deployed = evm.deployed_bytecode.unwrap_or_default();
                let output = ContractOutput {
                    contract_name: contract_name.clone(),
                    source_path: source_path.clone(),
                    source_name: source_name.clone(),
                    source: source.clone(),
                    abi: contract.abi,
                    bytecode: bytecode.object,
                    deployed_bytecode: deployed.object,
                    source_map: bytecode.source_map,
                    deployed_source_map: deployed.source_map,
                    link_references: bytecode.link_references,
                    metadata: contract.metadata,
                    devdoc: contract.devdoc,
                    userdoc: contract.userdoc,
                    storage_layout: contract.storage_layout,
                    method_identifiers: evm.method_identifiers,
                    compiler: compiler.clone(),
                };
                result.insert(contract_name, output);
            }
        }
        result
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }
}

/// A message the compiler emitted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.formatted_message {
            Some(msg) => f.write_str(msg.trim_end()),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub abi: Vec<serde_json::Value>,
    /// the contract metadata, a json document encoded as string
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub devdoc: serde_json::Value,
    #[serde(default)]
    pub userdoc: serde_json::Value,
    #[serde(default)]
    pub storage_layout: serde_json::Value,
    #[serde(default)]
    pub evm: Option<Evm>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evm {
    #[serde(default)]
    pub bytecode: Option<Bytecode>,
    #[serde(default)]
    pub deployed_bytecode: Option<Bytecode>,
    /// function signature -> selector
    #[serde(default)]
    pub method_identifiers: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bytecode {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub source_map: String,
    #[serde(default)]
    pub link_references: serde_json::Value,
}

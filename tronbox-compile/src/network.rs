//! Best effort lookup of the version of the node the project is configured against
//!
//! [`probe()`] never fails: any error is logged at debug level and yields an empty [`NetworkInfo`].
//! The result is only used for the status report after a successful compilation.

use crate::config::{CompileConfig, NetworkConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

/// The version information a network reported
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// The node's software version, `4.7.1` for java-tron or the `web3_clientVersion`
    pub node_version: Option<String>,
    /// The hex encoded chain id, EVM networks only
    pub chain_id: Option<String>,
}

impl NetworkInfo {
    pub fn is_empty(&self) -> bool {
        self.node_version.is_none() && self.chain_id.is_none()
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("no network configured")]
    NoNetwork,
    #[error("network \"{0}\" has no endpoint")]
    MissingEndpoint(String),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("JSON-RPC error: {0}")]
    Rpc(Value),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(Value),
}

/// Queries the active network, failures resolve to an empty [`NetworkInfo`]
#[tracing::instrument(skip_all)]
pub async fn probe(config: &CompileConfig) -> NetworkInfo {
    match try_probe(config).await {
        Ok(info) => info,
        Err(err) => {
            tracing::debug!("network probe failed: {}", err);
            NetworkInfo::default()
        }
    }
}

/// Queries the active network
///
/// The TVM environment asks `<full_host>/wallet/getnodeinfo` for `configNodeInfo.codeVersion`, the
/// EVM environment sends `web3_clientVersion` and `eth_chainId` to the network's JSON-RPC url.
pub async fn try_probe(config: &CompileConfig) -> Result<NetworkInfo, ProbeError> {
    let (name, network) = config.active_network().ok_or(ProbeError::NoNetwork)?;
    let client = Client::builder().timeout(config.probe_timeout).build()?;
    if config.evm {
        let url = evm_endpoint(network).ok_or_else(|| ProbeError::MissingEndpoint(name.to_string()))?;
        tracing::trace!("probing EVM network \"{}\" at {}", name, url);
        probe_evm(&client, Url::parse(url)?).await
    } else {
        let host = network
            .full_host
            .as_deref()
            .ok_or_else(|| ProbeError::MissingEndpoint(name.to_string()))?;
        tracing::trace!("probing TVM network \"{}\" at {}", name, host);
        probe_tvm(&client, node_info_url(host)?).await
    }
}

fn evm_endpoint(network: &NetworkConfig) -> Option<&str> {
    network.evm.as_ref().and_then(|evm| evm.url.as_deref()).or(network.full_host.as_deref())
}

fn node_info_url(full_host: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}/wallet/getnodeinfo", full_host.trim_end_matches('/')))
}

async fn probe_tvm(client: &Client, url: Url) -> Result<NetworkInfo, ProbeError> {
    let res: Value = client.post(url).send().await?.error_for_status()?.json().await?;
    let version = res
        .pointer("/configNodeInfo/codeVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| ProbeError::UnexpectedResponse(res.clone()))?;
    Ok(NetworkInfo { node_version: Some(version.to_string()), chain_id: None })
}

async fn probe_evm(client: &Client, url: Url) -> Result<NetworkInfo, ProbeError> {
    let node_version = rpc_string(client, url.clone(), 1, "web3_clientVersion").await?;
    let chain_id = rpc_string(client, url, 2, "eth_chainId").await?;
    Ok(NetworkInfo { node_version: Some(node_version), chain_id: Some(chain_id) })
}

async fn rpc_string(client: &Client, url: Url, id: u64, method: &str) -> Result<String, ProbeError> {
    let payload = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": [] });
    let mut res: Value = client.post(url).json(&payload).send().await?.json().await?;
    if let Some(error) = res.get_mut("error") {
        return Err(ProbeError::Rpc(error.take()))
    }
    match res.get("result").and_then(Value::as_str) {
        Some(result) => Ok(result.to_string()),
        None => Err(ProbeError::UnexpectedResponse(res)),
    }
}

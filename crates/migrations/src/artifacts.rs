/// This module resolves contract names to compiled artifacts. Artifacts can
/// be read from a local build directory (Truffle's `build/contracts` or
/// Foundry's `out`) or fetched from an artifacts server.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use ethers::{abi::Abi, contract::ContractFactory, providers::Middleware, types::Bytes};
use eyre::{eyre, Result};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

const RETRIES: usize = 5;
const RETRY_TIME: Duration = Duration::from_millis(500);

/// Truffle writes the bytecode as a hex string while Foundry nests it in an
/// object alongside the source map and link references.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: Option<String>,
    abi: Abi,
    #[serde(default)]
    bytecode: Option<RawBytecode>,
}

/// A compiled contract.
#[derive(Clone, Debug, PartialEq)]
pub struct Artifact {
    pub contract_name: String,
    pub abi: Abi,
    /// The creation bytecode. This is empty for interfaces and abstract
    /// contracts.
    pub bytecode: Bytes,
}

impl Artifact {
    /// Parses an artifact in either the Truffle or the Foundry layout. The
    /// provided name is used when the artifact doesn't carry its own.
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let raw = serde_json::from_str::<RawArtifact>(json)
            .map_err(|e| eyre!("invalid artifact for `{}`: {}", name, e))?;
        let bytecode = match raw.bytecode {
            Some(RawBytecode::Hex(bytes)) | Some(RawBytecode::Object { object: bytes }) => bytes,
            None => Bytes::default(),
        };
        Ok(Self {
            contract_name: raw.contract_name.unwrap_or_else(|| name.to_string()),
            abi: raw.abi,
            bytecode,
        })
    }

    pub fn is_deployable(&self) -> bool {
        !self.bytecode.is_empty()
    }

    /// Builds a factory that deploys this artifact with the given client.
    pub fn factory<M: Middleware>(&self, client: Arc<M>) -> Result<ContractFactory<M>> {
        if !self.is_deployable() {
            return Err(eyre!(
                "cannot deploy `{}`: the artifact has no bytecode (is it an interface or an abstract contract?)",
                self.contract_name
            ));
        }
        Ok(ContractFactory::new(
            self.abi.clone(),
            self.bytecode.clone(),
            client,
        ))
    }
}

/// Where artifacts are resolved from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArtifactRegistry {
    /// A build directory. Both `{dir}/{name}.json` and
    /// `{dir}/{name}.sol/{name}.json` are searched.
    Local(PathBuf),
    /// An artifacts server that serves `{url}/{name}.json`.
    Remote(String),
}

impl ArtifactRegistry {
    pub async fn resolve(&self, name: &str) -> Result<Artifact> {
        match self {
            Self::Local(dir) => resolve_local(dir, name).await,
            Self::Remote(url) => resolve_remote(url, name).await,
        }
    }
}

async fn resolve_local(dir: &Path, name: &str) -> Result<Artifact> {
    let candidates = [
        dir.join(format!("{}.json", name)),
        dir.join(format!("{}.sol", name)).join(format!("{}.json", name)),
    ];
    for path in candidates.iter() {
        if tokio::fs::try_exists(path).await? {
            debug!(artifact = name, path = %path.display(), "resolved artifact");
            let json = tokio::fs::read_to_string(path).await?;
            return Artifact::from_json(name, &json);
        }
    }
    Err(eyre!(
        "couldn't find artifact `{}` in {}",
        name,
        dir.display()
    ))
}

async fn resolve_remote(url: &str, name: &str) -> Result<Artifact> {
    let url = format!("{}/{}.json", url.trim_end_matches('/'), name);

    // Poll the artifacts server for the artifact.
    for _ in 0..RETRIES {
        let response = reqwest::get(&url).await?;
        if response.status().is_success() {
            debug!(artifact = name, url = %url, "resolved artifact");
            return Artifact::from_json(name, &response.text().await?);
        } else {
            sleep(RETRY_TIME).await;
        }
    }
    Err(eyre!(
        "couldn't get artifact `{}` from {} after {} retries",
        name,
        url,
        RETRIES
    ))
}

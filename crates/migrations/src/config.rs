use std::path::PathBuf;

use ethers::signers::LocalWallet;
use eyre::Result;
use serde::Deserialize;

use crate::artifacts::ArtifactRegistry;

/// The prefix shared by every environment variable the migrations read.
pub const ENV_PREFIX: &str = "MIGRATIONS_";

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("./out")
}

fn default_record_path() -> PathBuf {
    PathBuf::from("./artifacts/migrations.json")
}

fn default_addresses_path() -> PathBuf {
    PathBuf::from("./artifacts/addresses.json")
}

fn default_confirmations() -> usize {
    1
}

/// The configuration of a migration run. This is read from `MIGRATIONS_*`
/// environment variables, e.g. `MIGRATIONS_ETHEREUM_URL`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct MigrationConfig {
    /// The Ethereum RPC URL. If this is unset, a local anvil node is spun up.
    pub ethereum_url: Option<String>,
    /// The deployer's private key. If this is unset, transactions are sent
    /// from the node's first account and signed by the node.
    pub private_key: Option<String>,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    /// An artifacts server to resolve contracts from. This takes precedence
    /// over `artifacts_dir`.
    pub artifacts_url: Option<String>,
    #[serde(default = "default_record_path")]
    pub record_path: PathBuf,
    #[serde(default = "default_addresses_path")]
    pub addresses_path: PathBuf,
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
    /// Re-run every migration, ignoring the migration record.
    #[serde(default)]
    pub reset: bool,
}

impl MigrationConfig {
    /// Loads the configuration from the process environment. A `.env` file
    /// is loaded first if one exists.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine; the variables may be set directly.
        let _ = dotenvy::dotenv();
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    /// Loads the configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, Self>(vars)?)
    }

    pub fn artifact_registry(&self) -> ArtifactRegistry {
        match &self.artifacts_url {
            Some(url) => ArtifactRegistry::Remote(url.clone()),
            None => ArtifactRegistry::Local(self.artifacts_dir.clone()),
        }
    }

    pub fn wallet(&self) -> Result<Option<LocalWallet>> {
        self.private_key
            .as_deref()
            .map(|key| Ok(key.parse::<LocalWallet>()?))
            .transpose()
    }
}

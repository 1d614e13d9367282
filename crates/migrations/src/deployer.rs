use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    abi::Token,
    providers::Middleware,
    types::{Address, H256},
};
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::artifacts::ArtifactRegistry;

/// A contract deployed by a migration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub contract_name: String,
    pub address: Address,
    pub transaction_hash: H256,
    pub block_number: Option<u64>,
}

/// Lists the accounts controlled by the connected node.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>>;
}

/// Deploys named artifacts. This is the handle that migrations are given.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploys the artifact called `artifact` with the given constructor
    /// arguments and waits for the deployment to be mined.
    async fn deploy(&self, artifact: &str, args: Vec<Token>) -> Result<Deployment>;
}

/// A deployer that resolves artifacts from a registry and sends the creation
/// transactions with the given client.
#[derive(Debug)]
pub struct ChainDeployer<M> {
    client: Arc<M>,
    registry: ArtifactRegistry,
    confirmations: usize,
}

impl<M: Middleware + 'static> ChainDeployer<M> {
    pub fn new(client: Arc<M>, registry: ArtifactRegistry) -> Self {
        Self {
            client,
            registry,
            confirmations: 1,
        }
    }

    /// Sets the number of confirmations to wait for after each deployment.
    pub fn confirmations(mut self, confirmations: usize) -> Self {
        self.confirmations = confirmations;
        self
    }
}

#[async_trait]
impl<M: Middleware + 'static> Deployer for ChainDeployer<M> {
    async fn deploy(&self, artifact: &str, args: Vec<Token>) -> Result<Deployment> {
        let artifact = self.registry.resolve(artifact).await?;
        info!(contract = %artifact.contract_name, "deploying");

        let (contract, receipt) = artifact
            .factory(self.client.clone())?
            .deploy_tokens(args)?
            .confirmations(self.confirmations)
            .send_with_receipt()
            .await?;

        let deployment = Deployment {
            contract_name: artifact.contract_name,
            address: contract.address(),
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
        };
        info!(
            contract = %deployment.contract_name,
            address = ?deployment.address,
            transaction_hash = ?deployment.transaction_hash,
            "deployed"
        );
        Ok(deployment)
    }
}

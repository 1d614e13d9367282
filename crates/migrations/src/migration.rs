use async_trait::async_trait;
use ethers::abi::Tokenizable;
use eyre::Result;

use crate::deployer::{AccountSource, Deployer, Deployment};

/// The name of the artifact deployed by `MigrateBaseContract`.
pub const BASE_CONTRACT: &str = "baseContract";

/// A numbered deployment step. Migrations run in ascending `id` order and a
/// migration that has completed on a network isn't run there again.
#[async_trait]
pub trait Migration: Send + Sync {
    fn id(&self) -> u64;

    fn name(&self) -> &str;

    /// Runs the migration and returns the contracts it deployed. Errors from
    /// the node or the deployer are returned as-is.
    async fn run(
        &self,
        accounts: &dyn AccountSource,
        deployer: &dyn Deployer,
    ) -> Result<Vec<Deployment>>;
}

/// Deploys `baseContract` with the node's accounts as its owners.
#[derive(Clone, Copy, Debug, Default)]
pub struct MigrateBaseContract;

#[async_trait]
impl Migration for MigrateBaseContract {
    fn id(&self) -> u64 {
        2
    }

    fn name(&self) -> &str {
        "migrate_base_contract"
    }

    async fn run(
        &self,
        accounts: &dyn AccountSource,
        deployer: &dyn Deployer,
    ) -> Result<Vec<Deployment>> {
        // Set the owners to the node's accounts.
        let owners = accounts.accounts().await?;
        let deployment = deployer
            .deploy(BASE_CONTRACT, vec![owners.into_token()])
            .await?;
        Ok(vec![deployment])
    }
}

/// The migrations shipped with this crate, in the order they run.
pub fn migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(MigrateBaseContract)]
}

/// This module implements `AccountSource` on the `Chain` struct so that
/// migrations can ask the connected node for its accounts.
use async_trait::async_trait;
use ethers::{providers::Middleware, types::Address};
use eyre::Result;
use tracing::debug;

use super::Chain;
use crate::deployer::AccountSource;

#[async_trait]
impl AccountSource for Chain {
    async fn accounts(&self) -> Result<Vec<Address>> {
        let accounts = self.provider.get_accounts().await?;
        debug!(count = accounts.len(), "fetched node accounts");
        Ok(accounts)
    }
}

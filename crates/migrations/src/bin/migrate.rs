use std::sync::Arc;

use ethers::providers::Middleware;
use eyre::{eyre, Result};
use migrations::{
    chain::Chain,
    config::MigrationConfig,
    deployer::{AccountSource, ChainDeployer},
    migration::migrations,
    runner::MigrationRunner,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // Connect to the chain. This reads the Ethereum RPC URL, the deployer's
    // private key and the artifact locations from the environment. Without
    // an RPC URL, a local anvil node is spun up for the duration of the run.
    let config = MigrationConfig::from_env()?;
    let chain = Chain::connect(config.ethereum_url.clone()).await?;

    // Without a private key, the node signs for its first account.
    match config.wallet()? {
        Some(wallet) => {
            let client = chain.client(wallet).await?;
            migrate(&config, &chain, client).await
        }
        None => {
            let sender = chain
                .accounts()
                .await?
                .first()
                .copied()
                .ok_or_else(|| eyre!("the node doesn't control any accounts"))?;
            migrate(&config, &chain, chain.node_client(sender)).await
        }
    }
}

async fn migrate<M: Middleware + 'static>(
    config: &MigrationConfig,
    chain: &Chain,
    client: Arc<M>,
) -> Result<()> {
    let network = chain.network().await?;
    let deployer = ChainDeployer::new(client, config.artifact_registry())
        .confirmations(config.confirmations);

    // Run the pending migrations. Nothing is recorded for a chain that only
    // lives as long as this process.
    let record_path = (!chain.is_ephemeral()).then_some(config.record_path.as_path());
    let record = MigrationRunner::new(migrations())?
        .run(network, record_path, config.reset, chain, &deployer)
        .await?;

    // Write the chain's addresses to a file.
    let addresses = record.addresses(network.chain_id);
    if let Some(parent) = config.addresses_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&config.addresses_path, serde_json::to_vec(&addresses)?).await?;
    for (name, address) in addresses.iter() {
        info!(contract = name, address = ?address, "deployed contract");
    }

    Ok(())
}

use std::path::PathBuf;

use ethers::{
    abi::{encode, Token},
    providers::Middleware,
    signers::{LocalWallet, Signer},
    types::{Address, Bytes},
};
use eyre::Result;
use migrations::{
    artifacts::ArtifactRegistry,
    chain::Chain,
    deployer::{AccountSource, ChainDeployer, Deployer},
    migration::{migrations, MigrateBaseContract, Migration, BASE_CONTRACT},
    runner::{MigrationRecord, MigrationRunner},
};

// The fixture's creation code deploys a contract consisting of a single STOP.
const FIXTURE_RUNTIME_CODE: &str = "0x00";

// The first of anvil's default development keys.
const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

fn fixtures() -> ArtifactRegistry {
    ArtifactRegistry::Local(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures"))
}

fn record_path(label: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("migration-tests-{}-{}", label, std::process::id()))
        .join("migrations.json")
}

fn encoded_owners(owners: &[Address]) -> Vec<u8> {
    encode(&[Token::Array(
        owners.iter().copied().map(Token::Address).collect(),
    )])
}

// NOTE: These tests spin up an anvil node, so they only run when anvil is
// installed.
#[ignore]
#[tokio::test]
async fn test_migrate_base_contract() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let chain = Chain::connect(None).await?;
    assert!(chain.is_anvil());
    let accounts = chain.accounts().await?;
    assert!(!accounts.is_empty());

    // Deploy from the node's first account.
    let deployer = ChainDeployer::new(chain.node_client(accounts[0]), fixtures());
    let deployments = MigrateBaseContract.run(&chain, &deployer).await?;
    assert_eq!(deployments.len(), 1);
    let deployment = &deployments[0];
    assert_eq!(deployment.contract_name, BASE_CONTRACT);

    // The creation transaction carries the node's accounts, in order, as the
    // constructor argument.
    let tx = chain
        .provider()
        .get_transaction(deployment.transaction_hash)
        .await?
        .expect("deployment transaction");
    assert_eq!(tx.from, accounts[0]);
    assert!(tx.input.ends_with(&encoded_owners(&accounts)));

    let code = chain.provider().get_code(deployment.address, None).await?;
    assert_eq!(code, FIXTURE_RUNTIME_CODE.parse::<Bytes>()?);

    Ok(())
}

#[ignore]
#[tokio::test]
async fn test_migrate_with_local_signer() -> Result<()> {
    let chain = Chain::connect(None).await?;
    let wallet = ANVIL_KEY.parse::<LocalWallet>()?;
    let sender = wallet.address();
    let client = chain.client(wallet).await?;

    let deployment = ChainDeployer::new(client, fixtures())
        .deploy(BASE_CONTRACT, vec![Token::Array(vec![])])
        .await?;

    let tx = chain
        .provider()
        .get_transaction(deployment.transaction_hash)
        .await?
        .expect("deployment transaction");
    assert_eq!(tx.from, sender);
    assert!(tx.input.ends_with(&encoded_owners(&[])));

    Ok(())
}

#[ignore]
#[tokio::test]
async fn test_runner_records_and_skips() -> Result<()> {
    let chain = Chain::connect(None).await?;
    let network = chain.network().await?;
    let chain_id = network.chain_id;
    let accounts = chain.accounts().await?;
    let deployer = ChainDeployer::new(chain.node_client(accounts[0]), fixtures());
    let path = record_path("runner");
    let runner = MigrationRunner::new(migrations())?;

    let record = runner
        .run(network, Some(&path), false, &chain, &deployer)
        .await?;
    let entry = record.network(chain_id).expect("network record");
    assert_eq!(entry.genesis_hash, network.genesis_hash);
    assert_eq!(entry.last_completed_migration, 2);
    let address = record
        .addresses(chain_id)
        .get(BASE_CONTRACT)
        .expect("baseContract address");
    assert_eq!(MigrationRecord::load(&path).await?, record);

    // A second run doesn't deploy anything new.
    let block = chain.provider().get_block_number().await?;
    let rerun = runner
        .run(network, Some(&path), false, &chain, &deployer)
        .await?;
    assert_eq!(chain.provider().get_block_number().await?, block);
    assert_eq!(rerun.addresses(chain_id).get(BASE_CONTRACT), Some(address));

    // A reset deploys a fresh instance.
    let reset = runner
        .run(network, Some(&path), true, &chain, &deployer)
        .await?;
    assert_ne!(reset.addresses(chain_id).get(BASE_CONTRACT), Some(address));

    std::fs::remove_dir_all(path.parent().expect("record directory"))?;
    Ok(())
}

#[ignore]
#[tokio::test]
async fn test_missing_artifact_fails_before_sending() -> Result<()> {
    let chain = Chain::connect(None).await?;
    let accounts = chain.accounts().await?;
    let deployer = ChainDeployer::new(chain.node_client(accounts[0]), fixtures());

    let block = chain.provider().get_block_number().await?;
    let result = deployer.deploy("missingContract", vec![]).await;
    assert!(result.is_err());
    assert_eq!(chain.provider().get_block_number().await?, block);

    Ok(())
}

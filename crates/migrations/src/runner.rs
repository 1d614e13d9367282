/// This module runs migrations in order and keeps a record of which
/// migrations have completed on each network, along with the contracts they
/// deployed.
use std::{collections::BTreeMap, path::Path};

use ethers::types::H256;
use eyre::{eyre, Result};
use migration_addresses::Addresses;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    deployer::{AccountSource, Deployer, Deployment},
    migration::Migration,
};

/// Identifies a chain. Chains that share an id (e.g. every local anvil node)
/// are told apart by their genesis block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Network {
    pub chain_id: u64,
    pub genesis_hash: H256,
}

/// The migration state of a single network.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    pub genesis_hash: H256,
    pub last_completed_migration: u64,
    pub deployments: BTreeMap<String, Deployment>,
}

/// The migration state of every network, keyed by chain id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub networks: BTreeMap<u64, NetworkRecord>,
}

impl MigrationRecord {
    /// Loads a record from disk. A missing file is an empty record.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }
        let json = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// Saves the record. The record is written next to `path` first and then
    /// renamed over it, so an interrupted save leaves the old record intact.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(self)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn network(&self, chain_id: u64) -> Option<&NetworkRecord> {
        self.networks.get(&chain_id)
    }

    /// The addresses of every contract deployed on a network.
    pub fn addresses(&self, chain_id: u64) -> Addresses {
        self.network(chain_id)
            .map(|network| {
                network
                    .deployments
                    .iter()
                    .map(|(name, deployment)| (name.clone(), deployment.address))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct MigrationRunner {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRunner {
    pub fn new(mut migrations: Vec<Box<dyn Migration>>) -> Result<Self> {
        migrations.sort_by_key(|m| m.id());
        if let Some(pair) = migrations.windows(2).find(|w| w[0].id() == w[1].id()) {
            return Err(eyre!(
                "migrations `{}` and `{}` share the id {}",
                pair[0].name(),
                pair[1].name(),
                pair[0].id()
            ));
        }
        Ok(Self { migrations })
    }

    /// The ids of the migrations that a run would execute. Progress recorded
    /// for a different chain with the same id doesn't count.
    pub fn pending(&self, record: &MigrationRecord, network: &Network, reset: bool) -> Vec<u64> {
        let last_completed = if reset {
            0
        } else {
            record
                .network(network.chain_id)
                .filter(|n| n.genesis_hash == network.genesis_hash)
                .map(|n| n.last_completed_migration)
                .unwrap_or_default()
        };
        self.migrations
            .iter()
            .map(|m| m.id())
            .filter(|id| *id > last_completed)
            .collect()
    }

    /// Runs the pending migrations against a network. If `record_path` is
    /// given, the record stored there is updated after each migration
    /// completes; otherwise the run starts from an empty record that is only
    /// returned. If a migration fails, its error is returned and no later
    /// migration runs.
    pub async fn run(
        &self,
        network: Network,
        record_path: Option<&Path>,
        reset: bool,
        accounts: &dyn AccountSource,
        deployer: &dyn Deployer,
    ) -> Result<MigrationRecord> {
        let chain_id = network.chain_id;
        let mut record = match record_path {
            Some(path) => MigrationRecord::load(path).await?,
            None => MigrationRecord::default(),
        };
        let replaced = record
            .network(chain_id)
            .map_or(false, |n| n.genesis_hash != network.genesis_hash);
        if replaced {
            warn!(
                chain_id,
                genesis_hash = ?network.genesis_hash,
                "recorded migrations belong to another chain with this id"
            );
        }
        if reset || replaced {
            record.networks.remove(&chain_id);
        }
        let pending = self.pending(&record, &network, false);
        if pending.is_empty() {
            info!(chain_id, "network is up to date");
            return Ok(record);
        }

        for migration in self.migrations.iter().filter(|m| pending.contains(&m.id())) {
            info!(
                chain_id,
                id = migration.id(),
                name = migration.name(),
                "running migration"
            );
            let deployments = migration.run(accounts, deployer).await?;

            let entry = record
                .networks
                .entry(chain_id)
                .or_insert_with(|| NetworkRecord {
                    genesis_hash: network.genesis_hash,
                    ..Default::default()
                });
            for deployment in deployments {
                entry
                    .deployments
                    .insert(deployment.contract_name.clone(), deployment);
            }
            entry.last_completed_migration = migration.id();
            if let Some(path) = record_path {
                record.save(path).await?;
            }
        }

        Ok(record)
    }
}

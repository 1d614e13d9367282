mod accounts;

use std::{sync::Arc, time::Duration};

use ethers::{
    core::utils::Anvil,
    middleware::{NonceManagerMiddleware, SignerMiddleware},
    providers::{
        Http, HttpClientError, HttpRateLimitRetryPolicy, Middleware, Provider, RetryClient,
        RetryClientBuilder, RetryPolicy,
    },
    signers::Signer,
    types::Address,
    utils::AnvilInstance,
};
use eyre::{eyre, Result};
use tracing::info;

use crate::runner::Network;

/// Geth answers receipt queries with this while it is still indexing, which
/// happens right after a deployment on freshly synced nodes.
const INDEXING_IN_PROGRESS: &str = "transaction indexing is in progress";

/// A retry policy that retries rate limits and receipt lookups that hit a
/// node that is still indexing.
#[derive(Debug, Default)]
struct ChainRetryPolicy(HttpRateLimitRetryPolicy);

impl RetryPolicy<HttpClientError> for ChainRetryPolicy {
    fn should_retry(&self, error: &HttpClientError) -> bool {
        self.0.should_retry(error) || error.to_string().contains(INDEXING_IN_PROGRESS)
    }

    fn backoff_hint(&self, error: &HttpClientError) -> Option<Duration> {
        self.0.backoff_hint(error).or_else(|| {
            error
                .to_string()
                .contains(INDEXING_IN_PROGRESS)
                .then(|| Duration::from_millis(500))
        })
    }
}

/// A provider that retries according to `ChainRetryPolicy`. Both deployment
/// clients are built on it.
pub type RetryProvider = Provider<RetryClient<Http>>;

/// A client that signs deployments locally and tracks the deployer's nonce,
/// so consecutive deployments don't wait on the node's pending nonce.
pub type ChainClient<S> = NonceManagerMiddleware<SignerMiddleware<RetryProvider, S>>;

/// A connection to an Ethereum node that the migrations run against. If no
/// RPC URL is given, a local anvil node is spun up and kept alive for as long
/// as the `Chain` is.
pub struct Chain {
    provider: Provider<Http>,
    client_version: String,
    interval: Duration,
    maybe_anvil: Option<AnvilInstance>,
}

impl Chain {
    /// Constructs a new `Chain` from an Ethereum RPC URL. If the RPC URL is
    /// excluded, a local anvil node is spun up.
    pub async fn connect(maybe_rpc_url: Option<String>) -> Result<Self> {
        if let Some(rpc_url) = maybe_rpc_url {
            let interval = Duration::from_millis(500);
            let provider = Provider::<Http>::try_from(rpc_url)?.interval(interval);
            let client_version = provider.client_version().await?;
            info!(%client_version, "connected to chain");
            Ok(Self {
                provider,
                client_version,
                interval,
                maybe_anvil: None,
            })
        } else {
            let interval = Duration::from_millis(1);
            let anvil = Anvil::new().spawn();
            let provider = Provider::<Http>::try_from(anvil.endpoint())?.interval(interval);
            let client_version = provider.client_version().await?;
            info!(endpoint = %anvil.endpoint(), %client_version, "spawned anvil node");
            Ok(Self {
                provider,
                client_version,
                interval,
                maybe_anvil: Some(anvil),
            })
        }
    }

    /// A provider that can access the chain.
    pub fn provider(&self) -> Provider<Http> {
        self.provider.clone()
    }

    pub async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chainid().await?.as_u64())
    }

    /// The chain id together with the genesis block hash. Nodes restarted
    /// from scratch keep their chain id but get a new genesis block.
    pub async fn network(&self) -> Result<Network> {
        let chain_id = self.chain_id().await?;
        let genesis = self
            .provider
            .get_block(0u64)
            .await?
            .ok_or_else(|| eyre!("the node doesn't have a genesis block"))?;
        let genesis_hash = genesis
            .hash
            .ok_or_else(|| eyre!("the node returned a genesis block without a hash"))?;
        Ok(Network {
            chain_id,
            genesis_hash,
        })
    }

    fn retry_provider(&self) -> RetryProvider {
        let client = RetryClientBuilder::default()
            .rate_limit_retries(10)
            .timeout_retries(3)
            .initial_backoff(Duration::from_millis(100))
            .build(
                self.provider.as_ref().clone(),
                Box::<ChainRetryPolicy>::default(),
            );
        Provider::new(client).interval(self.interval)
    }

    /// A client that signs transactions locally with the given signer.
    pub async fn client<S: Signer + 'static>(&self, signer: S) -> Result<Arc<ChainClient<S>>> {
        let client = SignerMiddleware::new_with_provider_chain(self.retry_provider(), signer).await?;
        let address = client.address();
        Ok(Arc::new(NonceManagerMiddleware::new(client, address)))
    }

    /// A client that sends transactions from an account the node controls.
    /// The node is responsible for signing, so `sender` must be one of its
    /// accounts.
    pub fn node_client(&self, sender: Address) -> Arc<RetryProvider> {
        Arc::new(self.retry_provider().with_sender(sender))
    }

    /// Checks to see if the underlying chain is an anvil chain.
    pub fn is_anvil(&self) -> bool {
        self.client_version.contains("anvil")
    }

    /// Whether the chain was spun up for this process and disappears with it.
    pub fn is_ephemeral(&self) -> bool {
        self.maybe_anvil.is_some()
    }
}

//! Node RPC surface.
//!
//! Transport details are deliberately thin: the node answers JSON-RPC with
//! already-parsed records matching the model structs, plus the raw payload
//! bytes where relevant. Everything downstream talks to the traits, so tests
//! and the fetchers never depend on a live node.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use serac_core::{
    BlockHeight, ChainId, RpcCache, RpcError, TxId, TxIndex, ATOMIC_SOURCE_CACHE_PREFIX,
    REWARD_CACHE_PREFIX,
};

use crate::model::{CBlock, PBlock, PackedUtxo, XBlock, XTxRecord};

/// Block coordinates of an atomic tx on its source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicTxInfo {
    pub block_number: BlockHeight,
    pub block_timestamp: u64,
}

/// Synchronous lookup of source-chain coordinates for an imported UTXO,
/// used by the indexing engine on cache misses. Only the C-chain is
/// supported as a source.
pub trait AtomicInfoProbe: Send + Sync {
    fn atomic_tx_info(&self, source_chain: &ChainId, tx_id: &TxId) -> Result<AtomicTxInfo, RpcError>;
}

#[trait_variant::make(Send)]
pub trait PlatformRpc: Send + Sync + 'static {
    async fn latest_height(&self) -> Result<BlockHeight, RpcError>;

    async fn get_block(&self, height: BlockHeight) -> Result<PBlock, RpcError>;

    async fn get_reward_utxos(&self, staking_tx: &TxId) -> Result<Vec<PackedUtxo>, RpcError>;

    async fn current_validators(&self) -> Result<Vec<LiveValidator>, RpcError>;

    async fn current_supply(&self) -> Result<u64, RpcError>;

    async fn peer_count(&self) -> Result<u64, RpcError>;
}

#[trait_variant::make(Send)]
pub trait ExchangeRpc: Send + Sync + 'static {
    async fn latest_height(&self) -> Result<BlockHeight, RpcError>;

    async fn get_block(&self, height: BlockHeight) -> Result<XBlock, RpcError>;

    /// Tip of the node's sequential tx index (pre-Cortina era)
    async fn latest_tx_index(&self) -> Result<TxIndex, RpcError>;

    async fn get_tx(&self, index: TxIndex) -> Result<XTxRecord, RpcError>;
}

#[trait_variant::make(Send)]
pub trait ContractRpc: Send + Sync + 'static {
    async fn latest_height(&self) -> Result<BlockHeight, RpcError>;

    async fn get_block(&self, height: BlockHeight) -> Result<CBlock, RpcError>;
}

/// Live validator fields enriched into query responses; never indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveValidator {
    pub node_id: String,
    pub connected: bool,
    pub uptime_performance: f64,
    pub weight: u64,
    pub delegation_capacity: u64,
    pub potential_reward: u64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<R> {
    result: Option<R>,
    error: Option<RpcFault>,
}

#[derive(Debug, Deserialize)]
struct RpcFault {
    message: String,
}

fn unwrap_envelope<R>(envelope: RpcEnvelope<R>) -> Result<R, RpcError> {
    if let Some(fault) = envelope.error {
        return Err(RpcError::Transport(fault.message));
    }

    envelope
        .result
        .ok_or_else(|| RpcError::Malformed("empty rpc result".into()))
}

/// JSON-RPC client for one node, async side. Used by the fetchers and the
/// stats monitor.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl NodeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, RpcError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.base_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let envelope: RpcEnvelope<R> = response
            .json()
            .await
            .map_err(|e| RpcError::Malformed(e.to_string()))?;

        unwrap_envelope(envelope)
    }
}

#[derive(Debug, Deserialize)]
struct HeightResult {
    height: BlockHeight,
}

#[derive(Debug, Deserialize)]
struct SupplyResult {
    supply: u64,
}

#[derive(Debug, Deserialize)]
struct PeersResult {
    #[serde(rename = "numPeers")]
    num_peers: u64,
}

#[derive(Debug, Deserialize)]
struct ValidatorsResult {
    validators: Vec<LiveValidator>,
}

#[derive(Debug, Deserialize)]
struct RewardUtxosResult {
    utxos: Vec<PackedUtxo>,
}

#[derive(Debug, Deserialize)]
struct TxIndexResult {
    index: TxIndex,
}

impl PlatformRpc for NodeClient {
    async fn latest_height(&self) -> Result<BlockHeight, RpcError> {
        let result: HeightResult = self.call("platform.getHeight", serde_json::json!({})).await?;
        Ok(result.height)
    }

    async fn get_block(&self, height: BlockHeight) -> Result<PBlock, RpcError> {
        self.call("platform.getBlockByHeight", serde_json::json!({ "height": height }))
            .await
    }

    async fn get_reward_utxos(&self, staking_tx: &TxId) -> Result<Vec<PackedUtxo>, RpcError> {
        let result: RewardUtxosResult = self
            .call(
                "platform.getRewardUTXOs",
                serde_json::json!({ "txID": staking_tx.to_string() }),
            )
            .await?;
        Ok(result.utxos)
    }

    async fn current_validators(&self) -> Result<Vec<LiveValidator>, RpcError> {
        let result: ValidatorsResult = self
            .call("platform.getCurrentValidators", serde_json::json!({}))
            .await?;
        Ok(result.validators)
    }

    async fn current_supply(&self) -> Result<u64, RpcError> {
        let result: SupplyResult = self
            .call("platform.getCurrentSupply", serde_json::json!({}))
            .await?;
        Ok(result.supply)
    }

    async fn peer_count(&self) -> Result<u64, RpcError> {
        let result: PeersResult = self.call("info.peers", serde_json::json!({})).await?;
        Ok(result.num_peers)
    }
}

impl ExchangeRpc for NodeClient {
    async fn latest_height(&self) -> Result<BlockHeight, RpcError> {
        let result: HeightResult = self.call("avm.getHeight", serde_json::json!({})).await?;
        Ok(result.height)
    }

    async fn get_block(&self, height: BlockHeight) -> Result<XBlock, RpcError> {
        self.call("avm.getBlockByHeight", serde_json::json!({ "height": height }))
            .await
    }

    async fn latest_tx_index(&self) -> Result<TxIndex, RpcError> {
        let result: TxIndexResult = self
            .call("index.getLastAccepted", serde_json::json!({}))
            .await?;
        Ok(result.index)
    }

    async fn get_tx(&self, index: TxIndex) -> Result<XTxRecord, RpcError> {
        self.call("index.getContainerByIndex", serde_json::json!({ "index": index }))
            .await
    }
}

impl ContractRpc for NodeClient {
    async fn latest_height(&self) -> Result<BlockHeight, RpcError> {
        let result: HeightResult = self.call("avax.getHeight", serde_json::json!({})).await?;
        Ok(result.height)
    }

    async fn get_block(&self, height: BlockHeight) -> Result<CBlock, RpcError> {
        // the envelope arrives as the raw C payload; decode with the post-AP5
        // framing which the node reports per block
        let raw: serde_json::Value = self
            .call("avax.getBlockByNumber", serde_json::json!({ "number": height }))
            .await?;

        let bytes = serde_json::to_vec(&raw).map_err(|e| RpcError::Malformed(e.to_string()))?;

        crate::codec::decode_c_payload(&bytes, true).map_err(|e| RpcError::Malformed(e.to_string()))
    }
}

/// Forever-cache over the immutable RPC lookups: reward UTXO sets and atomic
/// tx coordinates. Cached entries never expire; the underlying responses are
/// immutable chain history.
#[derive(Clone)]
pub struct CachedRpc<R, C> {
    inner: R,
    cache: C,
}

impl<R, C: RpcCache> CachedRpc<R, C> {
    pub fn new(inner: R, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: PlatformRpc + Clone, C: RpcCache> CachedRpc<R, C> {
    pub async fn get_reward_utxos(&self, staking_tx: &TxId) -> Result<Vec<PackedUtxo>, RpcError> {
        let key = format!("{REWARD_CACHE_PREFIX}{staking_tx}");

        if let Some(hit) = self
            .cache
            .get(&key)
            .map_err(|e| RpcError::Transport(e.to_string()))?
        {
            return bincode::deserialize(&hit).map_err(|e| RpcError::Malformed(e.to_string()));
        }

        let utxos = self.inner.get_reward_utxos(staking_tx).await?;

        let encoded =
            bincode::serialize(&utxos).map_err(|e| RpcError::Malformed(e.to_string()))?;
        self.cache
            .put(&key, &encoded)
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(utxos)
    }
}

/// Blocking probe for atomic tx coordinates, shared with the indexing
/// engine which runs on the runner's blocking thread.
pub struct AtomicInfoClient<C> {
    http: reqwest::blocking::Client,
    c_chain_url: String,
    c_chain_id: ChainId,
    cache: C,
}

impl<C: RpcCache> AtomicInfoClient<C> {
    pub fn new(c_chain_url: impl Into<String>, c_chain_id: ChainId, cache: C) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            c_chain_url: c_chain_url.into(),
            c_chain_id,
            cache,
        }
    }
}

impl<C: RpcCache> AtomicInfoProbe for AtomicInfoClient<C> {
    fn atomic_tx_info(&self, source_chain: &ChainId, tx_id: &TxId) -> Result<AtomicTxInfo, RpcError> {
        if *source_chain != self.c_chain_id {
            return Err(RpcError::UnsupportedChain(format!(
                "atomic tx info is only available for the c-chain, got {source_chain}"
            )));
        }

        let key = format!("{ATOMIC_SOURCE_CACHE_PREFIX}{tx_id}");

        if let Some(hit) = self
            .cache
            .get(&key)
            .map_err(|e| RpcError::Transport(e.to_string()))?
        {
            return bincode::deserialize(&hit).map_err(|e| RpcError::Malformed(e.to_string()));
        }

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "avax.getAtomicTx",
            "params": { "txID": tx_id.to_string() },
        });

        let response = self
            .http
            .post(&self.c_chain_url)
            .json(&body)
            .send()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let envelope: RpcEnvelope<AtomicTxInfo> = response
            .json()
            .map_err(|e| RpcError::Malformed(e.to_string()))?;

        let info = unwrap_envelope(envelope)?;

        let encoded = bincode::serialize(&info).map_err(|e| RpcError::Malformed(e.to_string()))?;
        self.cache
            .put(&key, &encoded)
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(info)
    }
}

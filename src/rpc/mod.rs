/*
 * RPC client module: the single seam between the workflow and the chain
 */

use async_trait::async_trait;
use ethers::abi::{decode, ParamType};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, MiddlewareError, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::config::ChainConfig;
use crate::models::{PreparedCall, Result, SwapdeskError, TxReceipt};

/// Selector of Solidity's `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Everything the quote, approval and swap components need from a node.
///
/// All calls are made on behalf of [`ChainClient::sender`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn sender(&self) -> Address;

    async fn block_number(&self) -> Result<u64>;

    /// Read-only `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    async fn estimate_gas(&self, to: Address, data: Bytes) -> Result<U256>;

    /// Signs and broadcasts, returning as soon as the node accepts the transaction.
    async fn send_transaction(&self, call: PreparedCall) -> Result<H256>;

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt>;

    /// `eth_call` followed by `eth_estimateGas`; a revert in either aborts before anything is signed.
    async fn simulate(&self, to: Address, data: Bytes) -> Result<PreparedCall> {
        self.call(to, data.clone()).await?;
        let gas = self.estimate_gas(to, data.clone()).await?;
        Ok(PreparedCall { to, data, gas })
    }
}

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

pub struct RpcClient {
    client: SignerClient,
    chain_id: u64,
    confirmations: usize,
}

impl RpcClient {
    pub async fn new(config: &ChainConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| SwapdeskError::RpcError(format!("Failed to create provider: {e}")))?
            .interval(Duration::from_millis(config.poll_interval_ms));

        let chain = provider
            .get_chainid()
            .await
            .map_err(|e| SwapdeskError::RpcError(format!("Failed to get chain ID: {e}")))?;

        if chain.as_u64() != config.chain_id {
            return Err(SwapdeskError::RpcError(format!(
                "Chain ID mismatch: expected {}, got {}",
                config.chain_id,
                chain.as_u64()
            )));
        }

        let wallet = config
            .private_key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| SwapdeskError::ConfigError(format!("Invalid private key: {e}")))?
            .with_chain_id(config.chain_id);

        info!(address = ?wallet.address(), chain_id = config.chain_id, "Signer ready");

        Ok(Self {
            client: SignerMiddleware::new(provider, wallet),
            chain_id: config.chain_id,
            confirmations: config.confirmations,
        })
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn request(&self, to: Address, data: Bytes) -> TypedTransaction {
        TransactionRequest::new()
            .from(self.client.address())
            .to(to)
            .data(data)
            .into()
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    fn sender(&self) -> Address {
        self.client.address()
    }

    async fn block_number(&self) -> Result<u64> {
        let block = self
            .client
            .get_block_number()
            .await
            .map_err(|e| classify_error(&e, "Failed to get block number"))?;
        Ok(block.as_u64())
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = self.request(to, data);
        self.client
            .call(&tx, None)
            .await
            .map_err(|e| classify_error(&e, "eth_call failed"))
    }

    async fn estimate_gas(&self, to: Address, data: Bytes) -> Result<U256> {
        let tx = self.request(to, data);
        self.client
            .estimate_gas(&tx, None)
            .await
            .map_err(|e| classify_error(&e, "eth_estimateGas failed"))
    }

    async fn send_transaction(&self, call: PreparedCall) -> Result<H256> {
        let tx = TransactionRequest::new()
            .from(self.client.address())
            .to(call.to)
            .data(call.data)
            .gas(call.gas);

        let pending = self
            .client
            .send_transaction(tx, None)
            .await
            .map_err(|e| classify_error(&e, "Failed to send transaction"))?;

        let tx_hash = pending.tx_hash();
        info!(?tx_hash, "Transaction broadcast");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt> {
        debug!(?tx_hash, confirmations = self.confirmations, "Waiting for receipt");

        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .confirmations(self.confirmations)
            .await
            .map_err(|e| SwapdeskError::RpcError(format!("Failed to poll receipt: {e}")))?
            .ok_or(SwapdeskError::TransactionDropped { tx_hash })?;

        let success = receipt.status.map_or(false, |status| status.as_u64() == 1);
        if !success {
            warn!(?tx_hash, "Transaction mined with failure status");
        }

        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number.map(|b| b.as_u64()),
            gas_used: receipt.gas_used,
            success,
        })
    }
}

/// Splits node errors into reverts (the chain said no) and everything else (transport).
fn classify_error<E: MiddlewareError>(error: &E, context: &str) -> SwapdeskError {
    if let Some(response) = error.as_error_response() {
        let data = response
            .data
            .as_ref()
            .and_then(|value| value.as_str())
            .and_then(|hex| hex.parse::<Bytes>().ok());

        if response.code == 3 || response.message.contains("revert") {
            let reason = data
                .as_ref()
                .and_then(|bytes| decode_revert_reason(bytes))
                .or_else(|| reason_from_message(&response.message));
            return SwapdeskError::RevertError { reason, data };
        }
    }
    SwapdeskError::RpcError(format!("{context}: {error}"))
}

/// Decodes an `Error(string)` revert payload.
#[must_use]
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    decode(&[ParamType::String], &data[4..])
        .ok()?
        .into_iter()
        .next()?
        .into_string()
}

fn reason_from_message(message: &str) -> Option<String> {
    message
        .split_once("execution reverted:")
        .map(|(_, reason)| reason.trim().to_string())
        .filter(|reason| !reason.is_empty())
}

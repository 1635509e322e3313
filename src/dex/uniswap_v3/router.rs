/*
 * Uniswap V3 SwapRouter executor
 */

use ethers::types::{Address, H256, U256};
use std::sync::Arc;
use tracing::{info, warn};
use crate::models::{Result, SwapParams, SwapdeskError, Token};
use crate::rpc::ChainClient;
use crate::utils::deadline_from_now;

pub const DEFAULT_DEADLINE_SECS: u64 = 20 * 60;

pub struct SwapExecutor {
    client: Arc<dyn ChainClient>,
    router: Address,
    deadline_secs: u64,
}

impl SwapExecutor {
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>, router: Address, deadline_secs: u64) -> Self {
        Self {
            client,
            router,
            deadline_secs,
        }
    }

    #[must_use]
    pub fn router(&self) -> Address {
        self.router
    }

    /// Builds `exactInputSingle` params valid for the configured window.
    #[must_use]
    pub fn build_params(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        amount_out_minimum: U256,
        fee: u32,
        recipient: Address,
    ) -> SwapParams {
        SwapParams {
            token_in: token_in.address,
            token_out: token_out.address,
            fee,
            recipient,
            deadline: deadline_from_now(self.deadline_secs),
            amount_in,
            amount_out_minimum,
            sqrt_price_limit_x96: U256::zero(),
        }
    }

    pub async fn swap(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        amount_out_minimum: U256,
        fee: u32,
        recipient: Address,
    ) -> Result<H256> {
        let params = self.build_params(token_in, token_out, amount_in, amount_out_minimum, fee, recipient);
        info!(
            "Swapping {} {} for at least {} {} (fee {}, deadline {})",
            amount_in, token_in.symbol, amount_out_minimum, token_out.symbol, fee, params.deadline
        );
        self.swap_with_params(&params).await
    }

    /// Simulates, then submits. Nothing is signed if the simulation reverts.
    pub async fn swap_with_params(&self, params: &SwapParams) -> Result<H256> {
        if params.amount_out_minimum.is_zero() {
            return Err(SwapdeskError::InvalidInput(
                "amount_out_minimum must be at least 1".to_string(),
            ));
        }
        if params.amount_in.is_zero() {
            return Err(SwapdeskError::InvalidInput("amount_in must be positive".to_string()));
        }

        let data = params.encode_exact_input_single();
        let prepared = self.client.simulate(self.router, data).await.map_err(|e| {
            warn!("Swap simulation failed: {}", e);
            e
        })?;

        info!("Swap simulation passed, estimated gas {}", prepared.gas);
        self.client.send_transaction(prepared).await
    }
}

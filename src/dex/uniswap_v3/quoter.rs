/*
 * Uniswap V3 QuoterV2 client
 */

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, error};
use crate::models::{ExactInputQuote, Quote, Result, Token};
use crate::rpc::ChainClient;
use super::types::{
    decode_quote_exact_input, decode_quote_exact_output, encode_quote_exact_input_single,
    encode_quote_exact_output_single,
};

pub struct QuoteClient {
    client: Arc<dyn ChainClient>,
    quoter: Address,
}

impl QuoteClient {
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>, quoter: Address) -> Self {
        Self { client, quoter }
    }

    /// Input needed to receive exactly `amount_out` of `token_out` from a single pool.
    ///
    /// Only valid for the block it was taken at.
    pub async fn quote(&self, token_in: &Token, token_out: &Token, amount_out: U256, fee: u32) -> Result<Quote> {
        let data = encode_quote_exact_output_single(token_in.address, token_out.address, amount_out, fee);

        let result = self.client.call(self.quoter, data).await.map_err(|e| {
            error!("Quote {}->{} failed: {}", token_in.symbol, token_out.symbol, e);
            e
        })?;
        let quote = decode_quote_exact_output(&result)?;

        debug!(
            "Quote {} {} -> {} {} (fee {}, ticks crossed {})",
            quote.amount_in, token_in.symbol, amount_out, token_out.symbol, fee, quote.initialized_ticks_crossed
        );
        Ok(quote)
    }

    /// Output expected for exactly `amount_in` of `token_in`.
    pub async fn quote_exact_input(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_in: U256,
        fee: u32,
    ) -> Result<ExactInputQuote> {
        let data = encode_quote_exact_input_single(token_in.address, token_out.address, amount_in, fee);
        let result = self.client.call(self.quoter, data).await?;
        let quote = decode_quote_exact_input(&result)?;

        debug!(
            "Quote {} {} -> {} {} (fee {})",
            amount_in, token_in.symbol, quote.amount_out, token_out.symbol, fee
        );
        Ok(quote)
    }
}

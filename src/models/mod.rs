/*
 * Data models and types for the swap checkout service
 */

use chrono::{DateTime, Utc};
use ethers::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest `decimals` whose whole unit still fits in a `U256`.
pub const MAX_DECIMALS: u8 = 77;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    #[must_use]
    pub fn new(symbol: &str, address: Address, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            address,
            decimals,
        }
    }

    /// One whole token expressed in its smallest unit.
    pub fn unit(&self) -> Result<U256> {
        if self.decimals > MAX_DECIMALS {
            return Err(SwapdeskError::InvalidInput(format!(
                "{} has {} decimals, at most {MAX_DECIMALS} fit in 256 bits",
                self.symbol, self.decimals
            )));
        }
        Ok(U256::exp10(usize::from(self.decimals)))
    }
}

/// Result of a QuoterV2 exact-output quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub amount_in: U256,
    pub sqrt_price_x96_after: U256,
    pub initialized_ticks_crossed: u32,
    pub gas_estimate: U256,
}

/// Result of a QuoterV2 exact-input quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactInputQuote {
    pub amount_out: U256,
    pub sqrt_price_x96_after: U256,
    pub initialized_ticks_crossed: u32,
    pub gas_estimate: U256,
}

/// Arguments of `ISwapRouter.exactInputSingle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub token_in: Address,
    pub token_out: Address,
    pub fee: u32,
    pub recipient: Address,
    pub deadline: U256,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    pub sqrt_price_limit_x96: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Approve exactly the amount the swap needs.
    Exact,
    /// Approve `U256::MAX` so later checkouts skip the approval.
    Max,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllowanceOutcome {
    Sufficient { current: U256 },
    Approved { tx_hash: H256, amount: U256 },
}

/// A call that passed simulation and is ready to be signed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    pub to: Address,
    pub data: Bytes,
    pub gas: U256,
}

/// Minimal view of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStage {
    Idle,
    Quoting,
    CheckingAllowance,
    Approving,
    AwaitingApprovalReceipt,
    CheckingBalance,
    Swapping,
    AwaitingSwapReceipt,
    Done,
    Failed,
}

impl fmt::Display for CheckoutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutStage::Idle => "idle",
            CheckoutStage::Quoting => "quoting",
            CheckoutStage::CheckingAllowance => "checking allowance",
            CheckoutStage::Approving => "approving",
            CheckoutStage::AwaitingApprovalReceipt => "awaiting approval receipt",
            CheckoutStage::CheckingBalance => "checking balance",
            CheckoutStage::Swapping => "swapping",
            CheckoutStage::AwaitingSwapReceipt => "awaiting swap receipt",
            CheckoutStage::Done => "done",
            CheckoutStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub token_in: Token,
    pub token_out: Token,
    pub amount_in: U256,
    pub fee: u32,
    /// Defaults to the signing account.
    pub recipient: Option<Address>,
    /// When absent the minimum is derived from a fresh quote and the slippage tolerance.
    pub amount_out_minimum: Option<U256>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub timestamp_utc: DateTime<Utc>,
    pub stages: Vec<CheckoutStage>,
    pub allowance: AllowanceOutcome,
    pub amount_in: U256,
    pub amount_out_minimum: U256,
    pub swap: TxReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPrice {
    pub in_listing: U256,
    pub in_reference: U256,
    pub in_settlement: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPriceReport {
    pub timestamp_utc: DateTime<Utc>,
    pub block_number: u64,
    pub listing_token: String,
    pub reference_token: String,
    pub settlement_token: String,
    pub reference_in_settlement: String,
    pub reference_in_listing: String,
    pub item_price_listing: String,
    pub item_price_reference: String,
    pub item_price_settlement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteReport {
    pub timestamp_utc: DateTime<Utc>,
    pub token_in: String,
    pub token_out: String,
    pub fee: u32,
    pub amount_out: String,
    pub amount_in: String,
    pub gas_estimate: String,
    pub initialized_ticks_crossed: u32,
    /// Pool price after the quoted trade: one `pool_base` priced in `pool_quote`.
    pub pool_price_after: String,
    pub pool_base: String,
    pub pool_quote: String,
}

#[derive(Debug, Error)]
pub enum SwapdeskError {
    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Execution reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    RevertError {
        reason: Option<String>,
        data: Option<Bytes>,
    },

    #[error("Insufficient allowance for {token}: have {available}, need {required}")]
    InsufficientAllowance {
        token: String,
        available: U256,
        required: U256,
    },

    #[error("Insufficient balance of {token}: have {available}, need {required}")]
    InsufficientBalance {
        token: String,
        available: U256,
        required: U256,
    },

    #[error("Transaction {tx_hash:?} was mined with failure status")]
    TransactionFailed { tx_hash: H256 },

    #[error("Transaction {tx_hash:?} was dropped before confirmation")]
    TransactionDropped { tx_hash: H256 },

    #[error("Checkout failed while {stage}: {source}")]
    CheckoutFailed {
        stage: CheckoutStage,
        #[source]
        source: Box<SwapdeskError>,
    },

    #[error("Contract interaction error: {0}")]
    ContractError(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SwapdeskError {
    /// True when the failure came from the chain rejecting a call rather than from the transport.
    #[must_use]
    pub fn is_revert(&self) -> bool {
        match self {
            SwapdeskError::RevertError { .. } => true,
            SwapdeskError::CheckoutFailed { source, .. } => source.is_revert(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SwapdeskError>;

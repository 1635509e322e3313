/*
 * Configuration management for the swapdesk service
 */

use crate::models::{ApprovalMode, Result, SwapdeskError};
use crate::utils::slippage_percent_to_bps;
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_QUOTER_ADDRESS: &str = "0x61fFE014bA17989E743c5F6cB21bF9697530B21e";
pub const DEFAULT_SWAP_ROUTER_ADDRESS: &str = "0xE592427A0AEce92De3Edee1F18E0157C05861564";
const ALCHEMY_MAINNET_URL: &str = "https://eth-mainnet.alchemyapi.io/v2/";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
    pub checkout: CheckoutConfig,
    pub pricing: PricingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    #[serde(skip_serializing)]
    pub private_key: String,
    pub confirmations: usize,
    pub poll_interval_ms: u64,
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("private_key", &"<redacted>")
            .field("confirmations", &self.confirmations)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractsConfig {
    pub quoter: Address,
    pub swap_router: Address,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckoutConfig {
    pub approval_mode: ApprovalMode,
    pub slippage_bps: u32,
    pub deadline_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Listing price in whole units of the listing token.
    pub item_price: String,
    pub listing_token: String,
    pub reference_token: String,
    pub settlement_token: String,
    pub listing_fee: u32,
    pub settlement_fee: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let rpc_url = match (lookup("RPC_URL"), lookup("ALCHEMY_API_KEY")) {
            (Some(url), _) => url,
            (None, Some(key)) => format!("{ALCHEMY_MAINNET_URL}{key}"),
            (None, None) => {
                return Err(SwapdeskError::ConfigError(
                    "RPC_URL or ALCHEMY_API_KEY must be set".to_string(),
                ))
            }
        };

        let confirmations: usize = parse_var(&var("CONFIRMATIONS", "1"), "CONFIRMATIONS")?;
        if confirmations == 0 {
            return Err(SwapdeskError::ConfigError(
                "CONFIRMATIONS must be at least 1".to_string(),
            ));
        }

        let slippage_percent = Decimal::from_str(&var("SLIPPAGE_PERCENT", "0.5"))
            .map_err(|e| SwapdeskError::ConfigError(format!("Invalid SLIPPAGE_PERCENT: {e}")))?;

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST", "0.0.0.0"),
                port: parse_var(&var("SERVER_PORT", "8080"), "SERVER_PORT")?,
                log_level: var("LOG_LEVEL", "info"),
            },
            chain: ChainConfig {
                rpc_url,
                chain_id: parse_var(&var("CHAIN_ID", "1"), "CHAIN_ID")?,
                private_key: lookup("PRIVATE_KEY")
                    .ok_or_else(|| SwapdeskError::ConfigError("PRIVATE_KEY not set".to_string()))?,
                confirmations,
                poll_interval_ms: parse_var(&var("POLL_INTERVAL_MS", "2000"), "POLL_INTERVAL_MS")?,
            },
            contracts: ContractsConfig {
                quoter: parse_address(&var("QUOTER_ADDRESS", DEFAULT_QUOTER_ADDRESS), "QUOTER_ADDRESS")?,
                swap_router: parse_address(
                    &var("SWAP_ROUTER_ADDRESS", DEFAULT_SWAP_ROUTER_ADDRESS),
                    "SWAP_ROUTER_ADDRESS",
                )?,
            },
            checkout: CheckoutConfig {
                approval_mode: var("APPROVAL_MODE", "max").parse()?,
                slippage_bps: slippage_percent_to_bps(slippage_percent)?,
                deadline_secs: parse_var(&var("DEADLINE_SECONDS", "1200"), "DEADLINE_SECONDS")?,
            },
            pricing: PricingConfig {
                item_price: var("ITEM_PRICE", "20"),
                listing_token: var("LISTING_TOKEN", "PEPE"),
                reference_token: var("REFERENCE_TOKEN", "WETH"),
                settlement_token: var("SETTLEMENT_TOKEN", "USDC"),
                listing_fee: parse_var(&var("LISTING_FEE", "3000"), "LISTING_FEE")?,
                settlement_fee: parse_var(&var("SETTLEMENT_FEE", "500"), "SETTLEMENT_FEE")?,
            },
        })
    }
}

fn parse_var<T>(value: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SwapdeskError::ConfigError(format!("Invalid {key}: {e}")))
}

fn parse_address(value: &str, key: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| SwapdeskError::ConfigError(format!("Invalid {key} address: {e}")))
}

impl FromStr for ApprovalMode {
    type Err = SwapdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(ApprovalMode::Exact),
            "max" | "unlimited" => Ok(ApprovalMode::Max),
            _ => Err(SwapdeskError::ConfigError(format!(
                "Unknown approval mode: {s}"
            ))),
        }
    }
}

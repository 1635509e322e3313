/*
 * DEX integration module: ERC-20 allowances and Uniswap V3 quoting/routing
 */

pub mod erc20;
pub mod uniswap_v3;

use ethers::abi::{encode, Token as AbiToken};
use ethers::types::{Address, Bytes};
use ethers::utils::keccak256;
use std::collections::HashMap;
use std::str::FromStr;
use crate::models::{Result, SwapdeskError, Token};

pub const WETH_ADDRESS: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const USDC_ADDRESS: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
pub const PEPE_ADDRESS: &str = "0x6982508145454Ce325dDbE47a25d4ec3d2311933";

#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector followed by the ABI-encoded arguments.
#[must_use]
pub fn calldata(signature: &str, args: &[AbiToken]) -> Bytes {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode(args));
    Bytes::from(data)
}

/// Known tokens, looked up case-insensitively by symbol.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, Token>,
}

impl TokenRegistry {
    pub fn mainnet() -> Result<Self> {
        let mut registry = Self::default();
        for (symbol, address, decimals) in [
            ("WETH", WETH_ADDRESS, 18),
            ("USDC", USDC_ADDRESS, 6),
            ("PEPE", PEPE_ADDRESS, 18),
        ] {
            let address = Address::from_str(address)
                .map_err(|e| SwapdeskError::ConfigError(format!("Invalid {symbol} address: {e}")))?;
            registry.insert(Token::new(symbol, address, decimals))?;
        }
        Ok(registry)
    }

    /// Rejects tokens whose whole unit would not fit in a `U256`.
    pub fn insert(&mut self, token: Token) -> Result<()> {
        token.unit()?;
        self.tokens.insert(token.symbol.to_uppercase(), token);
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Result<&Token> {
        self.tokens
            .get(&symbol.to_uppercase())
            .ok_or_else(|| SwapdeskError::InvalidInput(format!("Unknown token: {symbol}")))
    }
}

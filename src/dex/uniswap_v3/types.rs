/*
 * Uniswap V3 call encoding for QuoterV2 and SwapRouter
 */

use ethers::abi::{decode, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use crate::dex::{calldata, selector};
use crate::models::{ExactInputQuote, Quote, Result, SwapParams, SwapdeskError};

pub const QUOTE_EXACT_OUTPUT_SINGLE: &str =
    "quoteExactOutputSingle((address,address,uint256,uint24,uint160))";
pub const QUOTE_EXACT_INPUT_SINGLE: &str =
    "quoteExactInputSingle((address,address,uint256,uint24,uint160))";
pub const EXACT_INPUT_SINGLE: &str =
    "exactInputSingle((address,address,uint24,address,uint256,uint256,uint256,uint160))";

fn quote_params(token_in: Address, token_out: Address, amount: U256, fee: u32) -> Token {
    Token::Tuple(vec![
        Token::Address(token_in),
        Token::Address(token_out),
        Token::Uint(amount),
        Token::Uint(fee.into()),
        Token::Uint(U256::zero()),
    ])
}

#[must_use]
pub fn encode_quote_exact_output_single(
    token_in: Address,
    token_out: Address,
    amount_out: U256,
    fee: u32,
) -> Bytes {
    calldata(
        QUOTE_EXACT_OUTPUT_SINGLE,
        &[quote_params(token_in, token_out, amount_out, fee)],
    )
}

#[must_use]
pub fn encode_quote_exact_input_single(
    token_in: Address,
    token_out: Address,
    amount_in: U256,
    fee: u32,
) -> Bytes {
    calldata(
        QUOTE_EXACT_INPUT_SINGLE,
        &[quote_params(token_in, token_out, amount_in, fee)],
    )
}

/// Both QuoterV2 single-pool methods return `(uint256, uint160, uint32, uint256)`.
fn decode_quote_words(result: &[u8]) -> Result<(U256, U256, u32, U256)> {
    let tokens = decode(
        &[
            ParamType::Uint(256),
            ParamType::Uint(160),
            ParamType::Uint(32),
            ParamType::Uint(256),
        ],
        result,
    )
    .map_err(|e| SwapdeskError::ContractError(format!("Invalid quoter response: {e}")))?;

    let mut words = tokens.into_iter().map(Token::into_uint);
    let mut next = || {
        words
            .next()
            .flatten()
            .ok_or_else(|| SwapdeskError::ContractError("Invalid quoter response".to_string()))
    };

    let amount = next()?;
    let sqrt_price_x96_after = next()?;
    let ticks = next()?;
    let gas_estimate = next()?;
    Ok((amount, sqrt_price_x96_after, ticks.low_u32(), gas_estimate))
}

pub fn decode_quote_exact_output(result: &[u8]) -> Result<Quote> {
    let (amount_in, sqrt_price_x96_after, initialized_ticks_crossed, gas_estimate) =
        decode_quote_words(result)?;
    Ok(Quote {
        amount_in,
        sqrt_price_x96_after,
        initialized_ticks_crossed,
        gas_estimate,
    })
}

pub fn decode_quote_exact_input(result: &[u8]) -> Result<ExactInputQuote> {
    let (amount_out, sqrt_price_x96_after, initialized_ticks_crossed, gas_estimate) =
        decode_quote_words(result)?;
    Ok(ExactInputQuote {
        amount_out,
        sqrt_price_x96_after,
        initialized_ticks_crossed,
        gas_estimate,
    })
}

const EXACT_INPUT_SINGLE_PARAMS: [ParamType; 8] = [
    ParamType::Address,
    ParamType::Address,
    ParamType::Uint(24),
    ParamType::Address,
    ParamType::Uint(256),
    ParamType::Uint(256),
    ParamType::Uint(256),
    ParamType::Uint(160),
];

impl SwapParams {
    #[must_use]
    pub fn encode_exact_input_single(&self) -> Bytes {
        calldata(
            EXACT_INPUT_SINGLE,
            &[Token::Tuple(vec![
                Token::Address(self.token_in),
                Token::Address(self.token_out),
                Token::Uint(self.fee.into()),
                Token::Address(self.recipient),
                Token::Uint(self.deadline),
                Token::Uint(self.amount_in),
                Token::Uint(self.amount_out_minimum),
                Token::Uint(self.sqrt_price_limit_x96),
            ])],
        )
    }

    /// Reads `exactInputSingle` calldata back into params.
    pub fn decode_exact_input_single(data: &[u8]) -> Result<Self> {
        if data.len() < 4 || data[..4] != selector(EXACT_INPUT_SINGLE) {
            return Err(SwapdeskError::ContractError(
                "Not an exactInputSingle call".to_string(),
            ));
        }

        let tokens = decode(&[ParamType::Tuple(EXACT_INPUT_SINGLE_PARAMS.to_vec())], &data[4..])
            .map_err(|e| SwapdeskError::ContractError(format!("Invalid swap calldata: {e}")))?;

        let fields = tokens
            .into_iter()
            .next()
            .and_then(Token::into_tuple)
            .ok_or_else(|| SwapdeskError::ContractError("Invalid swap calldata".to_string()))?;

        let invalid = || SwapdeskError::ContractError("Invalid swap calldata".to_string());
        let address = |i: usize| fields.get(i).cloned().and_then(Token::into_address).ok_or_else(invalid);
        let uint = |i: usize| fields.get(i).cloned().and_then(Token::into_uint).ok_or_else(invalid);

        Ok(Self {
            token_in: address(0)?,
            token_out: address(1)?,
            fee: uint(2)?.low_u32(),
            recipient: address(3)?,
            deadline: uint(4)?,
            amount_in: uint(5)?,
            amount_out_minimum: uint(6)?,
            sqrt_price_limit_x96: uint(7)?,
        })
    }
}

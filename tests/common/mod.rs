/*
 * In-memory chain double shared by the integration tests
 */

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::{decode, encode, ParamType, Token as AbiToken};
use ethers::types::{Address, Bytes, H256, U256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use swapdesk::config::Config;
use swapdesk::dex::erc20::{ALLOWANCE, APPROVE, BALANCE_OF};
use swapdesk::dex::uniswap_v3::{EXACT_INPUT_SINGLE, QUOTE_EXACT_INPUT_SINGLE, QUOTE_EXACT_OUTPUT_SINGLE};
use swapdesk::dex::{selector, TokenRegistry};
use swapdesk::metrics::Metrics;
use swapdesk::models::{PreparedCall, Result, SwapParams, SwapdeskError, Token, TxReceipt};
use swapdesk::rpc::ChainClient;
use swapdesk::service::CheckoutService;

pub const QUOTER: Address = Address::repeat_byte(0x51);
pub const ROUTER: Address = Address::repeat_byte(0x52);
pub const OWNER: Address = Address::repeat_byte(0x0a);
pub const NOW: u64 = 1_700_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Approve,
    Swap,
    Other,
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub kind: TxKind,
    pub to: Address,
    pub data: Bytes,
    pub hash: H256,
}

#[derive(Default)]
pub struct ChainState {
    pub block_number: u64,
    pub timestamp: u64,
    pub allowances: HashMap<(Address, Address, Address), U256>,
    pub balances: HashMap<(Address, Address), U256>,
    /// (token_in, token_out) -> amount_in for one exact-output quote
    pub exact_output: HashMap<(Address, Address), U256>,
    /// (token_in, token_out) -> amount_out for any exact-input quote
    pub exact_input: HashMap<(Address, Address), U256>,
    pub swap_output: U256,
    pub swap_revert: Option<String>,
    pub failing_receipts: HashSet<TxKind>,
    pub ignore_approvals: bool,
    pub calls: usize,
    pub sent: Vec<SentTx>,
    pub kinds: HashMap<H256, TxKind>,
}

/// Models just enough of an ERC-20, QuoterV2 and SwapRouter to drive the checkout.
pub struct MockChain {
    pub state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState {
                block_number: 19_000_000,
                timestamp: NOW,
                swap_output: U256::from(1_000u64),
                ..ChainState::default()
            }),
        })
    }

    pub fn set_allowance(&self, token: &Token, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((token.address, OWNER, ROUTER), amount);
    }

    pub fn allowance(&self, token: &Token) -> U256 {
        self.state
            .lock()
            .unwrap()
            .allowances
            .get(&(token.address, OWNER, ROUTER))
            .copied()
            .unwrap_or_default()
    }

    pub fn set_balance(&self, token: &Token, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert((token.address, OWNER), amount);
    }

    pub fn set_exact_output_quote(&self, token_in: &Token, token_out: &Token, amount_in: U256) {
        self.state
            .lock()
            .unwrap()
            .exact_output
            .insert((token_in.address, token_out.address), amount_in);
    }

    pub fn set_exact_input_quote(&self, token_in: &Token, token_out: &Token, amount_out: U256) {
        self.state
            .lock()
            .unwrap()
            .exact_input
            .insert((token_in.address, token_out.address), amount_out);
    }

    pub fn sent_kinds(&self) -> Vec<TxKind> {
        self.state.lock().unwrap().sent.iter().map(|tx| tx.kind).collect()
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    fn revert(reason: &str) -> SwapdeskError {
        SwapdeskError::RevertError {
            reason: Some(reason.to_string()),
            data: None,
        }
    }

    fn execute(&self, to: Address, data: &[u8]) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;

        let (head, args) = data.split_at(4usize.min(data.len()));
        let uint = |value: U256| -> Result<Bytes> { Ok(Bytes::from(encode(&[AbiToken::Uint(value)]))) };

        if head == selector(ALLOWANCE) {
            let tokens = decode(&[ParamType::Address, ParamType::Address], args).unwrap();
            let owner = tokens[0].clone().into_address().unwrap();
            let spender = tokens[1].clone().into_address().unwrap();
            let value = state.allowances.get(&(to, owner, spender)).copied().unwrap_or_default();
            return uint(value);
        }
        if head == selector(BALANCE_OF) {
            let tokens = decode(&[ParamType::Address], args).unwrap();
            let owner = tokens[0].clone().into_address().unwrap();
            let value = state.balances.get(&(to, owner)).copied().unwrap_or_default();
            return uint(value);
        }
        if head == selector(APPROVE) {
            return Ok(Bytes::from(encode(&[AbiToken::Bool(true)])));
        }
        if to == QUOTER && (head == selector(QUOTE_EXACT_OUTPUT_SINGLE) || head == selector(QUOTE_EXACT_INPUT_SINGLE)) {
            let params = ParamType::Tuple(vec![
                ParamType::Address,
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(24),
                ParamType::Uint(160),
            ]);
            let fields = decode(&[params], args).unwrap()[0].clone().into_tuple().unwrap();
            let key = (
                fields[0].clone().into_address().unwrap(),
                fields[1].clone().into_address().unwrap(),
            );
            let table = if head == selector(QUOTE_EXACT_OUTPUT_SINGLE) {
                &state.exact_output
            } else {
                &state.exact_input
            };
            let amount = *table.get(&key).ok_or_else(|| Self::revert("SPL"))?;
            return Ok(Bytes::from(encode(&[
                AbiToken::Uint(amount),
                AbiToken::Uint(U256::one() << 96),
                AbiToken::Uint(U256::one()),
                AbiToken::Uint(U256::from(80_000u64)),
            ])));
        }
        if to == ROUTER && head == selector(EXACT_INPUT_SINGLE) {
            let params = SwapParams::decode_exact_input_single(data)?;
            if params.deadline < U256::from(state.timestamp) {
                return Err(Self::revert("Transaction too old"));
            }
            let allowance = state
                .allowances
                .get(&(params.token_in, OWNER, ROUTER))
                .copied()
                .unwrap_or_default();
            if allowance < params.amount_in {
                return Err(Self::revert("STF"));
            }
            if let Some(reason) = &state.swap_revert {
                return Err(Self::revert(reason));
            }
            if state.swap_output < params.amount_out_minimum {
                return Err(Self::revert("Too little received"));
            }
            return uint(state.swap_output);
        }
        Err(SwapdeskError::RevertError { reason: None, data: None })
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        OWNER
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().block_number)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        self.execute(to, &data)
    }

    async fn estimate_gas(&self, to: Address, data: Bytes) -> Result<U256> {
        self.execute(to, &data)?;
        Ok(U256::from(120_000u64))
    }

    async fn send_transaction(&self, call: PreparedCall) -> Result<H256> {
        let mut state = self.state.lock().unwrap();
        let hash = H256::from_low_u64_be(state.sent.len() as u64 + 1);

        let kind = if call.data.len() >= 4 && call.data[..4] == selector(APPROVE) {
            TxKind::Approve
        } else if call.to == ROUTER {
            TxKind::Swap
        } else {
            TxKind::Other
        };

        if kind == TxKind::Approve && !state.ignore_approvals {
            let tokens = decode(&[ParamType::Address, ParamType::Uint(256)], &call.data[4..]).unwrap();
            let spender = tokens[0].clone().into_address().unwrap();
            let amount = tokens[1].clone().into_uint().unwrap();
            state.allowances.insert((call.to, OWNER, spender), amount);
        }

        if kind == TxKind::Swap {
            // transferFrom: spend the allowance unless it is infinite, then the balance
            let params = SwapParams::decode_exact_input_single(&call.data)?;
            let allowance_key = (params.token_in, OWNER, ROUTER);
            let allowance = state.allowances.get(&allowance_key).copied().unwrap_or_default();
            if allowance != U256::MAX {
                state.allowances.insert(allowance_key, allowance.saturating_sub(params.amount_in));
            }
            let balance_key = (params.token_in, OWNER);
            let balance = state.balances.get(&balance_key).copied().unwrap_or_default();
            state.balances.insert(balance_key, balance.saturating_sub(params.amount_in));
        }

        state.kinds.insert(hash, kind);
        state.sent.push(SentTx {
            kind,
            to: call.to,
            data: call.data,
            hash,
        });
        Ok(hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TxReceipt> {
        let state = self.state.lock().unwrap();
        let kind = state.kinds.get(&tx_hash).copied().unwrap_or(TxKind::Other);
        Ok(TxReceipt {
            tx_hash,
            block_number: Some(state.block_number + 1),
            gas_used: Some(U256::from(100_000u64)),
            success: !state.failing_receipts.contains(&kind),
        })
    }
}

pub fn config(extra: &[(&str, &str)]) -> Config {
    let quoter = format!("{QUOTER:?}");
    let router = format!("{ROUTER:?}");
    let mut vars: HashMap<String, String> = [
        ("RPC_URL", "http://localhost:8545"),
        ("PRIVATE_KEY", "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"),
        ("QUOTER_ADDRESS", quoter.as_str()),
        ("SWAP_ROUTER_ADDRESS", router.as_str()),
    ]
    .iter()
    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
    .collect();
    for (k, v) in extra {
        vars.insert((*k).to_string(), (*v).to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn service(chain: Arc<MockChain>, extra: &[(&str, &str)]) -> CheckoutService {
    CheckoutService::with_client(
        &config(extra),
        chain,
        TokenRegistry::mainnet().unwrap(),
        Metrics::new().unwrap(),
    )
}

pub fn token(symbol: &str) -> Token {
    TokenRegistry::mainnet().unwrap().get(symbol).unwrap().clone()
}

pub fn whole(amount: u64, token: &Token) -> U256 {
    U256::from(amount) * token.unit().unwrap()
}

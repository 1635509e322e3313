/*
 * ERC-20 allowance and approval management
 */

use ethers::abi::{decode, ParamType, Token as AbiToken};
use ethers::types::{Address, Bytes, H256, U256};
use std::sync::Arc;
use tracing::{info, warn};
use crate::dex::calldata;
use crate::models::{AllowanceOutcome, ApprovalMode, Result, SwapdeskError, Token};
use crate::rpc::ChainClient;

pub const ALLOWANCE: &str = "allowance(address,address)";
pub const APPROVE: &str = "approve(address,uint256)";
pub const BALANCE_OF: &str = "balanceOf(address)";

#[must_use]
pub fn encode_allowance(owner: Address, spender: Address) -> Bytes {
    calldata(ALLOWANCE, &[AbiToken::Address(owner), AbiToken::Address(spender)])
}

#[must_use]
pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    calldata(APPROVE, &[AbiToken::Address(spender), AbiToken::Uint(amount)])
}

#[must_use]
pub fn encode_balance_of(owner: Address) -> Bytes {
    calldata(BALANCE_OF, &[AbiToken::Address(owner)])
}

fn decode_uint(result: &[u8], method: &str) -> Result<U256> {
    decode(&[ParamType::Uint(256)], result)
        .map_err(|e| SwapdeskError::ContractError(format!("Invalid {method} response: {e}")))?
        .into_iter()
        .next()
        .and_then(AbiToken::into_uint)
        .ok_or_else(|| SwapdeskError::ContractError(format!("Invalid {method} response")))
}

/// An approval that has been broadcast but not yet confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingApproval {
    pub tx_hash: H256,
    pub amount: U256,
}

pub struct AllowanceManager {
    client: Arc<dyn ChainClient>,
    mode: ApprovalMode,
}

impl AllowanceManager {
    #[must_use]
    pub fn new(client: Arc<dyn ChainClient>, mode: ApprovalMode) -> Self {
        Self { client, mode }
    }

    pub async fn allowance(&self, token: &Token, owner: Address, spender: Address) -> Result<U256> {
        let result = self
            .client
            .call(token.address, encode_allowance(owner, spender))
            .await?;
        decode_uint(&result, "allowance")
    }

    pub async fn balance_of(&self, token: &Token, owner: Address) -> Result<U256> {
        let result = self.client.call(token.address, encode_balance_of(owner)).await?;
        decode_uint(&result, "balanceOf")
    }

    #[must_use]
    pub fn approval_amount(&self, required: U256) -> U256 {
        match self.mode {
            ApprovalMode::Exact => required,
            ApprovalMode::Max => U256::MAX,
        }
    }

    /// Simulates and submits `approve(spender, amount)` from the signing account.
    pub async fn approve(&self, token: &Token, spender: Address, amount: U256) -> Result<H256> {
        let prepared = self
            .client
            .simulate(token.address, encode_approve(spender, amount))
            .await?;
        let tx_hash = self.client.send_transaction(prepared).await?;
        info!(?tx_hash, "Approval of {} {} for {:?} submitted", amount, token.symbol, spender);
        Ok(tx_hash)
    }

    /// Reads the allowance. `Some` when it already covers `required`; `None` when an
    /// approval is needed, in which case `owner` must be the signing account.
    pub async fn check(
        &self,
        token: &Token,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> Result<Option<AllowanceOutcome>> {
        let current = self.allowance(token, owner, spender).await?;
        if current >= required {
            info!("Allowance of {} {} already covers {}", current, token.symbol, required);
            return Ok(Some(AllowanceOutcome::Sufficient { current }));
        }

        self.ensure_signer(owner)?;
        Ok(None)
    }

    /// Submits the approval for a shortfall, sized by the approval mode.
    pub async fn submit_approval(&self, token: &Token, spender: Address, required: U256) -> Result<PendingApproval> {
        let amount = self.approval_amount(required);
        let tx_hash = self.approve(token, spender, amount).await?;
        Ok(PendingApproval { tx_hash, amount })
    }

    /// Waits for the approval to be mined, then checks it actually moved the allowance.
    pub async fn confirm_approval(
        &self,
        token: &Token,
        owner: Address,
        spender: Address,
        required: U256,
        pending: PendingApproval,
    ) -> Result<AllowanceOutcome> {
        let PendingApproval { tx_hash, amount } = pending;
        let receipt = self.client.wait_for_receipt(tx_hash).await?;
        if !receipt.success {
            return Err(SwapdeskError::TransactionFailed { tx_hash });
        }

        let refreshed = self.allowance(token, owner, spender).await?;
        if refreshed < required {
            warn!(?tx_hash, "Approval mined but allowance is still {}", refreshed);
            return Err(SwapdeskError::InsufficientAllowance {
                token: token.symbol.clone(),
                available: refreshed,
                required,
            });
        }
        Ok(AllowanceOutcome::Approved { tx_hash, amount })
    }

    /// Approves `spender` only when the current allowance is below `required`.
    pub async fn ensure_allowance(
        &self,
        token: &Token,
        owner: Address,
        spender: Address,
        required: U256,
    ) -> Result<AllowanceOutcome> {
        if let Some(outcome) = self.check(token, owner, spender, required).await? {
            return Ok(outcome);
        }
        let pending = self.submit_approval(token, spender, required).await?;
        self.confirm_approval(token, owner, spender, required, pending).await
    }

    /// Approvals can only be signed by the account behind the client.
    pub fn ensure_signer(&self, owner: Address) -> Result<()> {
        let signer = self.client.sender();
        if owner != signer {
            warn!(?owner, ?signer, "Approval requested for a foreign owner");
            return Err(SwapdeskError::InvalidInput(format!(
                "Owner {owner:?} is not the signing account {signer:?}"
            )));
        }
        Ok(())
    }
}

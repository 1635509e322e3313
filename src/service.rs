/*
 * Checkout service that coordinates quoting, approvals and swaps
 */

use chrono::Utc;
use ethers::types::U256;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use crate::{
    config::{Config, PricingConfig},
    dex::{
        erc20::AllowanceManager,
        uniswap_v3::{QuoteClient, SwapExecutor},
        TokenRegistry,
    },
    metrics::Metrics,
    models::{
        CheckoutReceipt, CheckoutRequest, CheckoutStage, ItemPriceReport, Quote,
        QuoteReport, Result, SwapdeskError, Token,
    },
    pricing::PriceDeriver,
    rpc::{ChainClient, RpcClient},
    utils::{format_units, min_amount_out, parse_units, sqrt_price_x96_to_price},
};

pub struct CheckoutService {
    client: Arc<dyn ChainClient>,
    tokens: TokenRegistry,
    quoter: QuoteClient,
    allowances: AllowanceManager,
    executor: SwapExecutor,
    pricing: PricingConfig,
    slippage_bps: u32,
    metrics: Metrics,
    // one signing account, so mutating flows must not interleave
    checkout_lock: Mutex<()>,
}

/// Ordered record of the stages a checkout went through.
struct StageTracker {
    stages: Vec<CheckoutStage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            stages: vec![CheckoutStage::Idle],
        }
    }

    fn enter(&mut self, stage: CheckoutStage) {
        info!("Checkout stage: {}", stage);
        self.stages.push(stage);
    }

    fn current(&self) -> CheckoutStage {
        self.stages.last().copied().unwrap_or(CheckoutStage::Idle)
    }
}

impl CheckoutService {
    pub async fn new(config: Config) -> Result<Self> {
        info!("Initializing Checkout Service");

        let client: Arc<dyn ChainClient> = Arc::new(RpcClient::new(&config.chain).await?);
        info!("Connected to chain {}", config.chain.chain_id);

        let tokens = TokenRegistry::mainnet()?;
        let metrics = Metrics::new()?;

        Ok(Self::with_client(&config, client, tokens, metrics))
    }

    #[must_use]
    pub fn with_client(
        config: &Config,
        client: Arc<dyn ChainClient>,
        tokens: TokenRegistry,
        metrics: Metrics,
    ) -> Self {
        Self {
            quoter: QuoteClient::new(client.clone(), config.contracts.quoter),
            allowances: AllowanceManager::new(client.clone(), config.checkout.approval_mode),
            executor: SwapExecutor::new(
                client.clone(),
                config.contracts.swap_router,
                config.checkout.deadline_secs,
            ),
            client,
            tokens,
            pricing: config.pricing.clone(),
            slippage_bps: config.checkout.slippage_bps,
            metrics,
            checkout_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenRegistry {
        &self.tokens
    }

    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn quote(&self, token_in: &Token, token_out: &Token, amount_out: U256, fee: u32) -> Result<Quote> {
        self.metrics.quotes_total.inc();
        self.quoter.quote(token_in, token_out, amount_out, fee).await
    }

    /// Exact-output quote rendered in whole-token units, with the pool price it leaves behind.
    pub async fn quote_report(
        &self,
        token_in: &Token,
        token_out: &Token,
        amount_out: U256,
        fee: u32,
    ) -> Result<QuoteReport> {
        let quote = self.quote(token_in, token_out, amount_out, fee).await?;

        let (base, quote_token) = if token_in.address < token_out.address {
            (token_in, token_out)
        } else {
            (token_out, token_in)
        };
        let pool_price = sqrt_price_x96_to_price(quote.sqrt_price_x96_after, base.decimals, quote_token.decimals)?;

        Ok(QuoteReport {
            timestamp_utc: Utc::now(),
            token_in: token_in.symbol.clone(),
            token_out: token_out.symbol.clone(),
            fee,
            amount_out: format_units(amount_out, i32::from(token_out.decimals))?,
            amount_in: format_units(quote.amount_in, i32::from(token_in.decimals))?,
            gas_estimate: quote.gas_estimate.to_string(),
            initialized_ticks_crossed: quote.initialized_ticks_crossed,
            pool_price_after: pool_price.to_string(),
            pool_base: base.symbol.clone(),
            pool_quote: quote_token.symbol.clone(),
        })
    }

    /// Prices an item listed in the listing token in the reference and settlement tokens.
    pub async fn item_price(&self, item_price: Option<U256>) -> Result<ItemPriceReport> {
        let listing = self.tokens.get(&self.pricing.listing_token)?;
        let reference = self.tokens.get(&self.pricing.reference_token)?;
        let settlement = self.tokens.get(&self.pricing.settlement_token)?;

        let item_price = match item_price {
            Some(price) => price,
            None => parse_units(&self.pricing.item_price, i32::from(listing.decimals))?,
        };
        let unit = reference.unit()?;

        let (block_number, listing_quote, settlement_quote) = tokio::try_join!(
            self.client.block_number(),
            self.quote(listing, reference, unit, self.pricing.listing_fee),
            self.quote(settlement, reference, unit, self.pricing.settlement_fee)
        )?;
        info!("Quotes taken at block {}", block_number);

        let price = PriceDeriver::new(reference)?.derive(item_price, &listing_quote, &settlement_quote)?;

        let report = ItemPriceReport {
            timestamp_utc: Utc::now(),
            block_number,
            listing_token: listing.symbol.clone(),
            reference_token: reference.symbol.clone(),
            settlement_token: settlement.symbol.clone(),
            reference_in_settlement: format_units(settlement_quote.amount_in, i32::from(settlement.decimals))?,
            reference_in_listing: format_units(listing_quote.amount_in, i32::from(listing.decimals))?,
            item_price_listing: format_units(price.in_listing, i32::from(listing.decimals))?,
            item_price_reference: format_units(price.in_reference, i32::from(reference.decimals))?,
            item_price_settlement: format_units(price.in_settlement, i32::from(settlement.decimals))?,
        };

        info!(
            "Item price: {} {} = {} {} = {} {}",
            report.item_price_listing,
            report.listing_token,
            report.item_price_reference,
            report.reference_token,
            report.item_price_settlement,
            report.settlement_token
        );
        Ok(report)
    }

    /// Runs balance and allowance checks, an approval if needed, then the swap.
    ///
    /// Reports success only once every submitted transaction has a successful receipt.
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        let _guard = self.checkout_lock.lock().await;
        let mut tracker = StageTracker::new();

        match self.run_checkout(&request, &mut tracker).await {
            Ok(receipt) => {
                self.metrics
                    .checkouts_total
                    .with_label_values(&["done", "done"])
                    .inc();
                Ok(receipt)
            }
            Err(e) => {
                let stage = tracker.current();
                tracker.enter(CheckoutStage::Failed);
                error!("Checkout failed while {}: {}", stage, e);
                let stage_label = stage.to_string();
                self.metrics
                    .checkouts_total
                    .with_label_values(&["failed", stage_label.as_str()])
                    .inc();
                Err(SwapdeskError::CheckoutFailed {
                    stage,
                    source: Box::new(e),
                })
            }
        }
    }

    async fn run_checkout(&self, request: &CheckoutRequest, tracker: &mut StageTracker) -> Result<CheckoutReceipt> {
        let CheckoutRequest {
            token_in,
            token_out,
            amount_in,
            fee,
            ..
        } = request;
        let amount_in = *amount_in;

        if amount_in.is_zero() {
            return Err(SwapdeskError::InvalidInput("amount_in must be positive".to_string()));
        }

        let owner = self.client.sender();
        let recipient = request.recipient.unwrap_or(owner);
        let spender = self.executor.router();
        info!(
            "Checkout of {} {} into {} for {:?}",
            amount_in, token_in.symbol, token_out.symbol, recipient
        );

        let amount_out_minimum = match request.amount_out_minimum {
            Some(minimum) => minimum,
            None => {
                tracker.enter(CheckoutStage::Quoting);
                self.metrics.quotes_total.inc();
                let quote = self
                    .quoter
                    .quote_exact_input(token_in, token_out, amount_in, *fee)
                    .await?;
                min_amount_out(quote.amount_out, self.slippage_bps)?
            }
        };
        if amount_out_minimum.is_zero() {
            return Err(SwapdeskError::InvalidInput(
                "amount_out_minimum must be at least 1".to_string(),
            ));
        }

        tracker.enter(CheckoutStage::CheckingBalance);
        let balance = self.allowances.balance_of(token_in, owner).await?;
        if balance < amount_in {
            return Err(SwapdeskError::InsufficientBalance {
                token: token_in.symbol.clone(),
                available: balance,
                required: amount_in,
            });
        }

        tracker.enter(CheckoutStage::CheckingAllowance);
        let allowance = match self.allowances.check(token_in, owner, spender, amount_in).await? {
            Some(outcome) => outcome,
            None => {
                tracker.enter(CheckoutStage::Approving);
                let pending = self.allowances.submit_approval(token_in, spender, amount_in).await?;
                self.metrics.approvals_submitted_total.inc();

                tracker.enter(CheckoutStage::AwaitingApprovalReceipt);
                self.allowances
                    .confirm_approval(token_in, owner, spender, amount_in, pending)
                    .await?
            }
        };

        tracker.enter(CheckoutStage::Swapping);
        let tx_hash = self
            .executor
            .swap(token_in, token_out, amount_in, amount_out_minimum, *fee, recipient)
            .await?;
        self.metrics.swaps_submitted_total.inc();

        tracker.enter(CheckoutStage::AwaitingSwapReceipt);
        let swap = self.client.wait_for_receipt(tx_hash).await?;
        if !swap.success {
            return Err(SwapdeskError::TransactionFailed { tx_hash });
        }

        tracker.enter(CheckoutStage::Done);
        info!("Checkout completed in tx {:?}", tx_hash);

        Ok(CheckoutReceipt {
            timestamp_utc: Utc::now(),
            stages: tracker.stages.clone(),
            allowance,
            amount_in,
            amount_out_minimum,
            swap,
        })
    }
}

/*
 * Cross-rate derivation for listing prices
 */

use ethers::types::{U256, U512};
use crate::models::{ItemPrice, Quote, Result, SwapdeskError, Token};

/// `a * b / denominator` with a 512-bit intermediate product.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(SwapdeskError::CalculationError("Division by zero".to_string()));
    }
    let quotient = a.full_mul(b) / U512::from(denominator);
    U256::try_from(quotient)
        .map_err(|_| SwapdeskError::CalculationError("Price overflows 256 bits".to_string()))
}

/// Converts a price in the listing token into the reference and settlement tokens.
///
/// Both quotes must be exact-output quotes for one whole unit of the reference token:
/// `listing_quote.amount_in` is listing tokens per reference unit and
/// `settlement_quote.amount_in` is settlement tokens per reference unit.
pub struct PriceDeriver {
    unit: U256,
}

impl PriceDeriver {
    pub fn new(reference: &Token) -> Result<Self> {
        Ok(Self {
            unit: reference.unit()?,
        })
    }

    #[must_use]
    pub fn unit(&self) -> U256 {
        self.unit
    }

    pub fn price_in_reference(&self, item_price: U256, listing_quote: &Quote) -> Result<U256> {
        if listing_quote.amount_in.is_zero() {
            return Err(SwapdeskError::CalculationError(
                "Listing quote returned zero input".to_string(),
            ));
        }
        mul_div(item_price, self.unit, listing_quote.amount_in)
    }

    pub fn price_in_settlement(&self, price_in_reference: U256, settlement_quote: &Quote) -> Result<U256> {
        mul_div(price_in_reference, settlement_quote.amount_in, self.unit)
    }

    pub fn derive(&self, item_price: U256, listing_quote: &Quote, settlement_quote: &Quote) -> Result<ItemPrice> {
        let in_reference = self.price_in_reference(item_price, listing_quote)?;
        let in_settlement = self.price_in_settlement(in_reference, settlement_quote)?;
        Ok(ItemPrice {
            in_listing: item_price,
            in_reference,
            in_settlement,
        })
    }
}

//! Stacked price and discount derivation.
//!
//! The final price compounds: the first step seeds the chain with its own
//! price, and every later step with a positive discount multiplies the
//! running price by `1 - discount/100`. The aggregate discount is a plain
//! sum of every step's discount capped at 100. The two numbers are not
//! meant to agree with each other.

use crate::domain::{Deal, Decimal};
use serde::Serialize;

/// Derived figures for an ordered, non-empty selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackQuote {
    pub final_price: Decimal,
    pub aggregate_discount_percent: Decimal,
}

pub fn derive_quote(deals: &[Deal]) -> Option<StackQuote> {
    let (first, rest) = deals.split_first()?;

    let final_price = rest
        .iter()
        .filter(|d| d.discount_percent.is_positive())
        .fold(first.price, |price, d| price * d.discount_percent.discount_factor());

    let summed: Decimal = deals.iter().map(|d| d.discount_percent).sum();
    let aggregate = if summed > Decimal::hundred() {
        Decimal::hundred()
    } else {
        summed
    };

    Some(StackQuote {
        final_price: final_price.round_2dp(),
        aggregate_discount_percent: aggregate.round_2dp(),
    })
}

/// The price and discount fields of a stack being composed.
///
/// Once the price is set by hand, recomputation leaves it alone until
/// [`PriceForm::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceForm {
    price: Option<Decimal>,
    discount_percent: Option<Decimal>,
    price_overridden: bool,
}

impl PriceForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(&self) -> Option<Decimal> {
        self.price
    }

    pub fn discount_percent(&self) -> Option<Decimal> {
        self.discount_percent
    }

    pub fn is_price_overridden(&self) -> bool {
        self.price_overridden
    }

    pub fn recompute(&mut self, deals: &[Deal]) {
        match derive_quote(deals) {
            Some(quote) => {
                self.discount_percent = Some(quote.aggregate_discount_percent);
                if !self.price_overridden {
                    self.price = Some(quote.final_price);
                }
            }
            None => {
                self.discount_percent = None;
                if !self.price_overridden {
                    self.price = None;
                }
            }
        }
    }

    pub fn set_manual_price(&mut self, price: Decimal) {
        self.price = Some(price);
        self.price_overridden = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Seed from an existing stacked deal being edited. Its stored price
    /// counts as a manual override so the saved figure is not replaced.
    pub fn load_existing(&mut self, price: Decimal, discount_percent: Decimal) {
        self.price = Some(price);
        self.discount_percent = Some(discount_percent);
        self.price_overridden = true;
    }
}

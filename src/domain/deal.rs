//! A single offer for a product at a store.

use crate::domain::{DealId, DealType, Decimal, StoreId};
use serde::{Deserialize, Serialize};

/// A normalized deal as produced by the API boundary.
///
/// Every field has already been validated or defaulted: `discount_percent`
/// is within `[0, 100]` and `price` is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: DealId,
    pub store_id: Option<StoreId>,
    pub deal_type: DealType,
    pub price: Decimal,
    pub discount_percent: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_details: Option<String>,
    /// Ordered step ids; only populated for stacked deals.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_ids: Vec<DealId>,
}

impl Deal {
    pub fn new(
        id: DealId,
        store_id: Option<StoreId>,
        deal_type: DealType,
        price: Decimal,
        discount_percent: Decimal,
    ) -> Self {
        Self {
            id,
            store_id,
            deal_type,
            price: if price.is_negative() { Decimal::zero() } else { price },
            discount_percent: discount_percent.clamp_to(Decimal::zero(), Decimal::hundred()),
            coupon_code: None,
            additional_details: None,
            step_ids: Vec::new(),
        }
    }

    pub fn with_coupon_code(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.additional_details = Some(details.into());
        self
    }

    pub fn with_steps(mut self, steps: Vec<DealId>) -> Self {
        self.step_ids = steps;
        self
    }

    pub fn is_direct(&self) -> bool {
        self.deal_type == DealType::Direct
    }
}

//! Validation and payload building for stacked-deal submission.

use crate::domain::{DealId, DealType, Decimal, ProductId};
use serde::Serialize;
use thiserror::Error;

pub const MIN_STACK_STEPS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("A stack needs at least 2 deals (currently {count}).")]
    TooFewSteps { count: usize },
    #[error("Please describe the stacked deal.")]
    BlankDescription,
    #[error("Please enter a price for the stacked deal.")]
    MissingPrice,
}

/// Whether the stack is new or replaces an existing stacked deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    Create,
    Update {
        deal_id: DealId,
        /// Product association record of the stacked deal.
        product_deal_id: i64,
    },
}

/// Everything the user has composed, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDraft {
    pub product_id: ProductId,
    pub deal_ids: Vec<DealId>,
    pub price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub description: String,
}

/// Request body for create (POST) and update (PUT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackPayload {
    pub product_id: ProductId,
    pub price: Decimal,
    pub discount_percent: Decimal,
    pub deal_type_id: i64,
    pub condition_id: i64,
    pub additional_details: String,
    pub deal_ids: Vec<DealId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<DealId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_deal_id: Option<i64>,
}

impl StackDraft {
    pub fn validate(&self) -> Result<(), SubmissionError> {
        if self.deal_ids.len() < MIN_STACK_STEPS {
            return Err(SubmissionError::TooFewSteps {
                count: self.deal_ids.len(),
            });
        }
        if self.description.trim().is_empty() {
            return Err(SubmissionError::BlankDescription);
        }
        if self.price.is_none() {
            return Err(SubmissionError::MissingPrice);
        }
        Ok(())
    }

    pub fn into_payload(
        self,
        condition_id: i64,
        mode: SubmitMode,
    ) -> Result<StackPayload, SubmissionError> {
        self.validate()?;
        let price = self.price.ok_or(SubmissionError::MissingPrice)?;

        let (deal_id, product_deal_id) = match mode {
            SubmitMode::Create => (None, None),
            SubmitMode::Update {
                deal_id,
                product_deal_id,
            } => (Some(deal_id), Some(product_deal_id)),
        };

        Ok(StackPayload {
            product_id: self.product_id,
            price,
            discount_percent: self.discount_percent.unwrap_or_default(),
            deal_type_id: DealType::Stacked.wire_id(),
            condition_id,
            additional_details: self.description.trim().to_string(),
            deal_ids: self.deal_ids,
            deal_id,
            product_deal_id,
        })
    }
}

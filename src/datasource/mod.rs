//! Boundary to the CartSmart REST backend.

use crate::domain::{Deal, DealId, ProductId};
use crate::engine::{CandidateQuery, StackPayload};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod http;
pub mod mock;
pub mod normalize;

pub use http::HttpDealApi;
pub use mock::MockDealApi;

/// Shown when the backend gives no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

/// Deal listing and stacked-deal persistence.
///
/// Implementations return normalized [`Deal`] values; loosely-shaped JSON
/// never leaves this module.
#[async_trait]
pub trait DealApi: Send + Sync + fmt::Debug {
    /// Fetch one page of candidate deals for a product.
    ///
    /// A malformed page comes back as an empty `Vec`, which callers read as
    /// end of data.
    async fn fetch_candidates(
        &self,
        product_id: ProductId,
        query: &CandidateQuery,
    ) -> Result<Vec<Deal>, ApiError>;

    /// Fetch one deal's full detail.
    async fn fetch_deal(&self, deal_id: DealId) -> Result<Deal, ApiError>;

    /// Create a stacked deal.
    async fn create_stack(&self, payload: &StackPayload) -> Result<SubmitReceipt, ApiError>;

    /// Replace an existing stacked deal.
    async fn update_stack(
        &self,
        deal_id: DealId,
        payload: &StackPayload,
    ) -> Result<SubmitReceipt, ApiError>;
}

/// What the backend told us after a successful create/update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub deal_id: Option<DealId>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Connection failure, DNS, TLS, ...
    #[error("Network error: {0}")]
    Network(String),
    /// Non-2xx response. `message` is whatever the server said, possibly empty.
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    /// Response body could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Rate limited")]
    RateLimited,
}

impl ApiError {
    /// Message to surface to the user: the server's own words when it sent
    /// any, otherwise a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { message, .. } if !message.trim().is_empty() => {
                message.trim().to_string()
            }
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Http { status: 404, .. })
    }
}

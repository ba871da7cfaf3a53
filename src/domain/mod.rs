//! Domain types for stacked-deal composition.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Identifiers: DealId, StoreId, ProductId
//! - DealType and the normalized Deal

pub mod deal;
pub mod decimal;
pub mod primitives;

pub use deal::Deal;
pub use decimal::Decimal;
pub use primitives::{DealId, DealType, DealTypeParseError, ProductId, StoreId};

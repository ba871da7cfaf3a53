//! Domain primitives: identifiers and deal types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                $name(id)
            }

            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(
    /// Backend identifier of a single deal (or a stacked deal).
    DealId
);
id_newtype!(
    /// Backend identifier of a store.
    StoreId
);
id_newtype!(
    /// Backend identifier of a product.
    ProductId
);

/// How a deal is redeemed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealType {
    /// Redeemable at the listed price, no activation step.
    Direct,
    /// Requires a code at checkout.
    Coupon,
    /// A composite of other deals.
    Stacked,
    /// Requires activation on a third-party site.
    External,
}

impl DealType {
    /// Types that may appear as a step of a stack.
    pub const STACKABLE: [DealType; 3] = [DealType::Direct, DealType::Coupon, DealType::External];

    /// Numeric id used by the CartSmart backend.
    pub fn wire_id(&self) -> i64 {
        match self {
            DealType::Direct => 1,
            DealType::Coupon => 2,
            DealType::Stacked => 3,
            DealType::External => 4,
        }
    }

    pub fn from_wire_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(DealType::Direct),
            2 => Some(DealType::Coupon),
            3 => Some(DealType::Stacked),
            4 => Some(DealType::External),
            _ => None,
        }
    }

    pub fn is_stackable(&self) -> bool {
        !matches!(self, DealType::Stacked)
    }
}

impl fmt::Display for DealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DealType::Direct => write!(f, "direct"),
            DealType::Coupon => write!(f, "coupon"),
            DealType::Stacked => write!(f, "stacked"),
            DealType::External => write!(f, "external"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deal type: {0}")]
pub struct DealTypeParseError(pub String);

impl FromStr for DealType {
    type Err = DealTypeParseError;

    /// Accepts the names the backend has used over time ("Direct Deal",
    /// "coupon", "EXTERNAL_OFFER", ...) as well as the numeric ids.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return DealType::from_wire_id(id).ok_or_else(|| DealTypeParseError(s.to_string()));
        }

        let normalized: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "direct" | "directdeal" => Ok(DealType::Direct),
            "coupon" | "coupondeal" | "couponcode" => Ok(DealType::Coupon),
            "stacked" | "stackeddeal" | "stack" | "combo" => Ok(DealType::Stacked),
            "external" | "externaloffer" | "externaldeal" => Ok(DealType::External),
            _ => Err(DealTypeParseError(s.to_string())),
        }
    }
}

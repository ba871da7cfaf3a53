pub mod api;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{ApiError, DealApi, HttpDealApi, MockDealApi};
pub use domain::{Deal, DealId, DealType, Decimal, ProductId, StoreId};
pub use engine::{CandidatePager, PriceForm, StackSelection};
pub use error::AppError;
pub use orchestration::{Composer, ComposerError, ComposerSettings, SessionView};

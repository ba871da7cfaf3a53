use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::AppState;
use crate::config::MAX_PAGE_SIZE;
use crate::domain::{DealId, Decimal, ProductId, StoreId};
use crate::engine::CandidateFilter;
use crate::error::AppError;
use crate::orchestration::{SessionView, SubmitOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub product_id: i64,
    pub store_id: Option<i64>,
    #[serde(default)]
    pub exclude_selected: bool,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEditRequest {
    pub product_id: i64,
    pub stack_deal_id: i64,
    pub product_deal_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    pub store_id: Option<i64>,
    #[serde(default)]
    pub exclude_selected: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealRequest {
    pub deal_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    pub price: Value,
}

#[derive(Debug, Deserialize)]
pub struct DescriptionRequest {
    pub description: String,
}

fn filter_from(store_id: Option<i64>, exclude_selected: bool) -> CandidateFilter {
    CandidateFilter {
        store_id: store_id.map(StoreId::new),
        exclude_selected,
    }
}

/// Prices arrive as JSON numbers or numeric strings ("72.50").
fn parse_price(raw: &Value) -> Result<Decimal, AppError> {
    let text = match raw {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Err(AppError::BadRequest("price must be a number".into())),
    };
    Decimal::from_str_canonical(&text)
        .map_err(|_| AppError::BadRequest(format!("Invalid price: {}", text.trim())))
}

pub async fn open_session(
    State(state): State<AppState>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<Json<SessionView>, AppError> {
    if let Some(size) = req.page_size {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(AppError::BadRequest(format!(
                "pageSize must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
    }
    let view = state
        .composer
        .open(
            ProductId::new(req.product_id),
            filter_from(req.store_id, req.exclude_selected),
            req.page_size,
        )
        .await?;
    Ok(Json(view))
}

pub async fn open_edit_session(
    State(state): State<AppState>,
    Json(req): Json<OpenEditRequest>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .composer
        .open_edit(
            ProductId::new(req.product_id),
            DealId::new(req.stack_deal_id),
            req.product_deal_id,
        )
        .await?;
    Ok(Json(view))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.composer.view(id).await?))
}

pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.composer.close(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn load_next_page(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.composer.load_next(id).await?))
}

pub async fn set_filter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<SessionView>, AppError> {
    let filter = filter_from(req.store_id, req.exclude_selected);
    Ok(Json(state.composer.set_filter(id, filter).await?))
}

pub async fn select_first(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DealRequest>,
) -> Result<Json<SessionView>, AppError> {
    let view = state
        .composer
        .select_first(id, DealId::new(req.deal_id))
        .await?;
    Ok(Json(view))
}

pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DealRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        state.composer.toggle(id, DealId::new(req.deal_id)).await?,
    ))
}

pub async fn reorder(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.composer.reorder(id, req.from, req.to).await?))
}

pub async fn clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.composer.clear(id).await?))
}

pub async fn set_price(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PriceRequest>,
) -> Result<Json<SessionView>, AppError> {
    let price = parse_price(&req.price)?;
    Ok(Json(state.composer.set_price(id, price).await?))
}

pub async fn set_description(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DescriptionRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        state.composer.set_description(id, req.description).await?,
    ))
}

pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmitOutcome>, AppError> {
    Ok(Json(state.composer.submit(id).await?))
}

//! In-memory deal API for tests and local runs without a backend.

use super::{ApiError, DealApi, SubmitReceipt};
use crate::domain::{Deal, DealId, ProductId};
use crate::engine::{CandidateQuery, StackPayload};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A submission the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedSubmission {
    Create(StackPayload),
    Update(DealId, StackPayload),
}

/// Mock that pages over a fixed per-product catalog.
///
/// Cloning shares the recorded calls, so a test can keep a handle while the
/// composer owns another.
#[derive(Debug, Clone, Default)]
pub struct MockDealApi {
    catalog: HashMap<ProductId, Vec<Deal>>,
    details: HashMap<DealId, Deal>,
    candidate_error: Option<ApiError>,
    submit_error: Option<ApiError>,
    /// Fail candidate fetches for pages at or after this one.
    fail_from_page: Option<u32>,
    delay: Option<Duration>,
    candidate_calls: Arc<AtomicUsize>,
    next_id: Arc<AtomicI64>,
    submissions: Arc<Mutex<Vec<RecordedSubmission>>>,
}

impl MockDealApi {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicI64::new(1000)),
            ..Default::default()
        }
    }

    /// Add a listed deal for a product. It is also fetchable by id.
    pub fn with_deal(mut self, product_id: ProductId, deal: Deal) -> Self {
        self.details.insert(deal.id, deal.clone());
        self.catalog.entry(product_id).or_default().push(deal);
        self
    }

    pub fn with_deals(self, product_id: ProductId, deals: Vec<Deal>) -> Self {
        deals
            .into_iter()
            .fold(self, |mock, deal| mock.with_deal(product_id, deal))
    }

    /// Add a deal reachable only through `fetch_deal` (e.g. an existing stack).
    pub fn with_detail(mut self, deal: Deal) -> Self {
        self.details.insert(deal.id, deal);
        self
    }

    pub fn with_candidate_error(mut self, err: ApiError) -> Self {
        self.candidate_error = Some(err);
        self
    }

    pub fn with_candidate_error_from_page(mut self, page: u32, err: ApiError) -> Self {
        self.fail_from_page = Some(page);
        self.candidate_error = Some(err);
        self
    }

    pub fn with_submit_error(mut self, err: ApiError) -> Self {
        self.submit_error = Some(err);
        self
    }

    /// Sleep before answering candidate fetches and submissions.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn candidate_calls(&self) -> usize {
        self.candidate_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn record(&self, submission: RecordedSubmission) {
        if let Ok(mut subs) = self.submissions.lock() {
            subs.push(submission);
        }
    }
}

#[async_trait]
impl DealApi for MockDealApi {
    async fn fetch_candidates(
        &self,
        product_id: ProductId,
        query: &CandidateQuery,
    ) -> Result<Vec<Deal>, ApiError> {
        self.candidate_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if let Some(err) = &self.candidate_error {
            if self.fail_from_page.map_or(true, |from| query.page >= from) {
                return Err(err.clone());
            }
        }

        let page = query.page.max(1) as usize;
        let limit = query.limit.max(1) as usize;
        Ok(self
            .catalog
            .get(&product_id)
            .map(|deals| {
                deals
                    .iter()
                    .filter(|d| query.deal_types.contains(&d.deal_type))
                    .filter(|d| query.store_id.map_or(true, |s| d.store_id == Some(s)))
                    .filter(|d| !query.exclude_ids.contains(&d.id))
                    .skip((page - 1) * limit)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_deal(&self, deal_id: DealId) -> Result<Deal, ApiError> {
        self.details.get(&deal_id).cloned().ok_or(ApiError::Http {
            status: 404,
            message: format!("Deal {} not found", deal_id),
        })
    }

    async fn create_stack(&self, payload: &StackPayload) -> Result<SubmitReceipt, ApiError> {
        self.pause().await;
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        self.record(RecordedSubmission::Create(payload.clone()));
        Ok(SubmitReceipt {
            deal_id: Some(DealId::new(self.next_id.fetch_add(1, Ordering::SeqCst))),
            message: Some("Stacked deal created".to_string()),
        })
    }

    async fn update_stack(
        &self,
        deal_id: DealId,
        payload: &StackPayload,
    ) -> Result<SubmitReceipt, ApiError> {
        self.pause().await;
        if let Some(err) = &self.submit_error {
            return Err(err.clone());
        }
        self.record(RecordedSubmission::Update(deal_id, payload.clone()));
        Ok(SubmitReceipt {
            deal_id: Some(deal_id),
            message: Some("Stacked deal updated".to_string()),
        })
    }
}

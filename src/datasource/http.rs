//! CartSmart REST client.

use super::normalize::{extract_error_message, parse_page, parse_receipt, parse_single};
use super::{ApiError, DealApi, SubmitReceipt};
use crate::config::Config;
use crate::domain::{Deal, DealId, ProductId};
use crate::engine::{CandidateQuery, StackPayload};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Deal API over HTTP, forwarding the configured session cookie.
#[derive(Debug, Clone)]
pub struct HttpDealApi {
    client: Client,
    base_url: String,
    session_cookie: Option<String>,
    retry_budget: Duration,
}

impl HttpDealApi {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie: None,
            retry_budget: Duration::from_secs(10),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_base_url.clone())
            .with_session_cookie(config.session_cookie.clone())
            .with_retry_budget(Duration::from_millis(config.retry_max_elapsed_ms))
    }

    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie;
        self
    }

    /// Total time spent retrying transient failures on reads.
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.session_cookie {
            Some(cookie) => builder.header(reqwest::header::COOKIE, cookie),
            None => builder,
        }
    }

    /// GET with exponential backoff on network errors, 429 and 5xx.
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .request(Method::GET, url)
                .query(query)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ApiError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(ApiError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(error_from_response(response).await));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(error_from_response(response).await));
            }

            let text = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(ApiError::Network(e.to_string())))?;
            serde_json::from_str::<Value>(&text)
                .map_err(|e| backoff::Error::permanent(ApiError::Parse(e.to_string())))
        })
        .await
    }

    /// Single-shot write; submissions are not idempotent.
    async fn send_json(
        &self,
        method: Method,
        url: &str,
        payload: &StackPayload,
    ) -> Result<Value, ApiError> {
        let response = self
            .request(method, url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::Http {
        status,
        message: extract_error_message(&body),
    }
}

fn join_ids<T: ToString>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl DealApi for HttpDealApi {
    async fn fetch_candidates(
        &self,
        product_id: ProductId,
        query: &CandidateQuery,
    ) -> Result<Vec<Deal>, ApiError> {
        debug!(
            "Fetching candidates for product={}, page={}, limit={}",
            product_id, query.page, query.limit
        );

        let url = self.url(&format!("/api/products/{}/deals", product_id));
        let type_ids: Vec<i64> = query.deal_types.iter().map(|t| t.wire_id()).collect();
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
            ("dealTypeIds", join_ids(&type_ids)),
        ];
        if let Some(store) = query.store_id {
            params.push(("storeId", store.to_string()));
        }
        if !query.exclude_ids.is_empty() {
            params.push(("excludeIds", join_ids(&query.exclude_ids)));
        }

        match self.get_json(&url, &params).await {
            Ok(body) => Ok(parse_page(&body)),
            Err(ApiError::Parse(e)) => {
                warn!("Candidate page for product {} is not JSON: {}", product_id, e);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch_deal(&self, deal_id: DealId) -> Result<Deal, ApiError> {
        debug!("Fetching deal {}", deal_id);
        let url = self.url(&format!("/api/deals/{}", deal_id));
        let body = self.get_json(&url, &[]).await?;
        parse_single(&body)
    }

    async fn create_stack(&self, payload: &StackPayload) -> Result<SubmitReceipt, ApiError> {
        let url = self.url("/api/deals/stacked");
        let body = self.send_json(Method::POST, &url, payload).await?;
        let receipt = parse_receipt(&body);
        info!(
            "Created stacked deal {:?} for product {} with {} steps",
            receipt.deal_id,
            payload.product_id,
            payload.deal_ids.len()
        );
        Ok(receipt)
    }

    async fn update_stack(
        &self,
        deal_id: DealId,
        payload: &StackPayload,
    ) -> Result<SubmitReceipt, ApiError> {
        let url = self.url(&format!("/api/deals/stacked/{}", deal_id));
        let body = self.send_json(Method::PUT, &url, payload).await?;
        info!("Updated stacked deal {} with {} steps", deal_id, payload.deal_ids.len());
        let mut receipt = parse_receipt(&body);
        receipt.deal_id.get_or_insert(deal_id);
        Ok(receipt)
    }
}

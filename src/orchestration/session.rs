//! One user's in-progress stack: candidates, selection, price form.

use super::composer::ComposerError;
use crate::domain::{Deal, DealId, Decimal, ProductId, StoreId};
use crate::engine::{
    CandidateFilter, CandidatePager, CandidateQuery, PageOutcome, PageTicket, PriceForm,
    StackDraft, StackSelection, SubmitMode, ToggleEffect,
};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug)]
pub struct StackSession {
    id: Uuid,
    product_id: ProductId,
    mode: SubmitMode,
    filter: CandidateFilter,
    pager: CandidatePager,
    selection: StackSelection,
    form: PriceForm,
    description: String,
    submitting: bool,
    closed: bool,
    last_touched: Instant,
}

/// Snapshot returned to callers after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub product_id: ProductId,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editing_deal_id: Option<DealId>,
    pub candidates: Vec<Deal>,
    pub has_more: bool,
    pub loading: bool,
    pub last_error: Option<String>,
    pub selected: Vec<Deal>,
    pub active_store_id: Option<StoreId>,
    pub price: Option<String>,
    pub discount_percent: Option<String>,
    pub price_overridden: bool,
    pub description: String,
    pub can_submit: bool,
}

impl StackSession {
    pub fn new(
        id: Uuid,
        product_id: ProductId,
        mode: SubmitMode,
        page_size: u32,
        filter: CandidateFilter,
    ) -> Self {
        Self {
            id,
            product_id,
            mode,
            filter,
            pager: CandidatePager::new(page_size),
            selection: StackSelection::new(),
            form: PriceForm::new(),
            description: String::new(),
            submitting: false,
            closed: false,
            last_touched: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    pub fn selection(&self) -> &StackSelection {
        &self.selection
    }

    pub fn form(&self) -> &PriceForm {
        &self.form
    }

    pub fn pager(&self) -> &CandidatePager {
        &self.pager
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }

    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_touched.elapsed() >= timeout
    }

    /// A page fetch or submission is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pager.is_loading() || self.submitting
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.pager.reset();
    }

    fn lookup(&self, deal_id: DealId) -> Result<Deal, ComposerError> {
        self.selection
            .get(deal_id)
            .or_else(|| self.pager.get(deal_id))
            .cloned()
            .ok_or(ComposerError::DealNotFound(deal_id))
    }

    pub fn select_first(&mut self, deal_id: DealId) -> Result<(), ComposerError> {
        let deal = self.lookup(deal_id)?;
        self.selection.select_first(deal)?;
        self.form.recompute(self.selection.deals());
        Ok(())
    }

    pub fn toggle(&mut self, deal_id: DealId) -> Result<ToggleEffect, ComposerError> {
        let deal = self.lookup(deal_id)?;
        let effect = self.selection.toggle(deal)?;
        self.form.recompute(self.selection.deals());
        Ok(effect)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), ComposerError> {
        self.selection.reorder(from, to)?;
        self.form.recompute(self.selection.deals());
        Ok(())
    }

    /// Empty the stack and forget any manual price.
    pub fn clear(&mut self) {
        self.selection.clear();
        self.form.reset();
    }

    pub fn set_manual_price(&mut self, price: Decimal) -> Result<(), ComposerError> {
        if price.is_negative() {
            return Err(ComposerError::InvalidPrice(price.to_canonical_string()));
        }
        self.form.set_manual_price(price.round_2dp());
        Ok(())
    }

    pub fn set_description(&mut self, description: String) {
        self.description = description;
    }

    /// Change candidate filters; paging restarts from page 1.
    pub fn set_filter(&mut self, filter: CandidateFilter) {
        self.filter = filter;
        self.pager.reset();
    }

    /// Seed the session from an existing stacked deal and its hydrated
    /// steps. Steps that would break the stack rules are returned.
    pub fn load_existing(
        &mut self,
        stack: &Deal,
        steps: Vec<Deal>,
    ) -> Vec<(DealId, ComposerError)> {
        let mut rejected = Vec::new();
        for step in steps {
            let id = step.id;
            if let Err(e) = self.selection.toggle(step) {
                rejected.push((id, e.into()));
            }
        }
        self.form.load_existing(stack.price, stack.discount_percent);
        self.form.recompute(self.selection.deals());
        self.description = stack.additional_details.clone().unwrap_or_default();
        rejected
    }

    pub fn begin_load(&mut self) -> Option<(PageTicket, CandidateQuery)> {
        let ticket = self.pager.begin_next()?;
        let query = self
            .pager
            .query_for(ticket, &self.filter, &self.selection.ids());
        Some((ticket, query))
    }

    pub fn complete_load(
        &mut self,
        ticket: PageTicket,
        result: Result<Vec<Deal>, String>,
    ) -> PageOutcome {
        self.pager.complete(ticket, result)
    }

    pub fn draft(&self) -> StackDraft {
        StackDraft {
            product_id: self.product_id,
            deal_ids: self.selection.ids(),
            price: self.form.price(),
            discount_percent: self.form.discount_percent(),
            description: self.description.clone(),
        }
    }

    /// Mark a submission as started. Returns false if one already is.
    pub fn begin_submit(&mut self) -> bool {
        if self.submitting {
            return false;
        }
        self.submitting = true;
        true
    }

    pub fn end_submit(&mut self) {
        self.submitting = false;
    }

    pub fn view(&self) -> SessionView {
        let (mode, editing_deal_id) = match self.mode {
            SubmitMode::Create => ("create", None),
            SubmitMode::Update { deal_id, .. } => ("edit", Some(deal_id)),
        };
        SessionView {
            session_id: self.id,
            product_id: self.product_id,
            mode: mode.to_string(),
            editing_deal_id,
            candidates: self.pager.deals().to_vec(),
            has_more: self.pager.has_more(),
            loading: self.pager.is_loading(),
            last_error: self.pager.last_error().map(str::to_string),
            selected: self.selection.deals().to_vec(),
            active_store_id: self.selection.store_lock(),
            price: self.form.price().map(|p| p.to_fixed_2()),
            discount_percent: self.form.discount_percent().map(|d| d.to_fixed_2()),
            price_overridden: self.form.is_price_overridden(),
            description: self.description.clone(),
            can_submit: self.draft().validate().is_ok(),
        }
    }
}

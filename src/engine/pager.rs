//! Page-number paging over candidate deals.
//!
//! The pager is pure state: callers take a [`PageTicket`], perform the fetch
//! however they like, and hand the result back through
//! [`CandidatePager::complete`]. Tickets from a previous generation are
//! discarded, and only one ticket may be outstanding at a time.

use crate::domain::{Deal, DealId, DealType, StoreId};
use std::collections::HashSet;

/// Query for one page of candidate deals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub deal_types: Vec<DealType>,
    pub store_id: Option<StoreId>,
    pub exclude_ids: Vec<DealId>,
}

impl CandidateQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            deal_types: DealType::STACKABLE.to_vec(),
            store_id: None,
            exclude_ids: Vec::new(),
        }
    }

    pub fn with_store(mut self, store_id: Option<StoreId>) -> Self {
        self.store_id = store_id;
        self
    }

    pub fn excluding(mut self, ids: Vec<DealId>) -> Self {
        self.exclude_ids = ids;
        self
    }
}

/// User-facing candidate filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    pub store_id: Option<StoreId>,
    pub exclude_selected: bool,
}

/// Claim on one in-flight page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTicket {
    pub generation: u64,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Page merged; `added` counts deals that were not already listed.
    Merged { added: usize, has_more: bool },
    /// Fetch failed; pagination is now disabled.
    Failed { message: String },
    /// Ticket belonged to an older generation or was not outstanding.
    Stale,
}

#[derive(Debug, Clone)]
pub struct CandidatePager {
    page_size: u32,
    next_page: u32,
    has_more: bool,
    in_flight: Option<PageTicket>,
    generation: u64,
    deals: Vec<Deal>,
    seen: HashSet<DealId>,
    last_error: Option<String>,
}

impl CandidatePager {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            next_page: 1,
            has_more: true,
            in_flight: None,
            generation: 0,
            deals: Vec::new(),
            seen: HashSet::new(),
            last_error: None,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn get(&self, id: DealId) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Start over from page 1. Any outstanding ticket becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.next_page = 1;
        self.has_more = true;
        self.in_flight = None;
        self.deals.clear();
        self.seen.clear();
        self.last_error = None;
    }

    /// Claim the next page. Returns `None` while a fetch is outstanding or
    /// once the end of data has been reached.
    pub fn begin_next(&mut self) -> Option<PageTicket> {
        if self.in_flight.is_some() || !self.has_more {
            return None;
        }
        let ticket = PageTicket {
            generation: self.generation,
            page: self.next_page,
        };
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    pub fn query_for(
        &self,
        ticket: PageTicket,
        filter: &CandidateFilter,
        selected: &[DealId],
    ) -> CandidateQuery {
        let exclude = if filter.exclude_selected {
            selected.to_vec()
        } else {
            Vec::new()
        };
        CandidateQuery::new(ticket.page, self.page_size)
            .with_store(filter.store_id)
            .excluding(exclude)
    }

    pub fn complete(
        &mut self,
        ticket: PageTicket,
        result: Result<Vec<Deal>, String>,
    ) -> PageOutcome {
        if ticket.generation != self.generation || self.in_flight != Some(ticket) {
            return PageOutcome::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(page) => {
                // End of data is judged on what the server returned, before
                // client-side filtering.
                let received = page.len();
                let mut added = 0;
                for deal in page {
                    if !deal.deal_type.is_stackable() {
                        continue;
                    }
                    if self.seen.insert(deal.id) {
                        self.deals.push(deal);
                        added += 1;
                    }
                }
                self.has_more = received >= self.page_size as usize;
                self.next_page += 1;
                self.last_error = None;
                PageOutcome::Merged {
                    added,
                    has_more: self.has_more,
                }
            }
            Err(message) => {
                if ticket.page == 1 {
                    self.deals.clear();
                    self.seen.clear();
                }
                self.has_more = false;
                self.last_error = Some(message.clone());
                PageOutcome::Failed { message }
            }
        }
    }
}

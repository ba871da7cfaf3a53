use super::session::{SessionView, StackSession};
use crate::datasource::{ApiError, DealApi};
use crate::domain::{DealId, DealType, Decimal, ProductId};
use crate::engine::{CandidateFilter, PageOutcome, SelectionError, SubmissionError, SubmitMode};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Defaults applied to new sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposerSettings {
    pub page_size: u32,
    pub condition_id: i64,
    /// Sessions untouched for this long are dropped.
    pub idle_timeout: Duration,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            page_size: 20,
            condition_id: 1,
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
    #[error("Deal {0} is not available in this session")]
    DealNotFound(DealId),
    #[error("Deal {0} is not a stacked deal")]
    NotAStack(DealId),
    #[error("Candidates are already loading")]
    AlreadyLoading,
    #[error("A submission is already in progress")]
    AlreadySubmitting,
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

/// Result of a successful submit. The session is gone at this point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub deal_id: Option<DealId>,
    pub updated: bool,
    pub message: Option<String>,
}

type SharedSession = Arc<Mutex<StackSession>>;
type Registry = Arc<RwLock<HashMap<Uuid, SharedSession>>>;

/// Drives stack sessions against a [`DealApi`].
///
/// A session lock is never held across a network call. Upstream calls run
/// on their own task, so a caller that goes away mid-request never strands
/// the in-flight or submitting flag. Results that come back after the
/// session was reset or closed are dropped.
#[derive(Debug)]
pub struct Composer {
    api: Arc<dyn DealApi>,
    settings: ComposerSettings,
    sessions: Registry,
}

impl Composer {
    pub fn new(api: Arc<dyn DealApi>, settings: ComposerSettings) -> Self {
        Self {
            api,
            settings,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, id: Uuid) -> Result<SharedSession, ComposerError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ComposerError::SessionNotFound(id))
    }

    async fn register(&self, session: StackSession) -> Uuid {
        let id = session.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    /// Lock a live session and mark it as used. A session idle past the
    /// timeout is closed and reported as missing.
    async fn lock_live(
        &self,
        id: Uuid,
    ) -> Result<(SharedSession, OwnedMutexGuard<StackSession>), ComposerError> {
        let shared = self.session(id).await?;
        let mut session = shared.clone().lock_owned().await;
        if session.is_closed() {
            return Err(ComposerError::SessionNotFound(id));
        }
        if !session.is_busy() && session.is_idle(self.settings.idle_timeout) {
            session.close();
            drop(session);
            self.sessions.write().await.remove(&id);
            info!("Expired idle stack session {}", id);
            return Err(ComposerError::SessionNotFound(id));
        }
        session.touch();
        Ok((shared, session))
    }

    /// Apply a synchronous change to one session and return its view.
    async fn mutate<F>(&self, id: Uuid, f: F) -> Result<SessionView, ComposerError>
    where
        F: FnOnce(&mut StackSession) -> Result<(), ComposerError>,
    {
        let (_, mut session) = self.lock_live(id).await?;
        f(&mut *session)?;
        Ok(session.view())
    }

    /// Close and drop every idle session that is not mid-request.
    pub async fn evict_idle(&self) -> usize {
        let entries: Vec<(Uuid, SharedSession)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, shared)| (*id, shared.clone()))
            .collect();

        let mut evicted = 0;
        for (id, shared) in entries {
            // A locked session is in use right now.
            let Ok(mut session) = shared.try_lock() else {
                continue;
            };
            if session.is_busy() || !session.is_idle(self.settings.idle_timeout) {
                continue;
            }
            session.close();
            drop(session);
            self.sessions.write().await.remove(&id);
            evicted += 1;
        }
        if evicted > 0 {
            info!("Evicted {} idle stack sessions", evicted);
        }
        evicted
    }

    /// Run [`Composer::evict_idle`] every `every` until the composer is
    /// dropped.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let composer = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let Some(composer) = composer.upgrade() else {
                    break;
                };
                composer.evict_idle().await;
            }
        })
    }

    /// Open a session for a new stack and load the first candidate page.
    pub async fn open(
        &self,
        product_id: ProductId,
        filter: CandidateFilter,
        page_size: Option<u32>,
    ) -> Result<SessionView, ComposerError> {
        let page_size = page_size.unwrap_or(self.settings.page_size);
        let session = StackSession::new(
            Uuid::new_v4(),
            product_id,
            SubmitMode::Create,
            page_size,
            filter,
        );
        let id = self.register(session).await;
        info!("Opened stack session {} for product {}", id, product_id);
        self.load_next(id).await
    }

    /// Open a session editing an existing stacked deal. Steps are hydrated
    /// from the backend in their saved order.
    pub async fn open_edit(
        &self,
        product_id: ProductId,
        stack_deal_id: DealId,
        product_deal_id: i64,
    ) -> Result<SessionView, ComposerError> {
        let stack = self.api.fetch_deal(stack_deal_id).await?;
        if stack.deal_type != DealType::Stacked {
            return Err(ComposerError::NotAStack(stack_deal_id));
        }

        let steps = try_join_all(stack.step_ids.iter().map(|id| self.api.fetch_deal(*id))).await?;

        let mut session = StackSession::new(
            Uuid::new_v4(),
            product_id,
            SubmitMode::Update {
                deal_id: stack_deal_id,
                product_deal_id,
            },
            self.settings.page_size,
            CandidateFilter::default(),
        );
        for (deal_id, err) in session.load_existing(&stack, steps) {
            warn!(
                "Dropping step {} of stacked deal {}: {}",
                deal_id, stack_deal_id, err
            );
        }

        let id = self.register(session).await;
        info!(
            "Opened edit session {} for stacked deal {}",
            id, stack_deal_id
        );
        self.load_next(id).await
    }

    pub async fn view(&self, id: Uuid) -> Result<SessionView, ComposerError> {
        self.mutate(id, |_| Ok(())).await
    }

    /// Cancel: the session disappears and any in-flight result is dropped.
    pub async fn close(&self, id: Uuid) -> Result<(), ComposerError> {
        let shared = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(ComposerError::SessionNotFound(id))?;
        shared.lock().await.close();
        info!("Closed stack session {}", id);
        Ok(())
    }

    /// Load the next candidate page.
    ///
    /// Returns the current view unchanged once the end of data is reached,
    /// and `AlreadyLoading` while another page is outstanding. A fetch
    /// failure is recorded on the session rather than returned.
    pub async fn load_next(&self, id: Uuid) -> Result<SessionView, ComposerError> {
        let (shared, mut session) = self.lock_live(id).await?;
        if session.pager().is_loading() {
            return Err(ComposerError::AlreadyLoading);
        }
        let Some((ticket, query)) = session.begin_load() else {
            return Ok(session.view());
        };
        let product_id = session.product_id();
        drop(session);

        let api = self.api.clone();
        let task = tokio::spawn(async move {
            let result = api
                .fetch_candidates(product_id, &query)
                .await
                .map_err(|e| {
                    warn!("Candidate fetch for session {} failed: {}", id, e);
                    e.user_message()
                });

            let mut session = shared.lock().await;
            if session.is_closed() {
                debug!("Discarding page {} for closed session {}", ticket.page, id);
                return Err(ComposerError::SessionNotFound(id));
            }
            match session.complete_load(ticket, result) {
                PageOutcome::Stale => {
                    debug!(
                        "Discarding stale page {} (generation {}) for session {}",
                        ticket.page, ticket.generation, id
                    );
                }
                PageOutcome::Merged { added, has_more } => {
                    debug!(
                        "Session {} merged page {}: {} new, has_more={}",
                        id, ticket.page, added, has_more
                    );
                }
                PageOutcome::Failed { .. } => {}
            }
            Ok(session.view())
        });

        task.await
            .map_err(|e| ComposerError::TaskFailed(e.to_string()))?
    }

    /// Replace the candidate filters and reload from page 1.
    pub async fn set_filter(
        &self,
        id: Uuid,
        filter: CandidateFilter,
    ) -> Result<SessionView, ComposerError> {
        self.mutate(id, |s| {
            s.set_filter(filter);
            Ok(())
        })
        .await?;
        self.load_next(id).await
    }

    pub async fn select_first(
        &self,
        id: Uuid,
        deal_id: DealId,
    ) -> Result<SessionView, ComposerError> {
        self.mutate(id, |s| s.select_first(deal_id)).await
    }

    pub async fn toggle(&self, id: Uuid, deal_id: DealId) -> Result<SessionView, ComposerError> {
        self.mutate(id, |s| s.toggle(deal_id).map(|_| ())).await
    }

    pub async fn reorder(
        &self,
        id: Uuid,
        from: usize,
        to: usize,
    ) -> Result<SessionView, ComposerError> {
        self.mutate(id, |s| s.reorder(from, to)).await
    }

    pub async fn clear(&self, id: Uuid) -> Result<SessionView, ComposerError> {
        self.mutate(id, |s| {
            s.clear();
            Ok(())
        })
        .await
    }

    pub async fn set_price(&self, id: Uuid, price: Decimal) -> Result<SessionView, ComposerError> {
        self.mutate(id, |s| s.set_manual_price(price)).await
    }

    pub async fn set_description(
        &self,
        id: Uuid,
        description: String,
    ) -> Result<SessionView, ComposerError> {
        self.mutate(id, |s| {
            s.set_description(description);
            Ok(())
        })
        .await
    }

    /// Validate and send the stack. On success the session is closed; on
    /// any failure it is left as it was so the user can retry.
    pub async fn submit(&self, id: Uuid) -> Result<SubmitOutcome, ComposerError> {
        let (shared, mut session) = self.lock_live(id).await?;
        let mode = session.mode();
        let payload = session
            .draft()
            .into_payload(self.settings.condition_id, mode)?;
        if !session.begin_submit() {
            return Err(ComposerError::AlreadySubmitting);
        }
        drop(session);

        let api = self.api.clone();
        let sessions = self.sessions.clone();
        let task = tokio::spawn(async move {
            let result = match mode {
                SubmitMode::Create => api.create_stack(&payload).await,
                SubmitMode::Update { deal_id, .. } => api.update_stack(deal_id, &payload).await,
            };

            shared.lock().await.end_submit();
            let receipt = match result {
                Ok(receipt) => receipt,
                Err(e) => {
                    warn!("Submitting session {} failed: {}", id, e);
                    return Err(ComposerError::from(e));
                }
            };

            let removed = sessions.write().await.remove(&id);
            if let Some(removed) = removed {
                removed.lock().await.close();
            }
            info!(
                "Session {} submitted stacked deal {:?}",
                id, receipt.deal_id
            );

            Ok(SubmitOutcome {
                deal_id: receipt.deal_id,
                updated: matches!(mode, SubmitMode::Update { .. }),
                message: receipt.message,
            })
        });

        task.await
            .map_err(|e| ComposerError::TaskFailed(e.to_string()))?
    }
}

//! Deferred action manager for the follow-up queue.
//!
//! Status changes are staged, not sent: triggering "done" or "forward"
//! hides the affected leads at once, persists the staged action, and
//! starts an undo countdown. When the window elapses (or the agent
//! commits early) the change goes to the server; until then a single
//! `undo()` restores everything without a network call. The staged
//! record survives restarts: reopening resumes the remaining window,
//! or commits an action whose window elapsed while the client was
//! closed.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::{JoinHandle, JoinSet};

use crate::api::{ApiError, LeadApi};
use crate::config::Config;
use crate::notify::{Notice, NoticeSink};
use crate::store::{PendingStore, StoreError};
use crate::types::{ActionKind, Lead, LeadStatus, PendingAction};

/// Default grace period before a staged action commits.
const UNDO_WINDOW_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("No leads given for the action")]
    NoTargets,

    #[error("Store: {0}")]
    Store(#[from] StoreError),

    #[error("API: {0}")]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone)]
pub struct QueueSettings {
    /// How long the agent has to change their mind.
    pub undo_window: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            undo_window: Duration::from_secs(UNDO_WINDOW_SECS),
        }
    }
}

impl QueueSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            undo_window: config.undo_window(),
        }
    }
}

#[derive(Default)]
struct QueueState {
    leads: Vec<Lead>,
    pending: Option<PendingAction>,
    selected: Vec<String>,
    countdown: Option<JoinHandle<()>>,
}

/// The follow-up queue: the agent's pending leads plus at most one
/// staged, undoable status change.
pub struct FollowUpQueue {
    api: Arc<dyn LeadApi>,
    store: PendingStore,
    sink: Arc<dyn NoticeSink>,
    settings: QueueSettings,
    state: Mutex<QueueState>,
    /// Serializes every state transition so expiry, manual commit, undo
    /// and re-trigger resolve to exactly one commit per staged action.
    /// Held across the commit's HTTP calls; no two commits overlap.
    gate: AsyncMutex<()>,
    /// Handle the countdown task uses to reach back without keeping
    /// the queue alive.
    weak: Weak<Self>,
}

impl FollowUpQueue {
    /// Fetch the agent's pending leads and recover any staged action
    /// left behind by a previous session.
    ///
    /// An unreachable server surfaces as a notice and an empty list,
    /// never as a failure to open. A stored action whose window has
    /// already elapsed is committed before this returns.
    pub async fn open(
        api: Arc<dyn LeadApi>,
        store: PendingStore,
        sink: Arc<dyn NoticeSink>,
        settings: QueueSettings,
    ) -> Arc<Self> {
        let queue = Arc::new_cyclic(|weak| Self {
            api,
            store,
            sink,
            settings,
            state: Mutex::new(QueueState::default()),
            gate: AsyncMutex::new(()),
            weak: weak.clone(),
        });

        match queue.api.fetch_my_pending().await {
            Ok(leads) => {
                log::info!("FollowUpQueue: loaded {} pending lead(s)", leads.len());
                if let Ok(mut state) = queue.state.lock() {
                    state.leads = leads;
                }
            }
            Err(e) => {
                log::warn!("FollowUpQueue: initial fetch failed: {}", e);
                queue.sink.notice(Notice::error(format!(
                    "Could not load pending leads: {}",
                    e
                )));
            }
        }

        queue.recover_staged().await;
        queue
    }

    /// Stage a status change for the given leads.
    ///
    /// The leads disappear from the visible list immediately; nothing is
    /// sent to the server until the undo window elapses. If another
    /// action is already staged it is committed first, so two pending
    /// windows never overlap. Clears the selection set.
    pub async fn trigger(&self, targets: Vec<String>, kind: ActionKind) -> Result<(), QueueError> {
        if targets.is_empty() {
            return Err(QueueError::NoTargets);
        }
        let _gate = self.gate.lock().await;

        self.abort_countdown();
        if let Some(prior) = self.take_pending() {
            log::info!(
                "FollowUpQueue: committing prior {} action before staging a new one",
                prior.kind.as_str()
            );
            self.execute_commit(prior).await;
        }

        let action = PendingAction::new(targets, kind);
        let count = action.ids.len();
        self.store.save(&action)?;

        if let Ok(mut state) = self.state.lock() {
            state.pending = Some(action);
            state.selected.clear();
        }
        log::info!(
            "FollowUpQueue: staged {} for {} lead(s), undo within {:?}",
            kind.as_str(),
            count,
            self.settings.undo_window
        );
        self.start_countdown(self.settings.undo_window);
        Ok(())
    }

    /// Stage a status change for one lead.
    pub async fn trigger_one(
        &self,
        id: impl Into<String>,
        kind: ActionKind,
    ) -> Result<(), QueueError> {
        self.trigger(vec![id.into()], kind).await
    }

    /// Stage a status change for the current selection set.
    pub async fn trigger_selected(&self, kind: ActionKind) -> Result<(), QueueError> {
        let targets = self.selected_ids();
        self.trigger(targets, kind).await
    }

    /// Reverse the staged action: the leads return to the visible list
    /// with their status untouched and no request is made. Returns
    /// whether anything was staged.
    pub async fn undo(&self) -> Result<bool, QueueError> {
        let _gate = self.gate.lock().await;
        let staged = self
            .state
            .lock()
            .map(|s| s.pending.is_some())
            .unwrap_or(false);
        if !staged {
            return Ok(false);
        }

        // Slot first: if the clear fails the action stays staged and the
        // countdown keeps running, so nothing is half-undone.
        self.store.clear()?;
        self.abort_countdown();
        if let Ok(mut state) = self.state.lock() {
            if let Some(action) = state.pending.take() {
                log::info!(
                    "FollowUpQueue: undid {} action, {} lead(s) restored",
                    action.kind.as_str(),
                    action.ids.len()
                );
            }
        }
        Ok(true)
    }

    /// Commit the staged action now instead of waiting out the window.
    /// Returns whether anything was staged. Commit failures surface as
    /// notices, same as an expiry-driven commit.
    pub async fn commit_now(&self) -> bool {
        self.commit_staged("committed early by the agent").await
    }

    /// Replace the in-memory list with the server's. Leads covered by a
    /// still-staged action stay hidden. Returns how many leads the
    /// server reported.
    pub async fn refresh(&self) -> Result<usize, QueueError> {
        let _gate = self.gate.lock().await;
        self.refresh_inner().await
    }

    /// Leads not covered by the staged action, in server order.
    pub fn visible_leads(&self) -> Vec<Lead> {
        self.visible_leads_matching("")
    }

    /// Visible leads whose payload or source file matches `term`,
    /// case-insensitively. An empty term matches everything.
    pub fn visible_leads_matching(&self, term: &str) -> Vec<Lead> {
        match self.state.lock() {
            Ok(state) => state
                .leads
                .iter()
                .filter(|l| state.pending.as_ref().map_or(true, |p| !p.covers(&l.id)))
                .filter(|l| l.matches(term))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// The staged action, if one exists.
    pub fn pending_action(&self) -> Option<PendingAction> {
        self.state.lock().ok()?.pending.clone()
    }

    /// Time left to undo the staged action, `None` when nothing is
    /// staged or the window has already elapsed.
    pub fn undo_remaining(&self) -> Option<Duration> {
        let state = self.state.lock().ok()?;
        state.pending.as_ref()?.remaining(self.settings.undo_window)
    }

    /// Toggle a lead in the selection set; returns whether it is now
    /// selected.
    pub fn toggle_selected(&self, id: &str) -> bool {
        match self.state.lock() {
            Ok(mut state) => {
                if let Some(pos) = state.selected.iter().position(|s| s == id) {
                    state.selected.remove(pos);
                    false
                } else {
                    state.selected.push(id.to_string());
                    true
                }
            }
            Err(_) => false,
        }
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.selected.clone())
            .unwrap_or_default()
    }

    pub fn clear_selection(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.selected.clear();
        }
    }

    // ------------------------------------------------------------------
    // Internals. Everything that moves the staged action in or out of
    // the slot runs under the gate.
    // ------------------------------------------------------------------

    async fn recover_staged(&self) {
        let recovered = match self.store.load() {
            Ok(Some(action)) => action,
            Ok(None) => return,
            Err(e) => {
                log::warn!("FollowUpQueue: stored action unreadable: {}", e);
                self.sink.notice(Notice::error(
                    "A saved follow-up action could not be read and was discarded",
                ));
                if let Err(e) = self.store.clear() {
                    log::warn!("FollowUpQueue: failed to discard unreadable action: {}", e);
                }
                return;
            }
        };

        match recovered.remaining(self.settings.undo_window) {
            Some(remaining) => {
                let _gate = self.gate.lock().await;
                log::info!(
                    "FollowUpQueue: resumed {} action for {} lead(s), {:?} left to undo",
                    recovered.kind.as_str(),
                    recovered.ids.len(),
                    remaining
                );
                if let Ok(mut state) = self.state.lock() {
                    state.pending = Some(recovered);
                }
                self.start_countdown(remaining);
            }
            None => {
                self.sink.notice(Notice::info(format!(
                    "Your earlier {} action was committed; its undo window ended while the dashboard was closed",
                    recovered.kind.as_str()
                )));
                if let Ok(mut state) = self.state.lock() {
                    state.pending = Some(recovered);
                }
                self.commit_staged("stored grace period already elapsed")
                    .await;
            }
        }
    }

    /// Gate-taking commit path for every caller except the countdown
    /// task itself.
    async fn commit_staged(&self, reason: &str) -> bool {
        let _gate = self.gate.lock().await;
        self.abort_countdown();
        let Some(action) = self.take_pending() else {
            return false;
        };
        log::info!(
            "FollowUpQueue: committing {} action for {} lead(s) ({})",
            action.kind.as_str(),
            action.ids.len(),
            reason
        );
        self.execute_commit(action).await;
        true
    }

    /// Commit path for the countdown task. A task must not abort
    /// itself mid-commit, so this drops the stored handle instead of
    /// aborting it; the task is finished once this returns.
    async fn expire_commit(&self) {
        let _gate = self.gate.lock().await;
        if let Ok(mut state) = self.state.lock() {
            state.countdown = None;
        }
        let Some(action) = self.take_pending() else {
            return;
        };
        log::info!(
            "FollowUpQueue: undo window elapsed, committing {} action for {} lead(s)",
            action.kind.as_str(),
            action.ids.len()
        );
        self.execute_commit(action).await;
    }

    /// Send the staged change to the server. Runs with the gate held.
    ///
    /// The affected leads never reappear from this path and the slot is
    /// cleared on success and failure alike. A failed commit is not
    /// retried; the server's list is re-fetched once instead, so the
    /// visible state converges to whatever the server accepted.
    async fn execute_commit(&self, action: PendingAction) {
        let outcome = match action.kind {
            ActionKind::Done => self.commit_done(&action).await,
            ActionKind::Forward => self.commit_forward(&action).await,
        };

        if let Ok(mut state) = self.state.lock() {
            state.leads.retain(|l| !action.covers(&l.id));
        }
        if let Err(e) = self.store.clear() {
            log::warn!("FollowUpQueue: failed to clear stored action: {}", e);
        }

        if let Err(message) = outcome {
            self.sink.notice(Notice::error(message));
            match self.refresh_inner().await {
                Ok(n) => log::info!(
                    "FollowUpQueue: reconciled with server, {} lead(s) pending",
                    n
                ),
                Err(e) => log::warn!("FollowUpQueue: reconcile fetch failed: {}", e),
            }
        }
    }

    /// One status update per lead, in parallel; settles when all have.
    /// Partial failures are independent, nothing is rolled back.
    async fn commit_done(&self, action: &PendingAction) -> Result<(), String> {
        let mut tasks = JoinSet::new();
        for id in action.ids.iter().cloned() {
            let api = Arc::clone(&self.api);
            tasks.spawn(async move {
                let result = api.update_status(&id, LeadStatus::Done).await;
                (id, result)
            });
        }

        let total = action.ids.len();
        let mut failed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => log::debug!("FollowUpQueue: marked {} done", id),
                Ok((id, Err(e))) => {
                    failed += 1;
                    log::warn!("FollowUpQueue: marking {} done failed: {}", id, e);
                }
                Err(e) => {
                    failed += 1;
                    log::warn!("FollowUpQueue: status update task failed: {}", e);
                }
            }
        }

        if failed > 0 {
            Err(format!(
                "{} of {} follow-up(s) could not be marked done",
                failed, total
            ))
        } else {
            log::info!("FollowUpQueue: marked {} lead(s) done", total);
            Ok(())
        }
    }

    /// Single batched request carrying every affected id.
    async fn commit_forward(&self, action: &PendingAction) -> Result<(), String> {
        match self.api.forward_to_admin(&action.ids).await {
            Ok(()) => {
                log::info!(
                    "FollowUpQueue: forwarded {} lead(s) to the archive",
                    action.ids.len()
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("FollowUpQueue: forward failed: {}", e);
                Err(format!(
                    "Forwarding {} lead(s) failed: {}",
                    action.ids.len(),
                    e
                ))
            }
        }
    }

    async fn refresh_inner(&self) -> Result<usize, QueueError> {
        let leads = self.api.fetch_my_pending().await?;
        let count = leads.len();
        if let Ok(mut state) = self.state.lock() {
            state.leads = leads;
        }
        log::debug!("FollowUpQueue: refreshed, {} lead(s) pending", count);
        Ok(count)
    }

    /// The countdown owns nothing but a weak reference back here; it is
    /// spawned with the gate held by the caller.
    fn start_countdown(&self, delay: Duration) {
        let weak = self.weak.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(queue) = weak.upgrade() else {
                return;
            };
            queue.expire_commit().await;
        });
        if let Ok(mut state) = self.state.lock() {
            if let Some(old) = state.countdown.replace(handle) {
                old.abort();
            }
        }
    }

    /// Only call with the gate held.
    fn abort_countdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(handle) = state.countdown.take() {
                handle.abort();
            }
        }
    }

    /// Only call with the gate held.
    fn take_pending(&self) -> Option<PendingAction> {
        self.state.lock().ok().and_then(|mut s| s.pending.take())
    }
}

impl Drop for FollowUpQueue {
    /// An uncommitted action stays in the slot on purpose: the next
    /// `open` recovers it. Only the timer dies with the queue.
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(handle) = state.countdown.take() {
                handle.abort();
            }
        }
    }
}

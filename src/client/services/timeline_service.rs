//! Conversation timeline of one match: loading, merging, and the actions a
//! participant can take from the conversation view.
//!
//! Every mutation follows the same two steps: submit it, then on success
//! invalidate the view and reload it from the server. Loads are tagged with
//! a generation number so that only the most recent one reaches the view.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures_util::future::join3;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, Mutex};

use crate::client::error::TimelineError;
use crate::client::models::app_state::ConversationState;
use crate::client::models::notices::Notice;
use crate::client::models::timeline::{merge_timeline, TimelineEntry};
use crate::client::services::api::MatchApi;
use crate::common::models::{
    CurrentUser, Id, MatchSummary, Message, NewMessage, NewVisit, Role, VisitDecision, VisitProposal, VisitStatus,
};

/// Proposals dated this far in the past still count as "now".
const PRESENT_TOLERANCE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Committed { entries: usize },
    /// A newer load, or a switch to another match, started meanwhile; or
    /// the match was not the open one to begin with.
    Superseded,
}

/// Handle on the conversation view of one match at a time.
///
/// Cloning is cheap and every clone drives the same view, which is how the
/// poller shares it.
pub struct TimelineService<A> {
    api: Arc<A>,
    state: Arc<Mutex<ConversationState>>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl<A> Clone for TimelineService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            state: Arc::clone(&self.state),
            notices: self.notices.clone(),
        }
    }
}

impl<A: MatchApi> TimelineService<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(ConversationState::default())),
            notices: None,
        }
    }

    /// Route user-facing notifications to `tx`.
    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<Notice>) -> Self {
        self.notices = Some(tx);
        self
    }

    fn notify(&self, notice: Notice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }

    fn report(&self, err: &TimelineError) {
        error!("[TIMELINE] {:#}", err);
        if let Some(notice) = err.notice() {
            self.notify(notice);
        }
    }

    /// Show `match_id` from now on. Any load still running for the previous
    /// match is discarded when it completes.
    pub async fn open_match(&self, match_id: Id) {
        let mut st = self.state.lock().await;
        if st.is_active(&match_id) {
            return;
        }
        info!("[TIMELINE] opening match {}", match_id);
        st.open(match_id);
    }

    pub async fn active_match(&self) -> Option<Id> {
        self.state.lock().await.match_id.clone()
    }

    /// Current timeline, in-flight sends included.
    pub async fn view(&self) -> Vec<TimelineEntry> {
        self.state.lock().await.view()
    }

    pub async fn match_meta(&self) -> Option<MatchSummary> {
        self.state.lock().await.match_meta.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.lock().await.loaded
    }

    /// The other participant of the open match.
    pub async fn counterpart(&self, user: &CurrentUser) -> Option<Id> {
        let st = self.state.lock().await;
        st.match_meta.as_ref().and_then(|m| m.counterpart_of(&user.id)).cloned()
    }

    pub async fn draft(&self) -> String {
        self.state.lock().await.draft.clone()
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        self.state.lock().await.draft = text.into();
    }

    /// Fetch messages, visits and the match record concurrently and replace
    /// the timeline with their merge.
    ///
    /// A failing match record only loses display metadata. A failing message
    /// or visit list aborts the load and leaves the previous timeline in place.
    /// Loading never switches the view; a match that is not open is skipped.
    pub async fn load_timeline(&self, match_id: &Id) -> Result<LoadOutcome, TimelineError> {
        let Some(generation) = self.state.lock().await.begin_load(match_id) else {
            debug!("[TIMELINE] match {} is not open, skipping load", match_id);
            return Ok(LoadOutcome::Superseded);
        };
        debug!("[TIMELINE] load #{} for match {}", generation, match_id);

        let (messages, visits, meta) = join3(
            self.api.list_messages(match_id),
            self.api.list_visits(match_id),
            self.api.get_match(match_id),
        )
        .await;

        let meta = match meta {
            Ok(meta) => Some(meta),
            Err(source) => {
                let err = TimelineError::MatchMetadataUnavailable { match_id: match_id.clone(), source };
                warn!("[TIMELINE] {:#}", err);
                None
            }
        };

        let (messages, visits) = match (messages, visits) {
            (Ok(messages), Ok(visits)) => (messages, visits),
            (Err(source), _) | (_, Err(source)) => {
                let err = TimelineError::LoadFailed { match_id: match_id.clone(), source };
                warn!("[TIMELINE] {:#}", err);
                return Err(err);
            }
        };

        let entries = merge_timeline(messages, visits);
        let count = entries.len();
        let mut st = self.state.lock().await;
        if st.commit(generation, entries, meta) {
            debug!("[TIMELINE] load #{} committed {} entries", generation, count);
            Ok(LoadOutcome::Committed { entries: count })
        } else {
            debug!("[TIMELINE] load #{} superseded by #{}, discarded", generation, st.generation);
            Ok(LoadOutcome::Superseded)
        }
    }

    /// Reload the open match.
    pub async fn refresh(&self) -> Result<LoadOutcome, TimelineError> {
        let match_id = self.active_match().await.ok_or(TimelineError::NoActiveMatch)?;
        self.load_timeline(&match_id).await
    }

    // The mutation already succeeded; a failing reload is only logged. A
    // match the user has left meanwhile is not reloaded.
    async fn reload_after(&self, match_id: &Id) {
        if let Err(e) = self.load_timeline(match_id).await {
            warn!("[TIMELINE] reload after update failed: {:#}", e);
        }
    }

    /// Send `text` to the match. Blank text is dropped without any request.
    ///
    /// A provisional entry is visible in [`view`](Self::view) while the
    /// request runs. On failure it disappears again and the timeline is left
    /// as it was.
    pub async fn send_message(&self, match_id: &Id, sender_id: &Id, text: &str) -> Result<Message, TimelineError> {
        let content = text.trim();
        if content.is_empty() {
            debug!("[TIMELINE] ignoring empty message");
            return Err(TimelineError::ValidationFailed("message text is empty"));
        }

        let provisional = Message::provisional(match_id.clone(), sender_id.clone(), content.to_string());
        let temp_id = provisional.id.clone();
        {
            let mut st = self.state.lock().await;
            if st.is_active(match_id) {
                st.push_provisional(provisional);
            }
        }

        let result = self
            .api
            .send_message(NewMessage { match_id: match_id.clone(), content: content.to_string() })
            .await;

        match result {
            Ok(sent) => {
                self.state.lock().await.confirm_provisional(&temp_id, sent.clone());
                debug!("[TIMELINE] message {} sent to match {}", sent.id, match_id);
                self.reload_after(match_id).await;
                Ok(sent)
            }
            Err(source) => {
                self.state.lock().await.drop_provisional(&temp_id);
                let err = TimelineError::SendFailed { match_id: match_id.clone(), source };
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Send the composer text as `user`. The draft is cleared only once the
    /// server accepted the message, and only if it was not edited meanwhile.
    pub async fn send_draft(&self, user: &CurrentUser) -> Result<Message, TimelineError> {
        let (match_id, text) = {
            let st = self.state.lock().await;
            let match_id = st.match_id.clone().ok_or(TimelineError::NoActiveMatch)?;
            (match_id, st.draft.clone())
        };
        let sent = self.send_message(&match_id, &user.id, &text).await?;
        let mut st = self.state.lock().await;
        if st.is_active(&match_id) && st.draft == text {
            st.draft.clear();
        }
        Ok(sent)
    }

    /// Students propose in their own name; for anyone else the proposer is
    /// the match's student.
    async fn resolve_proposer(&self, user: &CurrentUser, match_id: &Id) -> Id {
        if user.role == Role::Student {
            return user.id.clone();
        }
        let st = self.state.lock().await;
        match st.match_meta.as_ref().filter(|m| m.id == *match_id) {
            Some(meta) => meta.student_id.clone(),
            None => {
                warn!(
                    "[TIMELINE] no metadata for match {}, proposing visit as user {}",
                    match_id, user.id
                );
                user.id.clone()
            }
        }
    }

    pub async fn propose_visit(
        &self,
        user: &CurrentUser,
        match_id: &Id,
        visit_date: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<VisitProposal, TimelineError> {
        if visit_date < Utc::now() - Duration::seconds(PRESENT_TOLERANCE_SECS) {
            return Err(TimelineError::ValidationFailed("visit date is in the past"));
        }
        let proposer_id = self.resolve_proposer(user, match_id).await;
        let notes = notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let result = self
            .api
            .create_visit(NewVisit { match_id: match_id.clone(), proposer_id, visit_date, notes })
            .await;

        match result {
            Ok(visit) => {
                info!("[TIMELINE] visit {} proposed for match {}", visit.id, match_id);
                self.notify(Notice::success("Visit proposed"));
                self.reload_after(match_id).await;
                Ok(visit)
            }
            Err(source) => {
                let err = TimelineError::VisitCreateFailed { match_id: match_id.clone(), source };
                self.report(&err);
                Err(err)
            }
        }
    }

    async fn visit_in_view(&self, visit_id: &Id) -> Result<(Id, VisitProposal), TimelineError> {
        let st = self.state.lock().await;
        let match_id = st.match_id.clone().ok_or(TimelineError::NoActiveMatch)?;
        let visit = st
            .find_visit(visit_id)
            .cloned()
            .ok_or_else(|| TimelineError::VisitNotFound { visit_id: visit_id.clone() })?;
        Ok((match_id, visit))
    }

    /// Accept or decline a pending visit. Refused locally, without any
    /// request, when the visit is no longer pending.
    pub async fn respond_to_visit(
        &self,
        user: &CurrentUser,
        visit_id: &Id,
        decision: VisitDecision,
    ) -> Result<VisitProposal, TimelineError> {
        let result = self.try_respond(user, visit_id, decision).await;
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    async fn try_respond(
        &self,
        user: &CurrentUser,
        visit_id: &Id,
        decision: VisitDecision,
    ) -> Result<VisitProposal, TimelineError> {
        let (match_id, visit) = self.visit_in_view(visit_id).await?;
        visit
            .check_response()
            .map_err(|refusal| TimelineError::refused(visit_id, refusal))?;

        let target = decision.target_status();
        let result = match decision {
            VisitDecision::Accept => self.api.accept_visit(visit_id).await,
            VisitDecision::Decline { reason } => self.api.decline_visit(visit_id, reason).await,
        };
        let updated = result.map_err(|source| TimelineError::VisitRespondFailed { visit_id: visit_id.clone(), source })?;

        info!("[TIMELINE] visit {} is now {} (answered by user {})", visit_id, target, user.id);
        self.notify(Notice::success(match target {
            VisitStatus::Accepted => "Visit accepted",
            _ => "Visit declined",
        }));
        self.reload_after(&match_id).await;
        Ok(updated)
    }

    /// Withdraw a pending visit `user` proposed.
    pub async fn cancel_visit(&self, user: &CurrentUser, visit_id: &Id) -> Result<(), TimelineError> {
        let result = self.try_cancel(user, visit_id).await;
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    async fn try_cancel(&self, user: &CurrentUser, visit_id: &Id) -> Result<(), TimelineError> {
        let (match_id, visit) = self.visit_in_view(visit_id).await?;
        visit
            .check_cancel(&user.id)
            .map_err(|refusal| TimelineError::refused(visit_id, refusal))?;

        self.api
            .cancel_visit(visit_id)
            .await
            .map_err(|source| TimelineError::VisitRespondFailed { visit_id: visit_id.clone(), source })?;

        info!("[TIMELINE] visit {} cancelled", visit_id);
        self.notify(Notice::success("Visit cancelled"));
        self.reload_after(&match_id).await;
        Ok(())
    }

    /// Mark every unread message from the other side as read. Failures are
    /// background noise and only logged. Returns how many were marked.
    pub async fn mark_incoming_read(&self, user: &CurrentUser) -> usize {
        let (match_id, unread) = {
            let st = self.state.lock().await;
            match &st.match_id {
                Some(id) => (id.clone(), st.unread_from_others(&user.id)),
                None => return 0,
            }
        };

        let mut marked = 0;
        for message_id in &unread {
            match self.api.mark_message_read(message_id).await {
                Ok(()) => marked += 1,
                Err(e) => warn!("[TIMELINE] could not mark message {} read: {:#}", message_id, e),
            }
        }
        if marked > 0 {
            self.reload_after(&match_id).await;
        }
        marked
    }
}

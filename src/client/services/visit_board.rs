use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{mpsc, Mutex};

use crate::client::error::TimelineError;
use crate::client::models::notices::Notice;
use crate::client::services::api::MatchApi;
use crate::common::models::{CurrentUser, Id, VisitDecision, VisitProposal, VisitStatus};

/// A user's visits across all matches, grouped by status, each group in
/// visit-date order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitGroups {
    pub pending: Vec<VisitProposal>,
    pub accepted: Vec<VisitProposal>,
    pub declined: Vec<VisitProposal>,
    pub cancelled: Vec<VisitProposal>,
}

impl VisitGroups {
    pub fn from_visits(mut visits: Vec<VisitProposal>) -> Self {
        visits.sort_by_key(|v| v.visit_date);
        let mut groups = VisitGroups::default();
        for visit in visits {
            match visit.status {
                VisitStatus::Pending => groups.pending.push(visit),
                VisitStatus::Accepted => groups.accepted.push(visit),
                VisitStatus::Declined => groups.declined.push(visit),
                VisitStatus::Cancelled => groups.cancelled.push(visit),
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.accepted.len() + self.declined.len() + self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, visit_id: &Id) -> Option<&VisitProposal> {
        self.pending
            .iter()
            .chain(&self.accepted)
            .chain(&self.declined)
            .chain(&self.cancelled)
            .find(|v| v.id == *visit_id)
    }
}

/// The visits page. Answers given here reload this board, not a chat
/// timeline.
pub struct VisitBoard<A> {
    api: Arc<A>,
    groups: Mutex<VisitGroups>,
    notices: Option<mpsc::UnboundedSender<Notice>>,
}

impl<A: MatchApi> VisitBoard<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api, groups: Mutex::new(VisitGroups::default()), notices: None }
    }

    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<Notice>) -> Self {
        self.notices = Some(tx);
        self
    }

    fn report(&self, err: &TimelineError) {
        error!("[VISITS] {:#}", err);
        if let (Some(tx), Some(notice)) = (&self.notices, err.notice()) {
            let _ = tx.send(notice);
        }
    }

    fn notify(&self, notice: Notice) {
        if let Some(tx) = &self.notices {
            let _ = tx.send(notice);
        }
    }

    pub async fn groups(&self) -> VisitGroups {
        self.groups.lock().await.clone()
    }

    /// On failure the previous board stays as it was.
    pub async fn load(&self, user: &CurrentUser) -> Result<VisitGroups, TimelineError> {
        let visits = self.api.list_user_visits(&user.id).await.map_err(|source| {
            let err = TimelineError::VisitsLoadFailed { user_id: user.id.clone(), source };
            warn!("[VISITS] {:#}", err);
            err
        })?;
        let groups = VisitGroups::from_visits(visits);
        *self.groups.lock().await = groups.clone();
        Ok(groups)
    }

    async fn reload_after(&self, user: &CurrentUser) {
        if let Err(e) = self.load(user).await {
            warn!("[VISITS] reload after update failed: {:#}", e);
        }
    }

    async fn visit(&self, visit_id: &Id) -> Result<VisitProposal, TimelineError> {
        self.groups
            .lock()
            .await
            .find(visit_id)
            .cloned()
            .ok_or_else(|| TimelineError::VisitNotFound { visit_id: visit_id.clone() })
    }

    pub async fn respond(
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
        self.visit(visit_id)
            .await?
            .check_response()
            .map_err(|refusal| TimelineError::refused(visit_id, refusal))?;

        let target = decision.target_status();
        let result = match decision {
            VisitDecision::Accept => self.api.accept_visit(visit_id).await,
            VisitDecision::Decline { reason } => self.api.decline_visit(visit_id, reason).await,
        };
        let updated = result.map_err(|source| TimelineError::VisitRespondFailed { visit_id: visit_id.clone(), source })?;

        info!("[VISITS] visit {} is now {}", visit_id, target);
        self.notify(Notice::success(format!("Visit {}", target)));
        self.reload_after(user).await;
        Ok(updated)
    }

    pub async fn cancel(&self, user: &CurrentUser, visit_id: &Id) -> Result<(), TimelineError> {
        let result = self.try_cancel(user, visit_id).await;
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    async fn try_cancel(&self, user: &CurrentUser, visit_id: &Id) -> Result<(), TimelineError> {
        self.visit(visit_id)
            .await?
            .check_cancel(&user.id)
            .map_err(|refusal| TimelineError::refused(visit_id, refusal))?;

        self.api
            .cancel_visit(visit_id)
            .await
            .map_err(|source| TimelineError::VisitRespondFailed { visit_id: visit_id.clone(), source })?;

        info!("[VISITS] visit {} cancelled", visit_id);
        self.notify(Notice::success("Visit cancelled"));
        self.reload_after(user).await;
        Ok(())
    }
}

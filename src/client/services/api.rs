use std::future::Future;

use crate::common::models::{CurrentUser, Id, MatchSummary, Message, NewMessage, NewVisit, VisitProposal};

/// The REST backend as seen by the conversation view. Implementations hand
/// back already-normalized domain values.
pub trait MatchApi: Send + Sync + 'static {
    fn current_user(&self) -> impl Future<Output = anyhow::Result<CurrentUser>> + Send;

    fn get_match(&self, match_id: &Id) -> impl Future<Output = anyhow::Result<MatchSummary>> + Send;

    fn list_messages(&self, match_id: &Id) -> impl Future<Output = anyhow::Result<Vec<Message>>> + Send;

    fn list_visits(&self, match_id: &Id) -> impl Future<Output = anyhow::Result<Vec<VisitProposal>>> + Send;

    /// Every visit the user takes part in, across matches.
    fn list_user_visits(&self, user_id: &Id) -> impl Future<Output = anyhow::Result<Vec<VisitProposal>>> + Send;

    fn send_message(&self, message: NewMessage) -> impl Future<Output = anyhow::Result<Message>> + Send;

    fn create_visit(&self, visit: NewVisit) -> impl Future<Output = anyhow::Result<VisitProposal>> + Send;

    fn accept_visit(&self, visit_id: &Id) -> impl Future<Output = anyhow::Result<VisitProposal>> + Send;

    fn decline_visit(
        &self,
        visit_id: &Id,
        reason: Option<String>,
    ) -> impl Future<Output = anyhow::Result<VisitProposal>> + Send;

    fn cancel_visit(&self, visit_id: &Id) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn mark_message_read(&self, message_id: &Id) -> impl Future<Output = anyhow::Result<()>> + Send;
}

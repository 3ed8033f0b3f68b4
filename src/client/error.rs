use thiserror::Error;

use crate::client::models::notices::Notice;
use crate::common::models::{Id, TransitionRefusal, VisitStatus};

/// Failures of timeline and visit operations.
///
/// Background failures (reloads, metadata, polling) are only logged.
/// Failures of user-initiated actions are additionally turned into a
/// [`Notice`]; see [`TimelineError::notice`].
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("failed to load timeline for match {match_id}: {source}")]
    LoadFailed {
        match_id: Id,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load visits of user {user_id}: {source}")]
    VisitsLoadFailed {
        user_id: Id,
        #[source]
        source: anyhow::Error,
    },

    #[error("match {match_id} metadata unavailable: {source}")]
    MatchMetadataUnavailable {
        match_id: Id,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to send message to match {match_id}: {source}")]
    SendFailed {
        match_id: Id,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to propose a visit for match {match_id}: {source}")]
    VisitCreateFailed {
        match_id: Id,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to update visit {visit_id}: {source}")]
    VisitRespondFailed {
        visit_id: Id,
        #[source]
        source: anyhow::Error,
    },

    #[error("visit {visit_id} is already {status}")]
    InvalidVisitState { visit_id: Id, status: VisitStatus },

    #[error("visit {visit_id} is not part of the current view")]
    VisitNotFound { visit_id: Id },

    #[error("visit {visit_id} cannot be changed by this user")]
    NotCounterparty { visit_id: Id },

    #[error("no match is open")]
    NoActiveMatch,

    #[error("validation failed: {0}")]
    ValidationFailed(&'static str),
}

impl TimelineError {
    pub(crate) fn refused(visit_id: &Id, refusal: TransitionRefusal) -> Self {
        match refusal {
            TransitionRefusal::Terminal(status) => TimelineError::InvalidVisitState {
                visit_id: visit_id.clone(),
                status,
            },
            TransitionRefusal::NotProposer => {
                TimelineError::NotCounterparty { visit_id: visit_id.clone() }
            }
        }
    }

    /// Whether the user should be told about this failure.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TimelineError::SendFailed { .. }
                | TimelineError::VisitCreateFailed { .. }
                | TimelineError::VisitRespondFailed { .. }
                | TimelineError::InvalidVisitState { .. }
                | TimelineError::VisitNotFound { .. }
                | TimelineError::NotCounterparty { .. }
        )
    }

    /// Short, non-blocking notification text for user-facing failures.
    pub fn notice(&self) -> Option<Notice> {
        let text = match self {
            TimelineError::SendFailed { .. } => "Message could not be sent",
            TimelineError::VisitCreateFailed { .. } => "Visit could not be proposed",
            TimelineError::VisitRespondFailed { .. } => "Visit could not be updated",
            TimelineError::InvalidVisitState { .. } => "This visit has already been answered",
            TimelineError::VisitNotFound { .. } => "This visit is no longer available",
            TimelineError::NotCounterparty { .. } => "You cannot change this visit",
            _ => return None,
        };
        Some(Notice::error(text))
    }
}

/// HTTP-level failures of the REST collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: reqwest::Method,
        path: String,
        status: reqwest::StatusCode,
        body: String,
    },
}

// Mapping of raw collaborator responses into the domain model.
// Every field-name and shape fallback the backend needs lives here.
use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::common::models::{CurrentUser, Id, Listing, MatchSummary, Message, Role, VisitProposal, VisitStatus};

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(anyhow!("unrecognised timestamp {:?}", raw))
}

fn parse_opt_timestamp(raw: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => parse_timestamp(s).map(Some),
        None => Ok(None),
    }
}

/// Unknown status strings fall back to pending.
pub fn parse_status(raw: &str) -> VisitStatus {
    match raw.trim().to_ascii_lowercase().as_str() {
        "accepted" | "confirmed" => VisitStatus::Accepted,
        "declined" | "rejected" => VisitStatus::Declined,
        "cancelled" | "canceled" => VisitStatus::Cancelled,
        _ => VisitStatus::Pending,
    }
}

#[derive(Debug, Deserialize)]
pub struct RawUser {
    pub id: Option<Id>,
    pub user_id: Option<Id>,
    pub role: Option<String>,
    pub user_type: Option<String>,
    pub is_landlord: Option<bool>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// `/auth/me` answers either `{user: {...}}` or the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawUserEnvelope {
    Wrapped { user: RawUser },
    Bare(RawUser),
}

impl RawUserEnvelope {
    pub fn into_inner(self) -> RawUser {
        match self {
            RawUserEnvelope::Wrapped { user } => user,
            RawUserEnvelope::Bare(user) => user,
        }
    }
}

impl TryFrom<RawUser> for CurrentUser {
    type Error = anyhow::Error;

    fn try_from(raw: RawUser) -> anyhow::Result<Self> {
        let id = raw.id.or(raw.user_id).context("user record without id")?;
        let role = match raw.role.or(raw.user_type).as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("landlord") | Some("owner") => Role::Landlord,
            Some(_) => Role::Student,
            None if raw.is_landlord == Some(true) => Role::Landlord,
            None => Role::Student,
        };
        let display_name = raw
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                let full = [raw.first_name, raw.last_name]
                    .into_iter()
                    .flatten()
                    .filter(|p| !p.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                (!full.is_empty()).then_some(full)
            })
            .unwrap_or_else(|| "Utilisateur".to_string());
        Ok(CurrentUser { id, role, display_name })
    }
}

#[derive(Debug, Deserialize)]
pub struct RawListing {
    pub id: Option<Id>,
    pub title: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub price: Option<f64>,
}

impl From<RawListing> for Listing {
    fn from(raw: RawListing) -> Self {
        Listing {
            id: raw.id,
            title: raw.title,
            address: raw.address,
            city: raw.city,
            price: raw.price,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawMatch {
    pub id: Option<Id>,
    pub student_id: Option<Id>,
    pub landlord_id: Option<Id>,
    #[serde(alias = "property")]
    pub listing: Option<RawListing>,
    pub listing_id: Option<Id>,
}

pub fn normalize_match(raw: RawMatch, requested: &Id) -> anyhow::Result<MatchSummary> {
    let listing = match (raw.listing, raw.listing_id) {
        (Some(listing), _) => Some(Listing::from(listing)),
        (None, Some(id)) => Some(Listing { id: Some(id), ..Listing::default() }),
        (None, None) => None,
    };
    Ok(MatchSummary {
        id: raw.id.unwrap_or_else(|| requested.clone()),
        student_id: raw.student_id.context("match record without student_id")?,
        landlord_id: raw.landlord_id.context("match record without landlord_id")?,
        listing,
    })
}

#[derive(Debug, Deserialize)]
pub struct RawMessage {
    pub id: Option<Id>,
    pub match_id: Option<Id>,
    pub sender_id: Option<Id>,
    #[serde(default)]
    pub content: String,
    pub created_at: Option<String>,
    pub read: Option<bool>,
    pub is_read: Option<bool>,
}

/// `match_id` falls back to the match the list was requested for.
pub fn normalize_message(raw: RawMessage, match_id: &Id) -> anyhow::Result<Message> {
    let id = raw.id.context("message without id")?;
    let created_at = parse_opt_timestamp(raw.created_at.as_deref())
        .with_context(|| format!("message {}", id))?
        .with_context(|| format!("message {} without created_at", id))?;
    Ok(Message {
        match_id: raw.match_id.unwrap_or_else(|| match_id.clone()),
        sender_id: raw.sender_id.with_context(|| format!("message {} without sender_id", id))?,
        content: raw.content,
        created_at,
        read: raw.read.or(raw.is_read).unwrap_or(false),
        id,
    })
}

#[derive(Debug, Deserialize)]
pub struct RawVisit {
    pub id: Option<Id>,
    pub match_id: Option<Id>,
    #[serde(alias = "proposed_by")]
    pub proposer_id: Option<Id>,
    #[serde(alias = "proposed_date")]
    pub visit_date: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
}

pub fn normalize_visit(raw: RawVisit, match_id: Option<&Id>) -> anyhow::Result<VisitProposal> {
    let id = raw.id.context("visit without id")?;
    let visit_date = parse_opt_timestamp(raw.visit_date.as_deref())
        .with_context(|| format!("visit {}", id))?
        .with_context(|| format!("visit {} without visit_date", id))?;
    let created_at = parse_opt_timestamp(raw.created_at.as_deref()).with_context(|| format!("visit {}", id))?;
    let match_id = raw
        .match_id
        .or_else(|| match_id.cloned())
        .with_context(|| format!("visit {} without match_id", id))?;
    Ok(VisitProposal {
        match_id,
        proposer_id: raw.proposer_id.with_context(|| format!("visit {} without proposer", id))?,
        visit_date,
        status: raw.status.as_deref().map(parse_status).unwrap_or(VisitStatus::Pending),
        notes: raw.notes.filter(|n| !n.trim().is_empty()),
        created_at,
        id,
    })
}

pub fn normalize_messages(raw: Vec<RawMessage>, match_id: &Id) -> anyhow::Result<Vec<Message>> {
    raw.into_iter().map(|m| normalize_message(m, match_id)).collect()
}

pub fn normalize_visits(raw: Vec<RawVisit>, match_id: Option<&Id>) -> anyhow::Result<Vec<VisitProposal>> {
    raw.into_iter().map(|v| normalize_visit(v, match_id)).collect()
}

// Domain models shared by every client component
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Prefix of client-generated ids used for messages not yet persisted.
pub const LOCAL_ID_PREFIX: &str = "local-";

/// Opaque identifier. The backend hands out integers, but nothing here relies
/// on that: numbers and strings are both accepted and kept as text.
///
/// Equality, ordering and hashing look at the text only; `numeric` just
/// remembers the JSON shape so the id goes back the way it came.
#[derive(Debug, Clone)]
pub struct Id {
    raw: String,
    numeric: bool,
}

impl Id {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into(), numeric: false }
    }

    /// Id typed by a user: canonical integers are taken as numeric ids,
    /// anything else (`"007"`, `"+5"`, `"m1"`) stays text.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) if n.to_string() == raw => Self::from(n),
            _ => Self::new(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    /// Temporary id for an optimistic entry.
    pub fn local() -> Self {
        Self::new(format!("{}{}", LOCAL_ID_PREFIX, uuid::Uuid::new_v4().simple()))
    }

    pub fn is_local(&self) -> bool {
        self.raw.starts_with(LOCAL_ID_PREFIX)
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Id {}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Id {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Id {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<i64> for Id {
    fn from(raw: i64) -> Self {
        Self { raw: raw.to_string(), numeric: true }
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.numeric {
            if let Ok(n) = self.raw.parse::<i64>() {
                return serializer.serialize_i64(n);
            }
            if let Ok(n) = self.raw.parse::<u64>() {
                return serializer.serialize_u64(n);
            }
        }
        serializer.serialize_str(&self.raw)
    }
}

struct IdVisitor;

impl<'de> Visitor<'de> for IdVisitor {
    type Value = Id;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer or string identifier")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Id, E> {
        Ok(Id::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Id, E> {
        Ok(Id { raw: v.to_string(), numeric: true })
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
        if v.trim().is_empty() {
            return Err(E::custom("empty identifier"));
        }
        Ok(Id::new(v))
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IdVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Landlord,
}

/// The authenticated actor. Passed explicitly into every operation that
/// needs it; nothing in the crate looks it up ambiently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Id,
    pub role: Role,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Option<Id>,
    pub title: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub price: Option<f64>,
}

/// A student/landlord pairing on a listing. Referenced by the timeline,
/// never modified by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: Id,
    pub student_id: Id,
    pub landlord_id: Id,
    pub listing: Option<Listing>,
}

impl MatchSummary {
    /// The participant on the other side of `user`, if `user` takes part.
    pub fn counterpart_of(&self, user: &Id) -> Option<&Id> {
        if *user == self.student_id {
            Some(&self.landlord_id)
        } else if *user == self.landlord_id {
            Some(&self.student_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub match_id: Id,
    pub sender_id: Id,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl Message {
    /// Provisional message shown while the send request is in flight.
    pub fn provisional(match_id: Id, sender_id: Id, content: String) -> Self {
        Self {
            id: Id::local(),
            match_id,
            sender_id,
            content,
            created_at: Utc::now(),
            read: false,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.is_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl VisitStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, VisitStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Accepted => "accepted",
            VisitStatus::Declined => "declined",
            VisitStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The counterparty's answer to a pending visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitDecision {
    Accept,
    Decline { reason: Option<String> },
}

impl VisitDecision {
    pub fn target_status(&self) -> VisitStatus {
        match self {
            VisitDecision::Accept => VisitStatus::Accepted,
            VisitDecision::Decline { .. } => VisitStatus::Declined,
        }
    }
}

/// Why a visit transition was refused before reaching the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRefusal {
    Terminal(VisitStatus),
    NotProposer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitProposal {
    pub id: Id,
    pub match_id: Id,
    pub proposer_id: Id,
    pub visit_date: DateTime<Utc>,
    pub status: VisitStatus,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl VisitProposal {
    /// Sort key in the merged timeline. Visits recorded without a creation
    /// time are placed at their scheduled date.
    pub fn sort_key(&self) -> DateTime<Utc> {
        self.created_at.unwrap_or(self.visit_date)
    }

    /// Accept/decline is open while the visit is pending. Either participant
    /// may answer: `proposer_id` is always the match's student, whoever
    /// actually suggested the date.
    pub fn check_response(&self) -> Result<(), TransitionRefusal> {
        if self.status.is_terminal() {
            return Err(TransitionRefusal::Terminal(self.status));
        }
        Ok(())
    }

    /// Withdrawing is open to the proposer of a pending visit only.
    pub fn check_cancel(&self, requester: &Id) -> Result<(), TransitionRefusal> {
        if self.status.is_terminal() {
            return Err(TransitionRefusal::Terminal(self.status));
        }
        if self.proposer_id != *requester {
            return Err(TransitionRefusal::NotProposer);
        }
        Ok(())
    }
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub match_id: Id,
    pub content: String,
}

/// Body of `POST /visits`.
#[derive(Debug, Clone, Serialize)]
pub struct NewVisit {
    pub match_id: Id,
    pub proposer_id: Id,
    pub visit_date: DateTime<Utc>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn visit(status: VisitStatus) -> VisitProposal {
        VisitProposal {
            id: Id::from(9),
            match_id: Id::from("m1"),
            proposer_id: Id::from(1),
            visit_date: Utc.with_ymd_and_hms(2030, 5, 12, 18, 0, 0).unwrap(),
            status,
            notes: None,
            created_at: None,
        }
    }

    #[test]
    fn id_accepts_numbers_and_strings() {
        let ids: Vec<Id> = serde_json::from_str(r#"[42, "abc", "17"]"#).unwrap();
        assert_eq!(ids, vec![Id::from(42), Id::from("abc"), Id::from("17")]);
    }

    #[test]
    fn ids_go_back_in_the_shape_they_came() {
        let ids: Vec<Id> = serde_json::from_str(r#"[12, "12", "007", "+5", "m-12"]"#).unwrap();
        let json = serde_json::to_value(&ids).unwrap();
        assert_eq!(json, serde_json::json!([12, "12", "007", "+5", "m-12"]));
        assert_eq!(ids[0], ids[1]);
    }

    #[test]
    fn typed_ids_are_numeric_only_when_canonical() {
        assert!(Id::parse("42").is_numeric());
        assert!(!Id::parse("007").is_numeric());
        assert!(!Id::parse("+5").is_numeric());
        assert!(!Id::parse("m1").is_numeric());
        let body = NewMessage { match_id: Id::parse("12"), content: "hi".into() };
        assert_eq!(serde_json::to_value(&body).unwrap()["match_id"], serde_json::json!(12));
    }

    #[test]
    fn empty_string_id_is_rejected() {
        assert!(serde_json::from_str::<Id>(r#""  ""#).is_err());
    }

    #[test]
    fn local_ids_are_recognised() {
        let msg = Message::provisional(Id::from(1), Id::from(2), "yo".into());
        assert!(msg.is_provisional());
        assert!(!Id::from(5).is_local());
    }

    #[test]
    fn visit_without_created_at_sorts_by_visit_date() {
        let v = visit(VisitStatus::Pending);
        assert_eq!(v.sort_key(), v.visit_date);

        let created = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        let v = VisitProposal { created_at: Some(created), ..v };
        assert_eq!(v.sort_key(), created);
    }

    #[test]
    fn only_pending_visits_may_be_answered() {
        assert_eq!(visit(VisitStatus::Pending).check_response(), Ok(()));

        for status in [VisitStatus::Accepted, VisitStatus::Declined, VisitStatus::Cancelled] {
            assert_eq!(visit(status).check_response(), Err(TransitionRefusal::Terminal(status)));
        }
    }

    #[test]
    fn only_proposer_may_cancel() {
        let v = visit(VisitStatus::Pending);
        assert_eq!(v.check_cancel(&Id::from(1)), Ok(()));
        assert_eq!(v.check_cancel(&Id::from(2)), Err(TransitionRefusal::NotProposer));
        assert_eq!(
            visit(VisitStatus::Accepted).check_cancel(&Id::from(1)),
            Err(TransitionRefusal::Terminal(VisitStatus::Accepted))
        );
    }

    #[test]
    fn counterpart_lookup() {
        let m = MatchSummary {
            id: Id::from("m1"),
            student_id: Id::from(1),
            landlord_id: Id::from(2),
            listing: None,
        };
        assert_eq!(m.counterpart_of(&Id::from(1)), Some(&Id::from(2)));
        assert_eq!(m.counterpart_of(&Id::from(2)), Some(&Id::from(1)));
        assert_eq!(m.counterpart_of(&Id::from(3)), None);
    }
}

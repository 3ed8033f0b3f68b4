//! Merged conversation feed: chat messages and visit proposals of one match
//! in a single chronological sequence.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::common::models::{CurrentUser, Id, Message, VisitProposal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Message,
    Visit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimelineEntry {
    Message(Message),
    Visit(VisitProposal),
}

impl TimelineEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            TimelineEntry::Message(_) => EntryKind::Message,
            TimelineEntry::Visit(_) => EntryKind::Visit,
        }
    }

    pub fn id(&self) -> &Id {
        match self {
            TimelineEntry::Message(m) => &m.id,
            TimelineEntry::Visit(v) => &v.id,
        }
    }

    /// Resolved sort timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Message(m) => m.created_at,
            TimelineEntry::Visit(v) => v.sort_key(),
        }
    }

    /// Sender of a message, proposer of a visit.
    pub fn author_id(&self) -> &Id {
        match self {
            TimelineEntry::Message(m) => &m.sender_id,
            TimelineEntry::Visit(v) => &v.proposer_id,
        }
    }

    /// Computed on demand from the current user; entries never carry it.
    pub fn is_authored_by(&self, user: &CurrentUser) -> bool {
        *self.author_id() == user.id
    }

    /// Key unique across both kinds (message and visit ids may collide).
    pub fn key(&self) -> String {
        match self {
            TimelineEntry::Message(m) => format!("message:{}", m.id),
            TimelineEntry::Visit(v) => format!("visit:{}", v.id),
        }
    }
}

/// Tag, concatenate (messages first) and stable-sort by resolved timestamp.
pub fn merge_timeline(messages: Vec<Message>, visits: Vec<VisitProposal>) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = messages
        .into_iter()
        .map(TimelineEntry::Message)
        .chain(visits.into_iter().map(TimelineEntry::Visit))
        .collect();
    // sort_by_key is stable: equal timestamps keep concatenation order
    entries.sort_by_key(TimelineEntry::timestamp);
    entries
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%d/%m %H:%M").to_string()
}

/// One line of text for a terminal view. Own entries are marked `>` and
/// others `<`; visits are centred with `*`.
pub fn render_entry(entry: &TimelineEntry, user: &CurrentUser) -> String {
    let mine = entry.is_authored_by(user);
    match entry {
        TimelineEntry::Message(m) => {
            let marker = if mine { '>' } else { '<' };
            let pending = if m.is_provisional() { " (sending...)" } else { "" };
            let line = format!("{} [{}] {}{}", marker, format_timestamp(m.created_at), m.content, pending);
            if mine {
                format!("{:>60}", line)
            } else {
                line
            }
        }
        TimelineEntry::Visit(v) => {
            let who = if mine { "you" } else { "them" };
            let notes = v.notes.as_deref().map(|n| format!(" \"{}\"", n)).unwrap_or_default();
            format!(
                "      * visit #{} on {} proposed by {} [{}]{}",
                v.id,
                format_timestamp(v.visit_date),
                who,
                v.status,
                notes
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::models::{Role, VisitStatus};
    use chrono::{Duration, TimeZone};

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn msg(id: i64, at: DateTime<Utc>, sender: i64) -> Message {
        Message {
            id: Id::from(id),
            match_id: Id::from("m1"),
            sender_id: Id::from(sender),
            content: format!("msg {}", id),
            created_at: at,
            read: false,
        }
    }

    fn visit(id: i64, created_at: Option<DateTime<Utc>>, visit_date: DateTime<Utc>) -> VisitProposal {
        VisitProposal {
            id: Id::from(id),
            match_id: Id::from("m1"),
            proposer_id: Id::from(1),
            visit_date,
            status: VisitStatus::Pending,
            notes: None,
            created_at,
        }
    }

    fn user(id: i64) -> CurrentUser {
        CurrentUser { id: Id::from(id), role: Role::Student, display_name: "Alice".into() }
    }

    #[test]
    fn visit_without_created_at_placed_at_visit_date() {
        let entries = merge_timeline(vec![msg(1, t(0), 1)], vec![visit(9, None, t(30))]);
        let keys: Vec<String> = entries.iter().map(TimelineEntry::key).collect();
        assert_eq!(keys, vec!["message:1", "visit:9"]);
    }

    #[test]
    fn merge_interleaves_and_keeps_everything() {
        let messages = vec![msg(1, t(10), 1), msg(2, t(0), 2), msg(3, t(40), 1)];
        let visits = vec![visit(7, Some(t(20)), t(500)), visit(8, None, t(5))];
        let entries = merge_timeline(messages, visits);

        assert_eq!(entries.len(), 5);
        assert!(entries.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));
        let keys: Vec<String> = entries.iter().map(TimelineEntry::key).collect();
        assert_eq!(keys, vec!["message:2", "visit:8", "message:1", "visit:7", "message:3"]);
    }

    #[test]
    fn equal_timestamps_keep_messages_then_visits_order() {
        let messages = vec![msg(1, t(0), 1), msg(2, t(0), 2)];
        let visits = vec![visit(9, Some(t(0)), t(90)), visit(3, None, t(0))];
        let keys: Vec<String> = merge_timeline(messages, visits).iter().map(TimelineEntry::key).collect();
        assert_eq!(keys, vec!["message:1", "message:2", "visit:9", "visit:3"]);
    }

    #[test]
    fn authorship_follows_sender_and_proposer() {
        let entries = merge_timeline(vec![msg(1, t(0), 2)], vec![visit(9, None, t(1))]);
        assert!(!entries[0].is_authored_by(&user(1)));
        assert!(entries[1].is_authored_by(&user(1)));
        assert!(entries[0].is_authored_by(&user(2)));
    }

    #[test]
    fn rendering_marks_ownership() {
        let entries = merge_timeline(vec![msg(1, t(0), 1), msg(2, t(1), 2)], vec![]);
        assert!(render_entry(&entries[0], &user(1)).trim_start().starts_with('>'));
        assert!(render_entry(&entries[1], &user(1)).starts_with('<'));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let entries = merge_timeline(vec![msg(1, t(0), 1)], vec![visit(9, None, t(1))]);
        let json = serde_json::to_value(&entries).unwrap();
        assert_eq!(json[0]["kind"], "message");
        assert_eq!(json[1]["kind"], "visit");
        assert_eq!(json[1]["status"], "pending");
    }
}

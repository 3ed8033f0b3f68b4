use crate::client::models::timeline::TimelineEntry;
use crate::common::models::{Id, MatchSummary, Message, VisitProposal};

/// Everything the conversation view of one match owns.
///
/// `generation` is bumped every time a load starts or the view switches to
/// another match; a load may only commit if the generation it started with
/// is still the current one.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub match_id: Option<Id>,
    pub match_meta: Option<MatchSummary>,
    pub entries: Vec<TimelineEntry>,
    pub provisional: Vec<Message>,
    pub draft: String,
    pub generation: u64,
    pub loaded: bool,
}

impl ConversationState {
    pub fn is_active(&self, match_id: &Id) -> bool {
        self.match_id.as_ref() == Some(match_id)
    }

    /// Switch to another match and drop everything that belonged to the
    /// previous one.
    pub fn open(&mut self, match_id: Id) -> u64 {
        self.match_id = Some(match_id);
        self.match_meta = None;
        self.entries.clear();
        self.provisional.clear();
        self.draft.clear();
        self.loaded = false;
        self.generation += 1;
        self.generation
    }

    /// Start a load for `match_id`. `None` when another match (or none) is
    /// open: only [`open`](Self::open) switches the view.
    pub fn begin_load(&mut self, match_id: &Id) -> Option<u64> {
        if !self.is_active(match_id) {
            return None;
        }
        self.generation += 1;
        Some(self.generation)
    }

    /// Replace the timeline with the result of the load started at
    /// `generation`. Returns false when a newer load or a match switch
    /// superseded it, in which case nothing changes.
    ///
    /// Missing metadata keeps whatever was shown before.
    pub fn commit(&mut self, generation: u64, entries: Vec<TimelineEntry>, meta: Option<MatchSummary>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.entries = entries;
        if meta.is_some() {
            self.match_meta = meta;
        }
        self.loaded = true;
        true
    }

    pub fn push_provisional(&mut self, message: Message) {
        self.provisional.push(message);
    }

    pub fn drop_provisional(&mut self, id: &Id) {
        self.provisional.retain(|m| m.id != *id);
    }

    /// Replace a provisional message with its persisted counterpart until
    /// the next reload brings the authoritative list.
    pub fn confirm_provisional(&mut self, id: &Id, persisted: Message) {
        self.drop_provisional(id);
        if !self.is_active(&persisted.match_id) {
            return;
        }
        let already_there = self.entries.iter().any(|e| match e {
            TimelineEntry::Message(m) => m.id == persisted.id,
            TimelineEntry::Visit(_) => false,
        });
        if already_there {
            return;
        }
        let at = persisted.created_at;
        let pos = self.entries.partition_point(|e| e.timestamp() <= at);
        self.entries.insert(pos, TimelineEntry::Message(persisted));
    }

    /// Committed entries plus in-flight sends, in timeline order.
    pub fn view(&self) -> Vec<TimelineEntry> {
        let mut view = self.entries.clone();
        view.extend(self.provisional.iter().cloned().map(TimelineEntry::Message));
        view.sort_by_key(TimelineEntry::timestamp);
        view
    }

    pub fn find_visit(&self, visit_id: &Id) -> Option<&VisitProposal> {
        self.entries.iter().find_map(|e| match e {
            TimelineEntry::Visit(v) if v.id == *visit_id => Some(v),
            _ => None,
        })
    }

    /// Persisted messages from anyone but `reader` that are still unread.
    pub fn unread_from_others(&self, reader: &Id) -> Vec<Id> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                TimelineEntry::Message(m) if !m.read && m.sender_id != *reader && !m.is_provisional() => {
                    Some(m.id.clone())
                }
                _ => None,
            })
            .collect()
    }
}

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Notify;

use studmatch::client::services::api::MatchApi;
use studmatch::common::models::{
    CurrentUser, Id, Listing, MatchSummary, Message, NewMessage, NewVisit, Role, VisitProposal, VisitStatus,
};

pub const STUDENT: i64 = 10;
pub const LANDLORD: i64 = 20;

pub fn t(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn student() -> CurrentUser {
    CurrentUser { id: Id::from(STUDENT), role: Role::Student, display_name: "Alice".into() }
}

pub fn landlord() -> CurrentUser {
    CurrentUser { id: Id::from(LANDLORD), role: Role::Landlord, display_name: "Bruno".into() }
}

pub fn match_summary(id: &str) -> MatchSummary {
    MatchSummary {
        id: Id::from(id),
        student_id: Id::from(STUDENT),
        landlord_id: Id::from(LANDLORD),
        listing: Some(Listing {
            id: Some(Id::from(7)),
            title: Some("Room near campus".into()),
            address: Some("12 Rue des Écoles".into()),
            city: Some("Lyon".into()),
            price: Some(450.0),
        }),
    }
}

pub fn message(id: i64, match_id: &str, sender: i64, minutes: i64, content: &str) -> Message {
    Message {
        id: Id::from(id),
        match_id: Id::from(match_id),
        sender_id: Id::from(sender),
        content: content.into(),
        created_at: t(minutes),
        read: false,
    }
}

pub fn visit(
    id: i64,
    match_id: &str,
    proposer: i64,
    created: Option<i64>,
    date: i64,
    status: VisitStatus,
) -> VisitProposal {
    VisitProposal {
        id: Id::from(id),
        match_id: Id::from(match_id),
        proposer_id: Id::from(proposer),
        visit_date: t(date),
        status,
        notes: None,
        created_at: created.map(t),
    }
}

/// Holds a request until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
struct Backend {
    user: Option<CurrentUser>,
    matches: HashMap<Id, MatchSummary>,
    messages: Vec<Message>,
    visits: Vec<VisitProposal>,
    next_id: i64,
    failing: HashSet<&'static str>,
    calls: HashMap<&'static str, usize>,
    decline_reasons: Vec<Option<String>>,
    created: Vec<NewVisit>,
}

/// In-memory backend with per-operation call counters and failure switches.
pub struct FakeApi {
    backend: Mutex<Backend>,
    gates: Mutex<HashMap<Id, Arc<Gate>>>,
    send_gate: Mutex<Option<Arc<Gate>>>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        let backend = Backend { next_id: 1000, user: Some(student()), ..Default::default() };
        Self {
            backend: Mutex::new(backend),
            gates: Mutex::new(HashMap::new()),
            send_gate: Mutex::new(None),
        }
    }

    pub fn with_match(self, summary: MatchSummary) -> Self {
        self.backend.lock().unwrap().matches.insert(summary.id.clone(), summary);
        self
    }

    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        self.backend.lock().unwrap().messages.extend(messages);
        self
    }

    pub fn with_visits(self, visits: Vec<VisitProposal>) -> Self {
        self.backend.lock().unwrap().visits.extend(visits);
        self
    }

    pub fn add_message(&self, message: Message) {
        self.backend.lock().unwrap().messages.push(message);
    }

    pub fn fail(&self, op: &'static str) {
        self.backend.lock().unwrap().failing.insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.backend.lock().unwrap().failing.remove(op);
    }

    pub fn calls(&self, op: &str) -> usize {
        self.backend.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.backend.lock().unwrap().calls.values().sum()
    }

    pub fn visit_status(&self, id: i64) -> Option<VisitStatus> {
        let id = Id::from(id);
        self.backend.lock().unwrap().visits.iter().find(|v| v.id == id).map(|v| v.status)
    }

    pub fn created_visits(&self) -> Vec<NewVisit> {
        self.backend.lock().unwrap().created.clone()
    }

    pub fn decline_reasons(&self) -> Vec<Option<String>> {
        self.backend.lock().unwrap().decline_reasons.clone()
    }

    pub fn gate(&self, match_id: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().unwrap().insert(Id::from(match_id), Arc::clone(&gate));
        gate
    }

    /// Hold the next `send_message` call.
    pub fn gate_send(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.send_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    fn enter(&self, op: &'static str) -> anyhow::Result<()> {
        let mut backend = self.backend.lock().unwrap();
        *backend.calls.entry(op).or_insert(0) += 1;
        if backend.failing.contains(op) {
            return Err(anyhow!("{} unavailable", op));
        }
        Ok(())
    }

    fn next_id(&self) -> Id {
        let mut backend = self.backend.lock().unwrap();
        backend.next_id += 1;
        Id::from(backend.next_id)
    }

    fn set_status(&self, visit_id: &Id, status: VisitStatus) -> anyhow::Result<VisitProposal> {
        let mut backend = self.backend.lock().unwrap();
        let visit = backend
            .visits
            .iter_mut()
            .find(|v| v.id == *visit_id)
            .ok_or_else(|| anyhow!("visit {} not found", visit_id))?;
        visit.status = status;
        Ok(visit.clone())
    }
}

impl MatchApi for FakeApi {
    async fn current_user(&self) -> anyhow::Result<CurrentUser> {
        self.enter("current_user")?;
        self.backend.lock().unwrap().user.clone().ok_or_else(|| anyhow!("not signed in"))
    }

    async fn get_match(&self, match_id: &Id) -> anyhow::Result<MatchSummary> {
        self.enter("get_match")?;
        self.backend
            .lock()
            .unwrap()
            .matches
            .get(match_id)
            .cloned()
            .ok_or_else(|| anyhow!("match {} not found", match_id))
    }

    async fn list_messages(&self, match_id: &Id) -> anyhow::Result<Vec<Message>> {
        let gate = self.gates.lock().unwrap().remove(match_id);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.enter("list_messages")?;
        let backend = self.backend.lock().unwrap();
        Ok(backend.messages.iter().filter(|m| m.match_id == *match_id).cloned().collect())
    }

    async fn list_visits(&self, match_id: &Id) -> anyhow::Result<Vec<VisitProposal>> {
        self.enter("list_visits")?;
        let backend = self.backend.lock().unwrap();
        Ok(backend.visits.iter().filter(|v| v.match_id == *match_id).cloned().collect())
    }

    async fn list_user_visits(&self, user_id: &Id) -> anyhow::Result<Vec<VisitProposal>> {
        self.enter("list_user_visits")?;
        let backend = self.backend.lock().unwrap();
        Ok(backend
            .visits
            .iter()
            .filter(|v| {
                backend
                    .matches
                    .get(&v.match_id)
                    .map_or(v.proposer_id == *user_id, |m| m.counterpart_of(user_id).is_some())
            })
            .cloned()
            .collect())
    }

    async fn send_message(&self, message: NewMessage) -> anyhow::Result<Message> {
        let gate = self.send_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.enter("send_message")?;
        let sender_id = self.backend.lock().unwrap().user.as_ref().map(|u| u.id.clone()).unwrap_or(Id::from(STUDENT));
        let sent = Message {
            id: self.next_id(),
            match_id: message.match_id,
            sender_id,
            content: message.content,
            created_at: Utc::now(),
            read: false,
        };
        self.backend.lock().unwrap().messages.push(sent.clone());
        Ok(sent)
    }

    async fn create_visit(&self, visit: NewVisit) -> anyhow::Result<VisitProposal> {
        self.enter("create_visit")?;
        let created = VisitProposal {
            id: self.next_id(),
            match_id: visit.match_id.clone(),
            proposer_id: visit.proposer_id.clone(),
            visit_date: visit.visit_date,
            status: VisitStatus::Pending,
            notes: visit.notes.clone(),
            created_at: Some(Utc::now()),
        };
        let mut backend = self.backend.lock().unwrap();
        backend.created.push(visit);
        backend.visits.push(created.clone());
        Ok(created)
    }

    async fn accept_visit(&self, visit_id: &Id) -> anyhow::Result<VisitProposal> {
        self.enter("accept_visit")?;
        self.set_status(visit_id, VisitStatus::Accepted)
    }

    async fn decline_visit(&self, visit_id: &Id, reason: Option<String>) -> anyhow::Result<VisitProposal> {
        self.enter("decline_visit")?;
        self.backend.lock().unwrap().decline_reasons.push(reason);
        self.set_status(visit_id, VisitStatus::Declined)
    }

    async fn cancel_visit(&self, visit_id: &Id) -> anyhow::Result<()> {
        self.enter("cancel_visit")?;
        self.set_status(visit_id, VisitStatus::Cancelled).map(|_| ())
    }

    async fn mark_message_read(&self, message_id: &Id) -> anyhow::Result<()> {
        self.enter("mark_message_read")?;
        let mut backend = self.backend.lock().unwrap();
        let message = backend
            .messages
            .iter_mut()
            .find(|m| m.id == *message_id)
            .ok_or_else(|| anyhow!("message {} not found", message_id))?;
        message.read = true;
        Ok(())
    }
}

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::catalog::{ServiceCatalog, SlotCatalog};

/// Stable external chat address of one customer, e.g. `5215551234567@c.us`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// The address with its transport domain suffix stripped. Used to derive
    /// the contact number when the deployment trusts the sender address.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    Start,
    CollectName,
    CollectContact,
    CollectService,
    CollectDate,
    CollectTime,
    Confirm,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::CollectName => "collect_name",
            Self::CollectContact => "collect_contact",
            Self::CollectService => "collect_service",
            Self::CollectDate => "collect_date",
            Self::CollectTime => "collect_time",
            Self::Confirm => "confirm",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Customer,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// The finalized tuple submitted to the booking gateway exactly once per
/// confirmed conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingRequest {
    pub name: String,
    pub contact: String,
    pub service_name: String,
    pub duration_minutes: u32,
    pub date: String,
    pub time: String,
}

/// Per-customer session state. Owned exclusively by the conversation store and
/// mutated only by the dialogue engine while handling that customer's current
/// message.
#[derive(Clone, Debug)]
pub struct Conversation {
    pub step: Step,
    pub name: String,
    pub contact: String,
    pub service_id: String,
    pub date: String,
    pub time: String,
    /// Catalog snapshots frozen when the conversation entered the
    /// corresponding selection step. A conversation never sees a catalog
    /// reload mid-booking.
    pub services: ServiceCatalog,
    pub slots: SlotCatalog,
    pub last_activity: DateTime<Utc>,
    transcript: VecDeque<Turn>,
    transcript_capacity: usize,
}

impl Conversation {
    pub fn new(transcript_capacity: usize) -> Self {
        Self {
            step: Step::Start,
            name: String::new(),
            contact: String::new(),
            service_id: String::new(),
            date: String::new(),
            time: String::new(),
            services: ServiceCatalog::default(),
            slots: SlotCatalog::default(),
            last_activity: Utc::now(),
            transcript: VecDeque::new(),
            transcript_capacity: transcript_capacity.max(1),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn idle_for(&self, ttl: Duration) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Utc::now().signed_duration_since(self.last_activity) >= ttl
    }

    /// Appends one turn, discarding the oldest when the window overflows.
    pub fn record_turn(&mut self, role: Role, text: impl Into<String>) {
        if self.transcript.len() == self.transcript_capacity {
            self.transcript.pop_front();
        }
        self.transcript.push_back(Turn { role, text: text.into() });
    }

    pub fn transcript(&self) -> impl Iterator<Item = &Turn> {
        self.transcript.iter()
    }

    pub fn transcript_window(&self) -> Vec<Turn> {
        self.transcript.iter().cloned().collect()
    }
}

//! Summarization Engine interface (C7): the schema, prompt-output
//! sanitization, idempotency keying, and debug-event ring that GCB/PO
//! consume as a source of "fact constraints". The actual LLM call and
//! durable storage backend are external collaborators; this module only
//! defines the contract and an in-memory reference implementation.


use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keyword::repair_mojibake;

/// `S4` (short-horizon) or `S60` (long-horizon) summary scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLevel {
    S4,
    S60,
}

impl SummaryLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SummaryLevel::S4 => "s4",
            SummaryLevel::S60 => "s60",
        }
    }
}

/// The required schema of a summary's JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SummaryFacts {
    pub goal: String,
    pub state: String,
    #[serde(default)]
    pub open_loops: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub tone_notes: Vec<String>,
}

/// A stored summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub session_id: String,
    pub scope_type: String,
    pub thread_id: String,
    pub memory_id: String,
    pub agent_id: String,
    pub level: SummaryLevel,
    pub summary_version: u32,
    pub from_turn: u32,
    pub to_turn: u32,
    pub summary: SummaryFacts,
    pub model: String,
    pub created_at: String,
}

impl Summary {
    /// `"{level}:{scope_type}:{thread_id}:{memory_id}:{agent_id}:{to_turn}:v{summary_version}"`.
    pub fn dedupe_key(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}:v{}",
            self.level.as_str(),
            self.scope_type,
            self.thread_id,
            self.memory_id,
            self.agent_id,
            self.to_turn,
            self.summary_version,
        )
    }

    fn identity_tuple(&self) -> (String, String, String, String, String, u32) {
        (
            self.session_id.clone(),
            self.scope_type.clone(),
            self.thread_id.clone(),
            self.memory_id.clone(),
            self.agent_id.clone(),
            self.to_turn,
        )
    }
}

/// Phrases indicating the transcript actually contains a help-seeking
/// cue; absent any of these, speculative financial-help phrases are
/// stripped from summary prose by [`sanitize_summary_facts`].
const HELP_SEEKING_CUES: &[&str] = &["能帮我", "可以帮我", "需要帮助", "帮帮我", "求助", "救命"];

/// Phrases that speculate about offering financial help — only
/// meaningful when the transcript actually asked for help.
const SPECULATIVE_FINANCIAL_HELP_PHRASES: &[&str] =
    &["可以借钱给你", "帮你还钱", "给你打钱", "资助你", "提供资金帮助"];

/// Strip speculative financial-help phrases from every prose field when
/// `transcript` contains no help-seeking cue, then mojibake-repair every
/// string field.
pub fn sanitize_summary_facts(mut facts: SummaryFacts, transcript: &str) -> SummaryFacts {
    let has_help_cue = HELP_SEEKING_CUES.iter().any(|cue| transcript.contains(cue));

    let strip = |text: &str| -> String {
        if has_help_cue {
            return text.to_string();
        }
        let mut cleaned = text.to_string();
        for phrase in SPECULATIVE_FINANCIAL_HELP_PHRASES {
            cleaned = cleaned.replace(phrase, "");
        }
        cleaned
    };

    facts.goal = repair_mojibake(&strip(&facts.goal));
    facts.state = repair_mojibake(&strip(&facts.state));
    facts.open_loops = facts.open_loops.iter().map(|s| repair_mojibake(&strip(s))).collect();
    facts.constraints = facts.constraints.iter().map(|s| repair_mojibake(&strip(s))).collect();
    facts.tone_notes = facts.tone_notes.iter().map(|s| repair_mojibake(&strip(s))).collect();
    facts
}

/// Parse an LLM's raw summary output; any JSON decode failure is
/// non-fatal and yields the default (empty) schema record.
pub fn parse_summary_facts(raw_json: &str) -> SummaryFacts {
    serde_json::from_str(raw_json).unwrap_or_default()
}

/// Durable store of summary rows, as consumed by GCB/PO. The real
/// backend is an external collaborator; [`InMemorySummaryStore`] is a
/// reference implementation for tests and local runs.
#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Latest S4 and S60 rows for `session_id`, ordered by `to_turn`
    /// descending, at most one each.
    async fn latest_summaries(&self, session_id: &str) -> (Option<Summary>, Option<Summary>);

    /// Insert `summary` unless a row with the same identity tuple
    /// already exists. Returns whether it was actually inserted.
    async fn insert_if_absent(&self, summary: Summary) -> bool;
}

/// Failure recording a completed turn with a [`TurnSink`].
#[derive(Debug, Error)]
pub enum TurnSinkError {
    /// The durable turn/summarization backend rejected or failed the write.
    #[error("failed to persist turn: {0}")]
    Persistence(String),
}

/// A sink that receives completed user/assistant turns and is
/// responsible for firing periodic S4/S60 summarization runs.
#[async_trait]
pub trait TurnSink: Send + Sync {
    async fn record_turn(&self, session_id: &str, user_text: &str, assistant_text: &str) -> Result<(), TurnSinkError>;
}

/// In-process [`SummaryStore`] used for tests and single-node runs.
#[derive(Default)]
pub struct InMemorySummaryStore {
    rows: Mutex<Vec<Summary>>,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn latest_summaries(&self, session_id: &str) -> (Option<Summary>, Option<Summary>) {
        let rows = self.rows.lock();
        let latest_for = |level: SummaryLevel| {
            rows.iter()
                .filter(|s| s.session_id == session_id && s.level == level)
                .max_by_key(|s| s.to_turn)
                .cloned()
        };
        (latest_for(SummaryLevel::S4), latest_for(SummaryLevel::S60))
    }

    async fn insert_if_absent(&self, summary: Summary) -> bool {
        let mut rows = self.rows.lock();
        let exists = rows.iter().any(|s| s.identity_tuple() == summary.identity_tuple());
        if exists {
            return false;
        }
        rows.push(summary);
        true
    }
}

/// A [`TurnSink`] that discards turns — used where persistence is
/// handled out-of-core and GCB/PO only need the trait object to exist.
#[derive(Default)]
pub struct NullTurnSink;

#[async_trait]
impl TurnSink for NullTurnSink {
    async fn record_turn(&self, _session_id: &str, _user_text: &str, _assistant_text: &str) -> Result<(), TurnSinkError> {
        Ok(())
    }
}

/// One entry in the bounded summarization debug ring.
#[derive(Debug, Clone, Serialize)]
pub struct DebugEvent {
    pub ts: i64,
    pub session_id: String,
    pub message: String,
}

/// Bounded (capacity 200), append-only FIFO of debug events. Exposes
/// only a "snapshot last N" read — never an open-ended stream.
pub struct DebugEventRing {
    capacity: usize,
    events: Mutex<VecDeque<DebugEvent>>,
}

impl DebugEventRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, event: DebugEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// The most recent `n` events, oldest first.
    pub fn snapshot_last(&self, n: usize) -> Vec<DebugEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(n);
        events.iter().skip(skip).cloned().collect()
    }
}

impl Default for DebugEventRing {
    fn default() -> Self {
        Self::new(200)
    }
}

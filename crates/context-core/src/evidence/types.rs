//! Unified evidence schema shared by every retrieval candidate source.

use serde::{Deserialize, Serialize};

/// Where an [`EvidenceRecord`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    CurrentInput,
    S4,
    S60,
    Keyword,
    Vector,
    Fallback,
}

impl SourceType {
    /// Fixed type-boost table from the scoring design.
    pub fn type_boost(self) -> f64 {
        match self {
            SourceType::CurrentInput => 1.3,
            SourceType::S4 => 1.2,
            SourceType::S60 => 1.1,
            SourceType::Keyword | SourceType::Vector => 1.0,
            SourceType::Fallback => 0.6,
        }
    }

    /// Fixed source-priority table used as the scoring tie-breaker.
    pub fn source_priority(self) -> i64 {
        match self {
            SourceType::CurrentInput => 4,
            SourceType::S4 => 3,
            SourceType::S60 => 2,
            SourceType::Keyword | SourceType::Vector | SourceType::Fallback => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::CurrentInput => "current_input",
            SourceType::S4 => "s4",
            SourceType::S60 => "s60",
            SourceType::Keyword => "keyword",
            SourceType::Vector => "vector",
            SourceType::Fallback => "fallback",
        }
    }
}

/// The four raw score components that compose `score_final`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRaw {
    pub keyword: f64,
    pub vector: f64,
    pub recency: f64,
    pub type_boost: f64,
}

impl ScoreRaw {
    /// `0.40*keyword + 0.40*vector + 0.10*recency + 0.10*type_boost`.
    pub fn weighted_final(&self) -> f64 {
        0.40 * self.keyword + 0.40 * self.vector + 0.10 * self.recency + 0.10 * self.type_boost
    }
}

/// A compressed reference to a record merged into a surviving keeper
/// during post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRef {
    pub id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub chunk_id: Option<String>,
    pub score_final: f64,
    pub reason: String,
}

/// Evidence metadata: provenance plus whatever got folded into this
/// record during deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMeta {
    pub source_name: String,
    pub chunk_id: Option<String>,
    pub source_priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicates: Option<Vec<DuplicateRef>>,
}

/// A single scored, citable piece of retrieval context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub source_type: SourceType,
    pub source_id: String,
    pub text: String,
    pub score_raw: ScoreRaw,
    pub score_final: f64,
    pub reason: String,
    pub ts: i64,
    pub meta: EvidenceMeta,
}

impl EvidenceRecord {
    /// Recompute `score_final` from `score_raw`, rounded to 6 decimals.
    pub fn rescored(mut self) -> Self {
        self.score_final = round6(self.score_raw.weighted_final());
        self
    }

    fn duplicate_ref(&self) -> DuplicateRef {
        DuplicateRef {
            id: self.id.clone(),
            source_type: self.source_type,
            source_id: self.source_id.clone(),
            chunk_id: self.meta.chunk_id.clone(),
            score_final: self.score_final,
            reason: self.reason.clone(),
        }
    }

    /// Fold `loser` into `self.meta.duplicates`, carrying over any
    /// duplicates the loser itself had already accumulated.
    pub fn absorb(&mut self, loser: &EvidenceRecord) {
        let entries = self.meta.duplicates.get_or_insert_with(Vec::new);
        entries.push(loser.duplicate_ref());
        if let Some(nested) = &loser.meta.duplicates {
            entries.extend(nested.iter().cloned());
        }
    }
}

/// Round to 6 decimal places, matching the spec's `score_final` contract.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// `none | weak | strong` — how confidently retrieval supports the
/// upcoming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundingMode {
    None,
    Weak,
    Strong,
}

impl GroundingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GroundingMode::None => "none",
            GroundingMode::Weak => "weak",
            GroundingMode::Strong => "strong",
        }
    }
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::ids::TaskKind;

/// Inbound request to synthesize a proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalRequest {
    /// The high-level topic. Must be at least 10 characters.
    pub topic: String,
    /// Optional hints the agents should weave in. May be empty.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Loosely typed preferences (`max_parallel_tasks`, per-node overrides, ...).
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,
    /// Optional author name for the front matter.
    #[serde(default)]
    pub author: Option<String>,
    /// Optional institution for the front matter.
    #[serde(default)]
    pub institution: Option<String>,
    /// Optional department for the front matter.
    #[serde(default)]
    pub department: Option<String>,
}

/// Error returned when a [`ProposalRequest`] fails intake validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestValidationError {
    /// `topic` was shorter than the required minimum.
    #[error("topic must be at least {min} characters, got {actual}")]
    TopicTooShort {
        /// Minimum required length.
        min: usize,
        /// Actual length observed.
        actual: usize,
    },
}

const MIN_TOPIC_LEN: usize = 10;

impl ProposalRequest {
    /// Validates the request. `key_points == []` is explicitly accepted.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.topic.chars().count() < MIN_TOPIC_LEN {
            return Err(RequestValidationError::TopicTooShort {
                min: MIN_TOPIC_LEN,
                actual: self.topic.chars().count(),
            });
        }
        Ok(())
    }

    /// Reads `preferences.max_parallel_tasks`, falling back to `default`.
    pub fn max_parallel_tasks(&self, default: usize) -> usize {
        self.preferences
            .get("max_parallel_tasks")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(default)
    }
}

/// The view of the world handed to an agent at dispatch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    /// The job's topic, copied from the request.
    pub topic: String,
    /// The job's key points, copied from the request.
    pub key_points: Vec<String>,
    /// The job's preferences, copied from the request.
    pub preferences: HashMap<String, serde_json::Value>,
    /// Exactly the outputs of this task's declared dependencies, no more.
    pub dependency_outputs: HashMap<TaskKind, AgentOutput>,
}

impl AgentInput {
    /// Fetches and deserializes a dependency's output, or a validation error
    /// naming the missing kind.
    pub fn require(&self, kind: TaskKind) -> Result<&AgentOutput, crate::ForgeError> {
        self.dependency_outputs
            .get(&kind)
            .ok_or_else(|| crate::ForgeError::validation(format!("missing dependency: {kind}")))
    }
}

/// Free-form typed blob specific to a `TaskKind`; opaque to the scheduler.
///
/// Represented as a JSON value so the scheduler and state store never need
/// per-kind knowledge; concrete agents build/read their own typed view via
/// `serde_json::from_value`/`to_value` over [`AgentOutput::as_value`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentOutput(pub serde_json::Value);

impl AgentOutput {
    /// Wraps any serializable payload as an agent output.
    pub fn new(value: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self(serde_json::to_value(value)?))
    }

    /// Borrows the underlying JSON value.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Approximates this output's word count from its `metadata.word_count`
    /// field, or by counting words in a top-level `content` string.
    pub fn word_count(&self) -> u64 {
        if let Some(count) = self.0.pointer("/metadata/word_count").and_then(|v| v.as_u64()) {
            return count;
        }
        self.0
            .get("content")
            .and_then(|v| v.as_str())
            .map(|s| s.split_whitespace().count() as u64)
            .unwrap_or(0)
    }
}

/// A normalized literature record returned by a source connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paper {
    /// Source-scoped identifier (opaque).
    pub paper_id: String,
    /// Paper title as published.
    pub title: String,
    /// Author names, in publication order.
    pub authors: Vec<String>,
    /// Publication year, if known.
    #[serde(default)]
    pub year: Option<i32>,
    /// Abstract text.
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    /// Venue (journal/conference) name.
    #[serde(default)]
    pub venue: String,
    /// Citation count as reported by the source.
    #[serde(default)]
    pub citation_count: u64,
    /// Digital Object Identifier, if known.
    #[serde(default)]
    pub doi: Option<String>,
    /// Canonical URL for the paper.
    pub url: String,
    /// Name of the source connector that produced this record.
    pub source: String,
}

impl Paper {
    /// Normalizes the title for identity comparison: Unicode NFKC, casefold,
    /// whitespace collapse.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }

    /// Case-folded DOI, if present, for identity comparison.
    pub fn normalized_doi(&self) -> Option<String> {
        self.doi.as_ref().map(|d| d.to_lowercase())
    }

    /// Two papers are the same iff their normalized titles match or their
    /// DOIs match (case-folded exact match).
    pub fn same_as(&self, other: &Paper) -> bool {
        if let (Some(a), Some(b)) = (self.normalized_doi(), other.normalized_doi()) {
            if a == b {
                return true;
            }
        }
        self.normalized_title() == other.normalized_title()
    }
}

/// Normalizes a title for deduplication: Unicode NFKC, casefold, then
/// collapse internal whitespace runs to single spaces and trim the ends.
pub fn normalize_title(title: &str) -> String {
    let nfkc: String = title.nfkc().collect();
    let folded = nfkc.to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deduplicates a list of papers per the normalized-title-or-DOI identity
/// rule, keeping the first occurrence of each distinct paper.
pub fn dedupe_papers(papers: Vec<Paper>) -> Vec<Paper> {
    let mut kept: Vec<Paper> = Vec::with_capacity(papers.len());
    for paper in papers {
        if !kept.iter().any(|existing| existing.same_as(&paper)) {
            kept.push(paper);
        }
    }
    kept
}

/// A section of the assembled proposal, possibly nested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Section heading.
    pub title: String,
    /// Section body text.
    pub content: String,
    /// Nested subsections, in document order.
    #[serde(default)]
    pub subsections: Vec<Section>,
    /// Word count, derived from `content` (and subsections); not
    /// independently authoritative.
    pub word_count: u64,
}

impl Section {
    /// Builds a section, deriving `word_count` from `content` plus the
    /// recursive word counts of its subsections.
    pub fn new(title: impl Into<String>, content: impl Into<String>, subsections: Vec<Section>) -> Self {
        let content = content.into();
        let own_count = content.split_whitespace().count() as u64;
        let word_count = own_count + subsections.iter().map(|s| s.word_count).sum::<u64>();
        Self {
            title: title.into(),
            content,
            subsections,
            word_count,
        }
    }
}

/// A formatted bibliography entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    /// Author names.
    pub authors: Vec<String>,
    /// Publication year.
    pub year: Option<i32>,
    /// Paper/work title.
    pub title: String,
    /// Venue name.
    pub venue: String,
    /// Digital Object Identifier, if known.
    #[serde(default)]
    pub doi: Option<String>,
    /// Canonical URL.
    pub url: String,
    /// Fully formatted bibliography entry string.
    pub formatted: String,
    /// In-text citation form, e.g. `"(Smith, 2023)"`.
    pub in_text: String,
}

/// Terminal metadata attached to an assembled proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalMetadata {
    /// The original request topic.
    pub topic: String,
    /// Sum of every section's word count.
    pub total_word_count: u64,
    /// Every task kind whose output contributed to this proposal.
    pub agents_involved: Vec<TaskKind>,
}

/// The terminal artifact produced by a successful job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Identifier correlating this proposal to its originating request.
    pub request_id: String,
    /// Summary metadata.
    pub metadata: ProposalMetadata,
    /// Document sections, in fixed assembly order.
    pub sections: Vec<Section>,
    /// Bibliography.
    pub references: Vec<Reference>,
    /// Free-form appendix content.
    #[serde(default)]
    pub appendices: Vec<Section>,
    /// Optional validation/QA summary, if the `qa` task ran.
    #[serde(default)]
    pub validation: Option<serde_json::Value>,
    /// Timestamp at which the assembler produced this record.
    pub assembled_at: DateTime<Utc>,
}

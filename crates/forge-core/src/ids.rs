use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for one job (one execution of the pipeline for one
/// [`crate::ProposalRequest`]). Unique per process lifetime, immutable once
/// assigned at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a new, unique job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The closed, build-time-known set of agent roles.
///
/// Each variant corresponds to exactly one node kind in the canonical task
/// graph (see the orchestrator crate's graph construction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Literature review: fans out to source connectors, deduplicates papers.
    Literature,
    /// Introduction section: problem statement, objectives, research questions.
    Introduction,
    /// Research methodology: design, procedures, ethical considerations.
    Methodology,
    /// Advisory quality review consumed by formatting and assembly.
    Qa,
    /// Diagram generation (mermaid) for the methodology/results.
    Visualization,
    /// Reference list and citation formatting.
    References,
    /// Document-wide structure and formatting metadata.
    Formatting,
    /// Abstract, keywords, and other front-matter content.
    FrontMatter,
    /// Final reshaping into the terminal `Proposal`.
    Assembly,
    /// Risk register for the proposed work.
    Risk,
    /// Budget/timeline optimization recommendations.
    Optimizer,
}

impl TaskKind {
    /// All eleven kinds, in a stable (alphabetical-ish, deterministic) order.
    pub const ALL: [TaskKind; 11] = [
        TaskKind::Literature,
        TaskKind::Introduction,
        TaskKind::Methodology,
        TaskKind::Qa,
        TaskKind::Visualization,
        TaskKind::References,
        TaskKind::Formatting,
        TaskKind::FrontMatter,
        TaskKind::Assembly,
        TaskKind::Risk,
        TaskKind::Optimizer,
    ];

    /// Iterates over every kind in the closed set.
    pub fn iter() -> impl Iterator<Item = TaskKind> {
        Self::ALL.into_iter()
    }

    /// The wire/key-layout string form, e.g. `"front_matter"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Literature => "literature",
            TaskKind::Introduction => "introduction",
            TaskKind::Methodology => "methodology",
            TaskKind::Qa => "qa",
            TaskKind::Visualization => "visualization",
            TaskKind::References => "references",
            TaskKind::Formatting => "formatting",
            TaskKind::FrontMatter => "front_matter",
            TaskKind::Assembly => "assembly",
            TaskKind::Risk => "risk",
            TaskKind::Optimizer => "optimizer",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unrecognized [`TaskKind`] string.
#[derive(Debug, thiserror::Error)]
#[error("unknown task kind: {0}")]
pub struct UnknownTaskKind(pub String);

impl FromStr for TaskKind {
    type Err = UnknownTaskKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "literature" => Ok(TaskKind::Literature),
            "introduction" => Ok(TaskKind::Introduction),
            "methodology" => Ok(TaskKind::Methodology),
            "qa" => Ok(TaskKind::Qa),
            "visualization" => Ok(TaskKind::Visualization),
            "references" => Ok(TaskKind::References),
            "formatting" => Ok(TaskKind::Formatting),
            "front_matter" => Ok(TaskKind::FrontMatter),
            "assembly" => Ok(TaskKind::Assembly),
            "risk" => Ok(TaskKind::Risk),
            "optimizer" => Ok(TaskKind::Optimizer),
            other => Err(UnknownTaskKind(other.to_string())),
        }
    }
}

/// Task identifier, unique within a job: `"{JobId}:{TaskKind}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Builds the task id for a given job and kind.
    pub fn new(job_id: JobId, kind: TaskKind) -> Self {
        Self(format!("{job_id}:{kind}"))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

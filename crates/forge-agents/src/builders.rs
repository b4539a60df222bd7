use std::sync::Arc;

use forge_core::TaskKind;

use crate::agent::Agent;
use crate::assembly_agent::AssemblyAgent;
use crate::literature_agent::LiteratureAgent;
use crate::llm_agent::LlmAgent;
use crate::prompts::*;
use crate::references_agent::ReferencesAgent;

/// Builds one concrete agent per [`TaskKind`], wired with the canonical
/// dependency edges. This is the set an [`crate::AgentRegistry`] is normally
/// built from.
pub fn default_agents() -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(LiteratureAgent::new(LITERATURE_PROMPT, 10)),
        Arc::new(LlmAgent::new(
            TaskKind::Introduction,
            INTRODUCTION_PROMPT,
            &[TaskKind::Literature],
            0.5,
            900,
        )),
        Arc::new(LlmAgent::new(
            TaskKind::Methodology,
            METHODOLOGY_PROMPT,
            &[TaskKind::Introduction],
            0.4,
            900,
        )),
        Arc::new(LlmAgent::new(
            TaskKind::Risk,
            RISK_PROMPT,
            &[TaskKind::Methodology],
            0.3,
            500,
        )),
        Arc::new(LlmAgent::new(
            TaskKind::Optimizer,
            OPTIMIZER_PROMPT,
            &[TaskKind::Methodology, TaskKind::Introduction],
            0.4,
            500,
        )),
        Arc::new(LlmAgent::new(
            TaskKind::Visualization,
            VISUALIZATION_PROMPT,
            &[TaskKind::Methodology],
            0.3,
            600,
        )),
        Arc::new(LlmAgent::new(
            TaskKind::Qa,
            QA_PROMPT,
            &[
                TaskKind::Introduction,
                TaskKind::Literature,
                TaskKind::Methodology,
                TaskKind::Risk,
            ],
            0.2,
            500,
        )),
        Arc::new(ReferencesAgent::new(REFERENCES_PROMPT)),
        Arc::new(LlmAgent::new(
            TaskKind::FrontMatter,
            FRONT_MATTER_PROMPT,
            &[
                TaskKind::Introduction,
                TaskKind::Literature,
                TaskKind::Methodology,
                TaskKind::Visualization,
            ],
            0.4,
            500,
        )),
        Arc::new(LlmAgent::new(
            TaskKind::Formatting,
            FORMATTING_PROMPT,
            &[
                TaskKind::FrontMatter,
                TaskKind::Introduction,
                TaskKind::Literature,
                TaskKind::Methodology,
                TaskKind::Visualization,
                TaskKind::Risk,
                TaskKind::References,
                TaskKind::Qa,
            ],
            0.1,
            400,
        )),
        Arc::new(AssemblyAgent),
    ]
}

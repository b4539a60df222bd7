use async_trait::async_trait;
use forge_core::{AgentInput, AgentOutput, ForgeError, Proposal, ProposalMetadata, Reference, Section, TaskKind};
use forge_store::task_output_key;
use tracing::info;

use crate::agent::Agent;
use crate::context::JobContext;

/// The sink of the task graph. Unlike every other agent, `assembly` reads
/// every completed task's output straight from the state store rather than
/// through `AgentInput::dependency_outputs` — its one graph dependency is
/// `formatting`, but the proposal it builds draws on the whole job, so it
/// looks those outputs up by their well-known keys instead of widening its
/// declared dependency edge.
pub struct AssemblyAgent;

const SECTION_ORDER: [(TaskKind, &str); 6] = [
    (TaskKind::FrontMatter, "Front Matter"),
    (TaskKind::Introduction, "Introduction"),
    (TaskKind::Literature, "Literature Review"),
    (TaskKind::Methodology, "Methodology"),
    (TaskKind::Visualization, "Visualizations"),
    (TaskKind::Risk, "Risk Assessment"),
];

#[async_trait]
impl Agent for AssemblyAgent {
    fn kind(&self) -> TaskKind {
        TaskKind::Assembly
    }

    fn validate_input(&self, input: &AgentInput) -> Result<(), ForgeError> {
        input.require(TaskKind::Formatting)?;
        Ok(())
    }

    async fn execute(&self, input: AgentInput, ctx: &JobContext) -> Result<AgentOutput, ForgeError> {
        if ctx.cancellation.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }

        // `formatting` is our only declared dependency; everything else is
        // read directly because the proposal needs the whole job, not just
        // what one graph edge carries.
        let _formatting = input.require(TaskKind::Formatting)?;

        let mut sections = Vec::new();
        let mut agents_involved = Vec::new();
        let mut total_word_count: u64 = 0;

        for (kind, title) in SECTION_ORDER {
            let Some(output) = self.fetch(ctx, kind).await? else {
                continue;
            };
            let content = output
                .as_value()
                .get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            total_word_count += output.word_count();
            agents_involved.push(kind);
            sections.push(Section::new(title, content, vec![]));
        }

        let references = if let Some(refs_output) = self.fetch(ctx, TaskKind::References).await? {
            agents_involved.push(TaskKind::References);
            total_word_count += refs_output.word_count();
            refs_output
                .as_value()
                .get("references")
                .cloned()
                .map(serde_json::from_value::<Vec<Reference>>)
                .transpose()?
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let validation = self
            .fetch(ctx, TaskKind::Qa)
            .await?
            .inspect(|_| agents_involved.push(TaskKind::Qa))
            .map(|o| o.as_value().clone());

        if let Some(formatting) = self.fetch(ctx, TaskKind::Formatting).await? {
            agents_involved.push(TaskKind::Formatting);
            total_word_count += formatting.word_count();
        }

        info!(sections = sections.len(), total_word_count, "assembling proposal");

        let proposal = Proposal {
            request_id: ctx.job_id.to_string(),
            metadata: ProposalMetadata {
                topic: input.topic.clone(),
                total_word_count,
                agents_involved,
            },
            sections,
            references,
            appendices: Vec::new(),
            validation,
            assembled_at: chrono::Utc::now(),
        };

        AgentOutput::new(proposal).map_err(ForgeError::from)
    }
}

impl AssemblyAgent {
    async fn fetch(&self, ctx: &JobContext, kind: TaskKind) -> Result<Option<AgentOutput>, ForgeError> {
        let key = task_output_key(ctx.job_id, kind);
        let stored = ctx
            .store
            .get(&key)
            .await
            .map_err(|e| ForgeError::Internal(e.to_string()))?;
        Ok(stored.map(AgentOutput))
    }
}

use async_trait::async_trait;
use forge_core::{dedupe_papers, AgentInput, AgentOutput, ForgeError, Paper, TaskKind};
use serde_json::json;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::context::JobContext;

/// The sole root of the task graph. Fans out to every configured source
/// connector in parallel, deduplicates the combined result set, and asks the
/// gateway for a short literature-review narrative over the surviving
/// papers.
pub struct LiteratureAgent {
    system_prompt: &'static str,
    results_per_source: usize,
}

impl LiteratureAgent {
    pub fn new(system_prompt: &'static str, results_per_source: usize) -> Self {
        Self {
            system_prompt,
            results_per_source,
        }
    }
}

#[async_trait]
impl Agent for LiteratureAgent {
    fn kind(&self) -> TaskKind {
        TaskKind::Literature
    }

    fn validate_input(&self, _input: &AgentInput) -> Result<(), ForgeError> {
        Ok(())
    }

    async fn execute(&self, input: AgentInput, ctx: &JobContext) -> Result<AgentOutput, ForgeError> {
        if ctx.cancellation.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }

        let filters = json!({});
        let mut papers: Vec<Paper> = Vec::new();
        for (name, connector) in ctx.sources.iter() {
            match connector.search(&input.topic, self.results_per_source, &filters, true).await {
                Ok(found) => papers.extend(found),
                Err(err) => warn!(source = %name, error = %err, "source connector failed, continuing with other sources"),
            }
        }
        let papers = dedupe_papers(papers);
        info!(papers_found = papers.len(), "literature search complete");

        let summary_prompt = format!(
            "Topic: {}\nKey points: {}\n{} papers found: {}\n",
            input.topic,
            input.key_points.join("; "),
            papers.len(),
            papers
                .iter()
                .map(|p| p.title.clone())
                .collect::<Vec<_>>()
                .join("; ")
        );
        let content = ctx
            .llm
            .generate(&summary_prompt, Some(self.system_prompt), Some(1200), Some(0.4))
            .await?;

        let word_count = content.split_whitespace().count();
        AgentOutput::new(json!({
            "content": content,
            "subsections": [],
            "papers_reviewed": papers.len(),
            "papers": papers,
            "research_gaps": [],
            "citations": papers.iter().map(|p| p.paper_id.clone()).collect::<Vec<_>>(),
            "metadata": { "word_count": word_count, "kind": "literature" },
        }))
        .map_err(ForgeError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use forge_llm::{GatewayConfig, LlmGateway};
    use forge_sources::{MockSourceConnector, SourceConnector};
    use forge_store::InMemoryStateStore;
    use tokio_util::sync::CancellationToken;

    fn ctx(sources: HashMap<String, Arc<dyn SourceConnector>>) -> JobContext {
        JobContext::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(LlmGateway::new(GatewayConfig::default())),
            Arc::new(sources),
            forge_core::JobId::new(),
            CancellationToken::new(),
        )
    }

    fn input() -> AgentInput {
        AgentInput {
            topic: "The effects of microgravity on cell division".to_string(),
            key_points: vec![],
            preferences: HashMap::new(),
            dependency_outputs: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_source_and_dedupes() {
        let mut sources: HashMap<String, Arc<dyn SourceConnector>> = HashMap::new();
        sources.insert("arxiv".to_string(), Arc::new(MockSourceConnector::new("arxiv")));
        sources.insert("pubmed".to_string(), Arc::new(MockSourceConnector::new("pubmed")));
        let agent = LiteratureAgent::new("prompt", 3);
        let output = agent.execute(input(), &ctx(sources)).await.unwrap();
        let papers_reviewed = output.as_value().get("papers_reviewed").and_then(|v| v.as_u64()).unwrap();
        assert_eq!(papers_reviewed, 6);
    }

    #[tokio::test]
    async fn a_failing_connector_does_not_fail_the_whole_search() {
        struct Failing;
        #[async_trait]
        impl forge_sources::SourceConnector for Failing {
            fn name(&self) -> &str {
                "flaky"
            }
            async fn search(
                &self,
                _query: &str,
                _limit: usize,
                _filters: &serde_json::Value,
                _use_cache: bool,
            ) -> Result<Vec<Paper>, ForgeError> {
                Err(ForgeError::permanent("upstream down"))
            }
            async fn get(&self, _paper_id: &str, _use_cache: bool) -> Result<Paper, ForgeError> {
                Err(ForgeError::permanent("upstream down"))
            }
            async fn health(&self) -> forge_sources::HealthStatus {
                forge_sources::HealthStatus {
                    source: "flaky".to_string(),
                    healthy: false,
                }
            }
        }

        let mut sources: HashMap<String, Arc<dyn SourceConnector>> = HashMap::new();
        sources.insert("flaky".to_string(), Arc::new(Failing));
        sources.insert("arxiv".to_string(), Arc::new(MockSourceConnector::new("arxiv")));
        let agent = LiteratureAgent::new("prompt", 3);
        let output = agent.execute(input(), &ctx(sources)).await.unwrap();
        let papers_reviewed = output.as_value().get("papers_reviewed").and_then(|v| v.as_u64()).unwrap();
        assert_eq!(papers_reviewed, 3);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_any_search() {
        let ctx = ctx(HashMap::new());
        ctx.cancellation.cancel();
        let agent = LiteratureAgent::new("prompt", 3);
        let err = agent.execute(input(), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::Cancelled);
    }
}

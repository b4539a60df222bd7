use async_trait::async_trait;
use forge_core::{AgentInput, AgentOutput, ForgeError, Paper, Reference, TaskKind};
use serde_json::json;

use crate::agent::Agent;
use crate::context::JobContext;

/// Builds the bibliography deterministically from `literature`'s deduplicated
/// paper list, then asks the gateway for a short formatted citation block.
pub struct ReferencesAgent {
    system_prompt: &'static str,
}

impl ReferencesAgent {
    pub fn new(system_prompt: &'static str) -> Self {
        Self { system_prompt }
    }
}

#[async_trait]
impl Agent for ReferencesAgent {
    fn kind(&self) -> TaskKind {
        TaskKind::References
    }

    fn validate_input(&self, input: &AgentInput) -> Result<(), ForgeError> {
        input.require(TaskKind::Literature)?;
        Ok(())
    }

    async fn execute(&self, input: AgentInput, ctx: &JobContext) -> Result<AgentOutput, ForgeError> {
        if ctx.cancellation.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }

        let literature = input.require(TaskKind::Literature)?;
        let papers: Vec<Paper> = literature
            .as_value()
            .get("papers")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        let references: Vec<Reference> = papers
            .iter()
            .map(|p| {
                let year_str = p.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
                let first_author = p.authors.first().cloned().unwrap_or_else(|| "Anonymous".to_string());
                Reference {
                    authors: p.authors.clone(),
                    year: p.year,
                    title: p.title.clone(),
                    venue: p.venue.clone(),
                    doi: p.doi.clone(),
                    url: p.url.clone(),
                    formatted: format!("{} ({}). {}. {}.", p.authors.join(", "), year_str, p.title, p.venue),
                    in_text: format!("({}, {})", first_author, year_str),
                }
            })
            .collect();

        let prompt = format!(
            "Format the following {} references for the bibliography section:\n{}",
            references.len(),
            references.iter().map(|r| r.formatted.clone()).collect::<Vec<_>>().join("\n")
        );
        let content = ctx
            .llm
            .generate(&prompt, Some(self.system_prompt), Some(600), Some(0.1))
            .await?;

        let word_count = content.split_whitespace().count();
        AgentOutput::new(json!({
            "content": content,
            "references": references,
            "metadata": { "word_count": word_count, "kind": "references" },
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
    use forge_store::InMemoryStateStore;
    use tokio_util::sync::CancellationToken;

    fn ctx() -> JobContext {
        JobContext::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(LlmGateway::new(GatewayConfig::default())),
            Arc::new(HashMap::new()),
            forge_core::JobId::new(),
            CancellationToken::new(),
        )
    }

    fn paper(title: &str, author: &str, year: i32) -> Paper {
        Paper {
            paper_id: title.to_string(),
            title: title.to_string(),
            authors: vec![author.to_string()],
            year: Some(year),
            abstract_text: String::new(),
            venue: "Journal of Tests".to_string(),
            citation_count: 0,
            doi: None,
            url: "https://example.test".to_string(),
            source: "mock".to_string(),
        }
    }

    fn input(papers: Vec<Paper>) -> AgentInput {
        let literature = AgentOutput::new(json!({ "papers": papers })).unwrap();
        AgentInput {
            topic: "Microgravity and cell division".to_string(),
            key_points: vec![],
            preferences: HashMap::new(),
            dependency_outputs: [(TaskKind::Literature, literature)].into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn missing_literature_is_a_validation_error() {
        let agent = ReferencesAgent::new("prompt");
        let input = AgentInput {
            topic: "x".to_string(),
            key_points: vec![],
            preferences: HashMap::new(),
            dependency_outputs: HashMap::new(),
        };
        let err = agent.execute(input, &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn builds_one_reference_per_paper_with_computed_citation_forms() {
        let agent = ReferencesAgent::new("prompt");
        let output = agent
            .execute(input(vec![paper("Deep Learning Methods", "A. Smith", 2023)]), &ctx())
            .await
            .unwrap();
        let references: Vec<Reference> = serde_json::from_value(output.as_value()["references"].clone()).unwrap();
        assert_eq!(references.len(), 1);
        assert_eq!(references[0].in_text, "(A. Smith, 2023)");
        assert!(references[0].formatted.contains("Deep Learning Methods"));
    }
}

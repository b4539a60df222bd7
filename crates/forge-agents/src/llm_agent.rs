use async_trait::async_trait;
use forge_core::{AgentInput, AgentOutput, ForgeError, TaskKind};
use serde_json::json;
use tracing::info;

use crate::agent::Agent;
use crate::context::JobContext;

/// A worker whose entire job is one prompt to the LLM gateway: build a
/// prompt from the topic, key points, and upstream dependency output, send
/// it, and wrap the response as this task kind's output.
///
/// Covers every task kind except `literature` (which also queries source
/// connectors) and `assembly` (a pure function with no LLM call of its own).
pub struct LlmAgent {
    kind: TaskKind,
    system_prompt: &'static str,
    required_deps: &'static [TaskKind],
    temperature: f32,
    max_tokens: u32,
}

impl LlmAgent {
    pub fn new(
        kind: TaskKind,
        system_prompt: &'static str,
        required_deps: &'static [TaskKind],
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            kind,
            system_prompt,
            required_deps,
            temperature,
            max_tokens,
        }
    }

    fn build_prompt(&self, input: &AgentInput) -> Result<String, ForgeError> {
        let mut prompt = format!(
            "Topic: {}\nKey points: {}\n",
            input.topic,
            input.key_points.join("; ")
        );
        for dep in self.required_deps {
            let output = input.require(*dep)?;
            prompt.push_str(&format!(
                "\n--- {} output ---\n{}\n",
                dep,
                output.as_value()
            ));
        }
        Ok(prompt)
    }
}

#[async_trait]
impl Agent for LlmAgent {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn validate_input(&self, input: &AgentInput) -> Result<(), ForgeError> {
        for dep in self.required_deps {
            input.require(*dep)?;
        }
        Ok(())
    }

    async fn execute(&self, input: AgentInput, ctx: &JobContext) -> Result<AgentOutput, ForgeError> {
        if ctx.cancellation.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }

        let prompt = self.build_prompt(&input)?;
        info!(kind = %self.kind, job_id = %ctx.job_id, "generating content");
        let content = ctx
            .llm
            .generate(&prompt, Some(self.system_prompt), Some(self.max_tokens), Some(self.temperature))
            .await?;

        let word_count = content.split_whitespace().count();
        AgentOutput::new(json!({
            "content": content,
            "subsections": [],
            "metadata": { "word_count": word_count, "kind": self.kind.as_str() },
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

    fn input(deps: Vec<(TaskKind, serde_json::Value)>) -> AgentInput {
        AgentInput {
            topic: "The effects of microgravity on cell division".to_string(),
            key_points: vec!["focus on stem cells".to_string()],
            preferences: HashMap::new(),
            dependency_outputs: deps
                .into_iter()
                .map(|(k, v)| (k, AgentOutput(v)))
                .collect(),
        }
    }

    #[tokio::test]
    async fn missing_dependency_is_a_validation_error() {
        let agent = LlmAgent::new(TaskKind::Methodology, "prompt", &[TaskKind::Introduction], 0.4, 200);
        let err = agent.execute(input(vec![]), &ctx()).await.unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn produces_content_with_word_count_metadata() {
        let agent = LlmAgent::new(TaskKind::Methodology, "prompt", &[TaskKind::Introduction], 0.4, 200);
        let output = agent
            .execute(
                input(vec![(TaskKind::Introduction, serde_json::json!({"content": "intro text"}))]),
                &ctx(),
            )
            .await
            .unwrap();
        assert!(output.as_value().get("content").is_some());
        assert!(output.word_count() > 0);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_any_call() {
        let agent = LlmAgent::new(TaskKind::Risk, "prompt", &[], 0.3, 200);
        let ctx = ctx();
        ctx.cancellation.cancel();
        let err = agent.execute(input(vec![]), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), forge_core::ErrorKind::Cancelled);
    }
}

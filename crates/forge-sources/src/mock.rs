use async_trait::async_trait;
use forge_core::{ForgeError, Paper};

use crate::connector::{HealthStatus, SearchFilters, SourceConnector};

/// Deterministic in-memory connector for tests and mock-mode runs. Returns a
/// small, stable set of synthetic papers derived from the query string so
/// repeated searches for the same query are byte-equal.
pub struct MockSourceConnector {
    name: String,
}

impl MockSourceConnector {
    /// Builds a mock connector that reports itself as `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl SourceConnector for MockSourceConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
        _filters: &SearchFilters,
        _use_cache: bool,
    ) -> Result<Vec<Paper>, ForgeError> {
        let count = limit.min(3);
        let papers = (0..count)
            .map(|i| Paper {
                paper_id: format!("{}-{}-{}", self.name, slug(query), i),
                title: format!("{query}: a study, part {}", i + 1),
                authors: vec!["A. Researcher".to_string()],
                year: Some(2023),
                abstract_text: format!("A synthetic abstract about {query}."),
                venue: format!("{} Proceedings", self.name),
                citation_count: (10 * (i as u64 + 1)),
                doi: Some(format!("10.1000/{}.{}", slug(query), i)),
                url: format!("https://example.test/{}/{}", self.name, i),
                source: self.name.clone(),
            })
            .collect();
        Ok(papers)
    }

    async fn get(&self, paper_id: &str, _use_cache: bool) -> Result<Paper, ForgeError> {
        Ok(Paper {
            paper_id: paper_id.to_string(),
            title: format!("Paper {paper_id}"),
            authors: vec!["A. Researcher".to_string()],
            year: Some(2023),
            abstract_text: String::new(),
            venue: format!("{} Proceedings", self.name),
            citation_count: 0,
            doi: None,
            url: format!("https://example.test/{}/{}", self.name, paper_id),
            source: self.name.clone(),
        })
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            source: self.name.clone(),
            healthy: true,
        }
    }
}

fn slug(query: &str) -> String {
    query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn search_is_deterministic_for_the_same_query() {
        let connector = MockSourceConnector::new("arxiv");
        let a = connector.search("deep learning", 3, &json!({}), false).await.unwrap();
        let b = connector.search("deep learning", 3, &json!({}), false).await.unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a[0].paper_id, b[0].paper_id);
    }

    #[tokio::test]
    async fn zero_limit_yields_empty_results() {
        let connector = MockSourceConnector::new("arxiv");
        let papers = connector.search("anything", 0, &json!({}), false).await.unwrap();
        assert!(papers.is_empty());
    }
}

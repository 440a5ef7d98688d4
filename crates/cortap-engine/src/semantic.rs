//! Semantic Retrieval Adapter
//!
//! Boundary to the external retrieval + generation service. The core treats
//! it as an opaque function: question (+ pass-through history) in, generated
//! answer and ranked passages out. Failures are not retried here — the
//! engine decides fallback behavior.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SemanticConfig;
use crate::error::EngineError;
use crate::types::HistoryTurn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPassage {
    pub text: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticAnswer {
    pub answer_text: String,
    #[serde(default)]
    pub ranked_passages: Vec<RankedPassage>,
}

#[async_trait]
pub trait SemanticRetriever: Send + Sync {
    async fn retrieve_and_generate(
        &self,
        question: &str,
        history: &[HistoryTurn],
    ) -> Result<SemanticAnswer, EngineError>;
}

/// HTTP-backed retriever. One POST per call; timeouts come from config and
/// the transport layer owns cancellation beyond that.
pub struct HttpSemanticRetriever {
    client: Client,
    endpoint: String,
    top_k: usize,
}

impl HttpSemanticRetriever {
    pub fn new(config: &SemanticConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| EngineError::SemanticBackend(format!("client build failed: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            top_k: config.top_k,
        })
    }

    /// Parse a response body as JSON, returning a clear error if the server
    /// returned HTML (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<SemanticAnswer, EngineError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            EngineError::SemanticBackend(format!(
                "failed to read response body from {}: {}",
                endpoint, e
            ))
        })?;

        let trimmed = body.trim_start();
        if trimmed.starts_with('<') || trimmed.starts_with("<!") {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(EngineError::SemanticBackend(format!(
                "endpoint {} returned HTML instead of JSON (HTTP {}): {}",
                endpoint, status, preview
            )));
        }

        serde_json::from_str::<SemanticAnswer>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            EngineError::SemanticBackend(format!(
                "failed to parse JSON from {} (HTTP {}): {}. Body: {}",
                endpoint, status, e, preview
            ))
        })
    }
}

#[async_trait]
impl SemanticRetriever for HttpSemanticRetriever {
    async fn retrieve_and_generate(
        &self,
        question: &str,
        history: &[HistoryTurn],
    ) -> Result<SemanticAnswer, EngineError> {
        let body = json!({
            "question": question,
            "history": history,
            "top_k": self.top_k,
        });

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EngineError::SemanticBackend(format!(
                    "request to {} failed: {}",
                    self.endpoint, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(EngineError::SemanticBackend(format!(
                "endpoint {} returned HTTP {}",
                self.endpoint,
                response.status()
            )));
        }

        let answer = Self::parse_json_response(response, &self.endpoint).await?;

        tracing::info!(
            latency_ms = start.elapsed().as_millis() as u64,
            passages = answer.ranked_passages.len(),
            "Semantic backend answered"
        );

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_deserializes_without_passages() {
        let answer: SemanticAnswer =
            serde_json::from_str(r#"{"answer_text": "Title VI prohibits discrimination."}"#)
                .unwrap();
        assert!(answer.ranked_passages.is_empty());
    }

    #[test]
    fn test_answer_deserializes_with_passages() {
        let raw = r#"{
            "answer_text": "ok",
            "ranked_passages": [
                {"text": "passage", "score": 0.92, "source": "guide.pdf"}
            ]
        }"#;
        let answer: SemanticAnswer = serde_json::from_str(raw).unwrap();
        assert_eq!(answer.ranked_passages.len(), 1);
        assert_eq!(answer.ranked_passages[0].source.as_deref(), Some("guide.pdf"));
    }
}

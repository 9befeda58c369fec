use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::traits::{check_batch, Embedder, EmbeddingError};

/// `batchEmbedContents` rejects calls with more requests than this.
const MAX_REQUESTS_PER_CALL: usize = 100;

/// Google Gemini embedding backend (`batchEmbedContents`).
pub struct GeminiEmbedder {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(
        api_key: String,
        model: String,
        base_url: Option<String>,
        dimensions: usize,
    ) -> Self {
        // The API addresses models as `models/<name>`.
        let model = if model.starts_with("models/") {
            model
        } else {
            format!("models/{model}")
        };
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            model,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            dimensions,
        }
    }
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    /// One request body per call, each within the per-call limit.
    fn batch_requests<'a>(&'a self, texts: &[&'a str]) -> Vec<BatchRequest<'a>> {
        texts
            .chunks(MAX_REQUESTS_PER_CALL)
            .map(|group| BatchRequest {
                requests: group
                    .iter()
                    .map(|&text| EmbedContentRequest {
                        model: &self.model,
                        content: Content {
                            parts: [Part { text }],
                        },
                    })
                    .collect(),
            })
            .collect()
    }

    async fn post(&self, request: &BatchRequest<'_>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/{}:batchEmbedContents",
                self.base_url, self.model
            ))
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api(format!("{status}: {body}")));
        }

        let parsed: BatchResponse = response.json().await?;
        Ok(parsed.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for request in self.batch_requests(texts) {
            let vectors = self.post(&request).await?;
            check_batch(&vectors, request.requests.len(), self.dimensions)?;
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_name_gets_models_prefix() {
        let e = GeminiEmbedder::new("k".into(), "text-embedding-004".into(), None, 768);
        assert_eq!(e.model, "models/text-embedding-004");
        let e = GeminiEmbedder::new("k".into(), "models/text-embedding-004".into(), None, 768);
        assert_eq!(e.model, "models/text-embedding-004");
    }

    #[test]
    fn request_body_shape() {
        let request = BatchRequest {
            requests: vec![EmbedContentRequest {
                model: "models/m",
                content: Content {
                    parts: [Part { text: "hi" }],
                },
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["requests"][0]["model"], "models/m");
        assert_eq!(json["requests"][0]["content"]["parts"][0]["text"], "hi");
    }

    #[test]
    fn large_batches_are_split_into_calls_of_at_most_one_hundred() {
        let e = GeminiEmbedder::new("k".into(), "text-embedding-004".into(), None, 768);
        let owned: Vec<String> = (0..250).map(|i| format!("sentence {i}")).collect();
        let texts: Vec<&str> = owned.iter().map(String::as_str).collect();

        let requests = e.batch_requests(&texts);
        let sizes: Vec<usize> = requests.iter().map(|r| r.requests.len()).collect();
        assert_eq!(sizes, [100, 100, 50]);
        assert_eq!(requests[1].requests[0].content.parts[0].text, "sentence 100");
        assert_eq!(requests[2].requests[49].content.parts[0].text, "sentence 249");
        assert!(e.batch_requests(&[]).is_empty());
    }
}

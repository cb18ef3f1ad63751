use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::warn;

/// Failure from the natural-language value producer. Always best-effort: the
/// caller substitutes a heuristic fallback and continues.
#[derive(Debug, Error)]
pub enum TextError {
    #[error("producer request failed: {0}")]
    Request(String),
    #[error("producer timed out")]
    Timeout,
}

/// Prompt for one free-text column value.
#[derive(Debug, Clone)]
pub struct TextPrompt {
    pub table: String,
    pub column: String,
    pub max_length: Option<i32>,
    /// Token budget hint passed to the producer.
    pub max_tokens: u32,
}

impl TextPrompt {
    /// Rendered prompt text. Structurally identical prompts render to the
    /// same string, which is what the response cache keys on.
    pub fn render(&self) -> String {
        let length_hint = self
            .max_length
            .map(|max| format!(" of at most {max} characters"))
            .unwrap_or_default();
        format!(
            "Generate a realistic, short value for the column '{}' of table '{}'{}. \
             Return only the value, no explanation, no formatting.",
            self.column, self.table, length_hint
        )
    }

    fn cache_key(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.render().as_bytes());
        hasher.finalize().into()
    }
}

/// External natural-language value producer.
#[async_trait]
pub trait TextProducer: Send + Sync {
    async fn produce(&self, prompt: &TextPrompt) -> Result<String, TextError>;
}

/// A prompt tied to the row and column it originated from. Results are
/// matched back by this pair, never by arrival order.
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub row_index: usize,
    pub prompt: TextPrompt,
}

/// Resolves batches of prompts against a producer with bounded concurrency
/// and a response cache keyed by prompt content hash, so structurally
/// identical prompts cost one call.
pub struct TextResolver {
    producer: Arc<dyn TextProducer>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    cache: Mutex<HashMap<[u8; 32], String>>,
}

impl TextResolver {
    pub fn new(producer: Arc<dyn TextProducer>, workers: usize, timeout: Duration) -> Self {
        Self {
            producer,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a batch of requests. The result vector is index-aligned with
    /// the input; `None` means the producer failed or timed out for that
    /// request and the caller should keep its fallback value.
    pub async fn resolve(&self, requests: &[TextRequest]) -> Vec<Option<String>> {
        let mut keys = Vec::with_capacity(requests.len());
        let mut pending: HashMap<[u8; 32], TextPrompt> = HashMap::new();
        {
            let cache = self.cache.lock().await;
            for request in requests {
                let key = request.prompt.cache_key();
                if !cache.contains_key(&key) {
                    pending.entry(key).or_insert_with(|| request.prompt.clone());
                }
                keys.push(key);
            }
        }

        let mut tasks = JoinSet::new();
        for (key, prompt) in pending {
            let producer = Arc::clone(&self.producer);
            let permits = Arc::clone(&self.permits);
            let timeout = self.timeout;
            tasks.spawn(async move {
                // The permit must be held across the produce call so the
                // pool stays bounded.
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => {
                        match tokio::time::timeout(timeout, producer.produce(&prompt)).await {
                            Ok(Ok(value)) => Ok(value.trim().to_string()),
                            Ok(Err(err)) => Err(err),
                            Err(_) => Err(TextError::Timeout),
                        }
                    }
                    Err(_) => Err(TextError::Request("worker pool closed".to_string())),
                };
                (key, prompt, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let Ok((key, prompt, result)) = joined else {
                continue;
            };
            match result {
                Ok(value) => {
                    self.cache.lock().await.insert(key, value);
                }
                Err(err) => {
                    warn!(
                        table = %prompt.table,
                        column = %prompt.column,
                        error = %err,
                        "text producer failed, keeping fallback value"
                    );
                }
            }
        }

        let cache = self.cache.lock().await;
        keys.into_iter().map(|key| cache.get(&key).cloned()).collect()
    }
}

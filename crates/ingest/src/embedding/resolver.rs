use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use semchunk_core::Vector;
use tracing::{debug, warn};

use super::cache::EmbeddingCache;
use super::traits::{check_batch, Embedder};
use crate::error::ChunkingError;

/// Resolves texts to vectors through the cache, embedding only misses.
///
/// Each distinct missing text is sent to the provider once per call; once a
/// batch returns, its vectors are written to the cache before the next batch
/// is consumed, so later calls in the same run resolve from the cache.
pub struct EmbeddingResolver {
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
    batch_size: usize,
    concurrency: usize,
}

impl EmbeddingResolver {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        cache: Arc<EmbeddingCache>,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            embedder,
            cache,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Return one vector per input text, in input order.
    pub async fn resolve<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vector>, ChunkingError> {
        let dims = self.embedder.dimensions();
        let mut resolved: Vec<Option<Vector>> = vec![None; texts.len()];

        // Distinct missing texts in first-seen order, with every position they fill.
        let mut pending: Vec<&str> = Vec::new();
        let mut positions: HashMap<&str, Vec<usize>> = HashMap::new();

        for (i, text) in texts.iter().enumerate() {
            let text = text.as_ref();
            if let Some(slots) = positions.get_mut(text) {
                slots.push(i);
                continue;
            }
            match self.cache.get(text) {
                Some(vec) => {
                    ensure_dimension(dims, vec.len())?;
                    resolved[i] = Some(vec);
                }
                None => {
                    pending.push(text);
                    positions.insert(text, vec![i]);
                }
            }
        }

        let hits = texts.len() - positions.values().map(Vec::len).sum::<usize>();
        debug!(
            total = texts.len(),
            hits,
            unique_misses = pending.len(),
            "resolving sentence embeddings"
        );

        if !pending.is_empty() {
            let embedder = &self.embedder;
            let mut batches = stream::iter(pending.chunks(self.batch_size))
                .map(|batch| async move {
                    let vectors = embedder.embed_batch(batch).await?;
                    Ok::<_, ChunkingError>((batch, vectors))
                })
                .buffered(self.concurrency);

            while let Some(result) = batches.next().await {
                let (batch, vectors) = result?;
                check_batch(&vectors, batch.len(), dims)?;

                self.persist(batch, &vectors).await;
                for (text, vec) in batch.iter().zip(vectors) {
                    if let Some(slots) = positions.get(text) {
                        for &slot in slots {
                            resolved[slot] = Some(vec.clone());
                        }
                    }
                }
            }
        }

        resolved
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ChunkingError::InvalidDocument("unresolved sentence embedding".into()))
    }
}

impl EmbeddingResolver {
    /// Write a completed batch to the cache off the async runtime. Failures
    /// only cost a re-embed on a later run.
    async fn persist(&self, batch: &[&str], vectors: &[Vector]) {
        let entries: Vec<(String, Vector)> = batch
            .iter()
            .map(|text| text.to_string())
            .zip(vectors.iter().cloned())
            .collect();
        let cache = Arc::clone(&self.cache);
        let written = tokio::task::spawn_blocking(move || {
            for (text, vec) in &entries {
                if let Err(e) = cache.set(text, vec) {
                    warn!(error = %e, "failed to persist embedding, continuing without cache");
                }
            }
        })
        .await;
        if let Err(e) = written {
            warn!(error = %e, "cache write task failed");
        }
    }
}

fn ensure_dimension(expected: usize, actual: usize) -> Result<(), ChunkingError> {
    if expected != actual {
        return Err(ChunkingError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Deterministic embedder: vector derived from text bytes, records every request.
    struct FakeEmbedder {
        call_count: AtomicUsize,
        seen: Mutex<Vec<String>>,
        dims: usize,
        fail_on_call: Option<usize>,
    }

    impl FakeEmbedder {
        fn new(dims: usize) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                dims,
                fail_on_call: None,
            }
        }

        fn vector_for(text: &str, dims: usize) -> Vec<f32> {
            let sum: u32 = text.bytes().map(u32::from).sum();
            (0..dims).map(|d| ((sum as usize + d) % 17) as f32 + 1.0).collect()
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(EmbeddingError::Api("quota exceeded".into()));
            }
            self.seen
                .lock()
                .unwrap()
                .extend(texts.iter().map(|t| t.to_string()));
            Ok(texts.iter().map(|t| Self::vector_for(t, self.dims)).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }
    }

    fn resolver_with(
        embedder: Arc<FakeEmbedder>,
        dir: &std::path::Path,
        batch_size: usize,
    ) -> EmbeddingResolver {
        let cache = Arc::new(EmbeddingCache::open(dir, 100).unwrap());
        EmbeddingResolver::new(embedder, cache, batch_size, 2)
    }

    #[tokio::test]
    async fn preserves_input_order_across_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::new(4));
        let resolver = resolver_with(embedder.clone(), tmp.path(), 2);

        let texts = ["alpha", "bravo", "charlie", "delta", "echo"];
        let vectors = resolver.resolve(&texts).await.unwrap();

        assert_eq!(vectors.len(), texts.len());
        for (text, vec) in texts.iter().zip(&vectors) {
            assert_eq!(vec, &FakeEmbedder::vector_for(text, 4));
        }
        assert_eq!(embedder.call_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn duplicate_texts_are_embedded_once() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::new(3));
        let resolver = resolver_with(embedder.clone(), tmp.path(), 10);

        let texts = ["same", "other", "same", "same"];
        let vectors = resolver.resolve(&texts).await.unwrap();

        assert_eq!(vectors[0], vectors[2]);
        assert_eq!(vectors[0], vectors[3]);
        assert_eq!(embedder.seen.lock().unwrap().as_slice(), ["same", "other"]);
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::new(3));
        let resolver = resolver_with(embedder.clone(), tmp.path(), 10);

        resolver.resolve(&["one", "two"]).await.unwrap();
        resolver.resolve(&["two", "one"]).await.unwrap();

        assert_eq!(embedder.call_count.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cache().hits(), 2);
    }

    #[tokio::test]
    async fn resolved_vectors_are_on_disk_when_resolve_returns() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::new(3));
        let resolver = resolver_with(embedder, tmp.path(), 2);
        let texts = ["north", "south", "east"];
        let vectors = resolver.resolve(&texts).await.unwrap();

        let reopened = EmbeddingCache::open(tmp.path(), 10).unwrap();
        for (text, vec) in texts.iter().zip(&vectors) {
            assert_eq!(reopened.get(text).as_ref(), Some(vec));
        }
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::new(3));
        let resolver = resolver_with(embedder.clone(), tmp.path(), 10);

        let empty: [&str; 0] = [];
        assert!(resolver.resolve(&empty).await.unwrap().is_empty());
        assert_eq!(embedder.call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_failure_keeps_earlier_batches_cached() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder {
            fail_on_call: Some(1),
            ..FakeEmbedder::new(2)
        });
        let cache = Arc::new(EmbeddingCache::open(tmp.path(), 100).unwrap());
        // One batch in flight at a time so the failing call is the second batch.
        let resolver = EmbeddingResolver::new(embedder.clone(), cache.clone(), 1, 1);

        let err = resolver.resolve(&["first", "second"]).await.unwrap_err();
        assert!(matches!(err, ChunkingError::Embedding(EmbeddingError::Api(_))));
        assert!(cache.get("first").is_some());
        assert!(cache.get("second").is_none());
    }

    #[tokio::test]
    async fn cached_vector_with_wrong_dimension_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::new(4));
        let resolver = resolver_with(embedder, tmp.path(), 10);
        resolver.cache().set("stale model", &[1.0, 2.0]).unwrap();

        let err = resolver.resolve(&["stale model"]).await.unwrap_err();
        assert!(matches!(
            err,
            ChunkingError::DimensionMismatch { expected: 4, actual: 2 }
        ));
    }
}

//! Runs the pipeline over collections, a bounded number of documents at a time.

use anyhow::{Context, Result};
use ingest::{Collection, Document};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;

use crate::cache::DocumentCache;
use crate::metrics::{Metrics, TimedOperation};
use crate::pipeline::{DocumentSummary, Pipeline};

pub struct Runner {
    pipeline: Arc<Pipeline>,
    limit: Arc<Semaphore>,
    cache: Option<Arc<DocumentCache>>,
    metrics: Arc<Metrics>,
    cancelled: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(pipeline: Pipeline, max_concurrent_documents: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            limit: Arc::new(Semaphore::new(max_concurrent_documents.max(1))),
            cache: None,
            metrics,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_cache(mut self, cache: Arc<DocumentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Flag checked before each document starts. Setting it leaves the
    /// remaining documents unprocessed.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn cache(&self) -> Option<&Arc<DocumentCache>> {
        self.cache.as_ref()
    }

    /// Process every document; output keeps input order. A document whose
    /// worker fails is logged, counted and returned unchanged.
    pub async fn run(&self, mut collection: Collection) -> Result<(Collection, Vec<DocumentSummary>)> {
        let mut handles = Vec::new();

        for doc in std::mem::take(&mut collection.documents) {
            let original = doc.clone();
            let pipeline = self.pipeline.clone();
            let limit = self.limit.clone();
            let cache = self.cache.clone();
            let metrics = self.metrics.clone();
            let cancelled = self.cancelled.clone();

            let handle = tokio::spawn(async move {
                let _permit = limit.acquire_owned().await.context("Document limiter closed")?;
                if cancelled.load(Ordering::Relaxed) {
                    metrics.record_skipped();
                    return Ok((doc, None));
                }

                let key = cache.as_ref().map(|_| DocumentCache::key(&doc));
                if let (Some(cache), Some(key)) = (&cache, &key) {
                    if let Some(cached) = cache.get(key) {
                        metrics.record_cache_hit();
                        return Ok((cached, None));
                    }
                }

                let timer = TimedOperation::start();
                let (doc, summary) = tokio::task::spawn_blocking(move || {
                    let mut doc = doc;
                    let summary = pipeline.process_document(&mut doc);
                    (doc, summary)
                })
                .await
                .context("Document worker failed")?;
                metrics.record_document(timer.elapsed(), &summary);

                if let (Some(cache), Some(key)) = (cache, key) {
                    cache.insert(key, doc.clone());
                }
                Ok::<_, anyhow::Error>((doc, Some(summary)))
            });
            handles.push((original, handle));
        }

        let mut summaries = Vec::new();
        for (original, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(anyhow::Error::new(e).context("Document task failed")),
            };
            match outcome {
                Ok((doc, summary)) => {
                    collection.documents.push(doc);
                    summaries.extend(summary);
                }
                Err(e) => {
                    tracing::error!(document_id = %original.id, error = %e, "Document failed; keeping it unannotated");
                    self.metrics.record_failed();
                    collection.documents.push(original);
                }
            }
        }

        if self.is_cancelled() {
            tracing::warn!(processed = summaries.len(), "Run cancelled; remaining documents left unprocessed");
        }
        Ok((collection, summaries))
    }
}

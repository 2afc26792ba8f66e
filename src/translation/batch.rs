/*!
 * Batch translation processing.
 *
 * Work items are split into contiguous batches that run on a bounded pool of
 * tokio tasks. Inside a batch items run one after another in index order:
 * store check, rate-limit slot, oracle call under the retry policy, store
 * write. A failed item is reported and never stops its batch or the others.
 */

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::errors::{ItemFailure, TranslationError};
use crate::translation::cache::{ProgressStore, WriteOutcome, write_record};
use crate::translation::client::TranslationClient;
use crate::translation::document::{Document, WorkItem};
use crate::translation::rate_limit::RateLimiter;
use crate::translation::retry::RetryPolicy;

/// Split items into contiguous batches of at most `batch_size`, keeping order.
///
/// A `batch_size` of zero is treated as one.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);

    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }

    batches
}

/// Outcome of one work item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// Translated and stored during this run
    Translated,
    /// Already in the store; no oracle call was made
    CacheHit,
    Failed(ItemFailure),
}

/// A failed item and why
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub index: usize,
    pub failure: ItemFailure,
}

/// Summary of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub total: usize,
    pub translated: usize,
    pub cache_hits: usize,
    pub failures: Vec<ItemReport>,
}

impl RunReport {
    /// Items stored at the end of the run, old or new
    pub fn succeeded(&self) -> usize {
        self.translated + self.cache_hits
    }

    /// Failed indices, ascending
    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.failures.iter().map(|f| f.index).collect();
        indices.sort_unstable();
        indices
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, index: usize, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Translated => self.translated += 1,
            ItemOutcome::CacheHit => self.cache_hits += 1,
            ItemOutcome::Failed(failure) => self.failures.push(ItemReport { index, failure }),
        }
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} items stored ({} translated, {} from cache), {} failed",
            self.succeeded(),
            self.total,
            self.translated,
            self.cache_hits,
            self.failures.len()
        )
    }
}

/// Everything a worker task needs, cheap to clone
struct Worker<D: Document> {
    client: Arc<TranslationClient<D>>,
    store: Arc<dyn ProgressStore>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    progress: ProgressBar,
}

impl<D: Document> Clone for Worker<D> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: self.store.clone(),
            limiter: self.limiter.clone(),
            retry: self.retry.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<D: Document> Worker<D> {
    /// Run a store call on the blocking pool so disk or SQLite I/O never stalls a runtime thread
    async fn blocking_store<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ProgressStore) -> anyhow::Result<T> + Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| anyhow::anyhow!("Progress store task failed: {}", e))?
    }

    async fn process_batch(&self, batch: Vec<WorkItem<D>>) -> Vec<(usize, ItemOutcome)> {
        let mut outcomes = Vec::with_capacity(batch.len());
        for item in &batch {
            let outcome = self.process_item(item).await;
            self.progress.inc(1);
            outcomes.push((item.index, outcome));
        }
        outcomes
    }

    async fn process_item(&self, item: &WorkItem<D>) -> ItemOutcome {
        let index = item.index;

        match self.blocking_store(move |store| store.exists(D::NAMESPACE, index)).await {
            Ok(true) => {
                debug!("Item {} already translated, skipping", index);
                return ItemOutcome::CacheHit;
            }
            Ok(false) => {}
            Err(e) => {
                error!("Item {} failed: cannot read progress store: {:#}", index, e);
                return ItemOutcome::Failed(ItemFailure::Store(e.to_string()));
            }
        }

        let client = &*self.client;
        let limiter = &*self.limiter;
        let document = &item.document;

        let result = self
            .retry
            .execute(index, move |attempt| async move {
                limiter.acquire().await;
                debug!("Item {} attempt {}: calling {}", index, attempt, client.provider().name());
                client.translate(document).await
            })
            .await;

        let translated = match result {
            Ok(translated) => translated,
            Err(failure) => {
                error!("Item {} failed: {}", index, failure);
                return ItemOutcome::Failed(failure);
            }
        };

        match self
            .blocking_store(move |store| write_record(store, D::NAMESPACE, index, &translated))
            .await
        {
            Ok(WriteOutcome::Written) => ItemOutcome::Translated,
            Ok(WriteOutcome::AlreadyPresent) => {
                debug!("Item {} was stored by another run first, keeping that record", index);
                ItemOutcome::Translated
            }
            Err(e) => {
                error!("Item {} failed: cannot store translation: {:#}", index, e);
                ItemOutcome::Failed(ItemFailure::Store(e.to_string()))
            }
        }
    }
}

/// Dispatches batches of work items to a bounded pool of workers
pub struct BatchOrchestrator<D: Document> {
    client: Arc<TranslationClient<D>>,
    store: Arc<dyn ProgressStore>,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    batch_size: usize,
    workers: usize,
    show_progress: bool,
}

impl<D: Document> BatchOrchestrator<D> {
    /// Create an orchestrator with one batch of 10 items per worker and 5 workers
    pub fn new(
        client: Arc<TranslationClient<D>>,
        store: Arc<dyn ProgressStore>,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            store,
            limiter,
            retry,
            batch_size: 10,
            workers: 5,
            show_progress: false,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress_bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} items ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message(D::NAMESPACE);
        progress_bar
    }

    /// Translate every item not yet in the store
    pub async fn run(&self, items: Vec<WorkItem<D>>) -> RunReport {
        let mut report = RunReport {
            total: items.len(),
            ..RunReport::default()
        };
        if items.is_empty() {
            return report;
        }

        let batches = partition(items, self.batch_size);
        info!(
            "Translating {} items of '{}' in {} batches with {} workers",
            report.total,
            D::NAMESPACE,
            batches.len(),
            self.workers
        );

        let progress = self.progress_bar(report.total);
        let worker = Worker {
            client: self.client.clone(),
            store: self.store.clone(),
            limiter: self.limiter.clone(),
            retry: self.retry.clone(),
            progress: progress.clone(),
        };
        let semaphore = Arc::new(Semaphore::new(self.workers));

        let mut batch_indices = Vec::with_capacity(batches.len());
        let mut handles = Vec::with_capacity(batches.len());
        for batch in batches {
            batch_indices.push(batch.iter().map(|item| item.index).collect::<Vec<usize>>());
            let worker = worker.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                // The semaphore is never closed, so acquiring cannot fail
                let _permit = semaphore.acquire_owned().await.ok();
                worker.process_batch(batch).await
            }));
        }

        let results = join_all(handles).await;
        for (indices, result) in batch_indices.into_iter().zip(results) {
            match result {
                Ok(outcomes) => {
                    for (index, outcome) in outcomes {
                        report.record(index, outcome);
                    }
                }
                Err(e) => {
                    error!("Worker for items {:?} stopped unexpectedly: {}", indices, e);
                    for index in indices {
                        let failure = ItemFailure::Unclassified {
                            attempt: 0,
                            error: TranslationError::Unclassified(format!("worker task failed: {}", e)),
                        };
                        report.record(index, ItemOutcome::Failed(failure));
                    }
                }
            }
        }

        progress.finish_and_clear();
        report
    }
}

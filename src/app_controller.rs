use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::{CacheBackend, Config, TranslationProvider};
use crate::database::SqliteProgressStore;
use crate::database::connection::DEFAULT_DB_FILENAME;
use crate::dataset;
use crate::export::{self, ExportSummary};
use crate::file_utils::FileManager;
use crate::language_utils;
use crate::providers::Provider;
use crate::providers::ollama::Ollama;
use crate::providers::openai::OpenAI;
use crate::translation::{
    BatchOrchestrator, Document, FileProgressStore, InstructionPair, MultipleChoiceQuestion, ProgressStore,
    PromptTemplate, RateLimiter, RetryPolicy, RunReport, TranslationClient, enumerate_items,
};

// @module: Application controller for dataset translation

/// File in the cache directory collecting failed items across runs
pub const FAILURE_LOG_FILENAME: &str = "failures.log";

/// The two translation pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// JSON instruction/response pairs
    Instructions,
    /// CSV multiple-choice questions
    MultipleChoice,
}

impl Pipeline {
    /// Cache namespace of the pipeline
    pub fn namespace(&self) -> &'static str {
        match self {
            Pipeline::Instructions => InstructionPair::NAMESPACE,
            Pipeline::MultipleChoice => MultipleChoiceQuestion::NAMESPACE,
        }
    }

    /// Extension of the aggregated output file
    pub fn output_extension(&self) -> &'static str {
        match self {
            Pipeline::Instructions => "json",
            Pipeline::MultipleChoice => "csv",
        }
    }

    pub fn template(&self) -> PromptTemplate {
        match self {
            Pipeline::Instructions => PromptTemplate::instructions(),
            Pipeline::MultipleChoice => PromptTemplate::multiple_choice(),
        }
    }

    /// Whether a JSON object may be recovered from prose around it
    pub fn default_lenient_json(&self) -> bool {
        matches!(self, Pipeline::MultipleChoice)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pipeline::Instructions => write!(f, "instructions"),
            Pipeline::MultipleChoice => write!(f, "multiple-choice"),
        }
    }
}

/// Result of a full run: translation then export
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub pipeline: Pipeline,
    pub run: RunReport,
    pub export: ExportSummary,
    pub elapsed: Duration,
}

impl PipelineSummary {
    pub fn is_complete(&self) -> bool {
        self.run.is_complete() && self.export.is_complete()
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} in {}. {}",
            self.pipeline,
            self.run,
            Controller::format_duration(self.elapsed),
            self.export
        )
    }
}

/// Cached vs pending items of a dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    pub pipeline: Pipeline,
    pub total: usize,
    pub cached: usize,
    pub pending: Vec<usize>,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} items translated, {} pending",
            self.pipeline,
            self.cached,
            self.total,
            self.pending.len()
        )
    }
}

/// Main application controller for dataset translation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Absent for cache-only commands
    provider: Option<Arc<dyn Provider>>,

    store: Arc<dyn ProgressStore>,

    show_progress: bool,
}

impl Controller {
    // @method: Create a controller with the provider and store described by the configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let provider = Self::build_provider(&config)?;
        let store = Self::build_store(&config)?;
        Ok(Self::with_components(config, provider, store))
    }

    /// Create a controller around an existing provider and store
    pub fn with_components(config: Config, provider: Arc<dyn Provider>, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            config,
            provider: Some(provider),
            store,
            show_progress: false,
        }
    }

    /// Create a controller that only reads and edits the cache
    pub fn for_cache(config: Config) -> Result<Self> {
        let store = Self::build_store(&config)?;
        Ok(Self {
            config,
            provider: None,
            store,
            show_progress: false,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    fn provider(&self) -> Result<&Arc<dyn Provider>> {
        self.provider
            .as_ref()
            .ok_or_else(|| anyhow!("No translation provider configured for this command"))
    }

    /// Build the provider client for the active provider
    pub fn build_provider(config: &Config) -> Result<Arc<dyn Provider>> {
        let translation = &config.translation;
        let provider = translation.provider;
        let endpoint = translation.get_endpoint();
        let timeout = translation.get_timeout();

        let client: Arc<dyn Provider> = match provider {
            TranslationProvider::Ollama => Arc::new(Ollama::new(endpoint, timeout)),
            TranslationProvider::Groq | TranslationProvider::OpenAI | TranslationProvider::Maritaca => {
                let api_key = translation.get_api_key();
                if api_key.is_empty() {
                    return Err(anyhow!("No API key configured for {}", provider.display_name()));
                }
                Arc::new(OpenAI::new(provider.to_lowercase_string(), api_key, endpoint, timeout))
            }
        };

        debug!("Using {} provider with model {}", provider.display_name(), translation.get_model());
        Ok(client)
    }

    /// Open the progress store selected by the cache configuration
    pub fn build_store(config: &Config) -> Result<Arc<dyn ProgressStore>> {
        let dir = &config.cache.dir;
        let store: Arc<dyn ProgressStore> = match config.cache.backend {
            CacheBackend::Files => Arc::new(FileProgressStore::open(dir)?),
            CacheBackend::Sqlite => Arc::new(SqliteProgressStore::open(dir.join(DEFAULT_DB_FILENAME))?),
        };
        Ok(store)
    }

    /// Check the provider is reachable before spending a run on it
    pub async fn test_connection(&self) -> Result<()> {
        let provider = self.provider()?;
        provider
            .test_connection()
            .await
            .with_context(|| format!("Cannot reach the {} provider", provider.name()))?;
        info!("Connected to {}", provider.name());
        Ok(())
    }

    /// Default aggregated output path: `<cache dir>/<input stem>.<target>.<ext>`
    pub fn default_output_path(&self, pipeline: Pipeline, input: &Path) -> PathBuf {
        FileManager::generate_output_path(
            input,
            &self.config.cache.dir,
            &self.config.target_language,
            pipeline.output_extension(),
        )
    }

    /// Translate an instruction dataset, then export everything stored
    pub async fn run_instructions(&self, input: &Path, output: &Path) -> Result<PipelineSummary> {
        let start_time = Instant::now();
        let pairs = dataset::load_instructions(input)?;
        let total = pairs.len();
        info!("Loaded {} instruction pairs from {}", total, input.display());

        self.test_connection().await?;
        let run = self.translate(Pipeline::Instructions, pairs).await?;
        let export = export::export_instructions(self.store.as_ref(), total, output)?;

        Ok(PipelineSummary {
            pipeline: Pipeline::Instructions,
            run,
            export,
            elapsed: start_time.elapsed(),
        })
    }

    /// Translate a multiple-choice dataset, then export it with translations merged in
    pub async fn run_multiple_choice(&self, input: &Path, output: &Path) -> Result<PipelineSummary> {
        let start_time = Instant::now();
        let questions = dataset::load_multiple_choice(input)?;
        info!("Loaded {} questions from {}", questions.len(), input.display());

        self.test_connection().await?;
        let run = self.translate(Pipeline::MultipleChoice, questions.clone()).await?;
        let export = export::export_multiple_choice(self.store.as_ref(), &questions, output)?;

        Ok(PipelineSummary {
            pipeline: Pipeline::MultipleChoice,
            run,
            export,
            elapsed: start_time.elapsed(),
        })
    }

    /// Run one pipeline over a loaded dataset
    pub async fn translate<D: Document>(&self, pipeline: Pipeline, documents: Vec<D>) -> Result<RunReport> {
        let translation = &self.config.translation;
        let lenient = translation
            .lenient_json
            .unwrap_or_else(|| pipeline.default_lenient_json());

        let client = TranslationClient::<D>::new(
            self.provider()?.clone(),
            pipeline.template(),
            translation.get_model(),
            language_utils::prompt_language_name(&self.config.source_language),
            language_utils::prompt_language_name(&self.config.target_language),
            lenient,
        )
        .with_temperature(translation.get_temperature())
        .with_max_tokens(translation.get_max_tokens());

        let limiter = RateLimiter::new(self.config.rate_limit.max_calls, self.config.rate_limit_period())?;
        let orchestrator = BatchOrchestrator::new(
            Arc::new(client),
            self.store.clone(),
            Arc::new(limiter),
            RetryPolicy::from_config(&self.config.retry),
        )
        .with_batch_size(self.config.batch.batch_size)
        .with_workers(self.config.batch.workers)
        .with_progress(self.show_progress);

        let report = orchestrator.run(enumerate_items(documents)).await;
        info!("{}", report);

        if !report.is_complete() {
            warn!("Failed indices for {}: {:?}", pipeline, report.failed_indices());
            self.record_failures(pipeline, &report);
        }

        Ok(report)
    }

    fn record_failures(&self, pipeline: Pipeline, report: &RunReport) {
        let path = self.config.cache.dir.join(FAILURE_LOG_FILENAME);
        for failure in &report.failures {
            let line = format!("{} #{}: {}", pipeline.namespace(), failure.index, failure.failure);
            if let Err(e) = FileManager::append_to_log_file(&path, &line) {
                warn!("Cannot write failure log {:?}: {:#}", path, e);
                return;
            }
        }
    }

    /// Aggregate stored translations without calling the oracle
    pub fn export(&self, pipeline: Pipeline, input: &Path, output: &Path) -> Result<ExportSummary> {
        match pipeline {
            Pipeline::Instructions => {
                let total = dataset::load_instructions(input)?.len();
                export::export_instructions(self.store.as_ref(), total, output)
            }
            Pipeline::MultipleChoice => {
                let questions = dataset::load_multiple_choice(input)?;
                export::export_multiple_choice(self.store.as_ref(), &questions, output)
            }
        }
    }

    /// Count cached and pending items of a dataset
    pub fn status(&self, pipeline: Pipeline, input: &Path) -> Result<PipelineStatus> {
        let total = match pipeline {
            Pipeline::Instructions => dataset::load_instructions(input)?.len(),
            Pipeline::MultipleChoice => dataset::load_multiple_choice(input)?.len(),
        };
        let stored = self.store.indices(pipeline.namespace())?;
        let pending: Vec<usize> = (0..total).filter(|i| !stored.contains(i)).collect();

        Ok(PipelineStatus {
            pipeline,
            total,
            cached: total - pending.len(),
            pending,
        })
    }

    /// Drop stored translations so the items are translated again; returns how many were removed
    pub fn invalidate(&self, pipeline: Pipeline, indices: &[usize]) -> Result<usize> {
        let mut removed = 0;
        for &index in indices {
            if self.store.invalidate(pipeline.namespace(), index)? {
                removed += 1;
            } else {
                debug!("Nothing stored for {} #{}", pipeline, index);
            }
        }
        info!("Invalidated {} of {} requested {} entries", removed, indices.len(), pipeline);
        Ok(removed)
    }

    // Format duration in a human-readable format (HH:MM:SS)
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}

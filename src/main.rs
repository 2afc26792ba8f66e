// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};

use dataset_translator::app_config::{self, Config, TranslationProvider};
use dataset_translator::app_controller::{Controller, Pipeline};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Groq,
    #[value(name = "openai")]
    OpenAI,
    Maritaca,
    Ollama,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Groq => TranslationProvider::Groq,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Maritaca => TranslationProvider::Maritaca,
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for Pipeline to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliPipeline {
    Instructions,
    MultipleChoice,
}

impl From<CliPipeline> for Pipeline {
    fn from(cli_pipeline: CliPipeline) -> Self {
        match cli_pipeline {
            CliPipeline::Instructions => Pipeline::Instructions,
            CliPipeline::MultipleChoice => Pipeline::MultipleChoice,
        }
    }
}

/// Options shared by every dataset command
#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", env = "DATASET_TRANSLATOR_CONFIG")]
    config: PathBuf,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Aggregated output file (default: <cache dir>/<input stem>.<target>.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Items per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Concurrent workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Oracle calls allowed per rate-limit window
    #[arg(long)]
    max_calls: Option<usize>,

    /// Rate-limit window length in seconds
    #[arg(long)]
    period_secs: Option<u64>,

    /// Attempts per item before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a JSON array of instruction/output pairs, then export it
    Instructions {
        /// Input JSON dataset
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Translate a CSV of multiple-choice questions, then export it
    MultipleChoice {
        /// Input CSV dataset
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Aggregate stored translations without calling the provider
    Export {
        #[arg(value_enum)]
        pipeline: CliPipeline,

        /// Source dataset the cache belongs to
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show how many items are translated and which are pending
    Status {
        #[arg(value_enum)]
        pipeline: CliPipeline,

        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// List every pending index
        #[arg(long)]
        verbose: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Remove stored translations so they are redone on the next run
    Invalidate {
        #[arg(value_enum)]
        pipeline: CliPipeline,

        /// Dataset indices to drop
        #[arg(value_name = "INDEX", required = true, num_args = 1..)]
        indices: Vec<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions for dataset-translator
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// dataset-translator - LLM translation of training datasets
///
/// Translates instruction/response datasets and multiple-choice question sets
/// through an LLM provider, one record per call, with a shared rate limit,
/// bounded retries and a durable cache that makes every run resumable.
#[derive(Parser, Debug)]
#[command(name = "dataset-translator")]
#[command(version)]
#[command(about = "Rate-limited, resumable LLM translation of datasets")]
#[command(long_about = "dataset-translator sends each record of a dataset to an LLM provider, validates the JSON reply and stores it, so an interrupted run picks up where it stopped.

EXAMPLES:
    dataset-translator instructions data/linux.json                  # Translate with the default config
    dataset-translator multiple-choice data/ops.csv -p maritaca      # Use a specific provider
    dataset-translator instructions data/linux.json --workers 2 --max-calls 20
    dataset-translator status instructions data/linux.json           # Cached vs pending items
    dataset-translator export multiple-choice data/ops.csv -o ops.pt.csv
    dataset-translator invalidate instructions 12 40                 # Redo two items
    dataset-translator completions bash > dataset-translator.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't exist,
    a default one is created. API keys can be set there or through
    GROQ_API_KEY, OPENAI_API_KEY and MARITACA_API_KEY.

SUPPORTED PROVIDERS:
    groq      - Groq API (default, requires API key)
    openai    - OpenAI API (requires API key)
    maritaca  - Maritaca API (requires API key)
    ollama    - Local Ollama server")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌",
            Level::Warn => "🚧",
            Level::Info => " ",
            Level::Debug => "🔍",
            Level::Trace => "📋",
        }
    }

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {} {}\x1B[0m",
                Self::get_color_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Load the config file and apply command line overrides
fn load_config(options: &CommonArgs) -> Result<Config> {
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level_filter(&config_log_level));
    }

    let (mut config, created) = Config::load_or_create(&options.config)?;
    if created {
        warn!("Config file not found at {:?}, created a default one.", options.config);
    }

    if let Some(provider) = &options.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(batch_size) = options.batch_size {
        config.batch.batch_size = batch_size;
    }
    if let Some(workers) = options.workers {
        config.batch.workers = workers;
    }
    if let Some(max_calls) = options.max_calls {
        config.rate_limit.max_calls = max_calls;
    }
    if let Some(period_secs) = options.period_secs {
        config.rate_limit.period_secs = period_secs;
    }
    if let Some(max_attempts) = options.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    } else {
        log::set_max_level(level_filter(&config.log_level));
    }

    Ok(config)
}

/// Controller for commands that call the provider
fn translating_controller(options: &CommonArgs) -> Result<Controller> {
    let config = load_config(options)?;
    config.validate().context("Configuration validation failed")?;
    Ok(Controller::with_config(config)?.with_progress(!options.no_progress))
}

/// Controller for commands that only touch the cache
fn cache_controller(options: &CommonArgs) -> Result<Controller> {
    Controller::for_cache(load_config(options)?)
}

fn output_path(controller: &Controller, pipeline: Pipeline, input: &Path, output: &Option<PathBuf>) -> PathBuf {
    output
        .clone()
        .unwrap_or_else(|| controller.default_output_path(pipeline, input))
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the global max level does the filtering
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    let complete = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "dataset-translator", &mut std::io::stdout());
            true
        }
        Commands::Instructions { input, common } => {
            let controller = translating_controller(&common)?;
            let output = output_path(&controller, Pipeline::Instructions, &input, &common.output);
            let summary = controller.run_instructions(&input, &output).await?;
            info!("{}", summary);
            summary.is_complete()
        }
        Commands::MultipleChoice { input, common } => {
            let controller = translating_controller(&common)?;
            let output = output_path(&controller, Pipeline::MultipleChoice, &input, &common.output);
            let summary = controller.run_multiple_choice(&input, &output).await?;
            info!("{}", summary);
            summary.is_complete()
        }
        Commands::Export { pipeline, input, common } => {
            let controller = cache_controller(&common)?;
            let pipeline: Pipeline = pipeline.into();
            let output = output_path(&controller, pipeline, &input, &common.output);
            controller.export(pipeline, &input, &output)?.is_complete()
        }
        Commands::Status {
            pipeline,
            input,
            verbose,
            common,
        } => {
            let controller = cache_controller(&common)?;
            let status = controller.status(pipeline.into(), &input)?;
            info!("{}", status);
            if verbose && !status.pending.is_empty() {
                info!("Pending indices: {:?}", status.pending);
            }
            true
        }
        Commands::Invalidate {
            pipeline,
            indices,
            common,
        } => {
            let controller = cache_controller(&common)?;
            controller.invalidate(pipeline.into(), &indices)?;
            true
        }
    };

    if !complete {
        error!("Some items were not translated; run the same command again to retry them");
        std::process::exit(2);
    }

    Ok(())
}

//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.titlescope.toml` files.

use crate::agent::{ClientConfig, Provider};
use crate::analysis::{TopCategoryAggregator, DEFAULT_SEPARATOR, DEFAULT_TOP_N};
use crate::chart::ChartOptions;
use crate::models::{default_question_groups, QuestionGroup};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".titlescope.toml";

/// Placeholder in the chart title replaced by the number of categories.
pub const TOP_N_PLACEHOLDER: &str = "{n}";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Dataset settings.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Top-category chart settings.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Question groups asked in order.
    #[serde(default = "default_question_groups")]
    pub questions: Vec<QuestionGroup>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            model: ModelConfig::default(),
            dataset: DatasetConfig::default(),
            chart: ChartConfig::default(),
            questions: default_question_groups(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory receiving all charts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Optional report file path.
    #[serde(default)]
    pub report: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            report: None,
            verbose: false,
        }
    }
}

fn default_output_dir() -> String {
    "exports/charts_generated_using_rust".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model provider.
    #[serde(default)]
    pub provider: Provider,

    /// Model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// API base URL; the provider default when unset.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Temperature for generation.
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transient failure.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Rows of the table shown to the model as a sample.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            name: default_model(),
            api_url: None,
            temperature: 0.0,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            sample_rows: default_sample_rows(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> usize {
    2
}

fn default_sample_rows() -> usize {
    5
}

/// Dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// CSV file with a header row.
    #[serde(default = "default_dataset_path")]
    pub path: String,

    /// Columns converted to numbers after loading.
    #[serde(default = "default_numeric_columns")]
    pub numeric_columns: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            numeric_columns: default_numeric_columns(),
        }
    }
}

fn default_dataset_path() -> String {
    "netflix_titles.csv".to_string()
}

fn default_numeric_columns() -> Vec<String> {
    vec!["release_year".to_string()]
}

/// Top-category chart settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Multi-value column to aggregate.
    #[serde(default = "default_column")]
    pub column: String,

    /// Separator between tokens in a cell.
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Number of categories shown.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Trim whitespace around tokens before counting.
    #[serde(default)]
    pub trim_tokens: bool,

    /// Chart file name inside the output directory (.png or .svg).
    #[serde(default = "default_chart_file")]
    pub file_name: String,

    /// Chart title; `{n}` is replaced with `top_n`.
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_x_label")]
    pub x_label: String,

    #[serde(default = "default_y_label")]
    pub y_label: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            column: default_column(),
            separator: default_separator(),
            top_n: default_top_n(),
            trim_tokens: false,
            file_name: default_chart_file(),
            title: default_title(),
            x_label: default_x_label(),
            y_label: default_y_label(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_column() -> String {
    "country".to_string()
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_chart_file() -> String {
    "top_countries.png".to_string()
}

fn default_title() -> String {
    "Top {n} Content Producing Countries on Netflix".to_string()
}

fn default_x_label() -> String {
    "Country".to_string()
}

fn default_y_label() -> String {
    "Number of Titles".to_string()
}

fn default_width() -> u32 {
    1000
}

fn default_height() -> u32 {
    500
}

impl ChartConfig {
    pub fn aggregator(&self) -> TopCategoryAggregator {
        TopCategoryAggregator::new(self.column.clone())
            .separator(self.separator.clone())
            .top_n(self.top_n)
            .trim_tokens(self.trim_tokens)
    }

    pub fn options(&self) -> ChartOptions {
        ChartOptions {
            title: self.title.replace(TOP_N_PLACEHOLDER, &self.top_n.to_string()),
            x_label: self.x_label.clone(),
            y_label: self.y_label.clone(),
            width: self.width,
            height: self.height,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data) = args.data {
            self.dataset.path = data.display().to_string();
        }
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.display().to_string();
        }
        if let Some(ref report) = args.report {
            self.general.report = Some(report.display().to_string());
        }

        // Model settings
        if let Some(provider) = args.provider {
            if provider != self.model.provider {
                // a URL configured for another provider no longer applies
                self.model.api_url = None;
            }
            self.model.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.api_url {
            self.model.api_url = Some(url.clone());
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.model.retries = retries;
        }

        // Chart settings
        if let Some(ref column) = args.column {
            self.chart.column = column.clone();
        }
        if let Some(ref separator) = args.separator {
            self.chart.separator = separator.clone();
        }
        if let Some(top_n) = args.top_n {
            self.chart.top_n = top_n;
        }
        if let Some(ref file) = args.chart_file {
            self.chart.file_name = file.clone();
        }
        if args.trim_tokens {
            self.chart.trim_tokens = true;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level after merging: `--quiet` wins, then `verbose` from the
    /// command line or the file.
    pub fn log_level(&self, args: &crate::cli::Args) -> tracing::Level {
        if !args.quiet && self.general.verbose {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Chat client settings. The API key is supplied separately and never
    /// stored in the file.
    pub fn client_config(&self, api_key: Option<String>) -> ClientConfig {
        ClientConfig {
            provider: self.model.provider,
            base_url: self
                .model
                .api_url
                .clone()
                .unwrap_or_else(|| self.model.provider.default_url().to_string()),
            model_name: self.model.name.clone(),
            api_key,
            temperature: self.model.temperature,
            timeout_seconds: self.model.timeout_seconds,
            retries: self.model.retries,
        }
    }

    /// Full path of the top-category chart.
    pub fn chart_path(&self) -> PathBuf {
        Path::new(&self.general.output_dir).join(&self.chart.file_name)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

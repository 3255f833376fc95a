//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Most options are optional so that values from
//! `.titlescope.toml` apply unless overridden here.

use crate::agent::Provider;
use clap::Parser;
use std::path::PathBuf;

/// TitleScope - ask an LLM about a title catalogue and chart its top categories
///
/// Loads a CSV of titles, sends a fixed list of research questions to a
/// language model, and always renders a deterministic top-N bar chart of a
/// multi-value column (countries by default).
///
/// Examples:
///   titlescope --data netflix_titles.csv
///   titlescope --data netflix_titles.csv --provider ollama --model llama3.2:latest
///   titlescope --dry-run --column listed_in --top-n 15 --chart-file genres.png
///   titlescope --report run.md
///   titlescope --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// CSV dataset with a header row
    ///
    /// Default: from config or netflix_titles.csv
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Directory for generated charts
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .titlescope.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model provider (openai, ollama)
    #[arg(long, value_name = "PROVIDER")]
    pub provider: Option<Provider>,

    /// Model name
    ///
    /// Can also be set via TITLESCOPE_MODEL env var or .titlescope.toml config.
    #[arg(short, long, env = "TITLESCOPE_MODEL")]
    pub model: Option<String>,

    /// API base URL (defaults to the provider's public endpoint)
    #[arg(long, value_name = "URL", env = "TITLESCOPE_API_URL")]
    pub api_url: Option<String>,

    /// API key for the model provider
    #[arg(long, value_name = "KEY", env = "PANDASAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Retries for timeouts, connection failures and 429/5xx responses
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Multi-value column to aggregate for the top-N chart
    #[arg(long, value_name = "NAME")]
    pub column: Option<String>,

    /// Separator between tokens in a cell
    #[arg(long, value_name = "SEP")]
    pub separator: Option<String>,

    /// Number of categories in the top-N chart
    #[arg(long, value_name = "N")]
    pub top_n: Option<usize>,

    /// File name of the top-N chart inside the output directory (.png or .svg)
    #[arg(long, value_name = "FILE")]
    pub chart_file: Option<String>,

    /// Trim whitespace around tokens before counting
    #[arg(long)]
    pub trim_tokens: bool,

    /// Write a run report to this file
    #[arg(short, long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Dry run: load the data and draw the top-N chart without calling the LLM
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the LLM questions but still require valid model settings
    #[arg(long)]
    pub skip_questions: bool,

    /// Exit with code 2 if any question failed
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .titlescope.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate API URL format
        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate temperature range
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.top_n == Some(0) {
            return Err("Top-N must be at least 1".to_string());
        }

        if let Some(ref separator) = self.separator {
            if separator.is_empty() {
                return Err("Separator must not be empty".to_string());
            }
        }

        if let Some(ref file) = self.chart_file {
            let lower = file.to_lowercase();
            if !lower.ends_with(".png") && !lower.ends_with(".svg") {
                return Err("Chart file must end in .png or .svg".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref data) = self.data {
            if !data.is_file() {
                return Err(format!("Dataset file does not exist: {}", data.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args::parse_from(["titlescope"])
    }

    #[test]
    fn test_defaults_are_unset() {
        let args = make_args();
        assert!(args.data.is_none());
        assert!(args.top_n.is_none());
        assert_eq!(args.format, OutputFormat::Markdown);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_provider_and_format() {
        let args = Args::parse_from(["titlescope", "--provider", "ollama", "--format", "json"]);
        assert_eq!(args.provider, Some(Provider::Ollama));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.api_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_top_n_and_chart_file() {
        let mut args = make_args();
        args.top_n = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.chart_file = Some("top.jpg".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.chart_file = Some("top.SVG".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_dataset() {
        let mut args = make_args();
        args.data = Some(PathBuf::from("/definitely/not/here.csv"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}

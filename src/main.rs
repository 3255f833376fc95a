//! TitleScope - LLM-assisted title catalogue explorer
//!
//! A CLI tool that loads a catalogue of titles, asks a language model a
//! fixed set of research questions about it, and renders a deterministic
//! top-N category chart.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (dataset, config, chart or model setup failure)
//!   2 - Some questions failed and --strict was set

mod agent;
mod analysis;
mod chart;
mod cli;
mod config;
mod models;
mod report;
mod session;
mod table;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use models::{QuestionRecord, RunMetadata, RunReport, SessionSummary, TopCategorySection};
use std::path::Path;
use std::time::Instant;
use table::Table;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(&args));

    info!("TitleScope v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Effective configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .titlescope.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .titlescope.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .titlescope.toml")?;

    println!("✅ Created .titlescope.toml with default settings.");
    println!("   Edit it to customize the model, chart and research questions.");
    Ok(())
}

/// Initialize logging at the given level. `RUST_LOG` wins when set.
fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: Load the dataset
    let dataset_path = Path::new(&config.dataset.path);
    let table = load_table(dataset_path, &config.dataset.numeric_columns)?;
    println!(
        "1. Dataset loaded: {} rows, {} columns",
        table.row_count(),
        table.column_count()
    );

    let output_dir = config.general.output_dir.clone();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    // Step 2: Ask the research questions. A model that cannot be set up
    // does not prevent the fallback chart.
    let mut setup_error = None;
    let (records, provider, model_used) = if args.dry_run {
        handle_dry_run(&config);
        (Vec::new(), "none".to_string(), "none".to_string())
    } else {
        let records = match ask_questions(&args, &config, &table).await {
            Ok(records) => records,
            Err(e) => {
                error!("Model setup failed: {:#}", e);
                eprintln!("❌ Questions skipped: {:#}", e);
                setup_error = Some(format!("{:#}", e));
                Vec::new()
            }
        };
        (
            records,
            config.model.provider.to_string(),
            config.model.name.clone(),
        )
    };

    // Step 3: Deterministic top-category chart
    println!(
        "\n📈 Rendering top {} '{}' chart...",
        config.chart.top_n, config.chart.column
    );
    let top_categories = render_top_categories(&config, &table);
    let chart_failed = top_categories.error.is_some();

    // Step 4: Report
    let summary = SessionSummary::from_records(&records);
    let report = RunReport {
        metadata: RunMetadata {
            dataset: config.dataset.path.clone(),
            rows: table.row_count(),
            columns: table.column_count(),
            provider,
            model_used,
            run_date: Utc::now(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        summary: summary.clone(),
        records,
        setup_error,
        top_categories: Some(top_categories),
    };

    if let Some(ref report_path) = config.general.report {
        write_report(&report, Path::new(report_path), args.format)?;
    }

    print_summary(&summary, start_time.elapsed().as_secs_f64());

    if chart_failed || report.setup_error.is_some() {
        return Ok(1);
    }

    if args.strict && summary.failed > 0 {
        eprintln!(
            "\n⛔ {} question(s) failed. Failing (exit code 2).",
            summary.failed
        );
        return Ok(2);
    }

    Ok(0)
}

/// Load the CSV and coerce the configured numeric columns.
fn load_table(path: &Path, numeric_columns: &[String]) -> Result<Table> {
    let mut table = Table::load_csv(path)
        .with_context(|| format!("Failed to load dataset: {}", path.display()))?;

    for column in numeric_columns {
        match table.coerce_numeric(column) {
            Ok(rejected) => debug!("Coerced '{}' to numbers ({} rejected)", column, rejected),
            Err(e) => warn!("Skipping numeric coercion: {}", e),
        }
    }

    Ok(table)
}

/// Build the agent and run every question group.
async fn ask_questions(
    args: &Args,
    config: &Config,
    table: &Table,
) -> Result<Vec<QuestionRecord>> {
    println!("\n2. Checking model settings...");

    let client_config = config.client_config(args.api_key.clone());
    println!("   Provider: {}", client_config.provider);
    println!("   Model: {}", client_config.model_name);
    println!("   Endpoint: {}", client_config.base_url);
    println!(
        "   API key: {}",
        if client_config.api_key.is_some() {
            "found"
        } else {
            "not set"
        }
    );

    if args.skip_questions {
        println!("   Skipping questions (--skip-questions).");
        return Ok(Vec::new());
    }

    let client = agent::LlmClient::new(client_config)
        .context("Failed to initialize the model client")?;

    let analyst = agent::TableAgent::new(
        client,
        table,
        config.model.sample_rows,
        config.general.output_dir.clone().into(),
        (config.chart.width, config.chart.height),
    );

    let session =
        session::QuestionSession::new(&analyst, &config.questions, &config.general.output_dir)
            .show_progress(!args.quiet);
    info!("Asking {} questions", session.question_count());

    let records = session.run().await;

    println!("\n{}", "=".repeat(80));
    println!("Conversation Complete!");
    println!("{}", "=".repeat(80));

    Ok(records)
}

/// Handle --dry-run: list the questions that would be asked.
fn handle_dry_run(config: &Config) {
    println!("\n🔍 Dry run: no LLM calls will be made.\n");

    let output_dir = &config.general.output_dir;
    for (g, group) in config.questions.iter().enumerate() {
        println!("   {}. {}", g + 1, group.title);
        for (i, prompt) in group.prompts.iter().enumerate() {
            println!(
                "      {}.{} {}",
                g + 1,
                i + 1,
                session::expand_prompt(prompt, output_dir)
            );
        }
    }
}

/// Aggregate the configured column and draw the chart. Failures are
/// recorded in the returned section.
fn render_top_categories(config: &Config, table: &Table) -> TopCategorySection {
    let aggregator = config.chart.aggregator();
    let chart_path = config.chart_path();

    let mut section = TopCategorySection {
        column: aggregator.column().to_string(),
        entries: Vec::new(),
        chart_path: None,
        error: None,
    };

    let result = match aggregator.aggregate(table) {
        Ok(result) => result,
        Err(e) => {
            error!("Top-category aggregation failed: {}", e);
            eprintln!("❌ Fallback visualization failed: {}", e);
            section.error = Some(e.to_string());
            return section;
        }
    };

    section.entries = result.entries.clone();

    match chart::render_top_n(&result, &config.chart.options(), &chart_path) {
        Ok(()) => {
            println!("   Fallback visualization saved: {}", chart_path.display());
            section.chart_path = Some(chart_path.display().to_string());
        }
        Err(e) => {
            error!("Chart rendering failed: {}", e);
            eprintln!("❌ Fallback visualization failed: {}", e);
            section.error = Some(e.to_string());
        }
    }

    section
}

fn write_report(report: &RunReport, path: &Path, format: OutputFormat) -> Result<()> {
    let output = match format {
        OutputFormat::Json => report::generate_json_report(report)?,
        OutputFormat::Markdown => report::generate_markdown_report(report),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }

    std::fs::write(path, &output)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;

    println!("\n📝 Report saved to: {}", path.display());
    Ok(())
}

fn print_summary(summary: &SessionSummary, duration: f64) {
    println!("\n📊 Run Summary:");
    println!("   Questions: {}", summary.total);
    println!(
        "   - 💬 Answered: {} | 📊 Charts: {} | ❌ Failed: {}",
        summary.answered, summary.charted, summary.failed
    );
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Run complete!");
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load .titlescope.toml, using defaults: {:#}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn fixture_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/netflix_sample.csv")
    }

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.general.output_dir = dir.join("charts").display().to_string();
        config
    }

    #[test]
    fn test_load_table_coerces_release_year() {
        let table = load_table(&fixture_path(), &["release_year".to_string(), "nope".to_string()])
            .unwrap();
        let years: Vec<Option<f64>> = table
            .column_values("release_year")
            .unwrap()
            .map(|v| v.as_number())
            .collect();
        assert_eq!(years[0], Some(2020.0));
        assert!(years.iter().all(|y| y.is_some()));
    }

    #[test]
    fn test_render_top_categories_fixture() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.chart.top_n = 3;
        let table = load_table(&fixture_path(), &[]).unwrap();

        let section = render_top_categories(&config, &table);

        assert!(section.error.is_none());
        let ranked: Vec<(&str, usize)> = section
            .entries
            .iter()
            .map(|e| (e.token.as_str(), e.count))
            .collect();
        assert_eq!(
            ranked,
            vec![("United States", 4), ("India", 3), ("South Africa", 1)]
        );
        assert!(config.chart_path().is_file());
    }

    #[test]
    fn test_missing_api_key_still_renders_chart() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.dataset.path = fixture_path().display().to_string();
        config.general.report = Some(dir.path().join("run.md").display().to_string());

        let mut args = Args::parse_from(["titlescope", "--quiet"]);
        args.api_key = None;

        let exit_code = tokio_test::block_on(run(args, config.clone())).unwrap();

        assert_eq!(exit_code, 1);
        assert!(config.chart_path().is_file());
        let report = std::fs::read_to_string(dir.path().join("run.md")).unwrap();
        assert!(report.contains("Questions not asked"));
        assert!(report.contains("| 1 | United States | 4 |"));
    }

    #[test]
    fn test_missing_column_writes_no_chart() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path());
        config.chart.column = "nationality".to_string();
        let table = load_table(&fixture_path(), &[]).unwrap();

        let section = render_top_categories(&config, &table);

        assert_eq!(section.error.as_deref(), Some("Column not found: nationality"));
        assert!(section.chart_path.is_none());
        assert!(!dir.path().join("charts").exists());
    }
}

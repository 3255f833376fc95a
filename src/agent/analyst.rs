//! Question answering over a loaded table.
//!
//! The model never sees the whole dataset: it gets a description of the
//! table (shape, columns, a few sample rows) and one question at a time.
//! Chart instructions are answered with a JSON chart description, which is
//! rendered locally into the output directory.

use crate::agent::client::{AgentError, ChatMessage, LlmClient};
use crate::chart::{self, ChartSpec};
use crate::table::Table;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Reply to a single question.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentReply {
    /// Plain text answer.
    Text(String),
    /// A chart was written to `path`.
    Chart { path: PathBuf, summary: String },
}

/// Anything that can answer natural-language questions about a dataset.
pub trait DataAgent {
    fn ask(&self, question: &str) -> impl Future<Output = Result<AgentReply, AgentError>> + Send;
}

/// Chart envelope the model is asked to return for chart instructions.
#[derive(Debug, Clone, Deserialize)]
struct ChartReply {
    chart: ChartSpec,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    summary: String,
}

/// A model reply after interpretation.
#[derive(Debug, Clone)]
enum ParsedReply {
    Text(String),
    Chart(ChartReply),
}

/// Agent that answers questions about one table through an LLM.
pub struct TableAgent {
    client: LlmClient,
    table_context: String,
    output_dir: PathBuf,
    chart_size: (u32, u32),
    charts_written: AtomicUsize,
}

impl TableAgent {
    pub fn new(
        client: LlmClient,
        table: &Table,
        sample_rows: usize,
        output_dir: PathBuf,
        chart_size: (u32, u32),
    ) -> Self {
        let table_context = table.describe(sample_rows);
        debug!("Table context is {} bytes", table_context.len());

        Self {
            client,
            table_context,
            output_dir,
            chart_size,
            charts_written: AtomicUsize::new(0),
        }
    }

    fn system_prompt(&self) -> String {
        format!("{}\n\n{}", SYSTEM_PROMPT, self.table_context)
    }

    fn next_chart_name(&self) -> String {
        let n = self.charts_written.fetch_add(1, Ordering::SeqCst) + 1;
        format!("chart_{}.png", n)
    }
}

impl DataAgent for TableAgent {
    async fn ask(&self, question: &str) -> Result<AgentReply, AgentError> {
        let messages = [
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(question),
        ];

        let response = self.client.chat(&messages).await?;

        match parse_reply(&response) {
            ParsedReply::Text(text) => Ok(AgentReply::Text(text)),
            ParsedReply::Chart(reply) => {
                let fallback = self.next_chart_name();
                let path = resolve_chart_path(&self.output_dir, reply.path.as_deref(), &fallback);
                chart::render_spec(&reply.chart, self.chart_size, &path)?;
                info!("Agent chart written to {}", path.display());

                Ok(AgentReply::Chart {
                    path,
                    summary: reply.summary,
                })
            }
        }
    }
}

/// Interpret a raw model reply as either a chart envelope or text.
fn parse_reply(response: &str) -> ParsedReply {
    if let Some(json) = extract_json_object(response) {
        if let Ok(reply) = serde_json::from_str::<ChartReply>(json) {
            return ParsedReply::Chart(reply);
        }
    }
    ParsedReply::Text(response.trim().to_string())
}

/// Find the JSON object in a reply, inside a code fence or bare.
fn extract_json_object(response: &str) -> Option<&str> {
    let body = match response.find("```") {
        Some(start) => {
            let after = &response[start + 3..];
            let after = after.strip_prefix("json").unwrap_or(after);
            match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            }
        }
        None => response,
    };

    let open = body.find('{')?;
    let close = body.rfind('}')?;
    (close > open).then(|| &body[open..=close])
}

/// Place a chart inside `output_dir`, keeping only the file name of any
/// model-requested path.
fn resolve_chart_path(output_dir: &Path, requested: Option<&str>, fallback: &str) -> PathBuf {
    let name = requested
        .and_then(|p| Path::new(p).file_name())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback));

    let name = match name.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") || ext.eq_ignore_ascii_case("svg") => name,
        _ => name.with_extension("png"),
    };

    output_dir.join(name)
}

const SYSTEM_PROMPT: &str = r#"You are a data analyst answering questions about a single table of Netflix titles.
Answer concisely using only the table described below. When a number is asked for, give the number.

If the user asks for a chart, do not write code. Instead reply with ONE JSON object and nothing else:
{"chart": {"kind": "bar" | "line" | "histogram", "title": "...", "x_label": "...", "y_label": "...",
"labels": ["..."], "values": [1.0]}, "path": "<file name requested by the user>", "summary": "<one or two sentences of insight>"}
"labels" and "values" must have the same length. For histograms, give the bin labels and counts.

Table description:"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartKind;

    #[test]
    fn test_parse_plain_text() {
        match parse_reply("  There are 6131 movies and 2676 TV shows.\n") {
            ParsedReply::Text(t) => assert_eq!(t, "There are 6131 movies and 2676 TV shows."),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fenced_chart() {
        let reply = r#"Here you go:
```json
{"chart": {"kind": "line", "title": "Titles per year", "labels": ["2019", "2020"], "values": [1030, 953]},
 "path": "exports/charts/content_over_time.png", "summary": "Output peaked in 2019."}
```"#;

        match parse_reply(reply) {
            ParsedReply::Chart(c) => {
                assert_eq!(c.chart.kind, ChartKind::Line);
                assert_eq!(c.chart.values, vec![1030.0, 953.0]);
                assert_eq!(c.path.as_deref(), Some("exports/charts/content_over_time.png"));
                assert_eq!(c.summary, "Output peaked in 2019.");
            }
            other => panic!("expected chart, got {:?}", other),
        }
    }

    #[test]
    fn test_json_without_chart_is_text() {
        match parse_reply(r#"{"answer": 42}"#) {
            ParsedReply::Text(t) => assert_eq!(t, r#"{"answer": 42}"#),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_chart_path_strips_directories() {
        let dir = Path::new("out");
        assert_eq!(
            resolve_chart_path(dir, Some("../../etc/top.png"), "chart_1.png"),
            PathBuf::from("out/top.png")
        );
        assert_eq!(
            resolve_chart_path(dir, Some("seasons"), "chart_1.png"),
            PathBuf::from("out/seasons.png")
        );
        assert_eq!(
            resolve_chart_path(dir, None, "chart_3.png"),
            PathBuf::from("out/chart_3.png")
        );
        assert_eq!(
            resolve_chart_path(dir, Some("plot.SVG"), "chart_1.png"),
            PathBuf::from("out/plot.SVG")
        );
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(extract_json_object("x {\"a\":1} y"), Some("{\"a\":1}"));
        assert_eq!(extract_json_object("no braces"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}

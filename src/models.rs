//! Data models for titlescope.
//!
//! This module contains the data structures shared between the question
//! session, the report generator and the configuration: question groups,
//! per-question outcomes and the run report.

use crate::analysis::CategoryCount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A titled group of research questions asked in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionGroup {
    /// Heading shown before the group's questions.
    pub title: String,
    /// Natural-language prompts sent to the agent.
    pub prompts: Vec<String>,
}

impl QuestionGroup {
    pub fn new(title: &str, prompts: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            prompts: prompts.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// The research questions asked when no configuration overrides them.
///
/// Chart prompts name their file inside `{output_dir}`, which the session
/// replaces with the configured output directory.
pub fn default_question_groups() -> Vec<QuestionGroup> {
    vec![
        QuestionGroup::new(
            "How has Netflix's content mix changed over time?",
            &[
                "How many movies and TV shows are in the dataset?",
                "How has the number of movies vs TV shows changed over the years?",
                "Which release years have the most content on Netflix?",
            ],
        ),
        QuestionGroup::new(
            "How do content ratings and duration characteristics differ between movies and TV shows on Netflix?",
            &[
                "What are the most common rating categories for movies and TV shows on Netflix?",
                "What is the distribution of movie durations on Netflix?",
                "What is the distribution of the number of seasons for TV shows on Netflix?",
            ],
        ),
        QuestionGroup::new(
            "Deeper analysis of the dataset",
            &[
                "Which countries produce the most Netflix content?",
                "What are the most common genres on Netflix?",
                "Has international content increased in recent years?",
            ],
        ),
        QuestionGroup::new(
            "Visualizations",
            &[
                "Create a bar chart showing the number of Movies versus TV Shows on Netflix. \
                 Save the chart to '{output_dir}/movies_vs_tvshows.png' and briefly summarize the insight.",
                "Create a line chart showing how many titles were released each year on Netflix. \
                 Save the chart to '{output_dir}/content_over_time.png' and describe the overall trend.",
                "Create a histogram of movie durations (in minutes) on Netflix. \
                 Save the chart to '{output_dir}/movie_duration_distribution.png' and describe the distribution.",
                "Create a bar chart showing the distribution of the number of seasons for TV shows on Netflix. \
                 Save the chart to '{output_dir}/tv_show_seasons_distribution.png' and explain the pattern.",
                "Show the top 10 countries producing Netflix content using a bar chart. \
                 Save the chart to '{output_dir}/top_countries_agent.png' and explain which countries dominate.",
            ],
        ),
    ]
}

/// What happened when a question was asked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QuestionOutcome {
    /// The agent answered in text.
    Answered { answer: String },
    /// The agent produced a chart file.
    Charted { path: String, summary: String },
    /// The question failed; the session carried on.
    Failed { error: String },
}

impl QuestionOutcome {
    /// Returns an emoji representation of the outcome.
    pub fn emoji(&self) -> &'static str {
        match self {
            QuestionOutcome::Answered { .. } => "💬",
            QuestionOutcome::Charted { .. } => "📊",
            QuestionOutcome::Failed { .. } => "❌",
        }
    }

    #[allow(dead_code)]
    pub fn is_failure(&self) -> bool {
        matches!(self, QuestionOutcome::Failed { .. })
    }
}

impl fmt::Display for QuestionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionOutcome::Answered { answer } => write!(f, "Answer: {}", answer),
            QuestionOutcome::Charted { path, summary } if summary.is_empty() => {
                write!(f, "Answer: chart saved to {}", path)
            }
            QuestionOutcome::Charted { path, summary } => {
                write!(f, "Answer: {} (chart saved to {})", summary, path)
            }
            QuestionOutcome::Failed { error } => write!(f, "Error: {}", error),
        }
    }
}

/// One asked question and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Position label such as `2.3` (group 2, question 3).
    pub id: String,
    /// Title of the group the question belongs to.
    pub group: String,
    pub question: String,
    pub outcome: QuestionOutcome,
    pub duration_seconds: f64,
}

/// Counts of outcomes across a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total: usize,
    pub answered: usize,
    pub charted: usize,
    pub failed: usize,
}

impl SessionSummary {
    pub fn from_records(records: &[QuestionRecord]) -> Self {
        let mut summary = SessionSummary {
            total: records.len(),
            ..Default::default()
        };

        for record in records {
            match record.outcome {
                QuestionOutcome::Answered { .. } => summary.answered += 1,
                QuestionOutcome::Charted { .. } => summary.charted += 1,
                QuestionOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        summary
    }
}

/// Result of the deterministic top-category chart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCategorySection {
    /// Column the categories were taken from.
    pub column: String,
    /// Ranked categories, empty when aggregation failed.
    pub entries: Vec<CategoryCount>,
    /// Where the chart was written, if it was.
    pub chart_path: Option<String>,
    /// Why the chart was not produced.
    pub error: Option<String>,
}

/// Metadata about a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Path of the loaded dataset.
    pub dataset: String,
    pub rows: usize,
    pub columns: usize,
    /// LLM provider, or `none` for dry runs.
    pub provider: String,
    pub model_used: String,
    pub run_date: DateTime<Utc>,
    pub duration_seconds: f64,
}

/// Complete transcript of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub metadata: RunMetadata,
    pub summary: SessionSummary,
    pub records: Vec<QuestionRecord>,
    /// Why no questions were asked, when the model could not be set up.
    #[serde(default)]
    pub setup_error: Option<String>,
    pub top_categories: Option<TopCategorySection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(outcome: QuestionOutcome) -> QuestionRecord {
        QuestionRecord {
            id: "1.1".to_string(),
            group: "Group".to_string(),
            question: "How many?".to_string(),
            outcome,
            duration_seconds: 0.5,
        }
    }

    #[test]
    fn test_default_groups() {
        let groups = default_question_groups();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].prompts.len(), 3);
        assert_eq!(groups[3].prompts.len(), 5);
        assert!(groups[3]
            .prompts
            .iter()
            .all(|p| p.contains("{output_dir}/")));
    }

    #[test]
    fn test_outcome_display() {
        let answered = QuestionOutcome::Answered {
            answer: "42".to_string(),
        };
        assert_eq!(answered.to_string(), "Answer: 42");

        let failed = QuestionOutcome::Failed {
            error: "timeout".to_string(),
        };
        assert_eq!(failed.to_string(), "Error: timeout");
        assert!(failed.is_failure());
    }

    #[test]
    fn test_session_summary() {
        let records = vec![
            record(QuestionOutcome::Answered {
                answer: "a".to_string(),
            }),
            record(QuestionOutcome::Charted {
                path: "c.png".to_string(),
                summary: String::new(),
            }),
            record(QuestionOutcome::Failed {
                error: "e".to_string(),
            }),
            record(QuestionOutcome::Answered {
                answer: "b".to_string(),
            }),
        ];

        let summary = SessionSummary::from_records(&records);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.answered, 2);
        assert_eq!(summary.charted, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = QuestionOutcome::Charted {
            path: "out/top.png".to_string(),
            summary: "US leads".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"charted\""));
        assert!(json.contains("\"path\":\"out/top.png\""));
    }
}

//! Markdown and JSON run reports.
//!
//! This module turns a [`RunReport`] into a readable transcript: run
//! metadata, the outcome of every question grouped as asked, and the
//! deterministic top-category table.

use crate::models::{
    QuestionOutcome, QuestionRecord, RunMetadata, RunReport, SessionSummary, TopCategorySection,
};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport) -> String {
    let mut output = String::new();

    output.push_str("# TitleScope Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));

    output.push_str(&generate_table_of_contents(report));

    output.push_str(&generate_summary_section(&report.summary));

    if let Some(ref error) = report.setup_error {
        output.push_str(&format!("> ❌ **Questions not asked:** {}\n\n", error));
    }

    output.push_str(&generate_questions_section(&report.records));

    if let Some(ref section) = report.top_categories {
        output.push_str(&generate_top_categories_section(section));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Dataset:** `{}`\n", metadata.dataset));
    section.push_str(&format!(
        "- **Shape:** {} rows, {} columns\n",
        metadata.rows, metadata.columns
    ));
    section.push_str(&format!(
        "- **Run Date:** {}\n",
        metadata.run_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Model:** `{}` ({})\n",
        metadata.model_used, metadata.provider
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &RunReport) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");

    if !report.records.is_empty() {
        toc.push_str("- [Questions](#questions)\n");
        for group in group_titles(&report.records) {
            toc.push_str(&format!("  - [{}](#{})\n", group, anchor(group)));
        }
    }

    if report.top_categories.is_some() {
        toc.push_str("- [Top Categories](#top-categories)\n");
    }

    toc.push('\n');

    toc
}

fn generate_summary_section(summary: &SessionSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| 💬 Answered | 📊 Charts | ❌ Failed | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.answered, summary.charted, summary.failed, summary.total
    ));

    section
}

fn generate_questions_section(records: &[QuestionRecord]) -> String {
    let mut section = String::new();

    section.push_str("## Questions\n\n");

    if records.is_empty() {
        section.push_str("No questions were asked in this run.\n\n");
        return section;
    }

    for group in group_titles(records) {
        section.push_str(&format!("### {} {{#{}}}\n\n", group, anchor(group)));
        for record in records.iter().filter(|r| r.group == group) {
            section.push_str(&generate_question_block(record));
        }
    }

    section
}

fn generate_question_block(record: &QuestionRecord) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "#### {} Question {}\n\n",
        record.outcome.emoji(),
        record.id
    ));
    block.push_str(&format!("> {}\n\n", record.question));

    match &record.outcome {
        QuestionOutcome::Answered { answer } => {
            block.push_str(answer.trim());
            block.push_str("\n\n");
        }
        QuestionOutcome::Charted { path, summary } => {
            block.push_str(&format!("**Chart:** `{}`\n\n", path));
            if !summary.is_empty() {
                block.push_str(summary.trim());
                block.push_str("\n\n");
            }
        }
        QuestionOutcome::Failed { error } => {
            block.push_str(&format!("**Error:** {}\n\n", error));
        }
    }

    block.push_str(&format!("*Answered in {:.1}s*\n\n", record.duration_seconds));
    block.push_str("---\n\n");

    block
}

fn generate_top_categories_section(section_data: &TopCategorySection) -> String {
    let mut section = String::new();

    section.push_str("## Top Categories\n\n");
    section.push_str(&format!("*Column: `{}`*\n\n", section_data.column));

    if let Some(ref error) = section_data.error {
        section.push_str(&format!("**Error:** {}\n\n", error));
        return section;
    }

    section.push_str("| Rank | Category | Titles |\n");
    section.push_str("|:---:|:---|:---:|\n");
    for (i, entry) in section_data.entries.iter().enumerate() {
        section.push_str(&format!("| {} | {} | {} |\n", i + 1, entry.token, entry.count));
    }
    section.push('\n');

    if let Some(ref path) = section_data.chart_path {
        section.push_str(&format!("**Chart:** `{}`\n\n", path));
    }

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by TitleScope*\n");

    footer
}

/// Group titles in first-asked order.
fn group_titles(records: &[QuestionRecord]) -> Vec<&str> {
    let mut titles: Vec<&str> = Vec::new();
    for record in records {
        if !titles.contains(&record.group.as_str()) {
            titles.push(&record.group);
        }
    }
    titles
}

fn anchor(title: &str) -> String {
    title
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c == ' ' || c == '-' {
                Some('-')
            } else {
                None
            }
        })
        .collect()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

//! Sequential question session.
//!
//! Questions are asked one at a time, group by group. A failed question is
//! recorded and printed, and the session moves on to the next one.

use crate::agent::{AgentReply, DataAgent};
use crate::models::{QuestionGroup, QuestionOutcome, QuestionRecord};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Placeholder in prompts replaced by the output directory.
pub const OUTPUT_DIR_PLACEHOLDER: &str = "{output_dir}";

/// Runs question groups against a [`DataAgent`].
pub struct QuestionSession<'a, A: DataAgent> {
    agent: &'a A,
    groups: &'a [QuestionGroup],
    output_dir: String,
    show_progress: bool,
}

impl<'a, A: DataAgent> QuestionSession<'a, A> {
    pub fn new(agent: &'a A, groups: &'a [QuestionGroup], output_dir: &str) -> Self {
        Self {
            agent,
            groups,
            output_dir: output_dir.trim_end_matches('/').to_string(),
            show_progress: true,
        }
    }

    /// Show a spinner while waiting for each answer.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Total number of questions across all groups.
    pub fn question_count(&self) -> usize {
        self.groups.iter().map(|g| g.prompts.len()).sum()
    }

    /// Ask every question in order and collect the outcomes.
    pub async fn run(&self) -> Vec<QuestionRecord> {
        let mut records = Vec::with_capacity(self.question_count());

        for (g, group) in self.groups.iter().enumerate() {
            print_group_banner(g + 1, &group.title);

            for (i, prompt) in group.prompts.iter().enumerate() {
                let id = format!("{}.{}", g + 1, i + 1);
                let question = expand_prompt(prompt, &self.output_dir);

                println!("\n{}", "─".repeat(80));
                println!("Question {}: {}", id, question);
                println!("{}", "─".repeat(80));

                let record = self.ask_one(id, &group.title, question).await;
                println!("{}", record.outcome);
                records.push(record);
            }
        }

        records
    }

    async fn ask_one(&self, id: String, group: &str, question: String) -> QuestionRecord {
        let spinner = self.spinner(&id);
        let start = Instant::now();

        let outcome = match self.agent.ask(&question).await {
            Ok(AgentReply::Text(answer)) => QuestionOutcome::Answered { answer },
            Ok(AgentReply::Chart { path, summary }) => QuestionOutcome::Charted {
                path: path.display().to_string(),
                summary,
            },
            Err(e) => {
                warn!("Question {} failed: {}", id, e);
                QuestionOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        let duration_seconds = start.elapsed().as_secs_f64();
        debug!("Question {} took {:.1}s", id, duration_seconds);

        QuestionRecord {
            id,
            group: group.to_string(),
            question,
            outcome,
            duration_seconds,
        }
    }

    fn spinner(&self, id: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Waiting for answer to question {}", id));
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

/// Substitute the output directory into a prompt.
pub fn expand_prompt(prompt: &str, output_dir: &str) -> String {
    prompt.replace(OUTPUT_DIR_PLACEHOLDER, output_dir)
}

fn print_group_banner(number: usize, title: &str) {
    println!("\n{}", "=".repeat(80));
    println!("RESEARCH QUESTION {}: {}", number, title);
    println!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::client::{AgentError, Provider};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Replays canned replies in order and records the questions it saw.
    struct ScriptedAgent {
        replies: Mutex<Vec<Result<AgentReply, AgentError>>>,
        asked: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        fn new(mut replies: Vec<Result<AgentReply, AgentError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl DataAgent for ScriptedAgent {
        async fn ask(&self, question: &str) -> Result<AgentReply, AgentError> {
            self.asked.lock().unwrap().push(question.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(AgentError::EmptyResponse))
        }
    }

    fn groups() -> Vec<QuestionGroup> {
        vec![
            QuestionGroup::new("Mix", &["How many movies?", "How many shows?"]),
            QuestionGroup::new("Charts", &["Plot it to '{output_dir}/mix.png'"]),
        ]
    }

    #[test]
    fn test_expand_prompt() {
        assert_eq!(
            expand_prompt("Save to '{output_dir}/a.png'", "exports/charts"),
            "Save to 'exports/charts/a.png'"
        );
        assert_eq!(expand_prompt("No placeholder", "x"), "No placeholder");
    }

    #[test]
    fn test_failure_does_not_stop_session() {
        let agent = ScriptedAgent::new(vec![
            Err(AgentError::Api {
                provider: Provider::Openai,
                status: 500,
                body: "boom".to_string(),
            }),
            Ok(AgentReply::Text("2676".to_string())),
            Ok(AgentReply::Chart {
                path: PathBuf::from("out/mix.png"),
                summary: "Movies dominate.".to_string(),
            }),
        ]);
        let groups = groups();
        let session = QuestionSession::new(&agent, &groups, "out/").show_progress(false);

        let records = tokio_test::block_on(session.run());

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, "1.1");
        assert!(records[0].outcome.is_failure());
        assert_eq!(
            records[1].outcome,
            QuestionOutcome::Answered {
                answer: "2676".to_string()
            }
        );
        assert_eq!(records[2].id, "2.1");
        assert_eq!(records[2].group, "Charts");
        assert!(matches!(
            &records[2].outcome,
            QuestionOutcome::Charted { path, .. } if path == "out/mix.png"
        ));
    }

    #[test]
    fn test_questions_asked_in_order_with_expansion() {
        let agent = ScriptedAgent::new(vec![
            Ok(AgentReply::Text("a".to_string())),
            Ok(AgentReply::Text("b".to_string())),
            Ok(AgentReply::Text("c".to_string())),
        ]);
        let groups = groups();
        let session = QuestionSession::new(&agent, &groups, "exports").show_progress(false);
        assert_eq!(session.question_count(), 3);

        tokio_test::block_on(session.run());

        let asked = agent.asked.lock().unwrap().clone();
        assert_eq!(
            asked,
            vec![
                "How many movies?".to_string(),
                "How many shows?".to_string(),
                "Plot it to 'exports/mix.png'".to_string(),
            ]
        );
    }
}

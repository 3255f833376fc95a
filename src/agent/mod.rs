//! LLM agent for natural-language questions about a table.
//!
//! The agent is an external collaborator: its answers are not
//! deterministic and nothing downstream depends on their content.

pub mod analyst;
pub mod client;

pub use analyst::{AgentReply, DataAgent, TableAgent};
pub use client::{ClientConfig, LlmClient, Provider};

//! The coding agent that performs the installation, plus the small
//! single-shot generators used after it.

pub mod claude;
pub mod engine;
pub mod prompt;
pub mod tools;

use crate::collaborators::types::{AgentRequest, AgentResult, ChangeSummary};
use crate::config::AppConfig;
use crate::error::{AppError, Result};
use claude::ClaudeClient;
use engine::{AgentEngine, AgentOutcome};
use tools::ToolRegistry;

const GENERATOR_MAX_TOKENS: u32 = 1024;

#[derive(Clone)]
pub struct InstallAgent {
    client: Option<ClaudeClient>,
    max_turns: u32,
    max_file_size: usize,
}

impl InstallAgent {
    pub fn new(config: &AppConfig) -> Self {
        let client = config
            .claude_api_key()
            .map(|key| ClaudeClient::new(key, &config.claude.model, config.claude.max_tokens));
        Self {
            client,
            max_turns: config.claude.max_turns,
            max_file_size: config.agent.max_file_size_bytes,
        }
    }

    fn client(&self) -> Result<&ClaudeClient> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Config(
                "No Claude API key configured; set ANTHROPIC_API_KEY or AUTHWRIGHT__CLAUDE__API_KEY"
                    .to_string(),
            )
        })
    }

    pub async fn install(&self, request: &AgentRequest) -> Result<AgentResult> {
        let engine = AgentEngine::new(
            self.client()?.clone(),
            ToolRegistry::new(self.max_file_size),
            self.max_turns,
        );
        let outcome = engine
            .run(
                &prompt::system_prompt_for_install(request.integration),
                &request.install_dir,
                &prompt::initial_message(request.integration),
            )
            .await?;

        Ok(match outcome {
            AgentOutcome::Completed { summary } => AgentResult {
                success: true,
                summary: Some(summary).filter(|s| !s.trim().is_empty()),
                error: None,
            },
            AgentOutcome::TurnLimitReached { turns } => AgentResult {
                success: false,
                summary: None,
                error: Some(format!("Agent stopped after {turns} turns without finishing")),
            },
            AgentOutcome::Failed { error } => AgentResult {
                success: false,
                summary: None,
                error: Some(error),
            },
        })
    }

    pub async fn commit_message(&self, summary: &ChangeSummary) -> Result<String> {
        let text = self
            .client()?
            .complete(
                prompt::COMMIT_MESSAGE_SYSTEM,
                &prompt::commit_message_prompt(summary),
                GENERATOR_MAX_TOKENS,
            )
            .await?;
        Ok(strip_fences(&text))
    }

    pub async fn pr_description(&self, summary: &ChangeSummary) -> Result<String> {
        let text = self
            .client()?
            .complete(
                prompt::PR_DESCRIPTION_SYSTEM,
                &prompt::pr_description_prompt(summary),
                GENERATOR_MAX_TOKENS * 2,
            )
            .await?;
        Ok(strip_fences(&text))
    }
}

/// Models sometimes wrap plain answers in a code fence anyway.
fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

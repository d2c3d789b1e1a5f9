use std::path::Path;

use crate::agent::claude::{
    extract_text, ClaudeClient, ContentBlock, Message, StopReason, Usage,
};
use crate::agent::tools::{ToolOutput, ToolRegistry};
use crate::error::Result;

/// Outcome of an agent run.
#[derive(Debug, PartialEq, Eq)]
pub enum AgentOutcome {
    /// Claude ended its turn; the final text is the summary.
    Completed { summary: String },
    TurnLimitReached { turns: u32 },
    /// Claude stopped for a reason the loop cannot continue from.
    Failed { error: String },
}

pub struct AgentEngine {
    client: ClaudeClient,
    tools: ToolRegistry,
    max_turns: u32,
}

impl AgentEngine {
    pub fn new(client: ClaudeClient, tools: ToolRegistry, max_turns: u32) -> Self {
        Self {
            client,
            tools,
            max_turns,
        }
    }

    /// Drive the tool-use conversation in `project_root` until Claude ends
    /// its turn or the turn budget runs out.
    ///
    /// API errors propagate; tool errors are handed back to Claude.
    pub async fn run(
        &self,
        system_prompt: &str,
        project_root: &Path,
        initial_message: &str,
    ) -> Result<AgentOutcome> {
        let definitions = self.tools.definitions();
        let mut messages = vec![Message::user(initial_message)];
        let mut usage = Usage::default();

        for turn in 1..=self.max_turns {
            let request = self
                .client
                .request(system_prompt, messages.clone(), definitions.clone());
            let response = self.client.send_message(&request).await?;
            usage += response.usage;

            tracing::debug!(
                turn,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                stop_reason = ?response.stop_reason,
                "Agent turn"
            );

            match response.stop_reason {
                Some(StopReason::EndTurn) | Some(StopReason::StopSequence) => {
                    tracing::info!(
                        turns = turn,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Agent finished"
                    );
                    return Ok(AgentOutcome::Completed {
                        summary: extract_text(&response.content),
                    });
                }
                Some(StopReason::ToolUse) => {
                    let results = self.run_tools(project_root, &response.content).await;
                    messages.push(Message::assistant(response.content));
                    messages.push(Message::tool_results(results));
                }
                Some(StopReason::MaxTokens) => {
                    tracing::warn!(turn, "Agent reply truncated at max_tokens");
                    messages.push(Message::assistant(response.content));
                    messages.push(Message::user("Please continue."));
                }
                other => {
                    tracing::warn!(stop_reason = ?other, "Unexpected stop reason");
                    return Ok(AgentOutcome::Failed {
                        error: format!("Agent stopped unexpectedly ({other:?})"),
                    });
                }
            }
        }

        tracing::warn!(max_turns = self.max_turns, "Agent hit turn limit");
        Ok(AgentOutcome::TurnLimitReached {
            turns: self.max_turns,
        })
    }

    /// Execute every tool call in `content`, in order, returning one result
    /// block per call.
    async fn run_tools(&self, project_root: &Path, content: &[ContentBlock]) -> Vec<ContentBlock> {
        let mut results = Vec::new();
        for block in content {
            let ContentBlock::ToolUse { id, name, input } = block else {
                continue;
            };
            let output = self.execute_tool(project_root, name, input).await;
            let (content, is_error) = match output {
                ToolOutput::Success(content) => (content, None),
                ToolOutput::Error(error) => {
                    tracing::warn!(tool = %name, error = %error, "Tool error");
                    (error, Some(true))
                }
            };
            results.push(ContentBlock::ToolResult {
                tool_use_id: id.clone(),
                content,
                is_error,
            });
        }
        results
    }

    async fn execute_tool(
        &self,
        project_root: &Path,
        name: &str,
        input: &serde_json::Value,
    ) -> ToolOutput {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutput::Error(format!("Unknown tool: {name}"));
        };
        tracing::info!(tool = name, "Executing tool");
        match tool.execute(project_root, input.clone()).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(tool = name, error = %e, "Tool execution failed");
                ToolOutput::Error(format!("Internal error: {e}"))
            }
        }
    }
}

use crate::collaborators::types::ChangeSummary;
use crate::project::configure::{client_id_var, API_KEY_VAR, REDIRECT_URI_VAR};
use crate::workflow::context::Integration;

pub fn system_prompt_for_install(integration: Integration) -> String {
    let name = integration.display_name();
    let env_file = integration.env_file();
    let client_id_var = client_id_var(integration);
    let secret_section = if integration.requires_api_key() {
        format!(
            "- `{API_KEY_VAR}` holds the secret API key. It must only ever be read on the server; never ship it to the browser."
        )
    } else {
        "- This is a client-only integration. There is no API key; do not add one.".to_string()
    };

    format!(
        r#"You are authwright, an expert engineer who adds authentication to existing {name} projects.

## Environment
The credentials are already written to `{env_file}`:
- `{client_id_var}` holds the public client id.
{secret_section}
- `{REDIRECT_URI_VAR}` holds the callback URL registered for local development.

## Instructions
1. Explore the project to find its entry points, routing and any existing auth code.
2. Install nothing yourself; if a package is needed, add it to the manifest (package.json, go.mod, requirements.txt or pyproject.toml).
3. Add sign-in, sign-out and callback handling using the authwright SDK for {name}.
4. Protect at least one existing page or route to demonstrate the session check.
5. Re-read every file you changed.

## Guidelines
- Follow the existing code style and project layout.
- Make focused changes; do not refactor unrelated code.
- Never hard-code credentials; always read them from the environment.
- Do not edit `{env_file}`.

When you are done, reply with a short summary of what you changed."#
    )
}

pub fn initial_message(integration: Integration) -> String {
    format!(
        "Add authwright authentication to this {} project. Start by listing the project root.",
        integration.display_name()
    )
}

fn describe(summary: &ChangeSummary) -> String {
    let integration = summary
        .integration
        .map(Integration::display_name)
        .unwrap_or("unknown");
    let files = summary
        .files
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");
    let agent_summary = summary.agent_summary.as_deref().unwrap_or("(none)");
    let mut text = format!(
        "Integration: {integration}\n\nChanged files:\n{files}\n\nAgent summary:\n{agent_summary}"
    );
    if !summary.preexisting_files.is_empty() {
        let preexisting = summary
            .preexisting_files
            .iter()
            .map(|f| format!("- {f}"))
            .collect::<Vec<_>>()
            .join("\n");
        text.push_str(&format!(
            "\n\nThese files already had uncommitted edits before setup. Any of them in the commit were not changed for authentication, so mention them separately:\n{preexisting}"
        ));
    }
    text
}

pub const COMMIT_MESSAGE_SYSTEM: &str = "You write git commit messages in the Conventional Commits style. Reply with the commit message only: a subject line under 72 characters, optionally followed by a blank line and a short body. No code fences.";

pub fn commit_message_prompt(summary: &ChangeSummary) -> String {
    format!(
        "Write a commit message for these changes, which add authentication.\n\n{}",
        describe(summary)
    )
}

pub const PR_DESCRIPTION_SYSTEM: &str = "You write pull request descriptions in Markdown. Reply with the description only: a `## Summary` section, a `## Changes` list and a `## Testing` section with steps to try sign-in locally.";

pub fn pr_description_prompt(summary: &ChangeSummary) -> String {
    let commit = summary.commit_message.as_deref().unwrap_or("(not committed)");
    format!(
        "Write a pull request description for these changes.\n\nCommit message:\n{commit}\n\n{}",
        describe(summary)
    )
}

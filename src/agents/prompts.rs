//! Prompt text sent to the agent CLI.

use super::{BatchReviewContext, CodeReviewContext, FileContext};

const PLAN_INSTRUCTIONS: &str = r#"You are a senior full-stack architect. Plan a complete Node.js + React application for the description below.

Cover features, data model, API routes and UI components, then list every file the project needs.

End your answer with the file list as JSON, exactly in this shape:
{"files": [{"path": "server.js", "type": "backend", "description": "Express entry point"}]}

Valid types: frontend, backend, config, other. The list MUST include package.json and server.js."#;

const PSEUDO_INSTRUCTIONS: &str = r#"Write detailed pseudocode for ONE file of the project.

Use exactly this layout:
BEGIN FILE: <path>
# Purpose:
# Imports/Dependencies:
- one line per import, e.g. import { Todo } from './models/Todo.js'
# Functions/Classes:
# Main Logic:
# Exports/Outputs:
END FILE

Reference project files by their path relative to the importing file."#;

const BATCH_REVIEW_INSTRUCTIONS: &str = r#"Review the pseudocode files below for completeness and for consistency with the plan and with each other's imports and exports.

Answer with JSON only, one entry per file path:
{"<path>": {"pass": true, "issues": ""}, "<other path>": {"pass": false, "issues": "what is wrong"}}"#;

const CODE_INSTRUCTIONS: &str = r#"Implement ONE file of the project from its verified pseudocode.

Output only the file content: no explanations and no markdown fences. JSON files must be valid JSON."#;

const CODE_REVIEW_INSTRUCTIONS: &str = r#"Check whether the code implements its pseudocode completely and correctly.

Answer on the first line with PASS or FAIL. After FAIL, list the concrete issues."#;

const SANITY_INSTRUCTIONS: &str = r#"Check that this set of files forms a coherent, runnable project for the plan: entry points exist, nothing essential is missing, imports can be satisfied.

Answer on the first line with PASS or FAIL, followed by a short explanation."#;

const PACKAGE_INSTRUCTIONS: &str = r#"List every npm package this plan needs, with a semver range.

Answer with JSON only: {"dependencies": {"express": "^4.18.2"}}"#;

pub fn plan(description: &str) -> String {
    format!("{PLAN_INSTRUCTIONS}\n\n## Application Description\n\n{description}")
}

pub fn regenerate_plan(description: &str, previous: &str, feedback: &str) -> String {
    format!(
        "{PLAN_INSTRUCTIONS}\n\n## Application Description\n\n{description}\n\n\
         ## Previous Plan\n\n{previous}\n\n## Problems To Fix\n\n{feedback}"
    )
}

pub fn packages(plan: &str) -> String {
    format!("{PACKAGE_INSTRUCTIONS}\n\n## Plan\n\n{plan}")
}

fn file_header(ctx: &FileContext<'_>) -> String {
    format!(
        "## File\n\nPath: {}\nType: {}\nPurpose: {}\n\n## Project Files\n\n{}\n\n## Plan\n\n{}",
        ctx.path, ctx.file_type, ctx.description, ctx.project_context, ctx.plan
    )
}

fn feedback_section(feedback: Option<&str>) -> String {
    match feedback {
        Some(text) if !text.trim().is_empty() => {
            format!("\n\n## Previous Attempt Was Rejected\n\n{text}")
        }
        _ => String::new(),
    }
}

pub fn pseudocode(ctx: &FileContext<'_>, feedback: Option<&str>) -> String {
    format!(
        "{PSEUDO_INSTRUCTIONS}\n\n{}{}",
        file_header(ctx),
        feedback_section(feedback)
    )
}

pub fn code(ctx: &FileContext<'_>, feedback: Option<&str>) -> String {
    let mut prompt = format!("{CODE_INSTRUCTIONS}\n\n{}", file_header(ctx));
    if let Some(pseudocode) = ctx.pseudocode {
        prompt.push_str(&format!("\n\n## Pseudocode\n\n{pseudocode}"));
    }
    if let Some(packages) = ctx.packages {
        prompt.push_str(&format!(
            "\n\n## Required Packages\n\nInclude these dependencies:\n{packages}"
        ));
    }
    prompt.push_str(&feedback_section(feedback));
    prompt
}

pub fn batch_review(ctx: &BatchReviewContext<'_>) -> String {
    let files: Vec<String> = ctx
        .files
        .iter()
        .map(|(path, pseudo)| format!("### {path}\n\n{pseudo}"))
        .collect();
    format!(
        "{BATCH_REVIEW_INSTRUCTIONS}\n\n## Plan\n\n{}\n\n## Project Dependencies\n\n{}\n\n## Files\n\n{}",
        ctx.plan,
        ctx.dependency_summary,
        files.join("\n\n")
    )
}

pub fn code_review(ctx: &CodeReviewContext<'_>) -> String {
    format!(
        "{CODE_REVIEW_INSTRUCTIONS}\n\n## File\n\n{} ({})\n\n## Pseudocode\n\n{}\n\n## Code\n\n{}",
        ctx.path, ctx.description, ctx.pseudocode, ctx.code
    )
}

pub fn sanity_check(plan: &str, file_list: &str) -> String {
    format!("{SANITY_INSTRUCTIONS}\n\n## Plan\n\n{plan}\n\n## Files\n\n{file_list}")
}

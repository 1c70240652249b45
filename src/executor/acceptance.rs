//! Local quality checks on generated content, and verdict parsing.

use crate::extract::{Extraction, json_object_spans, strip_code_fence};
use crate::storage::PSEUDO_SUFFIX;
use std::collections::HashMap;

/// Validate a pseudocode response. Returns the content to store.
pub fn accept_pseudocode(content: &str, min_chars: usize, marker: &str) -> Result<String, String> {
    let trimmed = content.trim();
    if trimmed.chars().count() < min_chars {
        return Err(format!(
            "pseudocode is too short ({} characters, at least {min_chars} expected)",
            trimmed.chars().count()
        ));
    }
    if !trimmed.contains(marker) {
        return Err(format!("pseudocode is missing the '{marker}' marker"));
    }
    Ok(trimmed.to_string())
}

/// Clean and validate a code response for `path`. Returns the content to store.
pub fn accept_code(path: &str, content: &str, min_chars: usize) -> Result<String, String> {
    let is_json = path.to_lowercase().ends_with(".json");
    let cleaned = clean_code(content, is_json);
    if cleaned.chars().count() < min_chars {
        return Err(format!(
            "code is too short ({} characters, at least {min_chars} expected)",
            cleaned.chars().count()
        ));
    }
    if is_json && let Err(e) = serde_json::from_str::<serde_json::Value>(&cleaned) {
        return Err(format!("{path} is not valid JSON: {e}"));
    }
    Ok(cleaned)
}

/// Strip markdown fences, and for non-JSON files any JSON block the agent
/// put in front of the code.
fn clean_code(content: &str, is_json: bool) -> String {
    let body = strip_code_fence(content);
    if is_json {
        return match json_object_spans(body).first() {
            Some(span) if serde_json::from_str::<serde_json::Value>(span).is_ok() => {
                span.to_string()
            }
            _ => body.to_string(),
        };
    }
    let mut rest = body.trim_start();
    while rest.starts_with('{') {
        match json_object_spans(rest).first() {
            Some(span)
                if rest.starts_with(span)
                    && serde_json::from_str::<serde_json::Value>(span).is_ok() =>
            {
                rest = rest[span.len()..].trim_start();
            }
            _ => break,
        }
    }
    strip_code_fence(rest).to_string()
}

/// One file's entry in a batch verification answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVerdict {
    pub pass: bool,
    pub issues: String,
}

/// Registry path form of a verdict key: no `./` prefix, no `.pseudo` suffix.
pub fn normalize_verdict_key(key: &str) -> String {
    let key = key.trim().trim_start_matches("./");
    key.strip_suffix(PSEUDO_SUFFIX).unwrap_or(key).to_string()
}

/// Parse a `{path: {pass, issues}}` batch verdict.
///
/// Entries without a boolean `pass` are skipped. An answer with no usable
/// entry at all is a fallback.
pub fn parse_batch_verdict(text: &str) -> Extraction<HashMap<String, FileVerdict>> {
    for span in json_object_spans(text) {
        let Ok(serde_json::Value::Object(object)) = serde_json::from_str(span) else {
            continue;
        };
        let verdicts: HashMap<String, FileVerdict> = object
            .iter()
            .filter_map(|(key, value)| {
                let pass = value.get("pass")?.as_bool()?;
                let issues = match value.get("issues") {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(serde_json::Value::Array(items)) => items
                        .iter()
                        .map(|i| i.as_str().map_or_else(|| i.to_string(), str::to_string))
                        .collect::<Vec<_>>()
                        .join("; "),
                    Some(serde_json::Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                Some((normalize_verdict_key(key), FileVerdict { pass, issues }))
            })
            .collect();
        if !verdicts.is_empty() {
            return Extraction::Parsed(verdicts);
        }
    }
    Extraction::Fallback("no {path: {pass, issues}} object in verification answer".to_string())
}

/// A single-file code verification answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeVerdict {
    Pass,
    Fail(String),
}

/// Parse a PASS/FAIL answer.
///
/// The first line starting with `PASS` or `FAIL` decides. Failing that, an
/// answer mentioning exactly one of the two words decides.
pub fn parse_code_verdict(text: &str) -> Extraction<CodeVerdict> {
    let fail_with = |text: &str| CodeVerdict::Fail(text.trim().to_string());

    for line in text.lines() {
        let upper = line.trim().trim_start_matches(['*', '#', '`', ' ']).to_uppercase();
        if upper.starts_with("PASS") {
            return Extraction::Parsed(CodeVerdict::Pass);
        }
        if upper.starts_with("FAIL") {
            return Extraction::Parsed(fail_with(text));
        }
    }

    let upper = text.to_uppercase();
    match (upper.contains("PASS"), upper.contains("FAIL")) {
        (true, false) => Extraction::Parsed(CodeVerdict::Pass),
        (false, true) => Extraction::Parsed(fail_with(text)),
        _ => Extraction::Fallback("verification answer has no clear PASS or FAIL".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PSEUDO: &str = "BEGIN FILE: server.js\n# Purpose: start the express app and mount routes\nEND FILE";

    #[test]
    fn test_accept_pseudocode() {
        assert!(accept_pseudocode(PSEUDO, 20, "BEGIN FILE").is_ok());
        assert!(accept_pseudocode("short", 20, "BEGIN FILE").is_err());
        let err = accept_pseudocode(&"x".repeat(60), 20, "BEGIN FILE").unwrap_err();
        assert!(err.contains("marker"));
    }

    #[test]
    fn test_accept_code_strips_fences() {
        let raw = "```javascript\nconst express = require('express');\nconst app = express();\n```";
        let code = accept_code("server.js", raw, 10).unwrap();
        assert!(code.starts_with("const express"));
        assert!(!code.contains("```"));
    }

    #[test]
    fn test_accept_code_drops_leading_json_block() {
        let raw = "{\"file\": \"server.js\"}\nconst app = require('express')();\napp.listen(3000);";
        let code = accept_code("server.js", raw, 10).unwrap();
        assert!(code.starts_with("const app"));
    }

    #[test]
    fn test_accept_code_keeps_code_starting_with_brace_block() {
        let raw = "{\n  const x = 1;\n  console.log(x);\n}";
        let code = accept_code("block.js", raw, 5).unwrap();
        assert_eq!(code, raw);
    }

    #[test]
    fn test_accept_code_json_must_parse() {
        let good = "Here it is:\n{\"name\": \"app\", \"version\": \"1.0.0\", \"scripts\": {}}";
        let code = accept_code("package.json", good, 10).unwrap();
        assert!(code.starts_with('{'));
        assert!(accept_code("package.json", "{\"name\": \"app\", broken", 5).is_err());
    }

    #[test]
    fn test_accept_code_too_short() {
        assert!(accept_code("a.js", "x", 10).is_err());
    }

    #[test]
    fn test_parse_batch_verdict_normalizes_keys() {
        let text = r#"Review:
{"./server.js.pseudo": {"pass": true, "issues": ""},
 "routes/api.js": {"pass": false, "issues": ["no export", "typo"]}}"#;
        let verdicts = parse_batch_verdict(text).parsed().unwrap();
        assert!(verdicts["server.js"].pass);
        assert!(!verdicts["routes/api.js"].pass);
        assert_eq!(verdicts["routes/api.js"].issues, "no export; typo");
    }

    #[test]
    fn test_parse_batch_verdict_fallback() {
        assert!(!parse_batch_verdict("looks good to me").is_parsed());
        assert!(!parse_batch_verdict(r#"{"a.js": {"ok": 1}}"#).is_parsed());
    }

    #[test]
    fn test_parse_code_verdict_first_line() {
        assert_eq!(parse_code_verdict("PASS\nall good").parsed(), Some(CodeVerdict::Pass));
        assert_eq!(
            parse_code_verdict("**FAIL**\n- missing export").parsed(),
            Some(CodeVerdict::Fail("**FAIL**\n- missing export".to_string()))
        );
    }

    #[test]
    fn test_parse_code_verdict_falls_back_to_single_word() {
        assert_eq!(
            parse_code_verdict("The verdict: it should pass.").parsed(),
            Some(CodeVerdict::Pass)
        );
        assert!(matches!(
            parse_code_verdict("Result - fail, routes missing").parsed(),
            Some(CodeVerdict::Fail(_))
        ));
        assert!(!parse_code_verdict("may pass or fail").is_parsed());
        assert!(!parse_code_verdict("no idea").is_parsed());
    }
}

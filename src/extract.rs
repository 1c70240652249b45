//! Best-effort parsing of free-form agent output.
//!
//! Agents answer in prose with JSON or structured sections embedded
//! somewhere inside. Every parser here returns an [`Extraction`] so the
//! caller decides what a miss means.

/// Outcome of pulling structured data out of free text.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    /// The structure was found and parsed.
    Parsed(T),
    /// Nothing usable; the reason says why.
    Fallback(String),
}

impl<T> Extraction<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Extraction::Parsed(_))
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            Extraction::Parsed(value) => Some(value),
            Extraction::Fallback(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extraction<U> {
        match self {
            Extraction::Parsed(value) => Extraction::Parsed(f(value)),
            Extraction::Fallback(reason) => Extraction::Fallback(reason),
        }
    }

    /// Try `next` only when this extraction fell back.
    pub fn or_else(self, next: impl FnOnce() -> Extraction<T>) -> Extraction<T> {
        match self {
            Extraction::Parsed(value) => Extraction::Parsed(value),
            Extraction::Fallback(_) => next(),
        }
    }
}

/// Every balanced `{...}` span in `text`, outermost first, in order of appearance.
///
/// Braces inside JSON string literals are ignored.
pub fn json_object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        match balanced_end(&bytes[start..]) {
            Some(len) => {
                spans.push(&text[start..start + len]);
                search_from = start + len;
            }
            None => search_from = start + 1,
        }
    }
    spans
}

/// Length of the balanced object starting at `bytes[0] == b'{'`.
fn balanced_end(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// The first embedded JSON object that parses, as a value.
pub fn first_json_object(text: &str) -> Extraction<serde_json::Value> {
    for span in json_object_spans(text) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(span)
            && value.is_object()
        {
            return Extraction::Parsed(value);
        }
    }
    Extraction::Fallback("no parsable JSON object in response".to_string())
}

/// Strip a surrounding markdown code fence, keeping the body.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim_matches('\n')
}

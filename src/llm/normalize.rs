//! Normalization of raw provider text before structured parsing.
//!
//! Providers are not guaranteed to honor "JSON only" instructions; the
//! common failure mode is wrapping the payload in a Markdown code fence.
//! Every JSON parse of provider output must run through [`clean_fences`]
//! first, which is what [`parse_structured`] does.

use serde::de::DeserializeOwned;

use super::LlmError;

/// Strip a leading/trailing Markdown code fence (optionally tagged `json`)
/// and surrounding whitespace.
///
/// Idempotent: cleaning already-clean text is a no-op.
pub fn clean_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let body = match rest.rfind("```") {
        Some(end) => &rest[..end],
        None => rest,
    };
    body.trim()
}

/// Clean and parse provider text into a structured value.
///
/// Fails with [`LlmErrorKind::MalformedResponse`](super::LlmErrorKind) when
/// the cleaned text is not valid JSON of the expected shape. Malformed
/// output is always surfaced, never silently defaulted: substituting empty
/// content here would corrupt downstream scoring.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let cleaned = clean_fences(raw);
    serde_json::from_str(cleaned).map_err(|e| {
        LlmError::malformed(format!(
            "provider output is not the expected shape: {} (cleaned text starts with: {:?})",
            e,
            cleaned.chars().take(120).collect::<String>()
        ))
    })
}

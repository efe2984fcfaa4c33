//! JSON parsing helpers for model replies
//!
//! Models often wrap the JSON payload in prose or code fences; these helpers
//! pull out the first object and parse it.

use super::CategorySuggestion;
use crate::error::{Error, Result};

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

/// Slice from the first `{` to the last `}`
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

/// Parse a category suggestion from a model reply
///
/// Confidence is clamped to 0.0 - 1.0. Percentages (e.g., 85) are scaled.
pub fn parse_suggestion(response: &str) -> Result<CategorySuggestion> {
    let response = response.trim();
    let json = extract_json_object(response).ok_or_else(|| {
        Error::Ai(format!(
            "No JSON found in AI response | Raw: {}",
            truncate(response, 200)
        ))
    })?;

    let mut suggestion: CategorySuggestion = serde_json::from_str(json).map_err(|e| {
        Error::Ai(format!(
            "Invalid JSON from AI: {} | Raw: {}",
            e,
            truncate(json, 200)
        ))
    })?;

    if suggestion.confidence > 1.0 {
        suggestion.confidence /= 100.0;
    }
    suggestion.confidence = suggestion.confidence.clamp(0.0, 1.0);
    suggestion.category = suggestion.category.trim().to_string();
    Ok(suggestion)
}

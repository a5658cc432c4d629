//! Shared utility functions.

use axum::http::HeaderMap;
use unicode_normalization::UnicodeNormalization;

use crate::models::Project;

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Canonical form for case-insensitive matching: NFC, then lowercase.
pub fn normalize_for_search(s: &str) -> String {
    s.nfc().collect::<String>().to_lowercase()
}

/// True when the project's name or description contains `query` (case-insensitive).
/// A blank query matches everything.
pub fn project_matches(project: &Project, query: &str) -> bool {
    let needle = normalize_for_search(query.trim());
    if needle.is_empty() {
        return true;
    }
    normalize_for_search(&project.name).contains(&needle)
        || project
            .description
            .as_deref()
            .is_some_and(|d| normalize_for_search(d).contains(&needle))
}

/// Keep only projects matching `query`, preserving order.
pub fn filter_projects(projects: Vec<Project>, query: &str) -> Vec<Project> {
    projects
        .into_iter()
        .filter(|p| project_matches(p, query))
        .collect()
}

/// Case-insensitive intersection of a project's required skills with a user's skills,
/// in the project's order and spelling.
pub fn matching_skills(required: &[String], have: &[String]) -> Vec<String> {
    let have: Vec<String> = have.iter().map(|s| normalize_for_search(s.trim())).collect();
    required
        .iter()
        .filter(|r| have.contains(&normalize_for_search(r.trim())))
        .cloned()
        .collect()
}

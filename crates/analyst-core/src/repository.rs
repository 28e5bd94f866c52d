//! Repository reference extraction and input classification.
//!
//! Matching is order-sensitive: the full URL pattern is tried over the whole
//! input before any whitespace token is tried as `owner/name` shorthand, so
//! `github.com/a/b/tree/main` never degrades into a shorthand match.

use once_cell::sync::Lazy;
use regex::Regex;

use analyst_types::session::RepositoryRef;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:https?://)?(?:www\.)?github\.com/([a-z0-9](?:[a-z0-9-]*[a-z0-9])?)/([a-z0-9_.-]+)",
    )
    .expect("valid url regex")
});

static SHORTHAND_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)/([A-Za-z0-9_.-]+)$")
        .expect("valid shorthand regex")
});

/// Slash-joined words that read as prose, never as `owner/name`
const NOT_REPOSITORIES: &[&str] = &[
    "and/or",
    "either/or",
    "input/output",
    "read/write",
    "true/false",
    "yes/no",
    "on/off",
    "client/server",
    "n/a",
];

const TOKEN_TRIM: &[char] = &['"', '\'', '`', '(', ')', '[', ']', '<', '>', ',', ';', ':', '!', '?'];

/// How a user input should be handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputClass {
    /// Input names a repository: start a new analysis
    Analysis(RepositoryRef),
    /// Free text: continue the conversation
    Chat,
}

pub fn classify_input(text: &str) -> InputClass {
    match extract_repository(text) {
        Some(repo) => InputClass::Analysis(repo),
        None => InputClass::Chat,
    }
}

/// Find the first repository reference in free text.
pub fn extract_repository(text: &str) -> Option<RepositoryRef> {
    if let Some(caps) = URL_PATTERN.captures(text) {
        if let Some(repo) = build_ref(&caps[1], &caps[2]) {
            return Some(repo);
        }
    }

    text.split_whitespace()
        .map(|token| token.trim_matches(TOKEN_TRIM).trim_end_matches('.'))
        .filter(|token| !token.contains("://"))
        .find_map(|token| {
            let caps = SHORTHAND_PATTERN.captures(token)?;
            if is_prose_pair(token, &caps[1], &caps[2]) {
                return None;
            }
            build_ref(&caps[1], &caps[2])
        })
}

/// Acronym pairs like `TCP/IP` and stop-listed phrases are not shorthand.
fn is_prose_pair(token: &str, owner: &str, name: &str) -> bool {
    let acronym = |part: &str| part.chars().all(|c| c.is_ascii_uppercase());
    if acronym(owner) && acronym(name) {
        return true;
    }
    NOT_REPOSITORIES
        .iter()
        .any(|phrase| phrase.eq_ignore_ascii_case(token))
}

/// `https://github.com/owner/name` for any accepted input form
pub fn normalize_repository_url(text: &str) -> Option<String> {
    extract_repository(text).map(|r| r.url())
}

fn build_ref(owner: &str, name: &str) -> Option<RepositoryRef> {
    let name = name.trim_end_matches('.');
    let name = name.strip_suffix(".git").unwrap_or(name);
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(RepositoryRef::new(owner, name))
}

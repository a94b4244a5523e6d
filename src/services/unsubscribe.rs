//! Unsubscribe link resolution.
//!
//! Turns a `List-Unsubscribe` header value, or failing that a message body,
//! into at most one actionable [`UnsubscribeLink`].

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::domain::{LinkScheme, UnsubscribeLink};

/// `<...>` tokens of a `List-Unsubscribe` value.
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("valid bracket regex"));

/// Body patterns, tried in order. Each captures the link in group 1.
static BODY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)href=["']([^"']*unsubscribe[^"']*?)["']"#,
        r#"(?i)href=["']([^"']*opt-out[^"']*?)["']"#,
        r#"(?i)href=["']([^"']*remove[^"']*?)["']"#,
        r#"(?i)(https?://[^\s"'<>]+unsubscribe[^\s"'<>]*)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid body pattern"))
    .collect()
});

/// Resolves the unsubscribe target of a message.
///
/// The directive is searched first; the body is only consulted when the
/// directive yields nothing.
pub fn resolve(directive: &str, body: Option<&str>) -> Option<UnsubscribeLink> {
    resolve_directive(directive).or_else(|| body.and_then(scrape_body))
}

/// Picks the first actionable URI of a `List-Unsubscribe` value.
///
/// Candidates are taken in document order; the first `http`, `https` or
/// `mailto` one wins regardless of scheme. A value without angle brackets is
/// treated as a single candidate.
pub fn resolve_directive(directive: &str) -> Option<UnsubscribeLink> {
    let directive = directive.trim();
    if directive.is_empty() {
        return None;
    }

    let bracketed: Vec<&str> = BRACKETED
        .captures_iter(directive)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    if bracketed.is_empty() {
        classify(directive)
    } else {
        bracketed.into_iter().find_map(classify)
    }
}

/// Scans a message body for an unsubscribe link.
pub fn scrape_body(body: &str) -> Option<UnsubscribeLink> {
    BODY_PATTERNS.iter().find_map(|pattern| {
        let captured = pattern.captures(body)?.get(1)?.as_str();
        classify(&captured.replace("&amp;", "&"))
    })
}

/// Accepts a candidate if it is an absolute URI with a usable scheme.
fn classify(candidate: &str) -> Option<UnsubscribeLink> {
    let candidate = candidate.trim();
    let url = Url::parse(candidate).ok()?;

    let scheme = match url.scheme() {
        "http" | "https" => LinkScheme::Web,
        "mailto" => LinkScheme::Mailto,
        _ => return None,
    };

    Some(UnsubscribeLink::new(candidate.to_string(), scheme))
}

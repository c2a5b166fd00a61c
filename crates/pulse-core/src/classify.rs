//! Keyword-heuristic classifier for ingested articles.
//!
//! Works on the lowercased concatenation of title and description; no
//! external state, so identical input always yields identical output.

use crate::{Category, Severity};

const CVE_KEYWORDS: &[&str] = &["cve-", "vulnerability"];
const BREACH_KEYWORDS: &[&str] = &["breach", "leak", "hack"];
const EXPLOIT_KEYWORDS: &[&str] = &["malware", "ransomware", "trojan", "exploit"];

const CRITICAL_KEYWORDS: &[&str] = &["critical", "zero-day", "actively exploited"];
const HIGH_KEYWORDS: &[&str] = &["high", "remote code execution", "rce"];
const LOW_KEYWORDS: &[&str] = &["low", "minor"];

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

/// Assign a category and severity to an article. Rules are evaluated in
/// priority order; the first matching rule wins. Severity defaults to
/// [`Severity::Medium`] when nothing matches.
pub fn classify(title: &str, description: &str) -> (Category, Severity) {
    let text = format!("{title} {description}").to_lowercase();

    let category = if contains_any(&text, CVE_KEYWORDS) {
        Category::Cve
    } else if contains_any(&text, BREACH_KEYWORDS) {
        Category::Breach
    } else if contains_any(&text, EXPLOIT_KEYWORDS) {
        Category::Exploit
    } else {
        Category::General
    };

    let severity = if contains_any(&text, CRITICAL_KEYWORDS) {
        Severity::Critical
    } else if contains_any(&text, HIGH_KEYWORDS) {
        Severity::High
    } else if contains_any(&text, LOW_KEYWORDS) {
        Severity::Low
    } else {
        Severity::Medium
    };

    (category, severity)
}

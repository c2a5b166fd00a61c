//! Core domain model and pure normalization functions for pulse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod classify;
pub mod identity;
pub mod text;
pub mod tier;

pub const CRATE_NAME: &str = "pulse-core";

/// Upper bound on stored article titles, in characters.
pub const TITLE_MAX_CHARS: usize = 255;
/// Upper bound on stored article descriptions, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Content category assigned to a news record by keyword heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cve,
    Exploit,
    Breach,
    General,
}

/// Severity assigned to a news record by keyword heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

/// Closed set of training/CTF platforms the pipeline snapshots.
///
/// The wire key doubles as the document id for the platform's stat
/// document, so there is exactly one document per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Hackthebox,
    Tryhackme,
    Ctftime,
}

impl Platform {
    pub fn key(self) -> &'static str {
        match self {
            Platform::Hackthebox => "hackthebox",
            Platform::Tryhackme => "tryhackme",
            Platform::Ctftime => "ctftime",
        }
    }
}

/// One ingested article, keyed by the identity hash of its canonical URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub category: Category,
    pub severity: Severity,
}

/// One profile snapshot for an external training/CTF platform.
///
/// Replaced wholesale on every sync run; `rank == 0` means
/// unknown/unranked and `points == 0` means not applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStat {
    pub platform: Platform,
    pub username: String,
    pub rank: u64,
    pub pwned: u64,
    pub percentile: String,
    pub tier: String,
    pub points: u64,
    pub badges: Vec<String>,
    pub badge_count: usize,
    pub profile_url: String,
    pub updated_at: DateTime<Utc>,
}

//! Per-item password health rules.
//!
//! Each rule is applied independently, so one item can carry several
//! issues. Items without issues are absent from the result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use vaultkeep_core::config::AuditConfig;
use vaultkeep_core::{ItemCategory, ItemId, VaultItem};

/// A problem found on one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Issue {
    /// Password shorter than the minimum length.
    Weak,
    /// Password shared with `peers` other items.
    Duplicate { peers: usize },
    /// Password not changed for `age_days` days.
    Old { age_days: i64 },
    /// Login without a password.
    Missing,
}

impl Issue {
    pub fn kind(&self) -> IssueKind {
        match self {
            Issue::Weak => IssueKind::Weak,
            Issue::Duplicate { .. } => IssueKind::Duplicate,
            Issue::Old { .. } => IssueKind::Old,
            Issue::Missing => IssueKind::Missing,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::Weak => write!(f, "weak password"),
            Issue::Duplicate { peers: 1 } => write!(f, "password reused by 1 other item"),
            Issue::Duplicate { peers } => write!(f, "password reused by {peers} other items"),
            Issue::Old { age_days } => write!(f, "password unchanged for {age_days} days"),
            Issue::Missing => write!(f, "no password set"),
        }
    }
}

/// Issue discriminant, for counting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    Weak,
    Duplicate,
    Old,
    Missing,
}

/// Issues per item.
pub type IssueMap = HashMap<ItemId, Vec<Issue>>;

/// Rule parameters for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub weak_min_length: usize,
    pub old_after_days: u32,
}

impl Thresholds {
    /// Thresholds for live highlighting.
    pub fn highlight(config: &AuditConfig) -> Self {
        Self {
            weak_min_length: config.weak_min_length,
            old_after_days: config.highlight_old_days,
        }
    }

    /// Thresholds for the aggregate report.
    pub fn report(config: &AuditConfig) -> Self {
        Self {
            weak_min_length: config.weak_min_length,
            old_after_days: config.report_old_days,
        }
    }
}

/// Classify every item in `items` as of `now`.
pub fn analyze(items: &[VaultItem], now: DateTime<Utc>, thresholds: &Thresholds) -> IssueMap {
    let mut by_password: HashMap<&str, usize> = HashMap::new();
    for item in items {
        if let Some(password) = item.usable_password() {
            *by_password.entry(password.expose_secret()).or_default() += 1;
        }
    }

    let mut issues = IssueMap::new();
    for item in items {
        let mut found = Vec::new();

        match item.usable_password() {
            Some(password) => {
                if password.char_count() < thresholds.weak_min_length {
                    found.push(Issue::Weak);
                }

                let sharing = by_password.get(password.expose_secret()).copied().unwrap_or(1);
                if sharing > 1 {
                    found.push(Issue::Duplicate { peers: sharing - 1 });
                }

                let age = now - item.last_modified;
                if age > chrono::Duration::days(i64::from(thresholds.old_after_days)) {
                    found.push(Issue::Old {
                        age_days: age.num_days(),
                    });
                }
            }
            None if item.category() == ItemCategory::Login => found.push(Issue::Missing),
            None => {}
        }

        if !found.is_empty() {
            issues.insert(item.id.clone(), found);
        }
    }
    issues
}

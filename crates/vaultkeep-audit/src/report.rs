//! Aggregate audit report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vaultkeep_core::ItemId;

use crate::rules::{Issue, IssueKind, IssueMap};

/// One-shot summary of a vault's password health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub total_items: usize,
    pub weak: usize,
    pub duplicate: usize,
    pub old: usize,
    pub missing: usize,
    pub issues: BTreeMap<ItemId, Vec<Issue>>,
    /// Percentage of items without any issue, 0 to 100.
    pub score: u8,
}

impl AuditReport {
    /// Build a report from an analysis over `total_items` items.
    pub fn from_issues(total_items: usize, issues: IssueMap, generated_at: DateTime<Utc>) -> Self {
        let count = |kind: IssueKind| {
            issues
                .values()
                .filter(|found| found.iter().any(|issue| issue.kind() == kind))
                .count()
        };

        let flagged = issues.len().min(total_items);
        let score = if total_items == 0 {
            100
        } else {
            ((total_items - flagged) * 100 / total_items) as u8
        };

        Self {
            generated_at,
            total_items,
            weak: count(IssueKind::Weak),
            duplicate: count(IssueKind::Duplicate),
            old: count(IssueKind::Old),
            missing: count(IssueKind::Missing),
            issues: issues.into_iter().collect(),
            score,
        }
    }

    /// Number of items with at least one issue.
    pub fn flagged_items(&self) -> usize {
        self.issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

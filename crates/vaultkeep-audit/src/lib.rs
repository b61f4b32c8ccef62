//! # vaultkeep-audit
//!
//! Security analysis over decrypted vault items.
//!
//! - [`rules`]: the per-item classification (weak, duplicate, old, missing)
//! - [`report`]: the aggregate [`AuditReport`]
//! - [`worker`]: a background [`ComputeWorker`] with priority lanes
//! - [`SecurityAuditor`]: live highlighting and reports, dispatched to the worker

pub mod auditor;
pub mod error;
pub mod report;
pub mod rules;
pub mod worker;

pub use auditor::SecurityAuditor;
pub use error::{AuditError, Result};
pub use report::AuditReport;
pub use rules::{analyze, Issue, IssueKind, IssueMap, Thresholds};
pub use worker::{ComputeWorker, Lane, TaskId};

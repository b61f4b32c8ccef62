//! The security auditor.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use vaultkeep_core::config::AuditConfig;
use vaultkeep_core::VaultItem;

use crate::error::{AuditError, Result};
use crate::report::AuditReport;
use crate::rules::{analyze, IssueMap, Thresholds};
use crate::worker::{ComputeWorker, Lane};

/// One analysis request, moved to the worker by value.
struct AnalysisRequest {
    items: Vec<VaultItem>,
    now: DateTime<Utc>,
    thresholds: Thresholds,
}

fn run_analysis(request: AnalysisRequest) -> IssueMap {
    analyze(&request.items, request.now, &request.thresholds)
}

/// Runs the password rules off the caller's path.
///
/// Vaults smaller than `audit.background_threshold` are analyzed inline;
/// larger ones go to the background worker. Live highlighting uses the
/// interactive lane and `audit.highlight_old_days`; reports use the
/// background lane and `audit.report_old_days`.
///
/// A worker request that times out or loses its thread is finished by a
/// fallback run, so callers always get a result.
pub struct SecurityAuditor {
    config: AuditConfig,
    worker: ComputeWorker<AnalysisRequest, IssueMap>,
}

impl SecurityAuditor {
    /// Create an auditor with its own worker thread.
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            worker: ComputeWorker::spawn("vaultkeep-audit", run_analysis),
        }
    }

    /// Create an auditor that always analyzes on the caller.
    pub fn inline(config: AuditConfig) -> Self {
        Self {
            config,
            worker: ComputeWorker::inline("vaultkeep-audit", run_analysis),
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Issues to highlight next to each item.
    pub async fn highlight(&self, items: &[VaultItem]) -> Result<IssueMap> {
        self.highlight_at(items, Utc::now()).await
    }

    pub async fn highlight_at(&self, items: &[VaultItem], now: DateTime<Utc>) -> Result<IssueMap> {
        let thresholds = Thresholds::highlight(&self.config);
        self.dispatch(Lane::Interactive, items, now, thresholds).await
    }

    /// Aggregate health report over the whole vault.
    pub async fn report(&self, items: &[VaultItem]) -> Result<AuditReport> {
        self.report_at(items, Utc::now()).await
    }

    pub async fn report_at(&self, items: &[VaultItem], now: DateTime<Utc>) -> Result<AuditReport> {
        let thresholds = Thresholds::report(&self.config);
        let issues = self.dispatch(Lane::Background, items, now, thresholds).await?;
        let report = AuditReport::from_issues(items.len(), issues, now);
        info!(
            total = report.total_items,
            flagged = report.flagged_items(),
            score = report.score,
            "security audit complete"
        );
        Ok(report)
    }

    async fn dispatch(
        &self,
        lane: Lane,
        items: &[VaultItem],
        now: DateTime<Utc>,
        thresholds: Thresholds,
    ) -> Result<IssueMap> {
        if items.len() < self.config.background_threshold {
            return Ok(analyze(items, now, &thresholds));
        }

        debug!(items = items.len(), ?lane, "dispatching analysis to worker");
        let request = AnalysisRequest {
            items: items.to_vec(),
            now,
            thresholds,
        };
        match self.worker.run(lane, request, self.config.task_timeout()).await {
            Ok(issues) => Ok(issues),
            // The thread died with our copy; the caller still has the items.
            Err(AuditError::WorkerUnavailable) => Ok(analyze(items, now, &thresholds)),
            Err(AuditError::Timeout { task_id, after }) => {
                warn!(%task_id, ?after, items = items.len(), "analysis timed out, running fallback");
                Ok(fallback(items, now, thresholds).await)
            }
        }
    }
}

/// Analyze on the blocking pool, or on the caller if that is unavailable.
async fn fallback(items: &[VaultItem], now: DateTime<Utc>, thresholds: Thresholds) -> IssueMap {
    let request = AnalysisRequest {
        items: items.to_vec(),
        now,
        thresholds,
    };
    match tokio::task::spawn_blocking(move || run_analysis(request)).await {
        Ok(issues) => issues,
        Err(e) => {
            warn!(error = %e, "fallback analysis task failed, analyzing inline");
            analyze(items, now, &thresholds)
        }
    }
}

//! End-of-run report and the metric batch.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::commit::{CommitAction, CommitOutcome};
use crate::gateway::MetricPoint;
use crate::propagate::ResolvedVolume;

pub const METRIC_UNTAGGED_RESOURCES: &str = "total_untagged_resources";

/// Batch summary printed at the end of a sweep. No per-resource outcome is
/// ever silent: every volume in the working set appears here.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub status: String,
    pub untagged_volumes: usize,
    pub snapshots_pending_tags: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<CommitOutcome>,
    pub messages: Vec<String>,
}

/// Volume<->snapshot relation from the resolved set. Reporting only;
/// snapshots are never committed.
pub fn snapshot_relations(resolved: &[ResolvedVolume]) -> BTreeMap<String, String> {
    resolved
        .iter()
        .filter_map(|volume| {
            volume
                .snapshot_id
                .as_ref()
                .map(|snapshot_id| (snapshot_id.clone(), volume.volume_id.clone()))
        })
        .collect()
}

pub fn build_summary(resolved: &[ResolvedVolume], outcomes: Vec<CommitOutcome>) -> RunSummary {
    let count = |action: CommitAction| {
        outcomes
            .iter()
            .filter(|outcome| outcome.action == action)
            .count()
    };

    let applied = count(CommitAction::Applied);
    let skipped = count(CommitAction::Skipped);
    let failed = count(CommitAction::Failed);
    let snapshots = snapshot_relations(resolved);
    let messages = outcomes.iter().map(CommitOutcome::message).collect();

    info!(
        total_untagged_volumes = resolved.len(),
        total_snapshots_to_tag = snapshots.len(),
        applied = applied,
        skipped = skipped,
        failed = failed,
        "Run report"
    );

    RunSummary {
        status: if failed == 0 { "success" } else { "partial" }.to_string(),
        untagged_volumes: resolved.len(),
        snapshots_pending_tags: snapshots.len(),
        applied,
        skipped,
        failed,
        outcomes,
        messages,
    }
}

/// The single gauge emitted per sweep: size of the untagged-volume working
/// set, dimensioned as `resource=volumes`.
pub fn untagged_volumes_metric(untagged_volumes: usize) -> MetricPoint {
    MetricPoint {
        name: METRIC_UNTAGGED_RESOURCES.to_string(),
        value: untagged_volumes as f64,
        dimensions: vec![("resource".to_string(), "volumes".to_string())],
    }
}

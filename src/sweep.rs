//! Full discovery sweep: index build, bulk propagation, commit, report.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span, warn};

use crate::commit::commit_volume_tags;
use crate::gateway::ResourceGateway;
use crate::index::ResourceIndex;
use crate::propagate::resolve_all;
use crate::report::{RunSummary, build_summary, untagged_volumes_metric};

/// One sweep pass. Listing failures are fatal for the run; per-volume
/// resolution and write failures are isolated into the outcome batch.
pub async fn run(
    gateway: &dyn ResourceGateway,
    propagate_keys: &[String],
    dry_run: bool,
) -> Result<RunSummary> {
    let sweep_start = Instant::now();
    let mut index = ResourceIndex::new();

    let _span = info_span!("step_1_index_instances").entered();
    let step_start = Instant::now();
    let instances = gateway
        .list_instances()
        .await
        .context("Failed to list instances")?;
    index.ingest_instances(instances);
    info!(
        duration_seconds = step_start.elapsed().as_secs_f64(),
        indexed_instances = index.instances.len(),
        "Instance index build completed"
    );
    drop(_span);

    let _span = info_span!("step_2_index_volumes").entered();
    let step_start = Instant::now();
    let volumes = gateway
        .list_volumes()
        .await
        .context("Failed to list volumes")?;
    index.ingest_volumes(volumes);
    info!(
        duration_seconds = step_start.elapsed().as_secs_f64(),
        untagged_volumes = index.volumes.len(),
        "Volume index build completed"
    );
    drop(_span);

    let _span = info_span!("step_3_resolve").entered();
    let resolved = resolve_all(&index, propagate_keys);
    info!(resolved_volumes = resolved.len(), "Propagation resolution completed");
    drop(_span);

    let _span = info_span!("step_4_commit").entered();
    let step_start = Instant::now();
    let outcomes = commit_volume_tags(gateway, &resolved, dry_run).await;
    info!(
        duration_seconds = step_start.elapsed().as_secs_f64(),
        outcomes = outcomes.len(),
        "Commit batch completed"
    );
    drop(_span);

    let summary = build_summary(&resolved, outcomes);

    // Fire-and-forget: a metric push failure never fails the sweep.
    let metric = untagged_volumes_metric(summary.untagged_volumes);
    if let Err(e) = gateway.emit_metrics(&[metric]).await {
        warn!(error = %e, "Metric push failed, continuing");
    }

    info!(
        total_duration_seconds = sweep_start.elapsed().as_secs_f64(),
        untagged_volumes = summary.untagged_volumes,
        snapshots_pending_tags = summary.snapshots_pending_tags,
        applied = summary.applied,
        "Sweep completed"
    );

    Ok(summary)
}

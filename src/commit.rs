//! Commit layer: decides per resource whether to write tags and performs
//! the write. Partial application is an expected, non-failing result.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::TagError;
use crate::gateway::ResourceGateway;
use crate::propagate::{Resolution, ResolvedVolume};
use crate::tags::TagMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitAction {
    Applied,
    Skipped,
    Failed,
}

/// Per-volume outcome of the commit batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub volume_id: String,
    pub action: CommitAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagMap>,
}

impl CommitOutcome {
    fn skipped(volume_id: &str, reason: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.to_string(),
            action: CommitAction::Skipped,
            reason: Some(reason.into()),
            tags: None,
        }
    }

    /// Human-readable batch message, one line per volume.
    pub fn message(&self) -> String {
        match self.action {
            CommitAction::Applied => format!(
                "{}={:?}",
                self.volume_id,
                self.tags.as_ref().cloned().unwrap_or_default()
            ),
            CommitAction::Skipped => format!(
                "ignoring volume {}: {}",
                self.volume_id,
                self.reason.as_deref().unwrap_or("skipped")
            ),
            CommitAction::Failed => format!(
                "failed volume {}: {}",
                self.volume_id,
                self.reason.as_deref().unwrap_or("write failed")
            ),
        }
    }
}

/// Commit the resolved volume batch.
///
/// Skip rules, first match wins: unattached, resolution error, empty tag
/// set. A rejected write fails that volume's outcome only; the loop
/// continues with the remaining volumes.
pub async fn commit_volume_tags(
    gateway: &dyn ResourceGateway,
    resolved: &[ResolvedVolume],
    dry_run: bool,
) -> Vec<CommitOutcome> {
    let mut outcomes = Vec::with_capacity(resolved.len());

    for volume in resolved {
        let outcome = match &volume.resolution {
            Resolution::Unattached => {
                CommitOutcome::skipped(&volume.volume_id, "unattached to instance")
            }
            Resolution::Failed { reason } => CommitOutcome::skipped(&volume.volume_id, reason),
            Resolution::Attached { tags, .. } if tags.is_empty() => {
                CommitOutcome::skipped(&volume.volume_id, "empty tags")
            }
            Resolution::Attached { tags, .. } => {
                write_volume_tags(gateway, &volume.volume_id, tags, dry_run).await
            }
        };

        info!(
            volume_id = %outcome.volume_id,
            action = ?outcome.action,
            reason = outcome.reason.as_deref().unwrap_or(""),
            "Volume commit outcome"
        );
        outcomes.push(outcome);
    }

    outcomes
}

async fn write_volume_tags(
    gateway: &dyn ResourceGateway,
    volume_id: &str,
    tags: &TagMap,
    dry_run: bool,
) -> CommitOutcome {
    if dry_run {
        warn!(
            volume_id = %volume_id,
            tags = ?tags,
            "DRY RUN: Would apply tags to volume (no write performed)"
        );
        return CommitOutcome {
            volume_id: volume_id.to_string(),
            action: CommitAction::Skipped,
            reason: Some("dry run".to_string()),
            tags: Some(tags.clone()),
        };
    }

    match gateway.write_tags(volume_id, tags).await {
        Ok(()) => CommitOutcome {
            volume_id: volume_id.to_string(),
            action: CommitAction::Applied,
            reason: None,
            tags: Some(tags.clone()),
        },
        Err(e) => {
            let rejected = TagError::WriteRejected {
                resource_id: volume_id.to_string(),
                reason: e.to_string(),
            };
            warn!(
                volume_id = %volume_id,
                error = %rejected,
                "Tag write rejected, continuing with remaining volumes"
            );
            CommitOutcome {
                volume_id: volume_id.to_string(),
                action: CommitAction::Failed,
                reason: Some(rejected.to_string()),
                tags: Some(tags.clone()),
            }
        }
    }
}

/// Single instance write for the event path. No skip logic: the driver only
/// calls this when there are missing tags to apply.
pub async fn commit_instance_tags(
    gateway: &dyn ResourceGateway,
    instance_id: &str,
    tags: &TagMap,
    dry_run: bool,
) -> anyhow::Result<()> {
    if dry_run {
        warn!(
            instance_id = %instance_id,
            tags = ?tags,
            "DRY RUN: Would apply required tags to instance (no write performed)"
        );
        return Ok(());
    }

    gateway.write_tags(instance_id, tags).await?;
    info!(
        instance_id = %instance_id,
        tags = ?tags,
        "Applied required tags to instance"
    );
    Ok(())
}

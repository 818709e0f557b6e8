//! Trigger-event parsing, routing, and the single-instance resolution
//! driver.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::commit::commit_instance_tags;
use crate::gateway::ResourceGateway;
use crate::required::{DerivationRule, missing_required_tags, mount_required_tags};
use crate::tags::{TagMap, tag_pairs_to_map};

const EVENT_CREATE_VOLUME: &str = "createVolume";

/// Trigger payload: `{"detail": {...}}`.
#[derive(Debug, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub detail: Option<EventDetail>,
}

#[derive(Debug, Deserialize)]
pub struct EventDetail {
    #[serde(rename = "instance-id")]
    pub instance_id: Option<String>,
    pub event: Option<String>,
}

/// Structured dispatch result. Malformed input is an `Unrecognized` value,
/// never an `Err` — the caller owns retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EventOutcome {
    InstanceTagged {
        instance_id: String,
        applied: TagMap,
    },
    InstanceCompliant {
        instance_id: String,
    },
    InstanceNotFound {
        instance_id: String,
    },
    VolumeCreateAcknowledged,
    Unrecognized {
        reason: String,
    },
}

/// Dispatch a raw trigger payload.
///
/// `Err` is reserved for gateway failures and fatal resolution errors
/// (missing derivation source); every payload-shape problem comes back as
/// `EventOutcome::Unrecognized`.
pub async fn handle_event(
    gateway: &dyn ResourceGateway,
    required_keys: &[String],
    rule: &DerivationRule,
    dry_run: bool,
    payload: &str,
) -> anyhow::Result<EventOutcome> {
    let event: TriggerEvent = match serde_json::from_str(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Trigger payload is not valid JSON");
            return Ok(EventOutcome::Unrecognized {
                reason: format!("invalid payload: {e}"),
            });
        }
    };

    let Some(detail) = event.detail else {
        warn!("Trigger payload has no detail object");
        return Ok(EventOutcome::Unrecognized {
            reason: "missing detail object".to_string(),
        });
    };

    if let Some(instance_id) = detail.instance_id {
        return resolve_instance_event(gateway, &instance_id, required_keys, rule, dry_run).await;
    }

    match detail.event.as_deref() {
        Some(EVENT_CREATE_VOLUME) => {
            // Volume-creation events are acknowledged only; the next sweep
            // picks the volume up through the propagation path.
            info!("createVolume event acknowledged, deferring to the next sweep");
            Ok(EventOutcome::VolumeCreateAcknowledged)
        }
        Some(other) => {
            warn!(event = %other, "Unsupported trigger event");
            Ok(EventOutcome::Unrecognized {
                reason: format!("unsupported event '{other}'"),
            })
        }
        None => {
            warn!("Trigger detail carries neither instance-id nor event");
            Ok(EventOutcome::Unrecognized {
                reason: "detail carries neither instance-id nor event".to_string(),
            })
        }
    }
}

/// Fill an instance's missing required tags.
///
/// The instance is fetched with the gateway's direct describe call rather
/// than the bulk listing: listing backends lag freshly created resources.
async fn resolve_instance_event(
    gateway: &dyn ResourceGateway,
    instance_id: &str,
    required_keys: &[String],
    rule: &DerivationRule,
    dry_run: bool,
) -> anyhow::Result<EventOutcome> {
    let Some(description) = gateway.get_instance(instance_id).await? else {
        warn!(instance_id = %instance_id, "Instance not found, skipping required-tag resolution");
        return Ok(EventOutcome::InstanceNotFound {
            instance_id: instance_id.to_string(),
        });
    };

    let instance_tags = tag_pairs_to_map(&description.tags);
    let missing = missing_required_tags(&instance_tags, required_keys);
    if missing.is_empty() {
        info!(instance_id = %instance_id, "Instance carries all required tags");
        return Ok(EventOutcome::InstanceCompliant {
            instance_id: instance_id.to_string(),
        });
    }

    info!(
        instance_id = %instance_id,
        missing_keys = ?missing,
        "Instance is missing required tags"
    );

    let network_tags = match &description.network_id {
        Some(network_id) => match gateway.get_network_tags(network_id).await? {
            Some(pairs) => tag_pairs_to_map(&pairs),
            None => {
                warn!(
                    instance_id = %instance_id,
                    network_id = %network_id,
                    "Network not found, deriving all missing tags"
                );
                TagMap::new()
            }
        },
        None => {
            debug!(instance_id = %instance_id, "Instance has no network, deriving all missing tags");
            TagMap::new()
        }
    };

    let to_apply = mount_required_tags(&missing, &network_tags, &instance_tags, rule)?;
    commit_instance_tags(gateway, instance_id, &to_apply, dry_run).await?;

    Ok(EventOutcome::InstanceTagged {
        instance_id: instance_id.to_string(),
        applied: to_apply,
    })
}

//! In-memory resource index built once per run from gateway listings.

use std::collections::BTreeMap;

use tracing::debug;

use crate::gateway::{BlockDeviceDescription, InstanceDescription, VolumeDescription};
use crate::tags::{TagMap, tag_pairs_to_map};

/// Indexed instance record. Mutated only during index build, read-only for
/// the rest of the run.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    pub id: String,
    pub tags: TagMap,
    pub image_id: Option<String>,
    pub network_id: Option<String>,
    /// Non-EBS devices, keyed by device name, raw descriptor kept as-is.
    pub volumes: BTreeMap<String, BlockDeviceDescription>,
    /// EBS volume id -> device name.
    pub ebs_volumes: BTreeMap<String, String>,
}

/// An untagged volume in the working set. Volumes that already carry tags
/// at discovery time never enter the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    pub snapshot_id: Option<String>,
    pub attachments: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ResourceIndex {
    pub instances: BTreeMap<String, Instance>,
    pub volumes: BTreeMap<String, Volume>,
}

impl ResourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest instance listing results. Idempotent per instance id: a
    /// repeated sighting updates the existing record in place.
    pub fn ingest_instances(&mut self, described: Vec<InstanceDescription>) {
        for desc in described {
            let record = self
                .instances
                .entry(desc.id.clone())
                .or_insert_with(|| Instance {
                    id: desc.id.clone(),
                    ..Instance::default()
                });

            record.tags = tag_pairs_to_map(&desc.tags);
            if desc.image_id.is_some() {
                record.image_id = desc.image_id;
            }
            if desc.network_id.is_some() {
                record.network_id = desc.network_id;
            }

            for device in desc.block_devices {
                match device.ebs_volume_id.clone() {
                    Some(volume_id) => {
                        record.ebs_volumes.insert(volume_id, device.device_name.clone());
                    }
                    None => {
                        record.volumes.insert(device.device_name.clone(), device);
                    }
                }
            }
        }

        debug!(indexed_instances = self.instances.len(), "Instance index built");
    }

    /// Ingest volume listing results, keeping only the untagged ones.
    pub fn ingest_volumes(&mut self, described: Vec<VolumeDescription>) {
        let mut already_tagged = 0usize;

        for desc in described {
            if !desc.tags.is_empty() {
                // Already tagged at discovery: out of the working set, never
                // re-evaluated or overwritten.
                already_tagged += 1;
                continue;
            }

            let snapshot_id = desc.snapshot_id.filter(|id| !id.is_empty());
            self.volumes.insert(
                desc.id.clone(),
                Volume {
                    id: desc.id,
                    snapshot_id,
                    attachments: desc.attached_instance_ids,
                },
            );
        }

        debug!(
            untagged_volumes = self.volumes.len(),
            already_tagged = already_tagged,
            "Volume index built"
        );
    }
}

//! Abstract interface to the cloud resource query service.
//!
//! The resolvers only ever see these description types, so the core stays
//! testable against an in-memory implementation and the AWS client lives
//! entirely behind this seam.

use anyhow::Result;
use async_trait::async_trait;

use crate::tags::TagMap;

/// Raw key/value tag entry as returned by the provider, reserved keys
/// included. Ingestion (`tags::tag_pairs_to_map`) is where filtering happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPair {
    pub key: String,
    pub value: String,
}

impl TagPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One block-device-mapping entry of an instance. `ebs_volume_id` is `None`
/// for instance-store and other non-EBS devices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockDeviceDescription {
    pub device_name: String,
    pub ebs_volume_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InstanceDescription {
    pub id: String,
    pub tags: Vec<TagPair>,
    pub image_id: Option<String>,
    pub network_id: Option<String>,
    pub block_devices: Vec<BlockDeviceDescription>,
}

#[derive(Debug, Clone, Default)]
pub struct VolumeDescription {
    pub id: String,
    pub tags: Vec<TagPair>,
    /// The EC2 API reports "no snapshot" as an empty string; the index
    /// normalizes that to `None`.
    pub snapshot_id: Option<String>,
    pub attached_instance_ids: Vec<String>,
}

/// A single gauge sample for the run metric batch.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricPoint {
    pub name: String,
    pub value: f64,
    pub dimensions: Vec<(String, String)>,
}

/// Resource query gateway consumed by the core.
///
/// Listing calls are paginated internally and return complete result sets.
/// `get_instance` is a direct describe call, not the bulk listing — listing
/// backends lag freshly created resources, and the event path needs the
/// current state.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    async fn list_instances(&self) -> Result<Vec<InstanceDescription>>;

    async fn list_volumes(&self) -> Result<Vec<VolumeDescription>>;

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceDescription>>;

    async fn get_network_tags(&self, network_id: &str) -> Result<Option<Vec<TagPair>>>;

    /// All-or-nothing per call; no partial-tag semantics.
    async fn write_tags(&self, resource_id: &str, tags: &TagMap) -> Result<()>;

    /// Fire-and-forget, batched once per run.
    async fn emit_metrics(&self, metrics: &[MetricPoint]) -> Result<()>;
}

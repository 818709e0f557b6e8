//! AWS-backed implementation of the resource query gateway.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::types::{Filter, Tag};
use tracing::{debug, info};

use crate::gateway::{
    BlockDeviceDescription, InstanceDescription, MetricPoint, ResourceGateway, TagPair,
    VolumeDescription,
};
use crate::tags::TagMap;

/// Instance states worth indexing; terminated instances keep no volumes.
const INSTANCE_STATES: [&str; 2] = ["running", "stopped"];

pub struct AwsGateway {
    ec2: aws_sdk_ec2::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    region: String,
    metric_namespace: String,
}

impl AwsGateway {
    /// Region resolution priority: explicit config value, then AWS SDK
    /// defaults (environment, credentials file, IMDS).
    pub async fn new(region: Option<&str>, metric_namespace: &str) -> Result<Self> {
        debug!("Initializing AWS SDK configuration");

        let config = match region {
            Some(r) => {
                info!(region = %r, "Using explicit AWS region from configuration");
                aws_config::defaults(BehaviorVersion::latest())
                    .region(aws_config::Region::new(r.to_string()))
                    .load()
                    .await
            }
            None => {
                debug!("Using default AWS region from AWS SDK (environment/credentials file/IMDS)");
                aws_config::load_defaults(BehaviorVersion::latest()).await
            }
        };

        let region_name = config
            .region()
            .map(|r| r.as_ref())
            .unwrap_or("unknown")
            .to_string();

        let gateway = Self {
            ec2: aws_sdk_ec2::Client::new(&config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&config),
            region: region_name,
            metric_namespace: metric_namespace.to_string(),
        };

        info!(
            region = %gateway.region,
            metric_namespace = %gateway.metric_namespace,
            "AWS gateway initialized"
        );

        Ok(gateway)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn map_tags(tags: &[Tag]) -> Vec<TagPair> {
        tags.iter()
            .filter_map(|tag| {
                let key = tag.key()?;
                let value = tag.value()?;
                Some(TagPair::new(key, value))
            })
            .collect()
    }

    fn map_instance(instance: &aws_sdk_ec2::types::Instance) -> InstanceDescription {
        let block_devices = instance
            .block_device_mappings()
            .iter()
            .filter_map(|mapping| {
                let device_name = mapping.device_name()?.to_string();
                let ebs_volume_id = mapping
                    .ebs()
                    .and_then(|ebs| ebs.volume_id())
                    .map(str::to_string);
                Some(BlockDeviceDescription {
                    device_name,
                    ebs_volume_id,
                })
            })
            .collect();

        InstanceDescription {
            id: instance.instance_id().unwrap_or_default().to_string(),
            tags: Self::map_tags(instance.tags()),
            image_id: instance.image_id().map(str::to_string),
            network_id: instance.vpc_id().map(str::to_string),
            block_devices,
        }
    }

    fn map_volume(volume: &aws_sdk_ec2::types::Volume) -> VolumeDescription {
        VolumeDescription {
            id: volume.volume_id().unwrap_or_default().to_string(),
            tags: Self::map_tags(volume.tags()),
            snapshot_id: volume
                .snapshot_id()
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            attached_instance_ids: volume
                .attachments()
                .iter()
                .filter_map(|attachment| attachment.instance_id())
                .map(str::to_string)
                .collect(),
        }
    }

    fn tag_map_to_sdk(tags: &TagMap) -> Vec<Tag> {
        tags.iter()
            .map(|(key, value)| Tag::builder().key(key).value(value).build())
            .collect()
    }
}

fn is_not_found(code: Option<&str>) -> bool {
    code.is_some_and(|code| code.ends_with(".NotFound"))
}

#[async_trait]
impl ResourceGateway for AwsGateway {
    async fn list_instances(&self) -> Result<Vec<InstanceDescription>> {
        let state_filter = Filter::builder()
            .name("instance-state-name")
            .set_values(Some(
                INSTANCE_STATES.iter().map(|s| s.to_string()).collect(),
            ))
            .build();

        let mut described = Vec::new();
        let mut pages = self
            .ec2
            .describe_instances()
            .filters(state_filter)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.context("Failed to describe instances")?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    described.push(Self::map_instance(instance));
                }
            }
        }

        debug!(instance_count = described.len(), "Instance listing completed");
        Ok(described)
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeDescription>> {
        let mut described = Vec::new();
        let mut pages = self.ec2.describe_volumes().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.context("Failed to describe volumes")?;
            for volume in page.volumes() {
                described.push(Self::map_volume(volume));
            }
        }

        debug!(volume_count = described.len(), "Volume listing completed");
        Ok(described)
    }

    async fn get_instance(&self, instance_id: &str) -> Result<Option<InstanceDescription>> {
        let response = match self
            .ec2
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if is_not_found(err.code()) => {
                debug!(instance_id = %instance_id, "Instance not found");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).context(format!("Failed to describe instance {instance_id}"));
            }
        };

        let instance = response
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .next()
            .map(Self::map_instance);

        Ok(instance)
    }

    async fn get_network_tags(&self, network_id: &str) -> Result<Option<Vec<TagPair>>> {
        let response = match self.ec2.describe_vpcs().vpc_ids(network_id).send().await {
            Ok(response) => response,
            Err(err) if is_not_found(err.code()) => {
                debug!(network_id = %network_id, "Network not found");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).context(format!("Failed to describe network {network_id}"));
            }
        };

        Ok(response
            .vpcs()
            .first()
            .map(|vpc| Self::map_tags(vpc.tags())))
    }

    async fn write_tags(&self, resource_id: &str, tags: &TagMap) -> Result<()> {
        self.ec2
            .create_tags()
            .resources(resource_id)
            .set_tags(Some(Self::tag_map_to_sdk(tags)))
            .send()
            .await
            .context(format!("Failed to write tags to {resource_id}"))?;

        debug!(
            resource_id = %resource_id,
            tag_count = tags.len(),
            api_action = "CreateTags",
            "Tags written"
        );
        Ok(())
    }

    async fn emit_metrics(&self, metrics: &[MetricPoint]) -> Result<()> {
        if metrics.is_empty() {
            return Ok(());
        }

        let mut request = self
            .cloudwatch
            .put_metric_data()
            .namespace(&self.metric_namespace);

        for metric in metrics {
            let mut datum = MetricDatum::builder()
                .metric_name(&metric.name)
                .value(metric.value)
                .unit(StandardUnit::Count);
            for (name, value) in &metric.dimensions {
                datum = datum.dimensions(Dimension::builder().name(name).value(value).build());
            }
            request = request.metric_data(datum.build());
        }

        request
            .send()
            .await
            .context("Failed to push metric batch")?;

        debug!(
            metric_count = metrics.len(),
            namespace = %self.metric_namespace,
            "Metric batch pushed"
        );
        Ok(())
    }
}

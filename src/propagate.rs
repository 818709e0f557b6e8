//! Propagation resolver: derives an untagged volume's tag set from its
//! attached instance.

use tracing::{debug, warn};

use crate::index::{ResourceIndex, Volume};
use crate::tags::{TAG_NAME, TagMap, filter_tags};

const MISSING_INSTANCE_REASON: &str = "instance tags not found";

/// Typed per-volume resolution outcome. A resolution failure is data, not a
/// run abort: it is carried into the commit batch and reported there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unattached,
    Failed { reason: String },
    Attached { instance_id: String, tags: TagMap },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVolume {
    pub volume_id: String,
    /// Kept for the volume<->snapshot relation in the run report.
    pub snapshot_id: Option<String>,
    pub resolution: Resolution,
}

/// Resolve one untagged volume against the instance index.
///
/// Volumes with several attachments are resolved per attachment and the last
/// attachment wins. Real deployments have exactly one; the tie-break matches
/// observed production behavior and is kept deliberately.
pub fn resolve_volume(
    volume: &Volume,
    index: &ResourceIndex,
    allowed_keys: &[String],
) -> ResolvedVolume {
    if volume.attachments.is_empty() {
        debug!(volume_id = %volume.id, "Volume has no attachments, nothing to propagate");
        return ResolvedVolume {
            volume_id: volume.id.clone(),
            snapshot_id: volume.snapshot_id.clone(),
            resolution: Resolution::Unattached,
        };
    }

    let mut resolution = Resolution::Unattached;
    for instance_id in &volume.attachments {
        resolution = match index.instances.get(instance_id) {
            None => {
                warn!(
                    volume_id = %volume.id,
                    instance_id = %instance_id,
                    "Attached instance missing from index, marking volume as failed"
                );
                Resolution::Failed {
                    reason: MISSING_INSTANCE_REASON.to_string(),
                }
            }
            Some(instance) => {
                let mut tags = filter_tags(&instance.tags, allowed_keys);
                // Several volumes can share the instance Name tag; the device
                // name disambiguates them.
                if let Some(name) = tags.get_mut(TAG_NAME) {
                    let device = instance
                        .ebs_volumes
                        .get(&volume.id)
                        .map(String::as_str)
                        .unwrap_or_default();
                    name.push(' ');
                    name.push_str(device);
                }
                Resolution::Attached {
                    instance_id: instance_id.clone(),
                    tags,
                }
            }
        };
    }

    ResolvedVolume {
        volume_id: volume.id.clone(),
        snapshot_id: volume.snapshot_id.clone(),
        resolution,
    }
}

/// Resolve every volume in the working set. A single volume's failure never
/// aborts the pass.
pub fn resolve_all(index: &ResourceIndex, allowed_keys: &[String]) -> Vec<ResolvedVolume> {
    index
        .volumes
        .values()
        .map(|volume| resolve_volume(volume, index, allowed_keys))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{BlockDeviceDescription, InstanceDescription, TagPair, VolumeDescription};

    fn allow(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    fn index_with_instance(id: &str, tags: Vec<TagPair>, ebs: &[(&str, &str)]) -> ResourceIndex {
        let mut index = ResourceIndex::new();
        index.ingest_instances(vec![InstanceDescription {
            id: id.to_string(),
            tags,
            block_devices: ebs
                .iter()
                .map(|(volume_id, device)| BlockDeviceDescription {
                    device_name: device.to_string(),
                    ebs_volume_id: Some(volume_id.to_string()),
                })
                .collect(),
            ..InstanceDescription::default()
        }]);
        index
    }

    fn untagged_volume(id: &str, snapshot_id: Option<&str>, attachments: &[&str]) -> Volume {
        Volume {
            id: id.to_string(),
            snapshot_id: snapshot_id.map(str::to_string),
            attachments: attachments.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_unattached_volume_resolves_unattached_even_with_snapshot() {
        let index = ResourceIndex::new();
        let volume = untagged_volume("vol-1", Some("snap-1"), &[]);

        let resolved = resolve_volume(&volume, &index, &allow(&["Name"]));

        assert_eq!(resolved.resolution, Resolution::Unattached);
        assert_eq!(resolved.snapshot_id.as_deref(), Some("snap-1"));
    }

    #[test]
    fn test_missing_instance_fails_that_volume_only() {
        let index = ResourceIndex::new();
        let volume = untagged_volume("vol-2", None, &["i-gone"]);

        let resolved = resolve_volume(&volume, &index, &allow(&["Name"]));

        assert_eq!(
            resolved.resolution,
            Resolution::Failed {
                reason: "instance tags not found".to_string()
            }
        );
    }

    #[test]
    fn test_name_tag_gets_device_suffix() {
        let index = index_with_instance(
            "i-1",
            vec![TagPair::new("Name", "web")],
            &[("vol-1", "/dev/sdb")],
        );
        let volume = untagged_volume("vol-1", None, &["i-1"]);

        let resolved = resolve_volume(&volume, &index, &allow(&["Name"]));

        match resolved.resolution {
            Resolution::Attached { instance_id, tags } => {
                assert_eq!(instance_id, "i-1");
                assert_eq!(tags.get("Name").map(String::as_str), Some("web /dev/sdb"));
            }
            other => panic!("expected attached resolution, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_device_defaults_to_empty_suffix() {
        // Volume attached but absent from the instance's EBS mapping.
        let index = index_with_instance("i-1", vec![TagPair::new("Name", "web")], &[]);
        let volume = untagged_volume("vol-1", None, &["i-1"]);

        let resolved = resolve_volume(&volume, &index, &allow(&["Name"]));

        match resolved.resolution {
            Resolution::Attached { tags, .. } => {
                assert_eq!(tags.get("Name").map(String::as_str), Some("web "));
            }
            other => panic!("expected attached resolution, got {:?}", other),
        }
    }

    #[test]
    fn test_tags_outside_allow_list_not_propagated() {
        let index = index_with_instance(
            "i-1",
            vec![TagPair::new("Name", "web"), TagPair::new("Secret", "x")],
            &[("vol-1", "/dev/sdb")],
        );
        let volume = untagged_volume("vol-1", None, &["i-1"]);

        let resolved = resolve_volume(&volume, &index, &allow(&["Name"]));

        match resolved.resolution {
            Resolution::Attached { tags, .. } => {
                assert!(!tags.contains_key("Secret"));
            }
            other => panic!("expected attached resolution, got {:?}", other),
        }
    }

    #[test]
    fn test_last_attachment_wins_on_multi_attach() {
        let mut index = index_with_instance("i-1", vec![TagPair::new("Name", "first")], &[]);
        index.ingest_instances(vec![InstanceDescription {
            id: "i-2".to_string(),
            tags: vec![TagPair::new("Name", "second")],
            ..InstanceDescription::default()
        }]);
        let volume = untagged_volume("vol-1", None, &["i-1", "i-2"]);

        let resolved = resolve_volume(&volume, &index, &allow(&["Name"]));

        match resolved.resolution {
            Resolution::Attached { instance_id, tags } => {
                assert_eq!(instance_id, "i-2");
                assert_eq!(tags.get("Name").map(String::as_str), Some("second "));
            }
            other => panic!("expected attached resolution, got {:?}", other),
        }
    }

    #[test]
    fn test_last_attachment_wins_even_when_it_fails() {
        let index = index_with_instance("i-1", vec![TagPair::new("Name", "web")], &[]);
        let volume = untagged_volume("vol-1", None, &["i-1", "i-gone"]);

        let resolved = resolve_volume(&volume, &index, &allow(&["Name"]));

        assert!(matches!(resolved.resolution, Resolution::Failed { .. }));
    }

    #[test]
    fn test_resolve_all_is_deterministic_and_isolates_failures() {
        let mut index = index_with_instance(
            "i-1",
            vec![TagPair::new("Name", "web")],
            &[("vol-ok", "/dev/sdb")],
        );
        index.ingest_volumes(vec![
            VolumeDescription {
                id: "vol-ok".to_string(),
                attached_instance_ids: vec!["i-1".to_string()],
                ..VolumeDescription::default()
            },
            VolumeDescription {
                id: "vol-orphan".to_string(),
                attached_instance_ids: vec!["i-gone".to_string()],
                ..VolumeDescription::default()
            },
        ]);

        let first = resolve_all(&index, &allow(&["Name"]));
        let second = resolve_all(&index, &allow(&["Name"]));

        assert_eq!(first, second, "same index and allow list must resolve identically");
        assert_eq!(first.len(), 2);
        assert!(
            first
                .iter()
                .any(|r| matches!(r.resolution, Resolution::Attached { .. }))
        );
        assert!(
            first
                .iter()
                .any(|r| matches!(r.resolution, Resolution::Failed { .. }))
        );
    }
}

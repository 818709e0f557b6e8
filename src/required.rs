//! Required-tag resolver for the event-driven path.
//!
//! A missing required tag is filled from the instance's network (VPC) tags
//! when present there, otherwise synthesized from a designated source tag by
//! split-and-truncate. There is no third source.

use crate::error::TagError;
use crate::tags::TagMap;

/// Rule for synthesizing a missing required tag's value from another tag.
#[derive(Debug, Clone)]
pub struct DerivationRule {
    pub source_key: String,
    pub separator: char,
    pub segment_count: usize,
}

impl DerivationRule {
    /// First `segment_count` separator-split segments of the source value,
    /// rejoined with `-`. Fewer segments than the count means all of them
    /// are used, without padding.
    pub fn derive(&self, source_value: &str) -> String {
        source_value
            .split(self.separator)
            .take(self.segment_count)
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// Required keys absent from the instance tags, in configured order.
/// Empty result means the instance is compliant and no write occurs.
pub fn missing_required_tags(instance_tags: &TagMap, required_keys: &[String]) -> Vec<String> {
    required_keys
        .iter()
        .filter(|key| !instance_tags.contains_key(*key))
        .cloned()
        .collect()
}

/// Build the tag set to apply for the missing keys.
///
/// Network tag values are copied verbatim; everything else is derived. An
/// absent derivation source tag fails the whole resolution — the source is
/// assumed always present by configuration contract.
pub fn mount_required_tags(
    missing_keys: &[String],
    network_tags: &TagMap,
    instance_tags: &TagMap,
    rule: &DerivationRule,
) -> Result<TagMap, TagError> {
    let mut mounted = TagMap::new();

    for key in missing_keys {
        let value = match network_tags.get(key) {
            Some(inherited) => inherited.clone(),
            None => {
                let source =
                    instance_tags
                        .get(&rule.source_key)
                        .ok_or_else(|| TagError::MissingSourceTag {
                            source_key: rule.source_key.clone(),
                        })?;
                rule.derive(source)
            }
        };
        mounted.insert(key.clone(), value);
    }

    Ok(mounted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(source_key: &str, separator: char, segment_count: usize) -> DerivationRule {
        DerivationRule {
            source_key: source_key.to_string(),
            separator,
            segment_count,
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn tags(entries: &[(&str, &str)]) -> TagMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    mod derivation_tests {
        use super::*;

        #[test]
        fn test_takes_leading_segments_rejoined_with_dash() {
            let rule = rule("Name", '-', 2);
            assert_eq!(rule.derive("payments-prod-web"), "payments-prod");
        }

        #[test]
        fn test_segment_count_beyond_available_uses_all_segments() {
            let rule = rule("Name", '-', 10);
            assert_eq!(rule.derive("payments-prod"), "payments-prod");
        }

        #[test]
        fn test_rejoins_with_dash_regardless_of_separator() {
            let rule = rule("Name", '.', 2);
            assert_eq!(rule.derive("payments.prod.web"), "payments-prod");
        }

        #[test]
        fn test_deterministic() {
            let rule = rule("Name", '-', 3);
            assert_eq!(rule.derive("a-b-c-d"), rule.derive("a-b-c-d"));
        }

        #[test]
        fn test_result_has_at_most_segment_count_segments() {
            let rule = rule("Name", '-', 2);
            let derived = rule.derive("a-b-c-d-e");
            assert!(derived.split('-').count() <= 2);
        }
    }

    mod missing_required_tags_tests {
        use super::*;

        #[test]
        fn test_preserves_configured_order() {
            let required = keys(&["Team", "Env", "CostCenter"]);
            let missing = missing_required_tags(&tags(&[("Env", "prod")]), &required);
            assert_eq!(missing, keys(&["Team", "CostCenter"]));
        }

        #[test]
        fn test_compliant_instance_has_no_missing_keys() {
            let required = keys(&["Team"]);
            let missing = missing_required_tags(&tags(&[("Team", "payments")]), &required);
            assert!(missing.is_empty());
        }
    }

    mod mount_required_tags_tests {
        use super::*;

        #[test]
        fn test_network_tag_inherited_verbatim() {
            let mounted = mount_required_tags(
                &keys(&["Team"]),
                &tags(&[("Team", "platform")]),
                &tags(&[]),
                &rule("Name", '-', 2),
            )
            .unwrap();

            assert_eq!(mounted, tags(&[("Team", "platform")]));
        }

        #[test]
        fn test_derivation_scenario() {
            // Required [Team, Env], instance {Team: payments, Name:
            // payments-prod-web}, empty VPC tags, rule (Name, '-', 2).
            let instance_tags = tags(&[("Team", "payments"), ("Name", "payments-prod-web")]);
            let missing = missing_required_tags(&instance_tags, &keys(&["Team", "Env"]));
            assert_eq!(missing, keys(&["Env"]));

            let mounted = mount_required_tags(
                &missing,
                &TagMap::new(),
                &instance_tags,
                &rule("Name", '-', 2),
            )
            .unwrap();

            assert_eq!(mounted, tags(&[("Env", "payments-prod")]));
        }

        #[test]
        fn test_network_wins_over_derivation() {
            let mounted = mount_required_tags(
                &keys(&["Env"]),
                &tags(&[("Env", "from-vpc")]),
                &tags(&[("Name", "payments-prod-web")]),
                &rule("Name", '-', 2),
            )
            .unwrap();

            assert_eq!(mounted.get("Env").map(String::as_str), Some("from-vpc"));
        }

        #[test]
        fn test_missing_source_tag_is_fatal_for_whole_resolution() {
            let result = mount_required_tags(
                &keys(&["Env", "Team"]),
                &TagMap::new(),
                &tags(&[]),
                &rule("Name", '-', 2),
            );

            assert_eq!(
                result,
                Err(TagError::MissingSourceTag {
                    source_key: "Name".to_string()
                })
            );
        }

        #[test]
        fn test_result_keys_are_exactly_the_missing_keys() {
            let missing = keys(&["Team", "Env"]);
            let mounted = mount_required_tags(
                &missing,
                &tags(&[("Team", "platform")]),
                &tags(&[("Name", "a-b-c")]),
                &rule("Name", '-', 2),
            )
            .unwrap();

            assert_eq!(mounted.len(), missing.len());
            for key in &missing {
                assert!(mounted.contains_key(key), "missing key '{}' not mounted", key);
            }
        }
    }
}

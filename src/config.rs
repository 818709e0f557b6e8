use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::required::DerivationRule;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ec2-tag-propagator",
    version,
    about = "Propagates and derives missing metadata tags for EC2 instances and EBS volumes"
)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Comma-separated tag keys propagated from an instance onto its volumes
    #[arg(long, env = "TAG_FILTER_KEYS", value_delimiter = ',', global = true)]
    pub propagate_tag_keys: Vec<String>,

    /// Comma-separated tag keys every instance is required to carry
    #[arg(long, env = "REQUIRED_TAG_KEYS", value_delimiter = ',', global = true)]
    pub required_tag_keys: Vec<String>,

    /// Source tag for deriving a missing required tag's value
    #[arg(long, env = "DERIVE_SOURCE_KEY", default_value = "Name", global = true)]
    pub derive_source_key: String,

    /// Separator the derivation source value is split on
    #[arg(long, env = "DERIVE_SEPARATOR", default_value = "-", global = true)]
    pub derive_separator: char,

    /// Number of leading segments kept when deriving a value
    #[arg(long, env = "DERIVE_SEGMENT_COUNT", default_value = "2", global = true)]
    pub derive_segment_count: usize,

    /// CloudWatch namespace for the run metric batch
    #[arg(
        long,
        env = "METRIC_NAMESPACE",
        default_value = "aws_resource_tagger",
        global = true
    )]
    pub metric_namespace: String,

    /// AWS region
    #[arg(long, env = "AWS_REGION", global = true)]
    pub region: Option<String>,

    /// Dry run mode (no tags are written)
    #[arg(long, env = "DRY_RUN", default_value = "false", global = true)]
    pub dry_run: bool,

    /// Log format: json or pretty
    #[arg(long, env = "LOG_FORMAT", default_value = "json", global = true)]
    pub log_format: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Full discovery sweep: index, propagate, commit, report
    Sweep,
    /// Handle a single resource-lifecycle trigger event
    Event {
        /// Path to the JSON trigger payload; omitted reads stdin
        #[arg(long)]
        payload: Option<PathBuf>,
    },
}

impl Config {
    pub fn from_args() -> Self {
        Self::parse()
    }

    pub fn derivation_rule(&self) -> DerivationRule {
        DerivationRule {
            source_key: self.derive_source_key.clone(),
            separator: self.derive_separator,
            segment_count: self.derive_segment_count,
        }
    }

    pub fn display(&self, actual_region: &str) {
        let region_info = match &self.region {
            Some(region) => region.clone(),
            None => format!("auto-detect ({})", actual_region),
        };

        tracing::info!(
            propagate_tag_keys = ?self.propagate_tag_keys,
            required_tag_keys = ?self.required_tag_keys,
            derive_source_key = %self.derive_source_key,
            derive_separator = %self.derive_separator,
            derive_segment_count = self.derive_segment_count,
            metric_namespace = %self.metric_namespace,
            region = %region_info,
            dry_run = self.dry_run,
            log_format = %self.log_format,
            log_level = %self.log_level,
            "Configuration initialized"
        );

        if self.dry_run {
            tracing::warn!("DRY RUN MODE ENABLED - No tags will be written, only logged");
        }

        if self.propagate_tag_keys.is_empty() {
            tracing::warn!(
                "No propagation tag keys configured - every resolved volume will have an empty tag set"
            );
        }
    }
}

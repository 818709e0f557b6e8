use thiserror::Error;

/// Typed failures surfaced by the tag resolvers and the commit layer.
///
/// Gateway plumbing failures stay as `anyhow` chains; these variants are the
/// decisions the core has to make about a specific resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// The derivation source tag is assumed present by configuration
    /// contract, so its absence is fatal for the whole resolution.
    #[error("derivation source tag '{source_key}' not found on instance")]
    MissingSourceTag { source_key: String },

    #[error("tag write rejected for {resource_id}: {reason}")]
    WriteRejected { resource_id: String, reason: String },
}

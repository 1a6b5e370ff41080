//! Provenance and schema descriptors attached to campaign reports.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic version describing the schema of serialized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
    /// Patch version incremented for bug fixes and documentation updates.
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Provenance information attached to every campaign report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// Hash of the parsed specification driving the campaign.
    pub spec_hash: String,
    /// Campaign timestamp, which is also the campaign directory name.
    pub campaign: String,
    /// Master sampling seed, when the design was drawn from a seeded sequence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_seed: Option<u64>,
    /// ISO-8601 timestamp recording when the report was generated.
    pub created_at: String,
    /// Schema of the report payload.
    pub schema: SchemaVersion,
    /// Version map for all tools involved in the run.
    pub tool_versions: BTreeMap<String, String>,
}
